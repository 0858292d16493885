//! On-disk encoding of the game record
//!
//! The file holds a JSON envelope: the record plus a SHA-256 of its canonical
//! JSON form. Decoding never evaluates input; it parses the typed schema,
//! re-checks the board invariant and verifies the checksum.

use fourcell_core::{CellError, GameStateRecord, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    checksum: String,
    record: GameStateRecord,
}

/// Hex SHA-256 of the record's canonical JSON
pub fn checksum(record: &GameStateRecord) -> Result<String> {
    let canonical = serde_json::to_vec(record)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// Serialize a record into the persisted form
pub fn encode(record: &GameStateRecord) -> Result<Vec<u8>> {
    let envelope = Envelope {
        checksum: checksum(record)?,
        record: record.clone(),
    };
    let mut bytes = serde_json::to_vec_pretty(&envelope)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse the persisted form
pub fn decode(bytes: &[u8]) -> Result<GameStateRecord> {
    let envelope: Envelope = serde_json::from_slice(bytes)
        .map_err(|e| CellError::Corrupted(format!("unparseable record: {}", e)))?;

    let expected = checksum(&envelope.record)?;
    if !expected.eq_ignore_ascii_case(&envelope.checksum) {
        return Err(CellError::Corrupted(format!(
            "checksum mismatch: stored {}, computed {}",
            envelope.checksum, expected
        )));
    }

    Ok(envelope.record)
}
