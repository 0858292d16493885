//! Error types for the game cell

use thiserror::Error;

/// Result type for fourcell operations
pub type Result<T> = std::result::Result<T, CellError>;

/// Failure classes shared by every fourcell process
#[derive(Debug, Error)]
pub enum CellError {
    /// No capture device in the index list could be opened
    #[error("No camera available (tried indices {0:?})")]
    NoCameraAvailable(Vec<u32>),

    /// Controller connection attempts were exhausted
    #[error("Connection to {address} failed after {attempts} attempts")]
    RetriesExhausted { address: String, attempts: u32 },

    /// Column index outside the board
    #[error("Column {0} is out of range")]
    ColumnOutOfRange(i32),

    /// Column has no free cell left
    #[error("Column {0} is full")]
    ColumnFull(usize),

    /// A move was attempted by the side whose turn it is not
    #[error("Out of turn: {0}")]
    OutOfTurn(String),

    /// Search was asked to move on a full board
    #[error("No legal moves left on the board")]
    NoLegalMoves,

    /// Board contents violate the gravity invariant or the grid shape
    #[error("Invalid board: {0}")]
    InvalidBoard(String),

    /// Persisted record could not be trusted
    #[error("Corrupted game record: {0}")]
    Corrupted(String),

    /// Transient device failure
    #[error("Device error: {0}")]
    Device(String),

    /// Socket or file IPC failure
    #[error("IPC error: {0}")]
    IpcError(String),

    /// Peer replied with something the protocol does not allow
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl CellError {
    /// Whether the failure ends the process rather than being retried
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CellError::NoCameraAvailable(_) | CellError::RetriesExhausted { .. }
        )
    }

    /// Whether the failure is a rejected move that leaves state unchanged
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            CellError::ColumnOutOfRange(_) | CellError::ColumnFull(_) | CellError::OutOfTurn(_)
        )
    }
}

impl From<serde_json::Error> for CellError {
    fn from(err: serde_json::Error) -> Self {
        CellError::SerializationError(err.to_string())
    }
}
