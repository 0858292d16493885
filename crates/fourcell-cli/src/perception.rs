//! Parsing of perception grids handed to `fourcell absorb`
//!
//! Accepted forms, all in image order (top row first):
//! - a JSON array of 42 strings, or of 6 arrays of 7 strings
//! - 6 lines of 7 whitespace-separated symbols
//! - 6 lines of 7 characters

use anyhow::{Result, bail};
use fourcell_core::{CELL_COUNT, COLS};

pub fn parse_grid(text: &str) -> Result<Vec<String>> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        return parse_json(trimmed);
    }

    let mut cells = Vec::with_capacity(CELL_COUNT);
    for line in trimmed.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() == COLS {
            cells.extend(tokens.into_iter().map(String::from));
        } else if line.chars().count() == COLS {
            cells.extend(line.chars().map(String::from));
        } else {
            bail!("expected {} cells per line, got {:?}", COLS, line);
        }
    }
    Ok(cells)
}

fn parse_json(text: &str) -> Result<Vec<String>> {
    if let Ok(flat) = serde_json::from_str::<Vec<String>>(text) {
        return Ok(flat);
    }
    let rows: Vec<Vec<String>> = serde_json::from_str(text)?;
    Ok(rows.into_iter().flatten().collect())
}
