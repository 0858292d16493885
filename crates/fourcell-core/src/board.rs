//! Connect Four board
//!
//! Row 0 is the bottom row everywhere in the workspace. The only places that
//! see the board upside down are perception input (image order, top row
//! first) and human-facing rendering; both flip exactly once, here.

use crate::error::{CellError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of rows
pub const ROWS: usize = 6;
/// Number of columns
pub const COLS: usize = 7;
/// Length of a winning line
pub const WINDOW: usize = 4;
/// Total cells on the board
pub const CELL_COUNT: usize = ROWS * COLS;

/// Sentinel for "no column pending" in the shared record and on the controller
pub const NO_COLUMN: i32 = -1;

/// State of one board cell. Serialized as 0 (empty), 1 (player), 2 (computer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Cell {
    #[default]
    Empty,
    Player,
    Computer,
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => 0,
            Cell::Player => 1,
            Cell::Computer => 2,
        }
    }
}

impl TryFrom<u8> for Cell {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::Player),
            2 => Ok(Cell::Computer),
            other => Err(format!("invalid cell value {}", other)),
        }
    }
}

impl Cell {
    /// Parse one OCR symbol. `0` is accepted as a misread `O`.
    pub fn from_symbol(symbol: &str) -> Cell {
        match symbol.trim() {
            "X" | "x" => Cell::Player,
            "O" | "o" | "0" => Cell::Computer,
            _ => Cell::Empty,
        }
    }

    /// Single-character rendering
    pub fn symbol(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Player => 'X',
            Cell::Computer => 'O',
        }
    }
}

/// The side making a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Actor {
    /// The human at the table
    Player,
    /// The automated side
    Computer,
}

impl Actor {
    /// Cell value this actor's pieces occupy
    pub fn cell(self) -> Cell {
        match self {
            Actor::Player => Cell::Player,
            Actor::Computer => Cell::Computer,
        }
    }

    /// The opposing side
    pub fn other(self) -> Actor {
        match self {
            Actor::Player => Actor::Computer,
            Actor::Computer => Actor::Player,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Player => f.write_str("player"),
            Actor::Computer => f.write_str("computer"),
        }
    }
}

/// Line directions scanned for windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Horizontal,
    Vertical,
    /// Bottom-left to top-right
    DiagonalUp,
    /// Top-left to bottom-right
    DiagonalDown,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Horizontal,
        Direction::Vertical,
        Direction::DiagonalUp,
        Direction::DiagonalDown,
    ];

    /// (row step, column step)
    fn delta(self) -> (isize, isize) {
        match self {
            Direction::Horizontal => (0, 1),
            Direction::Vertical => (1, 0),
            Direction::DiagonalUp => (1, 1),
            Direction::DiagonalDown => (-1, 1),
        }
    }
}

/// 6x7 grid, `cells[row][col]`, row 0 = bottom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "[[Cell; COLS]; ROWS]", try_from = "[[Cell; COLS]; ROWS]")]
pub struct Board {
    cells: [[Cell; COLS]; ROWS],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Board> for [[Cell; COLS]; ROWS] {
    fn from(board: Board) -> Self {
        board.cells
    }
}

impl TryFrom<[[Cell; COLS]; ROWS]> for Board {
    type Error = CellError;

    fn try_from(cells: [[Cell; COLS]; ROWS]) -> Result<Self> {
        Board::from_rows(cells)
    }
}

impl Board {
    /// Create an empty board
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Empty; COLS]; ROWS],
        }
    }

    /// Build a board from rows (row 0 = bottom), checking that no piece floats
    pub fn from_rows(cells: [[Cell; COLS]; ROWS]) -> Result<Self> {
        for col in 0..COLS {
            let mut seen_empty = false;
            for (row, cells_row) in cells.iter().enumerate() {
                match cells_row[col] {
                    Cell::Empty => seen_empty = true,
                    _ if seen_empty => {
                        return Err(CellError::InvalidBoard(format!(
                            "floating piece at row {} column {}",
                            row, col
                        )));
                    }
                    _ => {}
                }
            }
        }
        Ok(Self { cells })
    }

    /// Build a board from perception symbols in image order (top row first).
    ///
    /// Only the first 42 symbols are used; fewer is a detection failure.
    pub fn from_symbols<S: AsRef<str>>(symbols: &[S]) -> Result<Self> {
        if symbols.len() < CELL_COUNT {
            return Err(CellError::InvalidBoard(format!(
                "not enough cells: got {}, need {}",
                symbols.len(),
                CELL_COUNT
            )));
        }

        let mut cells = [[Cell::Empty; COLS]; ROWS];
        for (index, symbol) in symbols.iter().take(CELL_COUNT).enumerate() {
            let image_row = index / COLS;
            let col = index % COLS;
            cells[ROWS - 1 - image_row][col] = Cell::from_symbol(symbol.as_ref());
        }
        Self::from_rows(cells)
    }

    /// Rows, bottom first
    pub fn rows(&self) -> &[[Cell; COLS]; ROWS] {
        &self.cells
    }

    /// Cell at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Cell {
        self.cells[row][col]
    }

    /// Whether a piece can still be dropped in `col`
    pub fn is_playable(&self, col: usize) -> bool {
        col < COLS && self.cells[ROWS - 1][col] == Cell::Empty
    }

    /// Check a raw column index coming from another process
    pub fn validate_column(&self, col: i32) -> Result<usize> {
        let index = usize::try_from(col)
            .ok()
            .filter(|c| *c < COLS)
            .ok_or(CellError::ColumnOutOfRange(col))?;
        if !self.is_playable(index) {
            return Err(CellError::ColumnFull(index));
        }
        Ok(index)
    }

    /// Lowest empty row in `col`
    pub fn next_open_row(&self, col: usize) -> Option<usize> {
        (0..ROWS).find(|&row| self.cells[row][col] == Cell::Empty)
    }

    /// Playable columns in ascending order
    pub fn legal_columns(&self) -> Vec<usize> {
        (0..COLS).filter(|&col| self.is_playable(col)).collect()
    }

    /// Drop a piece for `actor`; returns the row it landed on
    pub fn drop_piece(&mut self, col: usize, actor: Actor) -> Result<usize> {
        if col >= COLS {
            return Err(CellError::ColumnOutOfRange(col as i32));
        }
        let row = self.next_open_row(col).ok_or(CellError::ColumnFull(col))?;
        self.cells[row][col] = actor.cell();
        Ok(row)
    }

    /// Copy of the board with one more piece
    pub fn with_piece(&self, col: usize, actor: Actor) -> Result<Board> {
        let mut next = *self;
        next.drop_piece(col, actor)?;
        Ok(next)
    }

    /// Whether every column is full
    pub fn is_full(&self) -> bool {
        (0..COLS).all(|col| !self.is_playable(col))
    }

    /// Number of pieces on the board
    pub fn piece_count(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| **cell != Cell::Empty)
            .count()
    }

    /// The four cells starting at (row, col) in `direction`, if they fit
    pub fn window(&self, row: usize, col: usize, direction: Direction) -> Option<[Cell; WINDOW]> {
        let (dr, dc) = direction.delta();
        let mut out = [Cell::Empty; WINDOW];
        for (i, slot) in out.iter_mut().enumerate() {
            let r = row as isize + dr * i as isize;
            let c = col as isize + dc * i as isize;
            if r < 0 || r >= ROWS as isize || c < 0 || c >= COLS as isize {
                return None;
            }
            *slot = self.cells[r as usize][c as usize];
        }
        Some(out)
    }

    /// Every 4-cell window on the board, row-major by origin
    pub fn windows(&self) -> impl Iterator<Item = [Cell; WINDOW]> + '_ {
        (0..ROWS).flat_map(move |row| {
            (0..COLS).flat_map(move |col| {
                Direction::ALL
                    .into_iter()
                    .filter_map(move |direction| self.window(row, col, direction))
            })
        })
    }

    /// Whether `actor` has four in a line anywhere. Scans the whole board.
    pub fn has_won(&self, actor: Actor) -> bool {
        let target = actor.cell();
        self.windows()
            .any(|window| window.iter().all(|cell| *cell == target))
    }

    /// Winner, if any
    pub fn winner(&self) -> Option<Actor> {
        [Actor::Player, Actor::Computer]
            .into_iter()
            .find(|actor| self.has_won(*actor))
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.iter().rev() {
            let line: String = row
                .iter()
                .map(|cell| cell.symbol())
                .flat_map(|c| [c, ' '])
                .collect();
            writeln!(f, "{}", line.trim_end())?;
        }
        write!(f, "1 2 3 4 5 6 7")
    }
}
