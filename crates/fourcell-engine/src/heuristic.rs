//! Window-based board scoring from the automated side's point of view

use fourcell_core::{Board, Cell, WINDOW};

/// Score of one 4-cell window
pub fn score_window(window: &[Cell; WINDOW]) -> i32 {
    let mut own = 0;
    let mut opp = 0;
    let mut empty = 0;
    for cell in window {
        match cell {
            Cell::Computer => own += 1,
            Cell::Player => opp += 1,
            Cell::Empty => empty += 1,
        }
    }

    match (own, opp, empty) {
        (4, _, _) => 100,
        (3, _, 1) => 5,
        (2, _, 2) => 2,
        (_, 3, 1) => -4,
        (_, 2, 2) => -2,
        _ => 0,
    }
}

/// Sum of every window score on the board
pub fn evaluate(board: &Board) -> i32 {
    board.windows().map(|window| score_window(&window)).sum()
}
