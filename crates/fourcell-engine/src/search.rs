//! Minimax search over column drops
//!
//! The maximizing side is always the automated player. Inner nodes only carry
//! values; the column is picked at the root, visiting columns in the order the
//! caller supplies and replacing the best only on a strictly better score.

use crate::heuristic::evaluate;
use fourcell_core::{Actor, Board, CellError, Result};

/// Outcome of a root search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchResult {
    /// Chosen column
    pub column: usize,
    /// Minimax value of that column
    pub score: i32,
    /// Positions visited, root excluded
    pub nodes: u64,
}

/// Whether subtrees may be skipped once they cannot change the result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pruning {
    AlphaBeta,
    /// Visit every node; used to verify the pruned search
    Exhaustive,
}

/// Search `board` to `depth` plies, trying root columns in `order`.
///
/// Columns in `order` that are not playable are skipped. A depth of zero is
/// searched as one ply so a column is always produced.
pub fn search_root(
    board: &Board,
    depth: u32,
    maximizing: bool,
    order: &[usize],
    pruning: Pruning,
) -> Result<SearchResult> {
    let mut nodes = 0;
    let mut alpha = i32::MIN;
    let mut beta = i32::MAX;
    let mut best: Option<(usize, i32)> = None;
    let depth = depth.max(1);

    for &col in order.iter().filter(|col| board.is_playable(**col)) {
        let child = board.with_piece(col, mover(maximizing))?;
        let score = minimax(&child, depth - 1, alpha, beta, !maximizing, pruning, &mut nodes);

        let better = match best {
            None => true,
            Some((_, best_score)) if maximizing => score > best_score,
            Some((_, best_score)) => score < best_score,
        };
        if better {
            best = Some((col, score));
        }

        if maximizing {
            alpha = alpha.max(score);
        } else {
            beta = beta.min(score);
        }
    }

    best.map(|(column, score)| SearchResult {
        column,
        score,
        nodes,
    })
    .ok_or(CellError::NoLegalMoves)
}

fn mover(maximizing: bool) -> Actor {
    if maximizing {
        Actor::Computer
    } else {
        Actor::Player
    }
}

fn minimax(
    board: &Board,
    depth: u32,
    mut alpha: i32,
    mut beta: i32,
    maximizing: bool,
    pruning: Pruning,
    nodes: &mut u64,
) -> i32 {
    *nodes += 1;

    let legal = board.legal_columns();
    if depth == 0 || legal.is_empty() {
        return evaluate(board);
    }

    let actor = mover(maximizing);
    let mut best = if maximizing { i32::MIN } else { i32::MAX };

    for col in legal {
        let mut child = *board;
        if child.drop_piece(col, actor).is_err() {
            continue;
        }
        let score = minimax(&child, depth - 1, alpha, beta, !maximizing, pruning, nodes);

        if maximizing {
            best = best.max(score);
            alpha = alpha.max(score);
        } else {
            best = best.min(score);
            beta = beta.min(score);
        }

        if pruning == Pruning::AlphaBeta && beta <= alpha {
            break;
        }
    }

    best
}
