//! # fourcell-engine
//!
//! Depth-limited minimax with alpha-beta pruning over Connect Four column
//! drops, scored by a fixed 4-cell window table.

pub mod engine;
pub mod heuristic;
pub mod search;

pub use engine::DecisionEngine;
pub use heuristic::{evaluate, score_window};
pub use search::{Pruning, SearchResult, search_root};
