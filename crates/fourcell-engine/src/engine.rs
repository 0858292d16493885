//! Decision engine for the automated player

use crate::search::{Pruning, SearchResult, search_root};
use fourcell_core::{Board, COLS, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Chooses columns for the automated side.
///
/// Root columns are visited in a fresh uniformly random order on every
/// decision, so equally scored columns are picked uniformly.
pub struct DecisionEngine<R = StdRng> {
    depth: u32,
    rng: R,
}

impl DecisionEngine<StdRng> {
    /// Engine seeded from OS entropy
    pub fn new(depth: u32) -> Self {
        Self::with_rng(depth, StdRng::from_entropy())
    }

    /// Engine with a reproducible tie-break stream
    pub fn seeded(depth: u32, seed: u64) -> Self {
        Self::with_rng(depth, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> DecisionEngine<R> {
    /// Engine with a caller-supplied random source
    pub fn with_rng(depth: u32, rng: R) -> Self {
        Self { depth, rng }
    }

    /// Search depth in plies
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Search for the side named by `maximizing` (true = automated side)
    pub fn decide(&mut self, board: &Board, maximizing: bool) -> Result<SearchResult> {
        let mut order: Vec<usize> = (0..COLS).collect();
        order.shuffle(&mut self.rng);

        let result = search_root(board, self.depth, maximizing, &order, Pruning::AlphaBeta)?;
        debug!(
            "Search depth={} maximizing={} -> column {} score {} ({} nodes)",
            self.depth, maximizing, result.column, result.score, result.nodes
        );
        Ok(result)
    }

    /// Column for the automated side
    pub fn choose_column(&mut self, board: &Board) -> Result<usize> {
        self.decide(board, true).map(|result| result.column)
    }
}
