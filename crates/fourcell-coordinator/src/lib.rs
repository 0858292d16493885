//! # fourcell-coordinator
//!
//! The turn-taking state machine. Reads the shared record, applies the pending
//! human column or asks the engine for the automated side's column, checks for
//! a win or a full board, and commits the result.

pub mod coordinator;

pub use coordinator::{Step, TurnCoordinator, apply_move};
