//! # fourcell-store
//!
//! The game record shared by the coordinator, the robot link and the console.
//! Stored as a checksummed JSON file and replaced atomically on every write.

pub mod codec;
pub mod store;

pub use codec::{checksum, decode, encode};
pub use store::{Absorption, GameStateStore};
