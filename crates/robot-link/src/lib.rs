//! # robot-link
//!
//! Talks to the arm controller over its XML variable interface:
//! - `protocol`: request encoding and reply framing
//! - `client`: TCP session with bounded reads and connection retry
//! - `handshake`: the counter/selection exchange that hands over a column

pub mod client;
pub mod handshake;
pub mod protocol;

pub use client::{EkiClient, bounded_connect, retry_connect};
pub use handshake::{
    EngineMoveSource, HandshakeState, HandshakeStep, MoveSource, NO_SELECTION, StoreMoveSource,
    inspect, poll_once, read_state, run_link,
};
pub use protocol::{Reply, ReplyFramer, TAG_KEY, set_var, show_var};
