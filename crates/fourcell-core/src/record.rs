//! The shared game record
//!
//! One record describes one session. Every process reads the whole record and
//! the process whose turn `status` names writes it back once.

use crate::board::{Actor, Board, NO_COLUMN};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Turn-taking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Status {
    /// Waiting for the human to report a column
    #[default]
    PlayerWait,
    /// Waiting for the automated side to move
    ComputerWait,
    PlayerWin,
    ComputerWin,
    Tie,
    /// Session ended by the operator
    Stopped,
    /// Record could not be read; try again later
    Error,
}

impl Status {
    /// Whether the session has ended
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::PlayerWin | Status::ComputerWin | Status::Tie | Status::Stopped
        )
    }

    /// Side expected to move in this status
    pub fn expected_actor(self) -> Option<Actor> {
        match self {
            Status::PlayerWait => Some(Actor::Player),
            Status::ComputerWait => Some(Actor::Computer),
            _ => None,
        }
    }

    /// Status reached when `actor` wins
    pub fn win_for(actor: Actor) -> Status {
        match actor {
            Actor::Player => Status::PlayerWin,
            Actor::Computer => Status::ComputerWin,
        }
    }

    /// Status in which `actor` is expected to move
    pub fn wait_for(actor: Actor) -> Status {
        match actor {
            Actor::Player => Status::PlayerWait,
            Actor::Computer => Status::ComputerWait,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::PlayerWait => "PlayerWait",
            Status::ComputerWait => "ComputerWait",
            Status::PlayerWin => "PlayerWin",
            Status::ComputerWin => "ComputerWin",
            Status::Tie => "Tie",
            Status::Stopped => "Stopped",
            Status::Error => "Error",
        };
        f.write_str(name)
    }
}

/// One applied move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub actor: Actor,
    pub column: usize,
}

/// Authoritative state of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateRecord {
    /// Identifies the session; every reset picks a new one
    #[serde(default)]
    pub session: u64,
    /// Incremented by one on every committed write, restarts at 0 on reset
    #[serde(default)]
    pub revision: u64,
    /// Column reported by the console, -1 when none is pending
    pub player_column: i32,
    /// Last column chosen by the automated side, -1 before its first move
    pub computer_column: i32,
    pub status: Status,
    /// Operator request to end the session
    pub stop: bool,
    /// Append-only move log
    pub moves: Vec<Move>,
    pub board_state: Board,
}

impl Default for GameStateRecord {
    fn default() -> Self {
        Self {
            session: 0,
            revision: 0,
            player_column: NO_COLUMN,
            computer_column: NO_COLUMN,
            status: Status::PlayerWait,
            stop: false,
            moves: Vec::new(),
            board_state: Board::new(),
        }
    }
}

impl GameStateRecord {
    /// Snapshot handed out when the persisted record cannot be trusted
    pub fn degraded() -> Self {
        Self {
            status: Status::Error,
            ..Default::default()
        }
    }

    /// Whether this snapshot came from a failed read
    pub fn is_degraded(&self) -> bool {
        self.status == Status::Error
    }

    /// Whether a player column is waiting to be applied
    pub fn has_pending_player_column(&self) -> bool {
        self.player_column != NO_COLUMN
    }

    /// Last move in the log
    pub fn last_move(&self) -> Option<&Move> {
        self.moves.last()
    }
}
