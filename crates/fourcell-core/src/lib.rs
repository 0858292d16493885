//! # fourcell-core
//!
//! Types shared by every process of the game cell:
//! - Board, cells and win detection
//! - The shared game record and its status machine vocabulary
//! - Frame geometry and the camera readiness signal
//! - Error type and configuration

pub mod board;
pub mod config;
pub mod error;
pub mod frame;
pub mod record;

pub use board::{Actor, Board, CELL_COUNT, COLS, Cell, Direction, NO_COLUMN, ROWS, WINDOW};
pub use config::{
    CameraBackend, CameraConfig, CellConfig, CoordinatorConfig, EngineConfig, MoveSourceKind, RobotConfig,
    StoreConfig,
};
pub use error::{CellError, Result};
pub use frame::{Frame, FrameGeometry, READINESS_ERROR_TOKEN, Readiness};
pub use record::{GameStateRecord, Move, Status};
