//! Process configuration
//!
//! Every section has working defaults; a JSON file may override any subset of
//! fields. Durations are stored as milliseconds so the file stays readable.

use crate::error::{CellError, Result};
use crate::frame::FrameGeometry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration shared by all fourcell processes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellConfig {
    pub camera: CameraConfig,
    pub store: StoreConfig,
    pub coordinator: CoordinatorConfig,
    pub engine: EngineConfig,
    pub robot: RobotConfig,
}

impl CellConfig {
    /// Load from a JSON file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    CellError::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                serde_json::from_str(&text)
                    .map_err(|e| CellError::Config(format!("{}: {}", path.display(), e)))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the processes cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.camera.fps == 0 {
            return Err(CellError::Config("camera.fps must be positive".into()));
        }
        if !(self.camera.gamma.is_finite() && self.camera.gamma > 0.0) {
            return Err(CellError::Config("camera.gamma must be positive".into()));
        }
        if self.camera.device_indices.is_empty() {
            return Err(CellError::Config(
                "camera.device_indices must not be empty".into(),
            ));
        }
        if self.robot.max_retries == 0 {
            return Err(CellError::Config("robot.max_retries must be at least 1".into()));
        }
        if self.robot.connect_timeout_ms == 0 || self.robot.read_timeout_ms == 0 {
            return Err(CellError::Config("robot timeouts must be positive".into()));
        }
        if self.robot.max_reply_bytes == 0 {
            return Err(CellError::Config("robot.max_reply_bytes must be positive".into()));
        }
        Ok(())
    }
}

/// How frames are pulled from the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    /// Video4Linux node; format and frame rate are negotiated with the driver
    #[default]
    V4l,
    /// Fixed-size frames at `device_geometry` from a file or pipe
    Raw,
}

/// Capture process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub backend: CameraBackend,
    /// Device indices tried in order
    pub device_indices: Vec<u32>,
    /// Device path, `{index}` is replaced by the index
    pub device_path_template: String,
    /// Geometry the raw backend delivers
    pub device_geometry: FrameGeometry,
    /// Geometry published to consumers
    pub geometry: FrameGeometry,
    pub fps: u32,
    /// Gamma strength, 1.2-1.6 is the useful range
    pub gamma: f64,
    /// Reads discarded while auto-exposure settles
    pub warmup_frames: u32,
    pub warmup_delay_ms: u64,
    /// Pause after a failed read
    pub read_backoff_ms: u64,
    /// Directory backing shared regions
    pub shm_dir: PathBuf,
    /// Name of the published region
    pub region_name: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackend::V4l,
            device_indices: vec![1, 2],
            device_path_template: "/dev/video{index}".into(),
            device_geometry: FrameGeometry::default(),
            geometry: FrameGeometry::default(),
            fps: 30,
            gamma: 1.4,
            warmup_frames: 25,
            warmup_delay_ms: 20,
            read_backoff_ms: 2,
            shm_dir: PathBuf::from("/dev/shm"),
            region_name: "fourcell-frames".into(),
        }
    }
}

impl CameraConfig {
    /// Target interval between published frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }

    pub fn warmup_delay(&self) -> Duration {
        Duration::from_millis(self.warmup_delay_ms)
    }

    pub fn read_backoff(&self) -> Duration {
        Duration::from_millis(self.read_backoff_ms)
    }

    /// Device path for one index
    pub fn device_path(&self, index: u32) -> PathBuf {
        PathBuf::from(
            self.device_path_template
                .replace("{index}", &index.to_string()),
        )
    }
}

/// Shared record location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("processing/game_status.json"),
        }
    }
}

/// Turn coordinator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub poll_interval_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
        }
    }
}

impl CoordinatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Plies searched per decision
    pub depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { depth: 4 }
    }
}

/// Where the robot link gets the automated player's column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveSourceKind {
    /// Column committed by the turn coordinator
    #[default]
    Store,
    /// Search the store's board directly
    Engine,
}

/// Controller link settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub host: String,
    pub port: u16,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Bound on each connection attempt
    pub connect_timeout_ms: u64,
    /// Bound on each socket read
    pub read_timeout_ms: u64,
    /// Largest reply accepted
    pub max_reply_bytes: usize,
    /// Interval between handshake polls
    pub poll_interval_ms: u64,
    /// Acknowledgement counter variable
    pub sync_var: String,
    /// Selected column variable
    pub select_var: String,
    pub move_source: MoveSourceKind,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            host: "172.31.1.153".into(),
            port: 6101,
            max_retries: 10,
            retry_delay_ms: 3000,
            connect_timeout_ms: 2000,
            read_timeout_ms: 5000,
            max_reply_bytes: 4096,
            poll_interval_ms: 2000,
            sync_var: "SYNC_VAR".into(),
            select_var: "CELL_SEL".into(),
            move_source: MoveSourceKind::Store,
        }
    }
}

impl RobotConfig {
    /// host:port
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CellConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.camera.device_indices, vec![1, 2]);
        assert_eq!(config.camera.warmup_frames, 25);
        assert_eq!(config.robot.address(), "172.31.1.153:6101");
        assert_eq!(config.robot.max_retries, 10);
        assert_eq!(config.robot.retry_delay(), Duration::from_secs(3));
        assert_eq!(config.robot.connect_timeout(), Duration::from_secs(2));
        assert_eq!(config.engine.depth, 4);
        assert_eq!(
            config.camera.device_path(2),
            PathBuf::from("/dev/video2")
        );
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{"robot": {"host": "127.0.0.1", "move_source": "engine"}, "camera": {"gamma": 1.2, "backend": "raw"}}"#;
        let config: CellConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.robot.host, "127.0.0.1");
        assert_eq!(config.robot.port, 6101);
        assert_eq!(config.robot.move_source, MoveSourceKind::Engine);
        assert_eq!(config.camera.gamma, 1.2);
        assert_eq!(config.camera.fps, 30);
        assert_eq!(config.camera.backend, CameraBackend::Raw);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = CellConfig::default();
        config.camera.fps = 0;
        assert!(config.validate().is_err());

        let mut config = CellConfig::default();
        config.robot.max_retries = 0;
        assert!(config.validate().is_err());

        let mut config = CellConfig::default();
        config.robot.connect_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
