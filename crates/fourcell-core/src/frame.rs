//! Video frame types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload sent instead of a region name when the camera could not start
pub const READINESS_ERROR_TOKEN: &str = "ERROR";

/// Fixed frame geometry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per pixel (one byte per channel)
    pub channels: u32,
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            channels: 3,
        }
    }
}

impl FrameGeometry {
    /// Size of one frame in bytes
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }
}

impl fmt::Display for FrameGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// One captured frame, row-major, channel order as the device produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub geometry: FrameGeometry,
    pub data: Vec<u8>,
}

impl Frame {
    /// Wrap raw bytes; `None` if the length does not match the geometry
    pub fn new(geometry: FrameGeometry, data: Vec<u8>) -> Option<Self> {
        (data.len() == geometry.byte_len()).then_some(Self { geometry, data })
    }

    /// All-zero frame
    pub fn black(geometry: FrameGeometry) -> Self {
        Self {
            geometry,
            data: vec![0; geometry.byte_len()],
        }
    }
}

/// One-shot camera readiness message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Shared region is live under this name
    Ready(String),
    /// Camera failed to open or configure
    Failed,
}

impl Readiness {
    /// Wire form: the region name, or the error token
    pub fn to_payload(&self) -> String {
        match self {
            Readiness::Ready(name) => name.clone(),
            Readiness::Failed => READINESS_ERROR_TOKEN.to_string(),
        }
    }

    /// Parse a payload line
    pub fn from_payload(payload: &str) -> Self {
        match payload.trim() {
            READINESS_ERROR_TOKEN => Readiness::Failed,
            name => Readiness::Ready(name.to_string()),
        }
    }
}
