//! Capture device abstraction
//!
//! The capture loop only needs to open a device by index, fix its geometry and
//! frame rate, and pull frames. Cameras go through the `v4l` backend; the raw
//! backend here reads fixed-size frames from a named pipe or a recorded dump,
//! whose producer owns the format.

use async_trait::async_trait;
use fourcell_core::{CameraConfig, CellError, Frame, FrameGeometry, Result};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// An opened video source
#[async_trait]
pub trait CaptureDevice: Send {
    /// Index the device was opened under
    fn index(&self) -> u32;

    /// Request the output geometry and frame rate
    async fn configure(&mut self, geometry: FrameGeometry, fps: u32) -> Result<()>;

    /// Read the next frame. Errors are transient.
    async fn read_frame(&mut self) -> Result<Frame>;

    /// Give the device back
    async fn release(&mut self);
}

/// Opens capture devices by index
#[async_trait]
pub trait DeviceOpener: Send + Sync {
    async fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>>;
}

/// Open the first index that works
pub async fn open_first(opener: &dyn DeviceOpener, indices: &[u32]) -> Result<Box<dyn CaptureDevice>> {
    for &index in indices {
        match opener.open(index).await {
            Ok(device) => {
                info!("Camera opened on index {}", index);
                return Ok(device);
            }
            Err(e) => debug!("Camera index {} unavailable: {}", index, e),
        }
    }
    Err(CellError::NoCameraAvailable(indices.to_vec()))
}

/// Opens raw frame streams from a path template
#[derive(Debug, Clone)]
pub struct RawDeviceOpener {
    path_template: String,
    geometry: FrameGeometry,
}

impl RawDeviceOpener {
    pub fn new(path_template: impl Into<String>, geometry: FrameGeometry) -> Self {
        Self {
            path_template: path_template.into(),
            geometry,
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(config.device_path_template.clone(), config.device_geometry)
    }

    fn path_for(&self, index: u32) -> PathBuf {
        PathBuf::from(self.path_template.replace("{index}", &index.to_string()))
    }
}

#[async_trait]
impl DeviceOpener for RawDeviceOpener {
    async fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>> {
        let path = self.path_for(index);
        let file = File::open(&path)
            .await
            .map_err(|e| CellError::Device(format!("{}: {}", path.display(), e)))?;

        Ok(Box::new(RawDevice {
            index,
            path,
            file: Some(file),
            geometry: self.geometry,
            buffer: vec![0; self.geometry.byte_len()],
        }))
    }
}

/// Fixed-geometry frame stream
struct RawDevice {
    index: u32,
    path: PathBuf,
    file: Option<File>,
    geometry: FrameGeometry,
    buffer: Vec<u8>,
}

#[async_trait]
impl CaptureDevice for RawDevice {
    fn index(&self) -> u32 {
        self.index
    }

    async fn configure(&mut self, geometry: FrameGeometry, fps: u32) -> Result<()> {
        // The producer fixes the format; mismatches are resampled by the
        // capture loop.
        if geometry != self.geometry {
            debug!(
                "{} delivers {}, requested {} @ {} fps",
                self.path.display(),
                self.geometry,
                geometry,
                fps
            );
        }
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CellError::Device("device released".into()))?;

        file.read_exact(&mut self.buffer)
            .await
            .map_err(|e| CellError::Device(format!("{}: {}", self.path.display(), e)))?;

        Frame::new(self.geometry, self.buffer.clone())
            .ok_or_else(|| CellError::Device("short frame".into()))
    }

    async fn release(&mut self) {
        if self.file.take().is_some() {
            info!("Camera index {} released", self.index);
        }
    }
}
