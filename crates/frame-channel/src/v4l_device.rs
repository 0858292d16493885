//! Video4Linux capture backend
//!
//! Sets the pixel format, resolution and frame rate on the device and streams
//! through memory-mapped driver buffers. Driver calls block, so they run on
//! the blocking pool.

use crate::convert::yuyv_to_bgr;
use crate::device::{CaptureDevice, DeviceOpener};
use async_trait::async_trait;
use fourcell_core::{CameraConfig, CellError, Frame, FrameGeometry, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::spawn_blocking;
use tracing::{info, warn};
use v4l::buffer::Type;
use v4l::format::FourCC;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::video::capture::Parameters;
use v4l::Device;

const YUYV: [u8; 4] = *b"YUYV";
const BGR3: [u8; 4] = *b"BGR3";

/// Driver buffers queued while streaming
const STREAM_BUFFERS: u32 = 4;

/// Longest wait for one frame before the read counts as failed
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(1);

fn device_error(path: &Path, e: impl std::fmt::Display) -> CellError {
    CellError::Device(format!("{}: {}", path.display(), e))
}

fn join_error(e: tokio::task::JoinError) -> CellError {
    CellError::Device(format!("capture task failed: {}", e))
}

/// Opens `/dev/videoN` style nodes
#[derive(Debug, Clone)]
pub struct V4lDeviceOpener {
    path_template: String,
}

impl V4lDeviceOpener {
    pub fn new(path_template: impl Into<String>) -> Self {
        Self {
            path_template: path_template.into(),
        }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self::new(config.device_path_template.clone())
    }
}

#[async_trait]
impl DeviceOpener for V4lDeviceOpener {
    async fn open(&self, index: u32) -> Result<Box<dyn CaptureDevice>> {
        let path = PathBuf::from(self.path_template.replace("{index}", &index.to_string()));
        let target = path.clone();
        let device = spawn_blocking(move || Device::with_path(&target))
            .await
            .map_err(join_error)?
            .map_err(|e| device_error(&path, e))?;

        Ok(Box::new(V4lDevice {
            index,
            path,
            device: Some(device),
            session: None,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
    Yuyv,
    Bgr,
}

/// Active stream and the format the driver agreed to
struct CaptureSession {
    stream: Stream<'static>,
    pixel: PixelFormat,
    geometry: FrameGeometry,
}

impl CaptureSession {
    fn grab(&mut self) -> std::io::Result<Option<Frame>> {
        let (buffer, meta) = self.stream.next()?;
        let used = match meta.bytesused as usize {
            0 => buffer,
            n => &buffer[..n.min(buffer.len())],
        };

        let data = match self.pixel {
            PixelFormat::Yuyv => yuyv_to_bgr(used, self.geometry.width, self.geometry.height),
            PixelFormat::Bgr => used
                .get(..self.geometry.byte_len())
                .map(<[u8]>::to_vec),
        };
        Ok(data.and_then(|data| Frame::new(self.geometry, data)))
    }
}

struct V4lDevice {
    index: u32,
    path: PathBuf,
    device: Option<Device>,
    session: Option<CaptureSession>,
}

#[async_trait]
impl CaptureDevice for V4lDevice {
    fn index(&self) -> u32 {
        self.index
    }

    async fn configure(&mut self, geometry: FrameGeometry, fps: u32) -> Result<()> {
        let device = self
            .device
            .take()
            .ok_or_else(|| CellError::Device("device released".into()))?;
        self.session = None;

        let path = self.path.clone();
        let (device, session) = spawn_blocking(move || {
            let session = start_session(&device, &path, geometry, fps);
            (device, session)
        })
        .await
        .map_err(join_error)?;

        self.device = Some(device);
        self.session = Some(session?);
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        let mut session = self
            .session
            .take()
            .ok_or_else(|| CellError::Device("device not configured".into()))?;

        let (session, grabbed) = spawn_blocking(move || {
            let grabbed = session.grab();
            (session, grabbed)
        })
        .await
        .map_err(join_error)?;
        self.session = Some(session);

        grabbed
            .map_err(|e| device_error(&self.path, e))?
            .ok_or_else(|| CellError::Device("short frame".into()))
    }

    async fn release(&mut self) {
        self.session = None;
        if self.device.take().is_some() {
            info!("Camera index {} released", self.index);
        }
    }
}

/// Negotiate format and frame rate, then map the driver buffers
fn start_session(
    device: &Device,
    path: &Path,
    geometry: FrameGeometry,
    fps: u32,
) -> Result<CaptureSession> {
    let mut format = device.format().map_err(|e| device_error(path, e))?;
    format.width = geometry.width;
    format.height = geometry.height;
    format.fourcc = FourCC::new(&YUYV);
    let format = device.set_format(&format).map_err(|e| device_error(path, e))?;

    let pixel = match format.fourcc.repr {
        YUYV => PixelFormat::Yuyv,
        BGR3 => PixelFormat::Bgr,
        other => {
            return Err(CellError::Device(format!(
                "{}: unsupported pixel format {}",
                path.display(),
                String::from_utf8_lossy(&other)
            )));
        }
    };

    let params = device
        .set_params(&Parameters::with_fps(fps))
        .map_err(|e| device_error(path, e))?;

    let delivered = FrameGeometry {
        width: format.width,
        height: format.height,
        channels: 3,
    };
    if delivered.width != geometry.width || delivered.height != geometry.height {
        warn!(
            "{} delivers {}, requested {}; frames will be resampled",
            path.display(),
            delivered,
            geometry
        );
    }

    let mut stream = Stream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
        .map_err(|e| device_error(path, e))?;
    stream.set_timeout(DEQUEUE_TIMEOUT);

    info!(
        "{} configured: {} {:?} at {}/{} s per frame",
        path.display(),
        delivered,
        pixel,
        params.interval.numerator,
        params.interval.denominator
    );
    Ok(CaptureSession {
        stream,
        pixel,
        geometry: delivered,
    })
}
