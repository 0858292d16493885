//! # frame-channel
//!
//! Captures video from the first available camera, normalizes each frame
//! (geometry, gamma) and publishes it into a fixed shared memory region that
//! other processes map read-only.

pub mod channel;
pub mod convert;
pub mod device;
pub mod gamma;
pub mod resample;
pub mod shm;
#[cfg(feature = "v4l")]
pub mod v4l_device;

pub use channel::{FrameChannel, FrameChannelHandle, run_capture};
pub use device::{CaptureDevice, DeviceOpener, RawDeviceOpener, open_first};
pub use gamma::GammaTable;
pub use resample::resample_nearest;
pub use shm::{DEFAULT_SHM_DIR, SharedFrameRegion, SharedFrameView};
#[cfg(feature = "v4l")]
pub use v4l_device::V4lDeviceOpener;
