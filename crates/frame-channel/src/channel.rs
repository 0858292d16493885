//! Capture task and its start/stop handle

use crate::device::{CaptureDevice, DeviceOpener, open_first};
use crate::gamma::GammaTable;
use crate::resample::resample_nearest;
use crate::shm::SharedFrameRegion;
use fourcell_core::{CameraConfig, CellError, Readiness, Result};
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Handle to a running capture task
#[derive(Clone)]
pub struct FrameChannelHandle {
    region_name: String,
    region_path: PathBuf,
    cancel: CancellationToken,
    task: Arc<StdMutex<Option<JoinHandle<Result<()>>>>>,
}

impl FrameChannelHandle {
    /// Name consumers open the frame region by
    pub fn region_name(&self) -> &str {
        &self.region_name
    }

    pub fn region_path(&self) -> &std::path::Path {
        &self.region_path
    }

    pub fn is_running(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        match self.task.lock() {
            Ok(slot) => slot.as_ref().is_some_and(|task| !task.is_finished()),
            Err(_) => false,
        }
    }

    /// Cancel the capture loop and wait until device and region are released
    pub async fn stop(&self) -> Result<()> {
        self.cancel.cancel();
        let task = self.task.lock().ok().and_then(|mut slot| slot.take());
        match task {
            Some(task) => task
                .await
                .map_err(|e| CellError::Device(format!("capture task failed: {}", e)))?,
            None => Ok(()),
        }
    }

    /// Wait for the capture loop to end on its own
    pub async fn wait(&self) -> Result<()> {
        let task = self.task.lock().ok().and_then(|mut slot| slot.take());
        match task {
            Some(task) => task
                .await
                .map_err(|e| CellError::Device(format!("capture task failed: {}", e)))?,
            None => Ok(()),
        }
    }
}

/// Starts at most one capture task
pub struct FrameChannel {
    config: CameraConfig,
    opener: Arc<dyn DeviceOpener>,
    cancel: CancellationToken,
    running: Mutex<Option<FrameChannelHandle>>,
}

impl FrameChannel {
    /// `cancel` stops any task this channel starts
    pub fn new(config: CameraConfig, opener: Arc<dyn DeviceOpener>, cancel: CancellationToken) -> Self {
        Self {
            config,
            opener,
            cancel,
            running: Mutex::new(None),
        }
    }

    /// Start capturing, or return the running instance.
    ///
    /// Resolves once the camera has warmed up and the region is live; fails
    /// with the startup error if the camera could not be opened or configured.
    pub async fn start(&self) -> Result<FrameChannelHandle> {
        let mut running = self.running.lock().await;
        if let Some(handle) = running.as_ref().filter(|h| h.is_running()) {
            debug!("Frame channel already running on {}", handle.region_name());
            return Ok(handle.clone());
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let cancel = self.cancel.child_token();
        let task = tokio::spawn(run_capture(
            self.config.clone(),
            self.opener.clone(),
            ready_tx,
            cancel.clone(),
        ));

        match ready_rx.await {
            Ok(Readiness::Ready(region_name)) => {
                let handle = FrameChannelHandle {
                    region_path: self.config.shm_dir.join(&region_name),
                    region_name,
                    cancel,
                    task: Arc::new(StdMutex::new(Some(task))),
                };
                *running = Some(handle.clone());
                Ok(handle)
            }
            // Failed, or the task ended before signalling: report why it ended
            _ => match task.await {
                Ok(Err(e)) => Err(e),
                Ok(Ok(())) => Err(CellError::Device("capture cancelled during startup".into())),
                Err(e) => Err(CellError::Device(format!("capture task failed: {}", e))),
            },
        }
    }
}

/// Open, warm up, signal readiness once, then publish frames until cancelled.
///
/// `ready` receives either the region name or [`Readiness::Failed`], never
/// both. The device and region are released on every exit path.
pub async fn run_capture(
    config: CameraConfig,
    opener: Arc<dyn DeviceOpener>,
    ready: oneshot::Sender<Readiness>,
    cancel: CancellationToken,
) -> Result<()> {
    let (mut region, mut device) = match setup(&config, opener.as_ref()).await {
        Ok(parts) => parts,
        Err(e) => {
            error!("Camera startup failed: {}", e);
            let _ = ready.send(Readiness::Failed);
            return Err(e);
        }
    };

    info!("Warming up camera exposure...");
    for _ in 0..config.warmup_frames {
        if cancel.is_cancelled() {
            break;
        }
        if let Err(e) = device.read_frame().await {
            debug!("Warm-up read failed: {}", e);
        }
        sleep(config.warmup_delay()).await;
    }

    if cancel.is_cancelled() {
        device.release().await;
        return Ok(());
    }

    let _ = ready.send(Readiness::Ready(region.name().to_string()));
    info!("Camera ready on region {}, entering capture loop", region.name());

    capture_loop(&config, device.as_mut(), &mut region, &cancel).await;

    info!("Shutting down camera");
    device.release().await;
    Ok(())
}

async fn setup(
    config: &CameraConfig,
    opener: &dyn DeviceOpener,
) -> Result<(SharedFrameRegion, Box<dyn CaptureDevice>)> {
    let region = SharedFrameRegion::create(&config.shm_dir, &config.region_name, config.geometry)?;
    let mut device = open_first(opener, &config.device_indices).await?;
    if let Err(e) = device.configure(config.geometry, config.fps).await {
        device.release().await;
        return Err(e);
    }
    Ok((region, device))
}

async fn capture_loop(
    config: &CameraConfig,
    device: &mut dyn CaptureDevice,
    region: &mut SharedFrameRegion,
    cancel: &CancellationToken,
) {
    let gamma = GammaTable::new(config.gamma);
    let interval = config.frame_interval();
    let mut deadline = Instant::now();
    let mut published: u64 = 0;

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = device.read_frame() => read,
        };

        let mut frame = match read {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Frame read failed: {}", e);
                sleep(config.read_backoff()).await;
                continue;
            }
        };

        if frame.geometry != config.geometry {
            frame = resample_nearest(&frame, config.geometry);
        }
        gamma.apply(&mut frame.data);
        if let Err(e) = region.publish(&frame) {
            warn!("Frame not published: {}", e);
        }
        published += 1;

        deadline += interval;
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep_until(deadline) => {}
        }
    }

    debug!("Capture loop ended after {} frames", published);
}
