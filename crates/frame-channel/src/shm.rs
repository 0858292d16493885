//! Shared frame region
//!
//! A file-backed mapping holding exactly one frame. The producer overwrites it
//! in place every cycle without locking; readers may observe a frame that is
//! part old and part new, which is acceptable for display.

use fourcell_core::{CellError, Frame, FrameGeometry, Result};
use memmap2::{Mmap, MmapMut};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default directory for region backing files
pub const DEFAULT_SHM_DIR: &str = "/dev/shm";

/// Writable region owned by the capture process; unlinked on drop
pub struct SharedFrameRegion {
    name: String,
    path: PathBuf,
    geometry: FrameGeometry,
    map: MmapMut,
}

impl SharedFrameRegion {
    /// Create (or take over) the region `name` under `dir`, zero-filled
    pub fn create(dir: &Path, name: &str, geometry: FrameGeometry) -> Result<Self> {
        let path = dir.join(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| CellError::IpcError(format!("{}: {}", path.display(), e)))?;
        file.set_len(geometry.byte_len() as u64)
            .map_err(|e| CellError::IpcError(format!("{}: {}", path.display(), e)))?;

        // SAFETY: the file was just created by this process with the mapped
        // length; readers only ever map it read-only.
        let mut map = unsafe { MmapMut::map_mut(&file) }.map_err(|e| {
            let _ = fs::remove_file(&path);
            CellError::IpcError(format!("mmap {}: {}", path.display(), e))
        })?;
        map.fill(0);

        debug!("Shared region {} created ({})", path.display(), geometry);
        Ok(Self {
            name: name.to_string(),
            path,
            geometry,
            map,
        })
    }

    /// Identifier consumers open the region by
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Overwrite the whole region with `frame`
    pub fn publish(&mut self, frame: &Frame) -> Result<()> {
        if frame.geometry != self.geometry || frame.data.len() != self.map.len() {
            return Err(CellError::Device(format!(
                "frame is {}, region holds {}",
                frame.geometry, self.geometry
            )));
        }
        self.map.copy_from_slice(&frame.data);
        Ok(())
    }
}

impl Drop for SharedFrameRegion {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Shared region {} unlinked", self.path.display()),
            Err(e) => warn!("Failed to unlink {}: {}", self.path.display(), e),
        }
    }
}

/// Read-only view held by a consumer
pub struct SharedFrameView {
    geometry: FrameGeometry,
    map: Mmap,
}

impl SharedFrameView {
    /// Open a region in the default directory
    pub fn open(name: &str, geometry: FrameGeometry) -> Result<Self> {
        Self::open_in(Path::new(DEFAULT_SHM_DIR), name, geometry)
    }

    pub fn open_in(dir: &Path, name: &str, geometry: FrameGeometry) -> Result<Self> {
        let path = dir.join(name);
        let file = fs::File::open(&path)
            .map_err(|e| CellError::IpcError(format!("{}: {}", path.display(), e)))?;

        // SAFETY: read-only mapping; the producer may overwrite the contents
        // concurrently, which only tears pixel data.
        let map = unsafe { Mmap::map(&file) }
            .map_err(|e| CellError::IpcError(format!("mmap {}: {}", path.display(), e)))?;

        if map.len() != geometry.byte_len() {
            return Err(CellError::IpcError(format!(
                "region {} holds {} bytes, expected {} for {}",
                name,
                map.len(),
                geometry.byte_len(),
                geometry
            )));
        }
        Ok(Self { geometry, map })
    }

    /// Copy out the current frame
    pub fn latest(&self) -> Frame {
        Frame {
            geometry: self.geometry,
            data: self.map.to_vec(),
        }
    }
}
