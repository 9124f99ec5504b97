/// Video source boundary.
///
/// `SourceOpener::open` acquires a device; the returned `SourceHandle` releases
/// it when dropped, so every exit path of the capture loop (end of stream,
/// read error, engine failure, stop) gives the device back.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// An opened frame source.
pub trait VideoSource: Send {
    /// Next frame. `Err(EndOfStream)` when exhausted, `Err(ReadError)` on failure.
    fn read_frame(&mut self) -> Result<RgbImage>;

    /// Give the underlying device back. Called exactly once, by `SourceHandle`.
    fn release(&mut self) {}

    fn describe(&self) -> String;
}

/// Opens a fresh `VideoSource` for every session.
pub trait SourceOpener: Send + Sync {
    fn open(&self) -> Result<SourceHandle>;
}

/// Scoped ownership of an opened source.
pub struct SourceHandle {
    source: Box<dyn VideoSource>,
}

impl SourceHandle {
    pub fn new(source: Box<dyn VideoSource>) -> Self {
        info!("Video source opened: {}", source.describe());
        Self { source }
    }

    pub fn read_frame(&mut self) -> Result<RgbImage> {
        self.source.read_frame()
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.source.release();
        info!("Video source released: {}", self.source.describe());
    }
}

// ── Directory replay ─────────────────────────────────────────────────────────

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Replays still images from a directory, in file-name order, as frames.
pub struct DirectorySource {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    next: usize,
}

impl DirectorySource {
    pub fn open(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            PipelineError::DeviceUnavailable(format!("{}: {}", dir.display(), e))
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(PipelineError::DeviceUnavailable(format!(
                "no frames found in {}",
                dir.display()
            )));
        }

        debug!("Directory source {} holds {} frames", dir.display(), frames.len());
        Ok(Self { dir: dir.to_path_buf(), frames, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

impl VideoSource for DirectorySource {
    fn read_frame(&mut self) -> Result<RgbImage> {
        let path = self.frames.get(self.next).ok_or(PipelineError::EndOfStream)?;
        self.next += 1;
        let img = image::open(path).map_err(|e| {
            warn!("Failed to decode frame {}: {}", path.display(), e);
            PipelineError::ReadError(format!("{}: {}", path.display(), e))
        })?;
        Ok(img.to_rgb8())
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}

/// Opens a `DirectorySource` over a fixed directory.
pub struct DirectoryOpener {
    dir: PathBuf,
}

impl DirectoryOpener {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SourceOpener for DirectoryOpener {
    fn open(&self) -> Result<SourceHandle> {
        let source = DirectorySource::open(&self.dir)?;
        Ok(SourceHandle::new(Box::new(source)))
    }
}
