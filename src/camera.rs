use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_BUFFERSIZE, CAP_PROP_FPS},
};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::source::{SourceHandle, SourceOpener, VideoSource};

/// Opened local camera.
pub struct OpenCvCamera {
    cap: VideoCapture,
    device_index: i32,
}

impl OpenCvCamera {
    /// Open a local capture device by index (0 = default webcam).
    pub fn open(device_index: i32) -> Result<Self> {
        info!("Opening camera device {}", device_index);

        let mut cap = VideoCapture::new(device_index, CAP_ANY)
            .map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))?;

        if !cap.is_opened().unwrap_or(false) {
            return Err(PipelineError::DeviceUnavailable(format!(
                "could not open camera device {}",
                device_index
            )));
        }

        // Small buffer: fresh frames, not queued ones
        if let Err(e) = cap.set(CAP_PROP_BUFFERSIZE, 1.0) {
            warn!("Camera {} ignores buffer size: {}", device_index, e);
        }

        let native_fps = cap.get(CAP_PROP_FPS).unwrap_or(30.0);
        info!("Camera {} opened. Native FPS: {:.1}", device_index, native_fps);

        Ok(Self { cap, device_index })
    }
}

impl VideoSource for OpenCvCamera {
    fn read_frame(&mut self) -> Result<RgbImage> {
        let mut frame = Mat::default();
        let ok = self
            .cap
            .read(&mut frame)
            .map_err(|e| PipelineError::ReadError(e.to_string()))?;
        if !ok || frame.empty() {
            return Err(PipelineError::EndOfStream);
        }
        bgr_mat_to_rgb(&frame)
    }

    fn release(&mut self) {
        if let Err(e) = self.cap.release() {
            warn!("Camera {} release failed: {}", self.device_index, e);
        }
    }

    fn describe(&self) -> String {
        format!("camera {}", self.device_index)
    }
}

/// Convert an OpenCV BGR `Mat` into an owned RGB image.
fn bgr_mat_to_rgb(frame: &Mat) -> Result<RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)
        .map_err(|e| PipelineError::ReadError(e.to_string()))?;

    let (w, h) = (rgb.cols() as u32, rgb.rows() as u32);
    let data = rgb
        .data_bytes()
        .map_err(|e| PipelineError::ReadError(e.to_string()))?
        .to_vec();

    RgbImage::from_raw(w, h, data)
        .ok_or_else(|| PipelineError::ReadError(format!("unexpected frame layout {}x{}", w, h)))
}

/// Opens the configured camera device for each session.
pub struct CameraOpener {
    device_index: i32,
}

impl CameraOpener {
    pub fn new(device_index: i32) -> Self {
        Self { device_index }
    }
}

impl SourceOpener for CameraOpener {
    fn open(&self) -> Result<SourceHandle> {
        let camera = OpenCvCamera::open(self.device_index)?;
        Ok(SourceHandle::new(Box::new(camera)))
    }
}
