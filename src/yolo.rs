/// YOLOv8 detector via ONNX Runtime
///
/// Runs the animal model on whole frames. The class-ID set passed to `detect`
/// narrows which argmax classes survive, the way the model's `classes=`
/// argument does.

use image::{imageops, Rgb, RgbImage};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tracing::debug;

use crate::config::DetectorConfig;
use crate::engine::{non_max_suppression, Detection, ObjectDetectionEngine};
use crate::error::{PipelineError, Result};

/// YOLOv8 wrapper using ONNX Runtime (ort 2.0).
pub struct YoloEngine {
    session: Session,
    input_size: u32,
    conf_threshold: f32,
    nms_threshold: f32,
}

fn engine_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::EngineFailure(e.to_string())
}

impl YoloEngine {
    pub fn new(cfg: &DetectorConfig) -> Result<Self> {
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(cfg.intra_threads))
            .and_then(|b| b.commit_from_file(&cfg.model_path))
            .map_err(|e| PipelineError::Config(format!("model {}: {}", cfg.model_path, e)))?;

        Ok(Self {
            session,
            input_size: cfg.input_size,
            conf_threshold: cfg.confidence_threshold,
            nms_threshold: cfg.nms_threshold,
        })
    }
}

impl ObjectDetectionEngine for YoloEngine {
    fn detect(&mut self, frame: &RgbImage, class_ids: &[u32]) -> Result<Vec<Detection>> {
        if class_ids.is_empty() || frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }

        let sz = self.input_size;
        let (letterboxed, scale, pad_x, pad_y) = letterbox(frame, sz);
        let data = rgb_to_chw_f32(&letterboxed);
        let array = Array4::from_shape_vec((1, 3, sz as usize, sz as usize), data).map_err(engine_err)?;
        let input = Tensor::from_array(array).map_err(engine_err)?;

        let outputs = self.session.run(ort::inputs!["images" => input]).map_err(engine_err)?;

        // YOLOv8 output: [1, 4 + classes, boxes]
        let output = outputs[0].try_extract_array::<f32>().map_err(engine_err)?;
        let shape = output.shape().to_vec();
        if shape.len() != 3 || shape[1] <= 4 {
            return Err(engine_err(format!("unexpected output shape {:?}", shape)));
        }
        let num_classes = shape[1] - 4;
        let num_boxes = shape[2];

        let orig_w = frame.width() as f32;
        let orig_h = frame.height() as f32;

        let mut detections = Vec::new();
        for i in 0..num_boxes {
            let mut max_score = 0f32;
            let mut max_class = 0usize;
            for c in 0..num_classes {
                let score = output[[0, 4 + c, i]];
                if score > max_score {
                    max_score = score;
                    max_class = c;
                }
            }
            if max_score <= self.conf_threshold || !class_ids.contains(&(max_class as u32)) {
                continue;
            }

            let cx = output[[0, 0, i]];
            let cy = output[[0, 1, i]];
            let bw = output[[0, 2, i]];
            let bh = output[[0, 3, i]];
            // letterbox coords → normalised frame coords
            let x1 = ((cx - bw / 2.0 - pad_x as f32) / (scale * orig_w)).max(0.0);
            let y1 = ((cy - bh / 2.0 - pad_y as f32) / (scale * orig_h)).max(0.0);
            let x2 = ((cx + bw / 2.0 - pad_x as f32) / (scale * orig_w)).min(1.0);
            let y2 = ((cy + bh / 2.0 - pad_y as f32) / (scale * orig_h)).min(1.0);

            detections.push(Detection {
                class_id: max_class as u32,
                confidence: max_score,
                bbox_norm: (x1, y1, x2, y2),
            });
        }

        let kept = non_max_suppression(detections, self.nms_threshold);
        debug!("YOLO: {} detections after NMS", kept.len());
        Ok(kept)
    }
}

/// Letterbox resize: fit image into `target×target` with grey padding.
/// Returns (letterboxed, scale, pad_x, pad_y).
fn letterbox(src: &RgbImage, target: u32) -> (RgbImage, f32, u32, u32) {
    let (w, h) = src.dimensions();
    let scale = (target as f32 / w.max(h) as f32).min(1.0);
    let new_w = ((w as f32 * scale) as u32).max(1);
    let new_h = ((h as f32 * scale) as u32).max(1);

    let resized = imageops::resize(src, new_w, new_h, imageops::FilterType::Triangle);
    let pad_x = (target - new_w) / 2;
    let pad_y = (target - new_h) / 2;

    // YOLOv8 grey padding
    let mut padded = RgbImage::from_pixel(target, target, Rgb([114, 114, 114]));
    imageops::replace(&mut padded, &resized, pad_x as i64, pad_y as i64);
    (padded, scale, pad_x, pad_y)
}

/// HWC RGB → CHW Vec<f32> normalised to [0,1].
fn rgb_to_chw_f32(img: &RgbImage) -> Vec<f32> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let plane = w * h;
    let mut out = vec![0f32; 3 * plane];
    for (x, y, px) in img.enumerate_pixels() {
        let idx = y as usize * w + x as usize;
        for c in 0..3usize {
            out[c * plane + idx] = px[c] as f32 / 255.0;
        }
    }
    out
}
