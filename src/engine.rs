/// Object detection engine boundary.
///
/// The capture loop calls `detect` once per frame, synchronously, restricted to
/// the class IDs the current filter allows, then asks the same engine for an
/// annotated copy of the frame.

use std::cmp::Ordering;

use image::RgbImage;

use crate::annotate::draw_detections;
use crate::classes::ClassTable;
use crate::error::Result;

/// One detection in a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    /// Bounding box (x1, y1, x2, y2) normalised [0..1] to the frame
    pub bbox_norm: (f32, f32, f32, f32),
}

pub trait ObjectDetectionEngine: Send {
    /// Detect objects of the given classes. An empty `class_ids` means nothing
    /// is requested and no detections are returned.
    fn detect(&mut self, frame: &RgbImage, class_ids: &[u32]) -> Result<Vec<Detection>>;

    /// Copy of `frame` with the detections drawn on it, labelled with
    /// names from `table`.
    fn annotate(&self, frame: &RgbImage, detections: &[Detection], table: &ClassTable) -> RgbImage {
        draw_detections(frame, detections, table)
    }
}

impl<E: ObjectDetectionEngine + ?Sized> ObjectDetectionEngine for Box<E> {
    fn detect(&mut self, frame: &RgbImage, class_ids: &[u32]) -> Result<Vec<Detection>> {
        (**self).detect(frame, class_ids)
    }

    fn annotate(&self, frame: &RgbImage, detections: &[Detection], table: &ClassTable) -> RgbImage {
        (**self).annotate(frame, detections, table)
    }
}

/// Greedy per-class non-maximum suppression, highest confidence first.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));

    let mut kept: Vec<Detection> = Vec::new();
    'outer: for det in detections {
        for k in &kept {
            if k.class_id == det.class_id && iou(&det.bbox_norm, &k.bbox_norm) >= iou_threshold {
                continue 'outer;
            }
        }
        kept.push(det);
    }
    kept
}

fn iou(a: &(f32, f32, f32, f32), b: &(f32, f32, f32, f32)) -> f32 {
    let inter_w = (a.2.min(b.2) - a.0.max(b.0)).max(0.0);
    let inter_h = (a.3.min(b.3) - a.1.max(b.1)).max(0.0);
    let inter = inter_w * inter_h;
    let area_a = (a.2 - a.0).max(0.0) * (a.3 - a.1).max(0.0);
    let area_b = (b.2 - b.0).max(0.0) * (b.3 - b.1).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}
