#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use parking_lot::Mutex;

use wildlife_watch::aggregator::DetectionAggregator;
use wildlife_watch::alert::CueSink;
use wildlife_watch::capture::{CaptureContext, SharedEngine};
use wildlife_watch::engine::{Detection, ObjectDetectionEngine};
use wildlife_watch::error::{PipelineError, Result};
use wildlife_watch::monitor::Monitor;
use wildlife_watch::session::SessionState;
use wildlife_watch::source::{SourceHandle, SourceOpener, VideoSource};
use wildlife_watch::stream::StreamEncoder;

// ─── Source ─────────────────────────────────────────────────────────────────

/// Yields `frames` small frames (forever when `None`), then end of stream,
/// or a read error when `broken`.
pub struct ScriptedSource {
    remaining: Option<usize>,
    broken: bool,
    released: Arc<AtomicUsize>,
}

impl VideoSource for ScriptedSource {
    fn read_frame(&mut self) -> Result<RgbImage> {
        match self.remaining.as_mut() {
            Some(0) if self.broken => return Err(PipelineError::ReadError("usb bus reset".into())),
            Some(0) => return Err(PipelineError::EndOfStream),
            Some(n) => *n -= 1,
            None => {}
        }
        Ok(RgbImage::from_pixel(32, 24, Rgb([40, 90, 40])))
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}

#[derive(Clone)]
pub struct ScriptedOpener {
    pub frames: Option<usize>,
    pub broken: bool,
    pub available: bool,
    pub opened: Arc<AtomicUsize>,
    pub released: Arc<AtomicUsize>,
}

impl ScriptedOpener {
    pub fn finite(frames: usize) -> Self {
        Self { frames: Some(frames), ..Self::endless() }
    }

    pub fn endless() -> Self {
        Self {
            frames: None,
            broken: false,
            available: true,
            opened: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `frames` good frames, then a read error.
    pub fn failing_after(frames: usize) -> Self {
        Self { broken: true, ..Self::finite(frames) }
    }

    pub fn unavailable() -> Self {
        Self { available: false, ..Self::endless() }
    }
}

impl SourceOpener for ScriptedOpener {
    fn open(&self) -> Result<SourceHandle> {
        if !self.available {
            return Err(PipelineError::DeviceUnavailable("no camera attached".into()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(SourceHandle::new(Box::new(ScriptedSource {
            remaining: self.frames,
            broken: self.broken,
            released: Arc::clone(&self.released),
        })))
    }
}

// ─── Engine ─────────────────────────────────────────────────────────────────

/// One scripted engine answer.
pub enum Step {
    Detect(Vec<u32>),
    Fail,
    Panic,
}

type Hook = Box<dyn FnMut(usize) + Send>;

/// Answers from a script (then `fallback` forever) and records every
/// class-ID set it was asked for. Only requested classes are returned.
pub struct ScriptedEngine {
    script: VecDeque<Step>,
    fallback: Vec<u32>,
    pub requested: Arc<Mutex<Vec<Vec<u32>>>>,
    after_detect: Option<Hook>,
    calls: usize,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Step>, fallback: Vec<u32>) -> Self {
        Self {
            script: script.into(),
            fallback,
            requested: Arc::new(Mutex::new(Vec::new())),
            after_detect: None,
            calls: 0,
        }
    }

    /// Run `hook(call_index)` after each detect call returns.
    pub fn with_hook(mut self, hook: impl FnMut(usize) + Send + 'static) -> Self {
        self.after_detect = Some(Box::new(hook));
        self
    }
}

impl ObjectDetectionEngine for ScriptedEngine {
    fn detect(&mut self, _frame: &RgbImage, class_ids: &[u32]) -> Result<Vec<Detection>> {
        self.requested.lock().push(class_ids.to_vec());
        let ids = match self.script.pop_front() {
            Some(Step::Fail) => return Err(PipelineError::EngineFailure("model crashed".into())),
            Some(Step::Panic) => panic!("inference backend aborted"),
            Some(Step::Detect(ids)) => ids,
            None => self.fallback.clone(),
        };
        let detections = ids
            .into_iter()
            .filter(|id| class_ids.contains(id))
            .map(|class_id| Detection { class_id, confidence: 0.9, bbox_norm: (0.2, 0.2, 0.6, 0.7) })
            .collect();

        let call = self.calls;
        self.calls += 1;
        if let Some(hook) = self.after_detect.as_mut() {
            hook(call);
        }
        Ok(detections)
    }
}

pub fn shared(engine: ScriptedEngine) -> SharedEngine {
    let engine: Box<dyn ObjectDetectionEngine> = Box::new(engine);
    Arc::new(Mutex::new(engine))
}

// ─── Cue ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingCue {
    pub triggered: Mutex<Vec<(String, Vec<String>)>>,
}

impl CueSink for RecordingCue {
    fn trigger(&self, cue: &str, classes: &[String]) {
        self.triggered.lock().push((cue.to_string(), classes.to_vec()));
    }
}

// ─── Wiring ─────────────────────────────────────────────────────────────────

pub fn context(session: Arc<SessionState>, engine: SharedEngine, cue: Arc<dyn CueSink>) -> CaptureContext {
    CaptureContext::new(
        session,
        engine,
        DetectionAggregator::default(),
        StreamEncoder::new(70),
        cue,
    )
}

pub fn monitor(opener: ScriptedOpener, engine: ScriptedEngine) -> (Arc<Monitor>, Arc<SessionState>) {
    let session = Arc::new(SessionState::default());
    let ctx = context(Arc::clone(&session), shared(engine), Arc::new(RecordingCue::default()));
    (Arc::new(Monitor::new(ctx, Arc::new(opener))), session)
}

/// Wait until the monitor's capture task has finished.
pub async fn wait_idle(monitor: &Monitor) {
    for _ in 0..200 {
        if !monitor.is_capturing().await {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("capture task did not finish");
}
