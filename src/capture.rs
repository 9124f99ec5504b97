/// Capture loop: frame → filter → detect → aggregate → encode → emit.
///
/// Strictly sequential; one frame is fully processed and handed to the viewer
/// before the next is read. The emit channel holds a single part, so a slow
/// viewer slows capture instead of frames being dropped. The session's active
/// flag is checked only between frames.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{Local, NaiveDateTime};
use flume::SendTimeoutError;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::aggregator::DetectionAggregator;
use crate::alert::CueSink;
use crate::engine::ObjectDetectionEngine;
use crate::error::PipelineError;
use crate::filter::effective_class_ids;
use crate::session::SessionState;
use crate::source::SourceHandle;
use crate::stream::StreamEncoder;

/// Engine shared between successive sessions; one loop holds it at a time.
pub type SharedEngine = Arc<Mutex<Box<dyn ObjectDetectionEngine>>>;

/// How often a blocked emit re-checks the active flag.
const EMIT_POLL: Duration = Duration::from_millis(250);

/// Everything a capture loop needs besides its source and output channel.
pub struct CaptureContext {
    pub session: Arc<SessionState>,
    pub engine: SharedEngine,
    pub aggregator: DetectionAggregator,
    pub encoder: StreamEncoder,
    pub cue: Arc<dyn CueSink>,
    pub clock: fn() -> NaiveDateTime,
}

impl CaptureContext {
    pub fn new(
        session: Arc<SessionState>,
        engine: SharedEngine,
        aggregator: DetectionAggregator,
        encoder: StreamEncoder,
        cue: Arc<dyn CueSink>,
    ) -> Self {
        Self { session, engine, aggregator, encoder, cue, clock: local_now }
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Why a capture loop ended.
#[derive(Debug)]
pub enum LoopExit {
    /// Session deactivated from outside.
    Stopped,
    /// The stream consumer went away.
    ViewerGone,
    /// Source, engine or encoder failure.
    Failed(PipelineError),
}

enum Emit {
    Sent,
    Stopped,
    ViewerGone,
}

/// Run until stopped, the viewer disconnects, or a frame fails.
///
/// `source` is dropped (and so released) before this returns, on every path.
pub fn run_capture_loop(ctx: &CaptureContext, mut source: SourceHandle, tx: flume::Sender<Bytes>) -> LoopExit {
    let mut frames = 0u64;
    let exit = loop {
        if !ctx.session.is_active() {
            break LoopExit::Stopped;
        }

        let frame = match source.read_frame() {
            Ok(f) => f,
            Err(e) => break LoopExit::Failed(e),
        };

        let filter = ctx.session.filter();
        let class_ids = effective_class_ids(&filter, ctx.aggregator.table());

        let (detections, annotated) = {
            let mut engine = ctx.engine.lock();
            let detections = match engine.detect(&frame, &class_ids) {
                Ok(d) => d,
                Err(e) => break LoopExit::Failed(e),
            };
            let annotated = engine.annotate(&frame, &detections, ctx.aggregator.table());
            (detections, annotated)
        };

        let outcome = ctx.aggregator.ingest(&ctx.session, &detections, (ctx.clock)());
        if let Some(cue) = &outcome.cue {
            let classes: Vec<String> = outcome.qualifying.iter().cloned().collect();
            ctx.cue.trigger(cue, &classes);
        }

        let part = match ctx.encoder.encode_part(&annotated) {
            Ok(p) => p,
            Err(e) => break LoopExit::Failed(e),
        };

        frames += 1;
        debug!("Frame {}: {} raw detections, filter={}", frames, detections.len(), filter);

        match emit(&tx, part, &ctx.session) {
            Emit::Sent => {}
            Emit::Stopped => break LoopExit::Stopped,
            Emit::ViewerGone => break LoopExit::ViewerGone,
        }
    };

    drop(source);
    info!("Capture loop exited after {} frames: {:?}", frames, exit);
    exit
}

/// Blocking hand-off to the viewer, abandoned if the session is stopped.
fn emit(tx: &flume::Sender<Bytes>, part: Bytes, session: &SessionState) -> Emit {
    let mut pending = part;
    loop {
        match tx.send_timeout(pending, EMIT_POLL) {
            Ok(()) => return Emit::Sent,
            Err(SendTimeoutError::Disconnected(_)) => return Emit::ViewerGone,
            Err(SendTimeoutError::Timeout(p)) => {
                if !session.is_active() {
                    return Emit::Stopped;
                }
                pending = p;
            }
        }
    }
}

/// Apply the session transition for a finished loop.
///
/// Failures end the session and clear its detections. A departed viewer only
/// marks it inactive so history stays queryable. `Stopped` was already handled
/// by whoever stopped it.
pub fn settle_session(session: &SessionState, exit: &LoopExit) {
    match exit {
        LoopExit::Stopped => {}
        LoopExit::ViewerGone => {
            info!("Viewer disconnected; capture paused");
            session.deactivate(false);
        }
        LoopExit::Failed(e) => {
            if e.ends_session() {
                warn!("Capture ended: {}", e);
            } else {
                warn!("Capture aborted: {}", e);
            }
            session.deactivate(true);
        }
    }
}
