//! Session start/stop orchestration.
//!
//! `start` opens the video source before anything is marked active, then runs
//! the capture loop on a blocking task. `stop` deactivates and clears the
//! session and waits for that task to finish, so a following `start` never
//! races a loop that is still releasing its device.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::capture::{run_capture_loop, settle_session, CaptureContext, LoopExit};
use crate::error::{PipelineError, Result};
use crate::session::SessionState;
use crate::source::SourceOpener;

/// Encoded multipart parts, in capture order. Ends when the loop ends.
pub type FrameStream = flume::r#async::RecvStream<'static, Bytes>;

pub struct Monitor {
    ctx: Arc<CaptureContext>,
    opener: Arc<dyn SourceOpener>,
    task: Mutex<Option<JoinHandle<LoopExit>>>,
}

impl Monitor {
    pub fn new(ctx: CaptureContext, opener: Arc<dyn SourceOpener>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            opener,
            task: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.ctx.session
    }

    /// Open the source, mark the session active and start capturing.
    ///
    /// Fails with `DeviceUnavailable` (session untouched) if the source cannot
    /// be opened, or `AlreadyStreaming` if a session is running.
    pub async fn start(&self) -> Result<FrameStream> {
        let mut slot = self.task.lock().await;
        if self.ctx.session.is_active() {
            return Err(PipelineError::AlreadyStreaming);
        }
        if let Some(previous) = slot.take() {
            join_loop(previous).await;
        }

        let opener = Arc::clone(&self.opener);
        let source = tokio::task::spawn_blocking(move || opener.open())
            .await
            .map_err(|e| PipelineError::DeviceUnavailable(e.to_string()))??;

        self.ctx.session.activate()?;

        let (tx, rx) = flume::bounded::<Bytes>(1);
        let ctx = Arc::clone(&self.ctx);
        *slot = Some(tokio::task::spawn_blocking(move || {
            let _unwind = ClearOnPanic(&ctx.session);
            let exit = run_capture_loop(&ctx, source, tx);
            settle_session(&ctx.session, &exit);
            exit
        }));

        info!("Streaming session started");
        Ok(rx.into_stream())
    }

    /// Deactivate and clear the session, then wait for the capture task.
    ///
    /// Filter and cue selections are left alone. Safe to call when idle.
    pub async fn stop(&self) {
        let mut slot = self.task.lock().await;
        self.ctx.session.deactivate(true);
        if let Some(handle) = slot.take() {
            join_loop(handle).await;
        }
        info!("Streaming session stopped; history cleared");
    }

    /// True while a capture task exists and has not finished.
    pub async fn is_capturing(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

/// Ends the session if the capture task unwinds before it can settle.
struct ClearOnPanic<'a>(&'a SessionState);

impl Drop for ClearOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!("Capture task panicked; session ended and cleared");
            self.0.deactivate(true);
        }
    }
}

async fn join_loop(handle: JoinHandle<LoopExit>) {
    match handle.await {
        Ok(exit) => info!("Previous capture task joined: {:?}", exit),
        Err(e) => warn!("Capture task panicked: {}", e),
    }
}
