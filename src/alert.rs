/// Audio-cue side effect of a detection.
///
/// Playback itself lives outside this crate; the capture loop only hands the
/// selected cue to a `CueSink` and never waits on the result.

use tracing::info;

pub trait CueSink: Send + Sync {
    /// Fire-and-forget notification that `classes` were detected.
    fn trigger(&self, cue: &str, classes: &[String]);
}

/// Records the cue in the log instead of playing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCue;

impl CueSink for LogCue {
    fn trigger(&self, cue: &str, classes: &[String]) {
        info!(target: "alert", cue, "Detected {}", classes.join(", "));
    }
}
