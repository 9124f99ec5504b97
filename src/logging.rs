//! Logging for the monitor process.
//!
//! Every lifecycle event (device opened/released, session start/stop, filter
//! and cue changes, loop exits) goes through `tracing`. The `alert` target
//! carries cue triggers. Output goes to stdout and to `monitor.log`, rotated
//! daily, under `WILDWATCH_LOG_DIR` or the platform data directory.

use std::path::{Path, PathBuf};
use std::sync::{Once, OnceLock};

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Used when neither `RUST_LOG` nor `WILDWATCH_LOG_LEVEL` is set.
/// ONNX Runtime and hyper are chatty at info.
pub const DEFAULT_DIRECTIVE: &str = "info,ort=warn,hyper=warn";

const LOG_FILE: &str = "monitor.log";

static INIT_LOGGING: Once = Once::new();
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// `override_dir` wins; otherwise `<data dir>/wildlife-watch/logs`.
fn log_dir_from(override_dir: Option<PathBuf>) -> PathBuf {
    override_dir.filter(|d| !d.as_os_str().is_empty()).unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("wildlife-watch")
            .join("logs")
    })
}

/// Filter directive from `WILDWATCH_LOG_LEVEL`, e.g. `debug` or
/// `wildlife_watch::capture=trace`.
fn level_directive(level: Option<String>) -> String {
    level
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

fn build_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level_directive(std::env::var("WILDWATCH_LOG_LEVEL").ok())))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

fn open_log_file() -> Option<(RollingFileAppender, PathBuf)> {
    let dir = log_dir_from(std::env::var_os("WILDWATCH_LOG_DIR").map(PathBuf::from));
    match std::fs::create_dir_all(&dir) {
        Ok(()) => Some((RollingFileAppender::new(Rotation::DAILY, &dir, LOG_FILE), dir)),
        Err(err) => {
            eprintln!("[wildlife-watch] cannot create log directory {}: {}", dir.display(), err);
            None
        }
    }
}

/// Install the global subscriber. Later calls are no-ops.
///
/// Returns the directory holding `monitor.log`, or `None` when logging is
/// stdout only.
pub fn init_logging() -> Option<&'static Path> {
    INIT_LOGGING.call_once(|| {
        let file_layer = open_log_file().map(|(appender, dir)| {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            LOG_GUARD.set(guard).ok();
            LOG_DIR.set(dir).ok();
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(writer)
        });

        tracing_subscriber::registry()
            .with(build_filter())
            .with(fmt::layer().with_target(true).with_timer(UtcTime::rfc_3339()))
            .with(file_layer)
            .init();

        match LOG_DIR.get() {
            Some(dir) => info!("Logging to stdout and {}", dir.join(LOG_FILE).display()),
            None => warn!("Logging to stdout only"),
        }
    });
    LOG_DIR.get().map(PathBuf::as_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_override() {
        assert_eq!(log_dir_from(Some(PathBuf::from("/var/log/ww"))), PathBuf::from("/var/log/ww"));
        let fallback = log_dir_from(Some(PathBuf::new()));
        assert!(fallback.ends_with("wildlife-watch/logs"));
        assert_eq!(log_dir_from(None), fallback);
    }

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive(None), DEFAULT_DIRECTIVE);
        assert_eq!(level_directive(Some("  ".into())), DEFAULT_DIRECTIVE);
        assert_eq!(level_directive(Some(" debug ".into())), "debug");
    }
}
