use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use tracing::warn;

use wildlife_watch::{
    aggregator::DetectionAggregator,
    alert::LogCue,
    capture::{CaptureContext, SharedEngine},
    classes::ClassTable,
    config::{self, AppConfig, SourceKind},
    filter::ActiveFilter,
    logging,
    monitor::Monitor,
    pattern::{peak_activity, NO_DETECTIONS},
    server::{self, AppState},
    session::{SessionState, TIMESTAMP_FORMAT},
    source::{DirectoryOpener, SourceOpener},
    stream::StreamEncoder,
};

#[derive(Parser)]
#[command(name = "wildlife-watch", version)]
#[command(about = "Live animal detection with history, activity patterns and MJPEG preview")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the monitoring server
    Serve {
        #[arg(long)] bind:      Option<String>,
        #[arg(long, value_parser = parse_source)] source: Option<SourceKind>,
        #[arg(long)] directory: Option<PathBuf>,
        #[arg(long)] model:     Option<String>,
    },

    /// List the detectable animal classes
    Classes,

    /// Peak-activity hours of a timestamp file (one `YYYY-MM-DD HH:MM:SS` per line)
    Pattern {
        file: PathBuf,
    },
}

fn parse_source(s: &str) -> Result<SourceKind, String> {
    match s.to_ascii_lowercase().as_str() {
        "device" => Ok(SourceKind::Device),
        "directory" | "dir" => Ok(SourceKind::Directory),
        other => Err(format!("unknown source '{}', expected device or directory", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_dir = logging::init_logging();

    let cli = Cli::parse();
    let mut cfg = config::load_config().unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    match cli.command {
        Command::Serve { bind, source, directory, model } => {
            if let Some(b) = bind      { cfg.server.bind = b; }
            if let Some(s) = source    { cfg.camera.source = s; }
            if let Some(d) = directory { cfg.camera.directory = Some(d); cfg.camera.source = SourceKind::Directory; }
            if let Some(m) = model     { cfg.detector.model_path = m; }
            print_startup_info(&cfg, log_dir);
            serve(cfg).await?;
        }

        Command::Classes => {
            let table = ClassTable::default();
            println!("{:<5} {:<10} {}", "ID", "Name", "Target");
            println!("{}", "─".repeat(24));
            for class in table.classes() {
                let target = table.target_ids().contains(&class.id);
                println!("{:<5} {:<10} {}", class.id, class.name, if target { "yes" } else { "no" });
            }
        }

        Command::Pattern { file } => {
            let stamps = read_timestamps(&file)?;
            match peak_activity(&stamps) {
                Some(peak) => println!("{}", peak.describe()),
                None => println!("{}", NO_DETECTIONS),
            }
        }
    }
    Ok(())
}

async fn serve(cfg: AppConfig) -> Result<()> {
    let table = ClassTable::default();
    let filter = ActiveFilter::parse(Some(&cfg.session.default_filter), &table);
    let session = Arc::new(SessionState::new(filter, cfg.session.default_cue.clone()));

    let engine = build_engine(&cfg)?;
    let opener = build_opener(&cfg)?;

    let ctx = CaptureContext::new(
        session,
        engine,
        DetectionAggregator::new(table.clone()),
        StreamEncoder::new(cfg.stream.jpeg_quality),
        Arc::new(LogCue),
    );
    let monitor = Arc::new(Monitor::new(ctx, opener));

    let state = Arc::new(AppState {
        monitor,
        table,
        default_cue: cfg.session.default_cue.clone(),
    });
    server::serve(state, &cfg.server.bind).await
}

#[cfg(feature = "onnx")]
fn build_engine(cfg: &AppConfig) -> Result<SharedEngine> {
    let engine: Box<dyn wildlife_watch::engine::ObjectDetectionEngine> =
        Box::new(wildlife_watch::yolo::YoloEngine::new(&cfg.detector)?);
    Ok(Arc::new(parking_lot::Mutex::new(engine)))
}

#[cfg(not(feature = "onnx"))]
fn build_engine(_cfg: &AppConfig) -> Result<SharedEngine> {
    anyhow::bail!("Built without the `onnx` feature; no detection engine available")
}

fn build_opener(cfg: &AppConfig) -> Result<Arc<dyn SourceOpener>> {
    match cfg.camera.source {
        SourceKind::Directory => {
            let dir = cfg
                .camera
                .directory
                .clone()
                .context("Directory source needs --directory or WILDWATCH__CAMERA__DIRECTORY")?;
            Ok(Arc::new(DirectoryOpener::new(dir)))
        }
        SourceKind::Device => device_opener(cfg.camera.device_index),
    }
}

#[cfg(feature = "camera")]
fn device_opener(index: i32) -> Result<Arc<dyn SourceOpener>> {
    Ok(Arc::new(wildlife_watch::camera::CameraOpener::new(index)))
}

#[cfg(not(feature = "camera"))]
fn device_opener(_index: i32) -> Result<Arc<dyn SourceOpener>> {
    anyhow::bail!("Built without the `camera` feature; use --source directory")
}

fn read_timestamps(path: &Path) -> Result<Vec<NaiveDateTime>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            NaiveDateTime::parse_from_str(line.trim(), TIMESTAMP_FORMAT)
                .with_context(|| format!("{}:{}: bad timestamp '{}'", path.display(), i + 1, line.trim()))
        })
        .collect()
}

fn print_startup_info(cfg: &AppConfig, log_dir: Option<&Path>) {
    let source = match cfg.camera.source {
        SourceKind::Device => format!("device {}", cfg.camera.device_index),
        SourceKind::Directory => format!(
            "directory {}",
            cfg.camera.directory.as_deref().map(|d| d.display().to_string()).unwrap_or_default()
        ),
    };

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║            WILDLIFE WATCH                                ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("  Source:    {}", source);
    println!("  Model:     {} (conf ≥ {:.2})", cfg.detector.model_path, cfg.detector.confidence_threshold);
    println!("  Filter:    {}", cfg.session.default_filter);
    println!("  Sound:     {}", cfg.session.default_cue);
    println!("  Listen:    http://{}", cfg.server.bind);
    if let Some(dir) = log_dir {
        println!("  Logs:      {}", dir.display());
    }
    println!("╚══════════════════════════════════════════════════════════╝");
}
