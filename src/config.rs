/// Wildlife Watch configuration
///
/// Loaded from wildlife-watch.toml (working directory) with env-var overrides.
/// Env format: WILDWATCH__SECTION__KEY (double underscore separators).
/// Every field has a default, so no file at all is a valid configuration.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Local capture device (requires the `camera` feature)
    Device,
    /// Still images replayed from a directory
    Directory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_source")]
    pub source: SourceKind,
    #[serde(default)]
    pub device_index: i32,
    pub directory: Option<PathBuf>,
}

fn default_source() -> SourceKind {
    SourceKind::Device
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            device_index: 0,
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_model_path")]
    pub model_path: String,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_nms_threshold")]
    pub nms_threshold: f32,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn default_model_path() -> String {
    "models/animaldetection_yolov8.onnx".to_string()
}
fn default_confidence_threshold() -> f32 {
    0.25
}
fn default_nms_threshold() -> f32 {
    0.45
}
fn default_input_size() -> u32 {
    640
}
fn default_intra_threads() -> usize {
    2
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            confidence_threshold: default_confidence_threshold(),
            nms_threshold: default_nms_threshold(),
            input_size: default_input_size(),
            intra_threads: default_intra_threads(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_jpeg_quality() -> u8 {
    80
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { jpeg_quality: default_jpeg_quality() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_filter")]
    pub default_filter: String,
    #[serde(default = "default_cue")]
    pub default_cue: String,
}

fn default_filter() -> String {
    crate::filter::ALL_SENTINEL.to_string()
}
fn default_cue() -> String {
    crate::session::DEFAULT_CUE.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_filter: default_filter(),
            default_cue: default_cue(),
        }
    }
}

/// Load configuration from wildlife-watch.toml + environment variable overrides.
///
/// Search order:
///   1. ./wildlife-watch.toml (working directory)
///   2. Environment variables: WILDWATCH__CAMERA__SOURCE, etc.
pub fn load_config() -> Result<AppConfig, config::ConfigError> {
    load_from("wildlife-watch")
}

/// Same as `load_config` with an explicit file stem (extension optional).
pub fn load_from(file_stem: &str) -> Result<AppConfig, config::ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(file_stem).required(false))
        .add_source(
            config::Environment::with_prefix("WILDWATCH")
                .separator("__")
                .try_parsing(true),
        );

    let settings = builder.build()?;
    settings.try_deserialize::<AppConfig>()
}
