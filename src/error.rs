/// Pipeline error taxonomy.
///
/// Mid-session failures (`ReadError`, `EndOfStream`, `EngineFailure`) end the
/// capture loop; nothing here is retried automatically.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("video source unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("frame read failed: {0}")]
    ReadError(String),

    #[error("video source reached end of stream")]
    EndOfStream,

    #[error("detection engine failed: {0}")]
    EngineFailure(String),

    #[error("frame encoding failed: {0}")]
    Encode(String),

    #[error("a stream is already active")]
    AlreadyStreaming,

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// True for the failures that terminate a running capture loop.
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            PipelineError::ReadError(_) | PipelineError::EndOfStream | PipelineError::EngineFailure(_)
        )
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Encode(err.to_string())
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
