use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("FFmpeg subprocess error: {0}")]
    FfmpegSubprocess(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Stem separation error: {0}")]
    StemSeparation(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
