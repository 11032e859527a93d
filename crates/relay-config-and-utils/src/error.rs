//! Core error types for the relay.

use std::path::PathBuf;
use thiserror::Error;

/// Error raised while loading configuration or preparing the filesystem.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Path error (e.g., home directory not found)
    #[error("Path error: {0}")]
    Path(String),

    /// Another relay process owns the base directory
    #[error(
        "Relay is already running for {} (pid {}). Stop it first.",
        .base_dir.display(),
        .pid.map(|pid| pid.to_string()).unwrap_or_else(|| "unknown".to_string())
    )]
    AlreadyRunning { pid: Option<u32>, base_dir: PathBuf },
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
