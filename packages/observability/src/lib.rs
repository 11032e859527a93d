//! # Observability
//!
//! Logging layer shared by every telemetry relay crate.
//!
//! Crates only emit through `tracing` macros. This crate decides where the
//! events go:
//!
//! - One JSON object per line, appended to a central file
//!   (`~/.telemetry-relay/logs/relay.jsonl` unless overridden)
//! - Optionally a compact human-readable stream on stderr
//!
//! Filtering honours `RUST_LOG` and falls back to the configured level.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "relay".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("relay started");
//! ```

mod central_writer;
mod json_layer;

use std::path::PathBuf;

pub use central_writer::{CentralLogWriter, WriterFactory};
pub use json_layer::{JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service written into every JSON line.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.telemetry-relay/logs/relay.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr for immediate feedback.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with custom configuration.
///
/// If the log file cannot be opened, only the stderr layer is installed.
/// Calling this more than once is a no-op after the first subscriber wins.
pub fn init_with_config(config: LogConfig) {
    central_writer::init_subscriber(&config);
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
