//! Outbox error types.

use relay_queue_store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// A single delivery attempt did not succeed.
///
/// The retry policy treats every variant the same way; the distinction only
/// matters for logs and the status surface.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Connection refused, reset, DNS failure, TLS failure...
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Collector answered with a non-2xx status
    #[error("Collector returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// No answer within the per-attempt limit
    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    /// Client-specific failure
    #[error("Delivery failed: {0}")]
    Unavailable(String),
}

/// Outbox error type.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Snapshot write failed; the mutation was not committed
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The controller task has exited
    #[error("Flush controller is not running")]
    WorkerStopped,
}

/// Result type alias using OutboxError.
pub type OutboxResult<T> = Result<T, OutboxError>;
