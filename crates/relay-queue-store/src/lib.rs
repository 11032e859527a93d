//! Durable storage for the relay's pending delivery queue.
//!
//! Two layers:
//! - [`KeyValueStore`]: named byte entries. [`FileKeyValueStore`] keeps one
//!   file per key and replaces it with write-then-rename, so readers only
//!   ever see a complete old value or a complete new value.
//! - [`QueueStore`]: the whole ordered queue under a single key, serialized
//!   as JSON and replaced as a unit on every mutation. Unreadable snapshots
//!   load as an empty queue.

mod file;
mod keys;
mod kv;
mod memory;
mod queue;

pub use file::FileKeyValueStore;
pub use keys::StorageKeys;
pub use kv::KeyValueStore;
pub use memory::MemoryKeyValueStore;
pub use queue::{DurableQueueStore, QueueStore};

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded
    #[error("Snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// Key cannot be mapped onto the backend
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
