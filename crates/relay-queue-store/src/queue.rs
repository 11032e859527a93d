//! Whole-snapshot queue persistence.

use crate::{KeyValueStore, StoreResult};
use telemetry_event_types::QueueItem;
use tracing::{debug, warn};

/// Persistence contract for the pending queue.
///
/// There are no append/remove primitives: every mutation replaces the whole
/// ordered sequence.
pub trait QueueStore: Send + Sync {
    /// The persisted sequence. Absent or unreadable snapshots load as empty.
    fn load(&self) -> Vec<QueueItem>;

    /// Replace the persisted sequence with `items`.
    fn save(&self, items: &[QueueItem]) -> StoreResult<()>;
}

/// [`QueueStore`] over one entry of a [`KeyValueStore`].
pub struct DurableQueueStore<S> {
    backend: S,
    key: String,
}

impl<S: KeyValueStore> DurableQueueStore<S> {
    pub fn new(backend: S, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Load without the empty-queue fallback.
    pub fn try_load(&self) -> StoreResult<Vec<QueueItem>> {
        let Some(bytes) = self.backend.get(&self.key)? else {
            return Ok(Vec::new());
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl<S: KeyValueStore> QueueStore for DurableQueueStore<S> {
    fn load(&self) -> Vec<QueueItem> {
        match self.try_load() {
            Ok(items) => {
                debug!(key = %self.key, count = items.len(), "Loaded queue snapshot");
                items
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Queue snapshot unreadable, starting empty");
                Vec::new()
            }
        }
    }

    fn save(&self, items: &[QueueItem]) -> StoreResult<()> {
        let bytes = serde_json::to_vec(items)?;
        self.backend.set(&self.key, &bytes)?;
        debug!(key = %self.key, count = items.len(), "Saved queue snapshot");
        Ok(())
    }
}
