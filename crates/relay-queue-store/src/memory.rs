//! In-process key-value backend.

use crate::{KeyValueStore, StoreResult};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Non-durable backend for ephemeral runs and tests. Clones share entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: std::sync::Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
