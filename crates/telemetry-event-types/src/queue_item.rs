//! Queue entries wrapping an event with a stable identity.

use crate::EventRecord;
use serde::{Deserialize, Serialize};

/// A pending delivery: an event plus the id used to remove it once delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    id: String,
    payload: EventRecord,
}

impl QueueItem {
    /// Wrap `payload` under a fresh v4 UUID.
    pub fn new(payload: EventRecord) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), payload)
    }

    pub fn with_id(id: impl Into<String>, payload: EventRecord) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn payload(&self) -> &EventRecord {
        &self.payload
    }
}
