//! Telemetry event and queue item types.
//!
//! The serialized form of [`EventRecord`] is the collector's wire body:
//!
//! ```json
//! {"event":"B","ts":"2024-01-15T10:30:00.123Z","img_id":"B_1705314600123"}
//! ```
//!
//! and a persisted queue snapshot is a JSON array of [`QueueItem`]s, each
//! `{"id": "<uuid>", "payload": <EventRecord>}`.

mod event;
mod queue_item;

pub use event::{EventCode, EventRecord, SignalCategory};
pub use queue_item::QueueItem;
