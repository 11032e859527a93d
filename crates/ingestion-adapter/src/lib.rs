//! Entry point for notifications coming off the peripheral transport.
//!
//! [`decode_notification`] turns a base64 characteristic value into an
//! [`EventCode`](telemetry_event_types::EventCode). [`IngestionAdapter`]
//! stamps it, attempts delivery once, and hands failures to the
//! [`FlushController`](relay_outbox::FlushController).

mod adapter;
mod decode;

pub use adapter::{IngestOutcome, IngestionAdapter};
pub use decode::{decode_notification, DecodeError};
