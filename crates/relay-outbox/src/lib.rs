//! Reliable delivery of telemetry events to the collector.
//!
//! This crate provides:
//! - [`DeliveryClient`]: one delivery attempt for one event, with
//!   [`HttpDeliveryClient`] posting JSON to the collector
//! - [`FlushController`]: actor owning the pending queue; serializes enqueues
//!   and drain passes and persists every change through a
//!   [`QueueStore`](relay_queue_store::QueueStore)

mod controller;
mod error;
mod sender;

pub use controller::{DrainReport, FlushConfig, FlushController, OutboxStatus, PassHalt};
pub use error::{DeliveryError, OutboxError, OutboxResult};
pub use sender::{
    deliver_with_timeout, DeliveryClient, HttpDeliveryClient, SenderConfig,
    DEFAULT_DELIVERY_TIMEOUT,
};
