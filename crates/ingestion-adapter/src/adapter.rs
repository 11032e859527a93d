//! Routes decoded events to the collector, falling back to the queue.

use crate::{decode_notification, DecodeError};
use relay_outbox::{deliver_with_timeout, DeliveryClient, FlushController, DEFAULT_DELIVERY_TIMEOUT};
use std::sync::Arc;
use std::time::Duration;
use telemetry_event_types::{EventRecord, SignalCategory};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What happened to one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Accepted by the collector on the direct attempt.
    Delivered,
    /// Direct attempt failed; persisted for a later drain pass.
    Queued { item_id: String },
    /// Not decodable, or the queue write failed.
    Dropped { reason: String },
}

pub struct IngestionAdapter {
    client: Arc<dyn DeliveryClient>,
    controller: FlushController,
    delivery_timeout: Duration,
    latest: watch::Sender<Option<SignalCategory>>,
}

impl IngestionAdapter {
    pub fn new(client: Arc<dyn DeliveryClient>, controller: FlushController) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            client,
            controller,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            latest,
        }
    }

    pub fn with_delivery_timeout(mut self, delivery_timeout: Duration) -> Self {
        self.delivery_timeout = delivery_timeout;
        self
    }

    /// Category of the most recently decoded event, for the status indicator.
    pub fn subscribe_category(&self) -> watch::Receiver<Option<SignalCategory>> {
        self.latest.subscribe()
    }

    pub fn latest_category(&self) -> Option<SignalCategory> {
        *self.latest.borrow()
    }

    /// Decode one raw notification into a record stamped now.
    pub fn on_event(&self, raw: Option<&str>) -> Result<EventRecord, DecodeError> {
        let code = decode_notification(raw)?;
        let category = code.category();
        self.latest.send_replace(Some(category));

        let record = EventRecord::now(code);
        debug!(
            event = %record.event_code(),
            color = category.color_name(),
            img_id = %record.correlation_tag(),
            "Decoded notification"
        );
        Ok(record)
    }

    /// Try the collector once; on failure hand the record to the queue.
    /// Never retries itself.
    pub async fn report(&self, record: EventRecord) -> IngestOutcome {
        match deliver_with_timeout(&*self.client, &record, self.delivery_timeout).await {
            Ok(()) => {
                info!(img_id = %record.correlation_tag(), "Event delivered");
                IngestOutcome::Delivered
            }
            Err(delivery_error) => {
                warn!(
                    img_id = %record.correlation_tag(),
                    error = %delivery_error,
                    "Direct delivery failed, queueing event"
                );
                match self.controller.enqueue(record).await {
                    Ok(item) => IngestOutcome::Queued {
                        item_id: item.id().to_string(),
                    },
                    Err(e) => {
                        error!(error = %e, "Event lost: could not be queued");
                        IngestOutcome::Dropped {
                            reason: e.to_string(),
                        }
                    }
                }
            }
        }
    }

    /// Decode and report one notification.
    pub async fn ingest(&self, raw: Option<&str>) -> IngestOutcome {
        match self.on_event(raw) {
            Ok(record) => self.report(record).await,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable notification");
                IngestOutcome::Dropped {
                    reason: e.to_string(),
                }
            }
        }
    }
}
