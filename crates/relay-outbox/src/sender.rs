//! Single-attempt delivery to the collector.

use crate::{DeliveryError, OutboxResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use telemetry_event_types::EventRecord;
use tracing::{debug, warn};
use url::Url;

/// Default per-attempt limit.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Error bodies longer than this are cut before logging.
const MAX_ERROR_BODY_CHARS: usize = 256;

/// One remote delivery attempt for one event.
///
/// Implementations must not touch the queue; they only report whether the
/// collector accepted the payload.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn deliver(&self, payload: &EventRecord) -> Result<(), DeliveryError>;
}

/// Run one attempt, turning an overrun of `limit` into [`DeliveryError::Timeout`].
pub async fn deliver_with_timeout(
    client: &dyn DeliveryClient,
    payload: &EventRecord,
    limit: Duration,
) -> Result<(), DeliveryError> {
    match tokio::time::timeout(limit, client.deliver(payload)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(DeliveryError::Timeout(limit)),
    }
}

/// Sender configuration.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Collector URL receiving one POST per event.
    pub endpoint_url: Url,
    /// Request timeout enforced by the HTTP client itself.
    pub request_timeout: Duration,
}

impl SenderConfig {
    pub fn new(endpoint_url: Url) -> Self {
        Self {
            endpoint_url,
            request_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// Posts each event as JSON to the collector.
pub struct HttpDeliveryClient {
    config: SenderConfig,
    client: Client,
}

impl HttpDeliveryClient {
    pub fn new(config: SenderConfig) -> OutboxResult<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.config.endpoint_url
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn deliver(&self, payload: &EventRecord) -> Result<(), DeliveryError> {
        debug!(
            url = %self.config.endpoint_url,
            event = %payload.event_code(),
            img_id = %payload.correlation_tag(),
            "Posting event"
        );

        let response = self
            .client
            .post(self.config.endpoint_url.clone())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            warn!(
                status = status.as_u16(),
                img_id = %payload.correlation_tag(),
                "Collector rejected event"
            );
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
