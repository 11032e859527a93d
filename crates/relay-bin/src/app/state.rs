//! Shared relay components.

use relay_config_and_utils::{Config, InstanceLock, Paths};
use relay_outbox::{FlushConfig, FlushController, HttpDeliveryClient, SenderConfig};
use relay_queue_store::{DurableQueueStore, FileKeyValueStore};
use std::sync::Arc;
use tracing::debug;

pub type RelayStore = DurableQueueStore<FileKeyValueStore>;

/// Open the durable queue configured for this base directory.
pub fn open_store(config: &Config, paths: &Paths) -> Result<Arc<RelayStore>, Box<dyn std::error::Error>> {
    paths.ensure_dirs()?;
    let backend = FileKeyValueStore::open(paths.data_dir())?;
    debug!(dir = %backend.dir().display(), key = %config.storage_key, "Opened queue store");
    Ok(Arc::new(DurableQueueStore::new(backend, config.storage_key.clone())))
}

/// Everything that talks to the collector or the queue.
///
/// Owns the base directory for as long as any clone is alive, so no other
/// relay process can run a flush controller over the same queue.
#[derive(Clone)]
pub struct RelayState {
    pub store: Arc<RelayStore>,
    pub client: Arc<HttpDeliveryClient>,
    pub controller: FlushController,
    _instance: Arc<InstanceLock>,
}

impl RelayState {
    /// Lock the base directory, open the store, build the HTTP client and
    /// start the flush controller.
    pub fn start(config: &Config, paths: &Paths) -> Result<Self, Box<dyn std::error::Error>> {
        let instance = Arc::new(InstanceLock::acquire(paths)?);
        let store = open_store(config, paths)?;

        let sender = SenderConfig::new(config.endpoint_url()?)
            .with_request_timeout(config.delivery_timeout());
        let client = Arc::new(HttpDeliveryClient::new(sender)?);

        let controller = FlushController::spawn(
            store.clone(),
            client.clone(),
            FlushConfig {
                delivery_timeout: config.delivery_timeout(),
                ..FlushConfig::default()
            },
        );

        Ok(Self {
            store,
            client,
            controller,
            _instance: instance,
        })
    }
}
