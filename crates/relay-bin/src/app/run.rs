//! Long-running relay.

use super::state::RelayState;
use connectivity_observer::{
    spawn_reachability_probe, ConnectivityObserver, ProbeConfig, ReachabilityProbe,
};
use ingestion_adapter::{IngestOutcome, IngestionAdapter};
use relay_config_and_utils::{Config, Paths};
use relay_queue_store::QueueStore;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Run the relay until stdin closes or Ctrl-C.
///
/// Each stdin line is one notification: the base64 characteristic value, or
/// an empty line when the transport delivered no value.
pub async fn run_relay(config: Config, paths: Paths) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = config.endpoint_url()?;
    info!(endpoint = %endpoint, base_dir = %paths.base_dir().display(), "Starting telemetry relay");

    let state = RelayState::start(&config, &paths)?;

    let observer = Arc::new(ConnectivityObserver::new());
    let subscription = observer.subscribe(state.controller.reachability_handler());

    let probe_config = ProbeConfig::for_endpoint(&endpoint)
        .ok_or_else(|| format!("cannot probe endpoint without host and port: {}", endpoint))?
        .with_interval(config.probe_interval())
        .with_connect_timeout(config.probe_connect_timeout());
    let (probe_shutdown_tx, probe_shutdown_rx) = oneshot::channel();
    let probe_handle = spawn_reachability_probe(
        ReachabilityProbe::new(probe_config),
        observer.clone(),
        probe_shutdown_rx,
    );

    let adapter = IngestionAdapter::new(state.client.clone(), state.controller.clone())
        .with_delivery_timeout(config.delivery_timeout());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let raw = line.trim();
                    let raw = (!raw.is_empty()).then_some(raw);
                    match adapter.ingest(raw).await {
                        IngestOutcome::Delivered => debug!("Notification delivered"),
                        IngestOutcome::Queued { item_id } => {
                            debug!(item_id = %item_id, "Notification queued")
                        }
                        IngestOutcome::Dropped { reason } => {
                            debug!(reason = %reason, "Notification dropped")
                        }
                    }
                }
                Ok(None) => {
                    info!("Notification stream closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read notification stream");
                    break;
                }
            }
        }
    }

    let _ = probe_shutdown_tx.send(());
    if let Err(e) = probe_handle.await {
        warn!(error = %e, "Reachability probe task failed");
    }
    observer.unsubscribe(subscription);

    state.controller.shutdown().await?;
    info!(pending = state.store.load().len(), "Telemetry relay stopped");
    Ok(())
}
