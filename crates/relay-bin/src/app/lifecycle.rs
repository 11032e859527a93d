//! One-shot commands (status, flush).

use super::state::{open_store, RelayState};
use relay_config_and_utils::{Config, InstanceLock, Paths};
use relay_queue_store::QueueStore;
use tracing::info;

/// Print the persisted queue as JSON. Read-only, so it is safe while a
/// relay owns the base directory.
pub fn print_status(config: &Config, paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let running = InstanceLock::is_held(paths)?;
    let store = open_store(config, paths)?;
    let items = store.load();

    let summary = serde_json::json!({
        "endpoint": config.endpoint_url,
        "running": running,
        "pending": items.len(),
        "items": items,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Run a single drain pass regardless of reachability.
///
/// Refused while another relay owns the base directory; that process
/// drains on its own once the collector is reachable.
pub async fn flush_once(config: Config, paths: Paths) -> Result<(), Box<dyn std::error::Error>> {
    let state = RelayState::start(&config, &paths)?;

    let report = state.controller.drain_now().await?;
    info!(
        delivered = report.delivered,
        remaining = report.remaining,
        "Manual flush finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    state.controller.shutdown().await?;
    Ok(())
}
