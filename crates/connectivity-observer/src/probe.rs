//! Periodic TCP reachability probe feeding a [`ConnectivityObserver`].

use crate::ConnectivityObserver;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// `host:port` to connect to.
    pub target: String,
    pub interval: Duration,
    pub connect_timeout: Duration,
}

impl ProbeConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            interval: DEFAULT_PROBE_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Probe the host serving `endpoint`, on its explicit or scheme-default port.
    /// `None` for URLs without a host or a known port.
    pub fn for_endpoint(endpoint: &Url) -> Option<Self> {
        let host = endpoint.host_str()?;
        let port = endpoint.port_or_known_default()?;
        Some(Self::new(format!("{}:{}", host, port)))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

/// Decides reachability by opening (and immediately dropping) a TCP
/// connection to the target.
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    config: ProbeConfig,
}

impl ReachabilityProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub async fn probe_once(&self) -> bool {
        match timeout(self.config.connect_timeout, TcpStream::connect(&self.config.target)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!(target_addr = %self.config.target, error = %e, "Reachability probe failed");
                false
            }
            Err(_) => {
                debug!(
                    target_addr = %self.config.target,
                    timeout_ms = self.config.connect_timeout.as_millis() as u64,
                    "Reachability probe timed out"
                );
                false
            }
        }
    }
}

/// Run `probe` every `interval` until `shutdown` fires, reporting to
/// `observer` on the first result and on every change after that.
pub fn spawn_reachability_probe(
    probe: ReachabilityProbe,
    observer: Arc<ConnectivityObserver>,
    mut shutdown: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = probe.config().interval;
        let mut last: Option<bool> = None;

        loop {
            let reachable = tokio::select! {
                _ = &mut shutdown => {
                    info!("Reachability probe received shutdown signal");
                    break;
                }
                reachable = probe.probe_once() => reachable,
            };

            if last != Some(reachable) {
                if reachable {
                    info!(target_addr = %probe.config().target, "Collector reachable");
                } else {
                    warn!(target_addr = %probe.config().target, "Collector unreachable");
                }
                last = Some(reachable);
                observer.report(reachable);
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Reachability probe received shutdown signal");
                    break;
                }
                _ = sleep(interval) => {}
            }
        }

        debug!("Reachability probe task stopped");
    })
}
