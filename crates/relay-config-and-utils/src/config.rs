//! Configuration management for the relay.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Collector endpoint that accepts one event per POST.
pub const DEFAULT_ENDPOINT_URL: &str = "https://dms.lat/api/postNewInfo";

/// Upper bound for a single delivery attempt.
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Key of the persisted pending queue in the key-value store.
pub const DEFAULT_STORAGE_KEY: &str = "@offline_reports";

/// Seconds between two reachability probes.
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 5;

/// Connect timeout of a single reachability probe.
pub const DEFAULT_PROBE_CONNECT_TIMEOUT_MS: u64 = 2_000;

const ENV_LOG_LEVEL: &str = "TELEMETRY_RELAY_LOG_LEVEL";
const ENV_ENDPOINT_URL: &str = "TELEMETRY_RELAY_ENDPOINT_URL";

/// Main relay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Collector URL receiving event POSTs.
    pub endpoint_url: String,
    /// Per-attempt delivery timeout in seconds.
    pub delivery_timeout_secs: u64,
    /// Name of the key-value entry holding the pending queue.
    pub storage_key: String,
    /// Interval between reachability probes in seconds.
    pub probe_interval_secs: u64,
    /// TCP connect timeout for reachability probes in milliseconds.
    pub probe_connect_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            delivery_timeout_secs: DEFAULT_DELIVERY_TIMEOUT_SECS,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            probe_connect_timeout_ms: DEFAULT_PROBE_CONNECT_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults.
    ///
    /// Environment variables take precedence over the file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_env_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an environment lookup. Blank values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(level) = non_empty(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(url) = non_empty(ENV_ENDPOINT_URL) {
            self.endpoint_url = url;
        }
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        let url = self.endpoint_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::Config(format!(
                "endpoint_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.delivery_timeout_secs == 0 {
            return Err(CoreError::Config(
                "delivery_timeout_secs must be positive".to_string(),
            ));
        }
        if self.probe_interval_secs == 0 {
            return Err(CoreError::Config(
                "probe_interval_secs must be positive".to_string(),
            ));
        }
        if self.storage_key.trim().is_empty() {
            return Err(CoreError::Config("storage_key must not be empty".to_string()));
        }
        Ok(())
    }

    /// Get the collector endpoint as a parsed URL.
    pub fn endpoint_url(&self) -> CoreResult<Url> {
        Url::parse(&self.endpoint_url).map_err(CoreError::from)
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn probe_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_connect_timeout_ms)
    }
}
