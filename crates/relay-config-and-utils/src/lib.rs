//! Configuration, filesystem layout, and logging setup for the telemetry relay.

mod config;
mod error;
mod instance;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_DELIVERY_TIMEOUT_SECS, DEFAULT_ENDPOINT_URL, DEFAULT_LOG_LEVEL,
    DEFAULT_PROBE_CONNECT_TIMEOUT_MS, DEFAULT_PROBE_INTERVAL_SECS, DEFAULT_STORAGE_KEY,
};
pub use error::{CoreError, CoreResult};
pub use instance::InstanceLock;
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
