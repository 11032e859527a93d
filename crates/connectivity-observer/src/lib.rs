//! Network reachability for the relay.
//!
//! - [`ConnectivityObserver`]: fan-out of boolean "internet reachable"
//!   reports to any number of subscribers. A new subscriber immediately
//!   receives the last known state.
//! - [`ReachabilityProbe`]: host-side source that probes the collector with
//!   TCP connects and reports changes to an observer.

mod observer;
mod probe;

pub use observer::{ConnectivityObserver, ReachabilityHandler, SubscriptionId};
pub use probe::{
    spawn_reachability_probe, ProbeConfig, ReachabilityProbe, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_PROBE_INTERVAL,
};
