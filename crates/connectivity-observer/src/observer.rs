//! Reachability fan-out.

use parking_lot::{Mutex, ReentrantMutex};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Callback invoked with every reachability report.
///
/// Runs on the reporting thread, so it should hand work off (signal a
/// task, send on a channel) rather than block.
pub type ReachabilityHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Handle returned by [`ConnectivityObserver::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    current: Option<bool>,
    next_id: u64,
    handlers: BTreeMap<u64, ReachabilityHandler>,
}

/// Broadcasts reachability reports to subscribers.
///
/// Reports are forwarded exactly as received; no debouncing. Emissions are
/// serialized, so each subscriber sees reports in the order they were made
/// and its initial emission never overtakes a later report.
#[derive(Default)]
pub struct ConnectivityObserver {
    registry: Mutex<Registry>,
    // Re-entrant so a handler may subscribe or unsubscribe while being called.
    emitting: ReentrantMutex<()>,
}

impl ConnectivityObserver {
    /// Observer with no known state yet. Subscribers get their first call
    /// on the first report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer seeded with a known state.
    pub fn with_state(reachable: bool) -> Self {
        let observer = Self::new();
        observer.registry.lock().current = Some(reachable);
        observer
    }

    /// Register `handler`. It is called right away with the current state
    /// when one is known, then on every report.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let _emitting = self.emitting.lock();

        let handler: ReachabilityHandler = Arc::new(handler);
        let (id, current) = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.handlers.insert(id, handler.clone());
            (id, registry.current)
        };

        debug!(subscription = id, current = ?current, "Reachability subscriber added");

        if let Some(reachable) = current {
            handler(reachable);
        }

        SubscriptionId(id)
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.registry.lock().handlers.remove(&id.0).is_some();
        if removed {
            debug!(subscription = id.0, "Reachability subscriber removed");
        }
        removed
    }

    /// Record a report from the reachability source and forward it to every
    /// subscriber.
    pub fn report(&self, reachable: bool) {
        let _emitting = self.emitting.lock();

        let handlers: Vec<ReachabilityHandler> = {
            let mut registry = self.registry.lock();
            registry.current = Some(reachable);
            registry.handlers.values().cloned().collect()
        };

        debug!(reachable, subscribers = handlers.len(), "Reachability reported");

        for handler in handlers {
            handler(reachable);
        }
    }

    /// Last reported state, if any.
    pub fn current(&self) -> Option<bool> {
        self.registry.lock().current
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().handlers.len()
    }
}
