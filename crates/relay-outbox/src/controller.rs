//! Flush controller: the single owner of the pending queue.
//!
//! A spawned worker task holds the in-memory queue and the store. Every
//! mutation (enqueue, removal after delivery) happens on that task, so
//! snapshot replacements can never interleave. Callers talk to it through
//! [`FlushController`] handles.
//!
//! Drain passes are started by a [`Notify`] trigger. The worker only waits on
//! the trigger between passes, and `Notify` keeps at most one permit, so any
//! number of triggers fired during a pass collapse into exactly one
//! follow-up pass.

use crate::{deliver_with_timeout, DeliveryClient, DeliveryError, OutboxError, OutboxResult};
use crate::sender::DEFAULT_DELIVERY_TIMEOUT;
use relay_queue_store::{QueueStore, StoreResult};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use telemetry_event_types::{EventRecord, QueueItem};
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tracing::{debug, info, warn};

const DEFAULT_COMMAND_CAPACITY: usize = 256;

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct FlushConfig {
    /// Upper bound on one delivery attempt.
    pub delivery_timeout: Duration,
    /// Buffered commands before callers wait.
    pub command_capacity: usize,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }
}

/// Externally visible queue state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutboxStatus {
    pub pending: usize,
    pub draining: bool,
    pub reachable: bool,
    /// Why the most recent pass halted, or the most recent failed enqueue.
    /// Cleared by a pass that runs to completion.
    pub last_error: Option<String>,
    pub passes_completed: u64,
    pub delivered_total: u64,
}

/// Why a drain pass stopped before the end of its snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum PassHalt {
    Delivery(String),
    Persistence(String),
}

impl fmt::Display for PassHalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivery(message) => write!(f, "delivery: {}", message),
            Self::Persistence(message) => write!(f, "persistence: {}", message),
        }
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub delivered: usize,
    pub remaining: usize,
    pub halted_by: Option<PassHalt>,
}

impl DrainReport {
    pub fn is_complete(&self) -> bool {
        self.halted_by.is_none()
    }
}

enum Command {
    Enqueue {
        record: EventRecord,
        reply: oneshot::Sender<StoreResult<QueueItem>>,
    },
    DrainNow {
        reply: oneshot::Sender<DrainReport>,
    },
    Pending {
        reply: oneshot::Sender<Vec<QueueItem>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct Shared {
    trigger: Notify,
    reachable: AtomicBool,
    status: watch::Sender<OutboxStatus>,
}

impl Shared {
    fn set_reachable(&self, reachable: bool) {
        let previous = self.reachable.swap(reachable, Ordering::SeqCst);
        self.status.send_modify(|status| status.reachable = reachable);

        if reachable {
            if previous {
                debug!("Reachability re-reported, scheduling drain");
            } else {
                info!("Connectivity available, scheduling drain");
            }
            self.trigger.notify_one();
        } else if previous {
            info!("Connectivity lost");
        }
    }
}

/// Handle to the queue-owning worker. Cheap to clone.
#[derive(Clone)]
pub struct FlushController {
    commands: mpsc::Sender<Command>,
    shared: Arc<Shared>,
}

impl FlushController {
    /// Load the persisted queue and start the worker. Must be called from
    /// within a Tokio runtime.
    ///
    /// The controller starts out unreachable; nothing is delivered until
    /// [`set_reachable`](Self::set_reachable) reports `true` or
    /// [`drain_now`](Self::drain_now) is called.
    pub fn spawn(
        store: Arc<dyn QueueStore>,
        client: Arc<dyn DeliveryClient>,
        config: FlushConfig,
    ) -> Self {
        let items = store.load();
        let (status, _) = watch::channel(OutboxStatus {
            pending: items.len(),
            ..OutboxStatus::default()
        });
        let shared = Arc::new(Shared {
            trigger: Notify::new(),
            reachable: AtomicBool::new(false),
            status,
        });
        let (commands, receiver) = mpsc::channel(config.command_capacity.max(1));

        info!(pending = items.len(), "Flush controller starting");

        let worker = Worker {
            store,
            client,
            delivery_timeout: config.delivery_timeout,
            items,
            shared: shared.clone(),
            commands: receiver,
            commands_open: true,
            deferred: VecDeque::new(),
            stop_requests: Vec::new(),
        };
        tokio::spawn(worker.run());

        Self { commands, shared }
    }

    /// Append `record` to the queue under a fresh id and persist the new
    /// snapshot. Nothing is added if the write fails.
    pub async fn enqueue(&self, record: EventRecord) -> OutboxResult<QueueItem> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Enqueue { record, reply }).await?;
        let saved = response.await.map_err(|_| OutboxError::WorkerStopped)?;
        Ok(saved?)
    }

    /// Run one pass now, whatever the reachability state. Waits behind a
    /// pass that is already running.
    pub async fn drain_now(&self) -> OutboxResult<DrainReport> {
        let (reply, response) = oneshot::channel();
        self.send(Command::DrainNow { reply }).await?;
        response.await.map_err(|_| OutboxError::WorkerStopped)
    }

    /// Current in-memory queue, in delivery order.
    pub async fn pending_items(&self) -> OutboxResult<Vec<QueueItem>> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Pending { reply }).await?;
        response.await.map_err(|_| OutboxError::WorkerStopped)
    }

    /// Record a reachability report. `true` schedules a drain pass.
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.set_reachable(reachable);
    }

    /// Callback suitable for a connectivity subscription.
    pub fn reachability_handler(&self) -> impl Fn(bool) + Send + Sync + 'static {
        let shared = self.shared.clone();
        move |reachable| shared.set_reachable(reachable)
    }

    pub fn status(&self) -> OutboxStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<OutboxStatus> {
        self.shared.status.subscribe()
    }

    /// Stop the worker once the pass in progress (if any) has finished.
    pub async fn shutdown(&self) -> OutboxResult<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Shutdown { reply }).await?;
        response.await.map_err(|_| OutboxError::WorkerStopped)
    }

    async fn send(&self, command: Command) -> OutboxResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| OutboxError::WorkerStopped)
    }
}

struct Worker {
    store: Arc<dyn QueueStore>,
    client: Arc<dyn DeliveryClient>,
    delivery_timeout: Duration,
    items: Vec<QueueItem>,
    shared: Arc<Shared>,
    commands: mpsc::Receiver<Command>,
    commands_open: bool,
    // Explicit drains requested while a pass was running.
    deferred: VecDeque<Command>,
    stop_requests: Vec<oneshot::Sender<()>>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            while let Some(command) = self.deferred.pop_front() {
                self.handle(command).await;
            }
            if !self.stop_requests.is_empty() || !self.commands_open {
                break;
            }

            let shared = self.shared.clone();
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => self.commands_open = false,
                },
                _ = shared.trigger.notified() => {
                    if shared.reachable.load(Ordering::SeqCst) {
                        self.drain_pass().await;
                    } else {
                        debug!("Drain trigger ignored while unreachable");
                    }
                }
            }
        }

        info!(pending = self.items.len(), "Flush controller stopped");
        for reply in self.stop_requests.drain(..) {
            let _ = reply.send(());
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::DrainNow { reply } => {
                let report = self.drain_pass().await;
                let _ = reply.send(report);
            }
            other => self.apply(other),
        }
    }

    /// Commands that are safe to serve between two delivery attempts.
    fn apply(&mut self, command: Command) {
        match command {
            Command::Enqueue { record, reply } => {
                let _ = reply.send(self.enqueue(record));
            }
            Command::Pending { reply } => {
                let _ = reply.send(self.items.clone());
            }
            Command::Shutdown { reply } => self.stop_requests.push(reply),
            drain @ Command::DrainNow { .. } => self.deferred.push_back(drain),
        }
    }

    fn enqueue(&mut self, record: EventRecord) -> StoreResult<QueueItem> {
        let item = QueueItem::new(record);
        let mut next = self.items.clone();
        next.push(item.clone());

        if let Err(e) = self.store.save(&next) {
            warn!(item_id = %item.id(), error = %e, "Failed to persist queued event");
            let message = PassHalt::Persistence(e.to_string()).to_string();
            self.shared
                .status
                .send_modify(|status| status.last_error = Some(message));
            return Err(e);
        }

        self.items = next;
        let pending = self.items.len();
        self.shared.status.send_modify(|status| status.pending = pending);
        info!(item_id = %item.id(), pending, "Event queued for retry");

        if self.shared.reachable.load(Ordering::SeqCst) {
            self.shared.trigger.notify_one();
        }
        Ok(item)
    }

    /// Deliver a snapshot of the queue front to back. Stops at the first
    /// failed delivery or failed write, so only a prefix of the snapshot is
    /// ever removed.
    async fn drain_pass(&mut self) -> DrainReport {
        let snapshot = self.items.clone();
        let mut report = DrainReport::default();

        self.shared.status.send_modify(|status| status.draining = true);
        debug!(pending = snapshot.len(), "Drain pass started");

        for item in snapshot {
            report.attempted += 1;

            if let Err(e) = self.attempt(&item).await {
                warn!(item_id = %item.id(), error = %e, "Delivery failed, halting drain pass");
                report.halted_by = Some(PassHalt::Delivery(e.to_string()));
                break;
            }

            if let Err(e) = self.remove(item.id()) {
                warn!(item_id = %item.id(), error = %e, "Failed to persist removal, halting drain pass");
                report.halted_by = Some(PassHalt::Persistence(e.to_string()));
                break;
            }
            report.delivered += 1;
        }

        report.remaining = self.items.len();
        let last_error = report.halted_by.as_ref().map(ToString::to_string);
        let remaining = report.remaining;
        self.shared.status.send_modify(|status| {
            status.draining = false;
            status.pending = remaining;
            status.passes_completed += 1;
            status.last_error = last_error;
        });

        if report.attempted > 0 {
            info!(
                attempted = report.attempted,
                delivered = report.delivered,
                remaining = report.remaining,
                "Drain pass finished"
            );
        }
        report
    }

    /// One bounded delivery attempt. Enqueue and query commands are still
    /// served while it is in flight.
    async fn attempt(&mut self, item: &QueueItem) -> Result<(), DeliveryError> {
        let client = self.client.clone();
        let payload = item.payload().clone();
        let limit = self.delivery_timeout;
        let delivery = async move { deliver_with_timeout(&*client, &payload, limit).await };
        tokio::pin!(delivery);

        loop {
            tokio::select! {
                outcome = &mut delivery => return outcome,
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(command) => self.apply(command),
                    None => self.commands_open = false,
                },
            }
        }
    }

    fn remove(&mut self, id: &str) -> StoreResult<()> {
        let next: Vec<QueueItem> = self
            .items
            .iter()
            .filter(|item| item.id() != id)
            .cloned()
            .collect();
        self.store.save(&next)?;
        self.items = next;

        let pending = self.items.len();
        self.shared.status.send_modify(|status| {
            status.pending = pending;
            status.delivered_total += 1;
        });
        debug!(item_id = %id, pending, "Delivered queued event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use relay_queue_store::{DurableQueueStore, MemoryKeyValueStore, StorageKeys};
    use telemetry_event_types::EventCode;

    struct AlwaysOk;

    #[async_trait]
    impl DeliveryClient for AlwaysOk {
        async fn deliver(&self, _payload: &EventRecord) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn record(tag: &str) -> EventRecord {
        EventRecord::new(
            EventCode::new(tag).unwrap(),
            Utc.timestamp_millis_opt(1_705_314_600_000).unwrap(),
        )
    }

    fn store() -> Arc<DurableQueueStore<MemoryKeyValueStore>> {
        Arc::new(DurableQueueStore::new(
            MemoryKeyValueStore::new(),
            StorageKeys::PENDING_REPORTS,
        ))
    }

    #[test]
    fn pass_halt_display_and_json() {
        let halt = PassHalt::Delivery("timed out".to_string());
        assert_eq!(halt.to_string(), "delivery: timed out");
        assert_eq!(
            serde_json::to_string(&halt).unwrap(),
            r#"{"kind":"delivery","message":"timed out"}"#
        );
    }

    #[test]
    fn empty_report_is_complete() {
        let report = DrainReport::default();
        assert!(report.is_complete());
        assert_eq!(report.attempted, 0);
    }

    #[tokio::test]
    async fn spawn_loads_persisted_queue() {
        let store = store();
        store
            .save(&[QueueItem::with_id("a", record("B")), QueueItem::with_id("b", record("R"))])
            .unwrap();

        let controller = FlushController::spawn(store, Arc::new(AlwaysOk), FlushConfig::default());

        assert_eq!(controller.status().pending, 2);
        let ids: Vec<String> = controller
            .pending_items()
            .await
            .unwrap()
            .iter()
            .map(|item| item.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn enqueue_while_unreachable_only_persists() {
        let store = store();
        let controller =
            FlushController::spawn(store.clone(), Arc::new(AlwaysOk), FlushConfig::default());

        let item = controller.enqueue(record("G")).await.unwrap();

        assert_eq!(store.load(), vec![item]);
        let status = controller.status();
        assert_eq!(status.pending, 1);
        assert_eq!(status.passes_completed, 0);
    }

    #[tokio::test]
    async fn drain_now_ignores_reachability() {
        let store = store();
        let controller =
            FlushController::spawn(store.clone(), Arc::new(AlwaysOk), FlushConfig::default());
        controller.enqueue(record("B")).await.unwrap();

        let report = controller.drain_now().await.unwrap();

        assert_eq!(
            report,
            DrainReport {
                attempted: 1,
                delivered: 1,
                remaining: 0,
                halted_by: None
            }
        );
        assert!(store.load().is_empty());
        assert_eq!(controller.status().delivered_total, 1);
    }

    #[tokio::test]
    async fn handles_fail_after_shutdown() {
        let controller = FlushController::spawn(store(), Arc::new(AlwaysOk), FlushConfig::default());

        controller.shutdown().await.unwrap();

        assert!(matches!(
            controller.enqueue(record("B")).await,
            Err(OutboxError::WorkerStopped)
        ));
    }
}
