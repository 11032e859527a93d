#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use relay_outbox::{DeliveryClient, DeliveryError, OutboxStatus};
use relay_queue_store::{
    DurableQueueStore, MemoryKeyValueStore, QueueStore, StorageKeys, StoreError, StoreResult,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use telemetry_event_types::{EventCode, EventRecord, QueueItem};
use tokio::sync::{watch, Semaphore};

pub fn record(tag: &str, millis: i64) -> EventRecord {
    EventRecord::new(
        EventCode::new(tag).unwrap(),
        Utc.timestamp_millis_opt(millis).unwrap(),
    )
}

pub fn codes(items: &[QueueItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.payload().event_code().to_string())
        .collect()
}

pub fn memory_store() -> Arc<DurableQueueStore<MemoryKeyValueStore>> {
    Arc::new(DurableQueueStore::new(
        MemoryKeyValueStore::new(),
        StorageKeys::PENDING_REPORTS,
    ))
}

pub async fn wait_for_status(
    status: &mut watch::Receiver<OutboxStatus>,
    predicate: impl FnMut(&OutboxStatus) -> bool,
) -> OutboxStatus {
    tokio::time::timeout(Duration::from_secs(5), status.wait_for(predicate))
        .await
        .expect("status condition not reached")
        .expect("controller dropped")
        .clone()
}

/// Succeeds unless the event code is marked as failing. Records every attempt.
#[derive(Default)]
pub struct ScriptedClient {
    failing: Mutex<HashSet<String>>,
    attempts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, code: &str) {
        self.failing.lock().insert(code.to_string());
    }

    pub fn recover(&self, code: &str) {
        self.failing.lock().remove(code);
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl DeliveryClient for ScriptedClient {
    async fn deliver(&self, payload: &EventRecord) -> Result<(), DeliveryError> {
        let code = payload.event_code().to_string();
        self.attempts.lock().push(code.clone());
        if self.failing.lock().contains(&code) {
            Err(DeliveryError::Unavailable(format!("{} rejected", code)))
        } else {
            Ok(())
        }
    }
}

/// Blocks every delivery until a permit is released, tracking how many
/// deliveries are in flight at once.
pub struct GatedClient {
    gate: Semaphore,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: AtomicUsize,
}

impl GatedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
        })
    }

    pub fn release(&self, deliveries: usize) {
        self.gate.add_permits(deliveries);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub async fn wait_started(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.started() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("delivery never started");
    }
}

#[async_trait]
impl DeliveryClient for GatedClient {
    async fn deliver(&self, _payload: &EventRecord) -> Result<(), DeliveryError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.started.fetch_add(1, Ordering::SeqCst);

        let permit = self.gate.acquire().await;
        if let Ok(permit) = permit {
            permit.forget();
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Memory-backed store whose writes can be made to fail.
pub struct FlakyStore {
    inner: DurableQueueStore<MemoryKeyValueStore>,
    fail_saves: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: DurableQueueStore::new(MemoryKeyValueStore::new(), StorageKeys::PENDING_REPORTS),
            fail_saves: AtomicBool::new(false),
        })
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }
}

impl QueueStore for FlakyStore {
    fn load(&self) -> Vec<QueueItem> {
        self.inner.load()
    }

    fn save(&self, items: &[QueueItem]) -> StoreResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.save(items)
    }
}
