mod common;

use async_trait::async_trait;
use common::*;
use connectivity_observer::ConnectivityObserver;
use relay_outbox::{
    DeliveryClient, DeliveryError, DrainReport, FlushConfig, FlushController, OutboxError,
    PassHalt,
};
use relay_queue_store::{DurableQueueStore, FileKeyValueStore, QueueStore, StorageKeys};
use std::sync::Arc;
use std::time::Duration;
use telemetry_event_types::{EventRecord, QueueItem};
use tempfile::tempdir;

#[tokio::test]
async fn pass_halts_at_first_failure_and_keeps_the_suffix() {
    let store = memory_store();
    let client = ScriptedClient::new();
    let controller = FlushController::spawn(store.clone(), client.clone(), FlushConfig::default());

    for (i, code) in ["A", "B", "C"].into_iter().enumerate() {
        controller.enqueue(record(code, 1_000 + i as i64)).await.unwrap();
    }
    client.fail("B");

    let report = controller.drain_now().await.unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.remaining, 2);
    assert!(matches!(report.halted_by, Some(PassHalt::Delivery(_))));
    assert_eq!(client.attempts(), vec!["A", "B"]);
    assert_eq!(codes(&store.load()), vec!["B", "C"]);

    client.recover("B");
    let report = controller.drain_now().await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.delivered, 2);
    assert_eq!(client.attempts(), vec!["A", "B", "B", "C"]);
    assert!(store.load().is_empty());
}

#[tokio::test]
async fn nothing_is_delivered_until_reachable() {
    let store = memory_store();
    store
        .save(&[QueueItem::with_id("a", record("A", 1_000))])
        .unwrap();
    let client = ScriptedClient::new();
    let controller = FlushController::spawn(store.clone(), client.clone(), FlushConfig::default());
    let mut status = controller.subscribe_status();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(client.attempts().is_empty());
    assert_eq!(controller.status().passes_completed, 0);

    controller.set_reachable(true);
    wait_for_status(&mut status, |s| s.passes_completed >= 1 && s.pending == 0).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.attempts(), vec!["A"]);
    assert_eq!(controller.status().passes_completed, 1);
    assert!(store.load().is_empty());
}

#[tokio::test]
async fn observer_transition_drives_drain() {
    let store = memory_store();
    let client = ScriptedClient::new();
    let controller = FlushController::spawn(store.clone(), client.clone(), FlushConfig::default());
    let mut status = controller.subscribe_status();

    let observer = ConnectivityObserver::with_state(false);
    observer.subscribe(controller.reachability_handler());

    controller.enqueue(record("A", 1_000)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(client.attempts().is_empty());
    assert!(!controller.status().reachable);

    observer.report(true);
    let settled = wait_for_status(&mut status, |s| s.delivered_total == 1).await;

    assert!(settled.reachable);
    assert_eq!(client.attempts(), vec!["A"]);
    assert!(store.load().is_empty());
}

#[tokio::test]
async fn triggers_during_a_pass_coalesce_into_one_follow_up() {
    let store = memory_store();
    let client = GatedClient::new();
    let controller = FlushController::spawn(store.clone(), client.clone(), FlushConfig::default());
    let mut status = controller.subscribe_status();

    controller.enqueue(record("A", 1_000)).await.unwrap();
    controller.enqueue(record("B", 2_000)).await.unwrap();

    controller.set_reachable(true);
    client.wait_started(1).await;
    assert!(controller.status().draining);

    controller.set_reachable(true);
    controller.set_reachable(true);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(client.started(), 1);

    client.release(10);
    wait_for_status(&mut status, |s| s.passes_completed >= 2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let settled = controller.status();
    assert_eq!(settled.passes_completed, 2);
    assert_eq!(settled.delivered_total, 2);
    assert!(!settled.draining);
    assert_eq!(client.started(), 2);
    assert_eq!(client.max_in_flight(), 1);
    assert!(store.load().is_empty());
}

#[tokio::test]
async fn enqueue_while_reachable_starts_a_pass() {
    let store = memory_store();
    let client = ScriptedClient::new();
    let controller = FlushController::spawn(store.clone(), client.clone(), FlushConfig::default());
    let mut status = controller.subscribe_status();

    controller.set_reachable(true);
    wait_for_status(&mut status, |s| s.passes_completed >= 1).await;

    controller.enqueue(record("A", 1_000)).await.unwrap();
    wait_for_status(&mut status, |s| s.delivered_total == 1).await;

    assert_eq!(client.attempts(), vec!["A"]);
    assert!(store.load().is_empty());
}

#[tokio::test]
async fn enqueue_is_served_while_a_delivery_is_in_flight() {
    let store = memory_store();
    let client = GatedClient::new();
    let controller = FlushController::spawn(store.clone(), client.clone(), FlushConfig::default());
    let mut status = controller.subscribe_status();

    controller.enqueue(record("A", 1_000)).await.unwrap();
    controller.set_reachable(true);
    client.wait_started(1).await;

    tokio::time::timeout(Duration::from_secs(1), controller.enqueue(record("B", 2_000)))
        .await
        .expect("enqueue blocked behind the delivery")
        .unwrap();
    assert_eq!(codes(&controller.pending_items().await.unwrap()), vec!["A", "B"]);
    assert_eq!(codes(&store.load()), vec!["A", "B"]);

    client.release(10);
    wait_for_status(&mut status, |s| s.delivered_total == 2 && !s.draining).await;

    assert_eq!(client.started(), 2);
    assert!(store.load().is_empty());
}

#[tokio::test]
async fn queue_survives_restart() {
    let dir = tempdir().unwrap();
    let open = || {
        Arc::new(DurableQueueStore::new(
            FileKeyValueStore::open(dir.path()).unwrap(),
            StorageKeys::PENDING_REPORTS,
        ))
    };

    let first = FlushController::spawn(open(), ScriptedClient::new(), FlushConfig::default());
    let mut queued = Vec::new();
    for (i, code) in ["B", "R", "G"].into_iter().enumerate() {
        queued.push(first.enqueue(record(code, 1_000 + i as i64)).await.unwrap());
    }
    first.shutdown().await.unwrap();

    let second = FlushController::spawn(open(), ScriptedClient::new(), FlushConfig::default());

    assert_eq!(second.pending_items().await.unwrap(), queued);
    assert_eq!(second.status().pending, 3);
}

#[tokio::test]
async fn failed_removal_is_not_committed() {
    let store = FlakyStore::new();
    let client = ScriptedClient::new();
    let controller = FlushController::spawn(store.clone(), client.clone(), FlushConfig::default());

    let item = controller.enqueue(record("A", 1_000)).await.unwrap();
    store.set_failing(true);

    let report = controller.drain_now().await.unwrap();

    assert_eq!(report.attempted, 1);
    assert_eq!(report.delivered, 0);
    assert_eq!(report.remaining, 1);
    assert!(matches!(report.halted_by, Some(PassHalt::Persistence(_))));
    assert_eq!(controller.pending_items().await.unwrap(), vec![item.clone()]);
    assert_eq!(store.load(), vec![item]);
    let last_error = controller.status().last_error.unwrap();
    assert!(last_error.starts_with("persistence"), "{last_error}");

    store.set_failing(false);
    let report = controller.drain_now().await.unwrap();

    assert_eq!(report.delivered, 1);
    assert_eq!(client.attempts(), vec!["A", "A"]);
    assert!(store.load().is_empty());
    assert_eq!(controller.status().last_error, None);
}

#[tokio::test]
async fn failed_enqueue_is_not_committed() {
    let store = FlakyStore::new();
    let controller = FlushController::spawn(store.clone(), ScriptedClient::new(), FlushConfig::default());
    store.set_failing(true);

    let result = controller.enqueue(record("A", 1_000)).await;

    assert!(matches!(result, Err(OutboxError::Persistence(_))));
    assert!(controller.pending_items().await.unwrap().is_empty());
    assert!(store.load().is_empty());
    assert_eq!(controller.status().pending, 0);
}

struct Stalled;

#[async_trait]
impl DeliveryClient for Stalled {
    async fn deliver(&self, _payload: &EventRecord) -> Result<(), DeliveryError> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test]
async fn stalled_delivery_is_bounded_by_the_timeout() {
    let store = memory_store();
    let config = FlushConfig {
        delivery_timeout: Duration::from_millis(50),
        ..FlushConfig::default()
    };
    let controller = FlushController::spawn(store.clone(), Arc::new(Stalled), config);
    controller.enqueue(record("A", 1_000)).await.unwrap();

    let report = tokio::time::timeout(Duration::from_secs(5), controller.drain_now())
        .await
        .expect("drain wedged")
        .unwrap();

    assert_eq!(
        report,
        DrainReport {
            attempted: 1,
            delivered: 0,
            remaining: 1,
            halted_by: Some(PassHalt::Delivery(
                DeliveryError::Timeout(Duration::from_millis(50)).to_string()
            )),
        }
    );
    assert_eq!(store.load().len(), 1);
}
