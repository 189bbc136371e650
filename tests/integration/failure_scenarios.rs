//! Integration tests for failure scenarios
//!
//! These tests verify that:
//! - Storage outages never lose in-memory state or stop evaluation
//! - Broken stored views are dropped on load
//! - Failing alert targets do not affect monitoring
//! - A lagging alert subscriber only loses events

use std::sync::Arc;
use std::time::Duration;

use pulsewatch::{
    ServiceSnapshot, State, Timeout, ViewSnapshot,
    actors::messages::UpsertService,
    monitors::StateEngine,
    storage::{MemoryBackend, StorageBackend},
};
use tokio::sync::broadcast;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_storage_outage_keeps_memory_state() {
    let (mut engine, backend, mut alerts) = engine_with_views(&[("critical", "^db-")]).await;

    backend.set_unavailable(true);

    engine
        .upsert_service(
            UpsertService::beat("db-backup").with_timeouts(Some(Timeout::from_secs(60)), None),
            t(0),
        )
        .await;
    engine.tick(t(61)).await;

    // evaluation and alerting carry on without the backend
    assert_eq!(engine.service("db-backup").unwrap().state, State::Warning);
    assert_eq!(engine.view("critical").unwrap().state, State::Warning);
    assert!(alerts.try_recv().is_ok());
    assert!(engine.stats().storage_errors > 0);

    // the next write after recovery persists the current snapshot
    backend.set_unavailable(false);
    engine
        .upsert_service(UpsertService::beat("db-backup"), t(62))
        .await;
    let stored = backend.stored_service("db-backup").await.unwrap();
    assert_eq!(stored.state, State::Ok);
    assert_eq!(stored.incident_nbr, 1);
}

#[tokio::test]
async fn test_unavailable_backend_at_startup() {
    let backend = Arc::new(MemoryBackend::new());
    backend.set_unavailable(true);

    let (alert_tx, _alert_rx) = broadcast::channel(16);
    let mut engine = StateEngine::new(backend.clone(), alert_tx, 10);
    assert!(engine.reload().await.is_err());

    // the built-in view is always there
    assert_eq!(engine.views().len(), 1);
    engine
        .upsert_service(UpsertService::beat("cron"), t(0))
        .await;
    assert!(engine.service("cron").is_some());
}

#[tokio::test]
async fn test_broken_stored_records() {
    let mut history_overflow = ServiceSnapshot::new("cron");
    history_overflow.state = State::Ok;
    history_overflow.last_beat = Some(t(100));
    history_overflow.previous_beats = (0..50).map(t).collect();

    let backend = Arc::new(MemoryBackend::with_records(
        vec![history_overflow],
        vec![
            ViewSnapshot::new("broken", "[unclosed"),
            ViewSnapshot::new("cron-jobs", "^cron"),
        ],
    ));
    let (alert_tx, _alert_rx) = broadcast::channel(16);
    let mut engine = StateEngine::new(backend.clone(), alert_tx, 10);
    engine.reload().await.unwrap();

    assert_eq!(engine.view("broken"), None);
    assert!(engine.view("cron-jobs").is_some());

    let cron = engine.service("cron").unwrap();
    assert!(cron.previous_beats.is_empty());
    assert_eq!(cron.last_beat, Some(t(100)));

    // the record in the backend is left for the next write to fix
    assert_eq!(backend.stored_view("broken").await.unwrap().pattern, "[unclosed");
}

#[tokio::test]
async fn test_failing_webhook_does_not_block_monitoring() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    let (monitor, alerts, _alert_tx) = spawn_hub(
        backend,
        vec![webhook_view("all", "", server.uri())],
    )
    .await;
    let (monitor, alerts) = (&monitor, &alerts);

    monitor
        .upsert(
            UpsertService::beat("db-backup").with_timeouts(Some(Timeout::from_secs(1)), None),
        )
        .unwrap();

    let stats = wait_for(Duration::from_secs(5), || async move {
        alerts.get_stats().await.filter(|s| s.failed >= 1)
    })
    .await
    .expect("delivery was never attempted");
    assert_eq!(stats.delivered, 0);

    // the monitor keeps answering
    monitor.beat("db-backup").unwrap();
    let stats = monitor.get_stats().await.unwrap();
    assert!(stats.beats >= 1);

    monitor.shutdown().await;
    alerts.shutdown().await;
}

#[tokio::test]
async fn test_lagging_subscriber_loses_events_only() {
    // a tiny channel that nobody drains
    let (alert_tx, mut slow) = broadcast::channel(1);
    let backend = Arc::new(MemoryBackend::new());
    let mut engine = StateEngine::new(backend, alert_tx, 10);
    engine.reload().await.unwrap();

    for (i, name) in ["a", "b", "c"].into_iter().enumerate() {
        engine
            .upsert_service(
                UpsertService::beat(name).with_timeouts(Some(Timeout::from_secs(10)), None),
                t(i as i64),
            )
            .await;
    }
    engine.tick(t(11)).await;
    engine.upsert_service(UpsertService::beat("a"), t(12)).await;
    engine.upsert_service(UpsertService::beat("b"), t(12)).await;
    engine.upsert_service(UpsertService::beat("c"), t(12)).await;

    assert_eq!(engine.view("all").unwrap().state, State::Ok);
    assert!(matches!(
        slow.try_recv(),
        Err(broadcast::error::TryRecvError::Lagged(_))
    ));
}
