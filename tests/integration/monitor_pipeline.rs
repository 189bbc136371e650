//! Integration tests for the full actor pipeline
//!
//! These tests verify that actors work correctly together:
//! - Beats → MonitorActor → queries
//! - MonitorActor timeout evaluation → AlertActor → webhook
//! - Graceful shutdown of the whole system

use std::sync::Arc;
use std::time::Duration;

use pulsewatch::{
    State, Timeout,
    actors::messages::UpsertService,
    storage::MemoryBackend,
};
use serde_json::Value;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_beat_is_visible_through_queries() {
    let backend = Arc::new(MemoryBackend::new());
    let (monitor, alerts, _alert_tx) =
        spawn_hub(backend.clone(), vec![view_config("critical", "^db-")]).await;
    let monitor = &monitor;

    monitor.beat("db-backup").unwrap();
    monitor.beat("web-frontend").unwrap();

    let services = wait_for(Duration::from_secs(2), || async move {
        let services = monitor.get_services("critical").await.unwrap();
        (!services.is_empty()).then_some(services)
    })
    .await
    .expect("beat was never applied");
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].name, "db-backup");
    assert_eq!(services[0].state, State::Ok);

    let views = monitor.get_views().await.unwrap();
    let names = views.iter().map(|v| v.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["all", "critical"]);

    assert!(backend.stored_service("db-backup").await.is_some());

    monitor.shutdown().await;
    alerts.shutdown().await;
}

#[tokio::test]
async fn test_missed_beat_alerts_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/critical"))
        .and(header("X-Pulsewatch", "1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let backend = Arc::new(MemoryBackend::new());
    let (monitor, alerts, _alert_tx) = spawn_hub(
        backend,
        vec![webhook_view(
            "critical",
            "^db-",
            format!("{}/critical", server.uri()),
        )],
    )
    .await;
    let (monitor, alerts, server) = (&monitor, &alerts, &server);

    monitor
        .upsert(
            UpsertService::beat("db-backup").with_timeouts(Some(Timeout::from_secs(1)), None),
        )
        .unwrap();

    // the 1s tick picks the missed beat up within a couple of seconds
    let requests = wait_for(Duration::from_secs(5), || async move {
        let requests = server.received_requests().await.unwrap_or_default();
        (!requests.is_empty()).then_some(requests)
    })
    .await
    .expect("no webhook delivered");

    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["name"], "critical");
    assert_eq!(body["from_state"], "OK");
    assert_eq!(body["to_state"], "WARNING");
    assert_eq!(body["incident_number"], 1);

    let service = monitor.get_service("db-backup").await.unwrap().unwrap();
    assert_eq!(service.state, State::Warning);

    let stats = wait_for(Duration::from_secs(2), || async move {
        alerts.get_stats().await.filter(|s| s.delivered >= 1)
    })
    .await
    .unwrap();
    assert_eq!(stats.failed, 0);

    let monitor_stats = monitor.get_stats().await.unwrap();
    assert!(monitor_stats.alerts_published >= 1);
    assert!(monitor_stats.ticks >= 1);

    monitor.shutdown().await;
    alerts.shutdown().await;
}

#[tokio::test]
async fn test_delete_recovers_view() {
    let backend = Arc::new(MemoryBackend::new());
    let (monitor, alerts, alert_tx) =
        spawn_hub(backend.clone(), vec![view_config("critical", "^db-")]).await;
    let mut events = alert_tx.subscribe();
    let monitor = &monitor;

    monitor
        .upsert(
            UpsertService::beat("db-backup").with_timeouts(Some(Timeout::from_secs(1)), None),
        )
        .unwrap();

    let failing = wait_for(Duration::from_secs(5), || async move {
        monitor
            .get_view("critical")
            .await
            .unwrap()
            .filter(|v| v.state == State::Warning)
    })
    .await
    .expect("view never went to warning");
    assert_eq!(failing.incident_nbr, 1);

    monitor.delete_service("db-backup").await.unwrap();
    let recovered = wait_for(Duration::from_secs(2), || async move {
        monitor
            .get_view("critical")
            .await
            .unwrap()
            .filter(|v| v.state == State::Ok)
    })
    .await
    .expect("view never recovered");
    assert_eq!(recovered.incident_nbr, 1);
    assert_eq!(backend.stored_service("db-backup").await, None);

    // warning and recovery for both the all and the critical view
    let mut transitions = vec![];
    while let Ok(event) = events.try_recv() {
        transitions.push((event.view.name, event.current));
    }
    assert!(transitions.contains(&("critical".to_string(), State::Warning)));
    assert!(transitions.contains(&("critical".to_string(), State::Ok)));

    monitor.shutdown().await;
    alerts.shutdown().await;
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let backend = Arc::new(MemoryBackend::new());
    let (monitor, alerts, _alert_tx) = spawn_hub(backend, vec![]).await;
    let monitor = &monitor;

    monitor.shutdown().await;
    alerts.shutdown().await;

    let gone = wait_for(Duration::from_secs(1), || async move {
        monitor.get_stats().await.is_err().then_some(())
    })
    .await;
    assert!(gone.is_some());
    assert!(alerts.get_stats().await.is_none());
}
