//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Beats, configuration and deletes are accepted over HTTP
//! - Services and views can be queried
//! - Invalid names and bodies are rejected
//! - Authentication middleware functions properly
//! - Alert delivery can be muted and unmuted

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pulsewatch::{
    ServiceSnapshot, State, Timeout, ViewSnapshot,
    api::{ApiConfig, ApiState, HealthResponse, ServicesResponse, ViewsResponse, spawn_api_server},
    storage::MemoryBackend,
};
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::helpers::*;

async fn spawn_test_api(auth_token: Option<&str>) -> (SocketAddr, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let (monitor, alerts, _alert_tx) = spawn_hub(
        backend.clone(),
        vec![view_config("critical", "^db-")],
    )
    .await;

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        auth_token: auth_token.map(str::to_string),
        enable_cors: true,
    };
    let addr = spawn_api_server(config, ApiState::new(monitor, alerts, backend.clone()))
        .await
        .unwrap();
    (addr, backend)
}

async fn fetch_service(
    client: &reqwest::Client,
    addr: SocketAddr,
    name: &str,
) -> Option<ServiceSnapshot> {
    let response = client
        .get(format!("http://{addr}/api/v1/services/{name}"))
        .send()
        .await
        .unwrap();
    if response.status() == StatusCode::NOT_FOUND {
        return None;
    }
    Some(response.json().await.unwrap())
}

async fn alerts_muted(client: &reqwest::Client, addr: SocketAddr) -> bool {
    let stats: Value = client
        .get(format!("http://{addr}/api/v1/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    stats["alerts"]["muted"].as_bool().unwrap()
}

#[tokio::test]
async fn test_beat_then_query() {
    let (addr, backend) = spawn_test_api(None).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/v1/services/db-backup"))
        .json(&json!({ "warning_timeout": 60, "error_timeout": "auto" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let client = &client;
    let service = wait_for(Duration::from_secs(2), || async move {
        fetch_service(client, addr, "db-backup").await
    })
    .await
    .expect("beat was never applied");
    assert_eq!(service.state, State::Ok);
    assert_eq!(service.warning_timeout, Timeout::from_secs(60));
    assert_eq!(service.error_timeout, Timeout::Auto);
    assert!(service.last_beat.is_some());
    assert!(backend.stored_service("db-backup").await.is_some());

    // a plain beat needs no body
    let response = client
        .post(format!("http://{addr}/api/v1/services/web-frontend"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let critical = wait_for(Duration::from_secs(2), || async move {
        let response: ServicesResponse = client
            .get(format!("http://{addr}/api/v1/services?view=critical"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let all: ServicesResponse = client
            .get(format!("http://{addr}/api/v1/services"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        (all.count == 2).then_some((response, all))
    })
    .await;
    let (critical, all) = critical.expect("second beat was never applied");
    assert_eq!(critical.view, "critical");
    assert_eq!(critical.count, 1);
    assert_eq!(critical.services[0].name, "db-backup");
    assert_eq!(all.view, "all");
}

#[tokio::test]
async fn test_configure_without_beat() {
    let (addr, _backend) = spawn_test_api(None).await;
    let client = reqwest::Client::new();

    let response = client
        .put(format!("http://{addr}/api/v1/services/cron"))
        .json(&json!({ "paused": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let client = &client;
    let service = wait_for(Duration::from_secs(2), || async move {
        fetch_service(client, addr, "cron").await
    })
    .await
    .unwrap();
    assert_eq!(service.state, State::Paused);
    assert!(service.paused);
    assert_eq!(service.last_beat, None);
}

#[tokio::test]
async fn test_delete_service() {
    let (addr, backend) = spawn_test_api(None).await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{addr}/api/v1/services/db-backup"))
        .send()
        .await
        .unwrap();
    let client = &client;
    wait_for(Duration::from_secs(2), || async move {
        fetch_service(client, addr, "db-backup").await
    })
    .await
    .unwrap();

    let response = client
        .delete(format!("http://{addr}/api/v1/services/db-backup"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let gone = wait_for(Duration::from_secs(2), || async move {
        fetch_service(client, addr, "db-backup")
            .await
            .is_none()
            .then_some(())
    })
    .await;
    assert!(gone.is_some());
    assert_eq!(backend.stored_service("db-backup").await, None);
}

#[tokio::test]
async fn test_invalid_requests() {
    let (addr, _backend) = spawn_test_api(None).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/v1/services/bad%20name"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("invalid service name"));

    let response = client
        .post(format!("http://{addr}/api/v1/services/db-backup"))
        .json(&json!({ "warning_timeout": 300, "error_timeout": 60 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("http://{addr}/api/v1/services/db-backup"))
        .json(&json!({ "warning_timeout": "sometimes" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .get(format!("http://{addr}/api/v1/services/unknown"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .get(format!("http://{addr}/api/v1/views/unknown"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_views_stats_and_health() {
    let (addr, _backend) = spawn_test_api(None).await;
    let client = reqwest::Client::new();

    let views: ViewsResponse = client
        .get(format!("http://{addr}/api/v1/views"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(views.count, 2);
    assert_eq!(views.views[0].name, "all");
    assert_eq!(views.views[1].name, "critical");

    let critical: ViewSnapshot = client
        .get(format!("http://{addr}/api/v1/views/critical"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(critical.pattern, "^db-");
    assert_eq!(critical.state, State::Ok);

    let stats: Value = client
        .get(format!("http://{addr}/api/v1/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["monitor"]["views"], 2);
    assert_eq!(stats["alerts"]["delivered"], 0);

    let health: HealthResponse = client
        .get(format!("http://{addr}/api/v1/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.status, "ok");
    assert!(health.storage.healthy);
}

#[tokio::test]
async fn test_degraded_health() {
    let (addr, backend) = spawn_test_api(None).await;
    backend.set_unavailable(true);

    let health: HealthResponse = reqwest::get(format!("http://{addr}/api/v1/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health.status, "degraded");
    assert!(!health.storage.healthy);
}

#[tokio::test]
async fn test_bearer_token_required() {
    let (addr, _backend) = spawn_test_api(Some("s3cret")).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/v1/services/db-backup");

    let response = client.post(&url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client.post(&url).bearer_auth("wrong").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client.post(&url).bearer_auth("s3cret").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_mute_and_unmute_alerts() {
    let (addr, _backend) = spawn_test_api(None).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/v1/alerts/mute");

    let response = client
        .post(&url)
        .json(&json!({ "duration_secs": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!alerts_muted(&client, addr).await);

    let response = client
        .post(&url)
        .json(&json!({ "duration_secs": 600 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(alerts_muted(&client, addr).await);

    let response = client.delete(&url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!alerts_muted(&client, addr).await);
}
