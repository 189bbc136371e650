//! Integration tests for storage persistence
//!
//! These tests verify that:
//! - Service and view state survives a restart on the SQLite backend
//! - Seeding views keeps stored state and incident numbers
//! - Deleted services stay deleted

use std::sync::Arc;

use pretty_assertions::assert_eq;
use pulsewatch::{
    State, Timeout,
    actors::messages::UpsertService,
    monitors::StateEngine,
    storage::{StorageBackend, seed_views, sqlite::SqliteBackend},
};
use tempfile::tempdir;
use tokio::sync::broadcast;

use crate::helpers::*;

async fn engine_on(backend: Arc<SqliteBackend>) -> StateEngine {
    let (alert_tx, _) = broadcast::channel(256);
    let mut engine = StateEngine::new(backend, alert_tx, 10);
    engine.reload().await.unwrap();
    engine
}

#[tokio::test]
async fn test_state_survives_restart() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("pulsewatch.db");

    {
        let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        seed_views(backend.as_ref(), &[view_config("critical", "^db-")])
            .await
            .unwrap();

        let mut engine = engine_on(backend.clone()).await;
        for secs in [0, 10, 20] {
            engine
                .upsert_service(
                    UpsertService::beat("db-backup").with_timeouts(
                        Some(Timeout::from_secs(60)),
                        Some(Timeout::Auto),
                    ),
                    t(secs),
                )
                .await;
        }
        engine.tick(t(81)).await;
        assert_eq!(engine.service("db-backup").unwrap().state, State::Warning);
        assert_eq!(engine.stats().storage_errors, 0);

        backend.close().await.unwrap();
    }

    let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
    let engine = engine_on(backend.clone()).await;

    let service = engine.service("db-backup").unwrap();
    assert_eq!(service.state, State::Warning);
    assert_eq!(service.incident_nbr, 1);
    assert_eq!(service.last_beat, Some(t(20)));
    assert_eq!(service.previous_beats, vec![t(0), t(10), t(20)]);
    assert_eq!(service.warning_timeout, Timeout::from_secs(60));
    assert_eq!(service.error_timeout, Timeout::Auto);

    let critical = engine.view("critical").unwrap();
    assert_eq!(critical.state, State::Warning);
    assert_eq!(critical.incident_nbr, 1);
    assert_eq!(engine.view("all").unwrap().state, State::Warning);
}

#[tokio::test]
async fn test_seeding_keeps_incidents_across_restarts() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("pulsewatch.db");

    {
        let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
        seed_views(backend.as_ref(), &[view_config("critical", "^db-")])
            .await
            .unwrap();

        let mut engine = engine_on(backend.clone()).await;
        engine
            .upsert_service(
                UpsertService::beat("db-backup").with_timeouts(Some(Timeout::from_secs(5)), None),
                t(0),
            )
            .await;
        engine.tick(t(6)).await;
        engine
            .upsert_service(UpsertService::beat("db-backup"), t(7))
            .await;
        assert_eq!(engine.view("critical").unwrap().incident_nbr, 1);

        backend.close().await.unwrap();
    }

    // restart with a widened pattern
    let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());
    let written = seed_views(
        backend.as_ref(),
        &[view_config("critical", "^(db|cache)-")],
    )
    .await
    .unwrap();
    assert_eq!(written, 1);

    let views = backend.load_views().await.unwrap();
    let critical = views.iter().find(|v| v.name == "critical").unwrap();
    assert_eq!(critical.pattern, "^(db|cache)-");
    assert_eq!(critical.incident_nbr, 1);

    // the next incident continues the count
    let mut engine = engine_on(backend.clone()).await;
    engine.tick(t(7 + 6)).await;
    let critical = engine.view("critical").unwrap();
    assert_eq!(critical.state, State::Warning);
    assert_eq!(critical.incident_nbr, 2);
}

#[tokio::test]
async fn test_deleted_service_stays_deleted() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("pulsewatch.db");
    let backend = Arc::new(SqliteBackend::new(&db_path).await.unwrap());

    let mut engine = engine_on(backend.clone()).await;
    engine.upsert_service(UpsertService::beat("cron"), t(0)).await;
    engine.upsert_service(UpsertService::beat("db-backup"), t(0)).await;
    engine.delete_service("cron", t(1)).await;

    let engine = engine_on(backend.clone()).await;
    let names = engine
        .services_in_view("all")
        .into_iter()
        .map(|s| s.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["db-backup"]);

    let health = backend.health_check().await.unwrap();
    assert!(health.healthy);
}
