//! SQLite storage backend implementation
//!
//! This module provides a SQLite-based implementation of the `StorageBackend` trait.
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Efficient resource usage
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! ## Encoding
//!
//! - Beat timestamps are stored as Unix nanoseconds, `updated_at` as Unix milliseconds
//! - Timeouts are stored in their wire form (`"auto"`, `"clear"`, seconds)
//! - The beat history is stored as a JSON array of Unix nanoseconds

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use crate::{ServiceSnapshot, State, Timeout, ViewSnapshot};

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for WAL mode
    ///
    /// ## Example
    ///
    /// ```no_run
    /// # use pulsewatch::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./pulsewatch.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    /// Beats are stored with full `chrono` precision
    fn beat_to_nanos(dt: &DateTime<Utc>) -> StorageResult<i64> {
        dt.timestamp_nanos_opt()
            .ok_or_else(|| StorageError::SerializationError(format!("beat out of range: {dt}")))
    }

    fn nanos_to_beat(nanos: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(nanos)
    }

    fn parse_state(raw: &str) -> StorageResult<State> {
        raw.parse().map_err(StorageError::CorruptRecord)
    }

    fn parse_timeout(raw: &str) -> StorageResult<Timeout> {
        raw.parse().map_err(StorageError::CorruptRecord)
    }

    fn encode_beats(beats: &[DateTime<Utc>]) -> StorageResult<String> {
        let nanos = beats
            .iter()
            .map(Self::beat_to_nanos)
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(serde_json::to_string(&nanos)?)
    }

    fn decode_beats(raw: &str) -> StorageResult<Vec<DateTime<Utc>>> {
        let nanos: Vec<i64> = serde_json::from_str(raw)?;
        Ok(nanos.into_iter().map(Self::nanos_to_beat).collect())
    }

    fn service_from_row(row: &SqliteRow) -> StorageResult<ServiceSnapshot> {
        let state: String = row.try_get("state")?;
        let warning_timeout: String = row.try_get("warning_timeout")?;
        let error_timeout: String = row.try_get("error_timeout")?;
        let previous_beats: String = row.try_get("previous_beats")?;
        let last_beat: Option<i64> = row.try_get("last_beat")?;
        let incident_nbr: i64 = row.try_get("incident_nbr")?;

        Ok(ServiceSnapshot {
            name: row.try_get("name")?,
            state: Self::parse_state(&state)?,
            last_beat: last_beat.map(Self::nanos_to_beat),
            warning_timeout: Self::parse_timeout(&warning_timeout)?,
            error_timeout: Self::parse_timeout(&error_timeout)?,
            paused: row.try_get("paused")?,
            previous_beats: Self::decode_beats(&previous_beats)?,
            incident_nbr: incident_nbr.max(0) as u64,
        })
    }

    fn view_from_row(row: &SqliteRow) -> StorageResult<ViewSnapshot> {
        let state: String = row.try_get("state")?;
        let incident_nbr: i64 = row.try_get("incident_nbr")?;

        Ok(ViewSnapshot {
            name: row.try_get("name")?,
            pattern: row.try_get("pattern")?,
            state: Self::parse_state(&state)?,
            incident_nbr: incident_nbr.max(0) as u64,
        })
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self))]
    async fn load_services(&self) -> StorageResult<Vec<ServiceSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT name, state, last_beat, warning_timeout, error_timeout,
                   paused, previous_beats, incident_nbr
            FROM services
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut services = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::service_from_row(row) {
                Ok(service) => services.push(service),
                Err(e) => warn!("skipping unreadable service row: {}", e),
            }
        }

        debug!("loaded {} services", services.len());
        Ok(services)
    }

    #[instrument(skip(self))]
    async fn load_views(&self) -> StorageResult<Vec<ViewSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT name, pattern, state, incident_nbr
            FROM views
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut views = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::view_from_row(row) {
                Ok(view) => views.push(view),
                Err(e) => warn!("skipping unreadable view row: {}", e),
            }
        }

        debug!("loaded {} views", views.len());
        Ok(views)
    }

    #[instrument(skip_all, fields(service = %current.name))]
    async fn save_service(
        &self,
        previous: &ServiceSnapshot,
        current: &ServiceSnapshot,
    ) -> StorageResult<()> {
        if previous.state != current.state {
            debug!("state transition {} -> {}", previous.state, current.state);
        }

        sqlx::query(
            r#"
            INSERT INTO services (
                name, state, last_beat, warning_timeout, error_timeout,
                paused, previous_beats, incident_nbr, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (name) DO UPDATE SET
                state = excluded.state,
                last_beat = excluded.last_beat,
                warning_timeout = excluded.warning_timeout,
                error_timeout = excluded.error_timeout,
                paused = excluded.paused,
                previous_beats = excluded.previous_beats,
                incident_nbr = excluded.incident_nbr,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&current.name)
        .bind(current.state.as_str())
        .bind(current.last_beat.as_ref().map(Self::beat_to_nanos).transpose()?)
        .bind(current.warning_timeout.to_string())
        .bind(current.error_timeout.to_string())
        .bind(current.paused)
        .bind(Self::encode_beats(&current.previous_beats)?)
        .bind(current.incident_nbr as i64)
        .bind(Self::timestamp_to_millis(&Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip_all, fields(view = %current.name))]
    async fn save_view(
        &self,
        previous: &ViewSnapshot,
        current: &ViewSnapshot,
    ) -> StorageResult<()> {
        if previous.state != current.state {
            debug!("state transition {} -> {}", previous.state, current.state);
        }

        sqlx::query(
            r#"
            INSERT INTO views (name, pattern, state, incident_nbr, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (name) DO UPDATE SET
                pattern = excluded.pattern,
                state = excluded.state,
                incident_nbr = excluded.incident_nbr,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&current.name)
        .bind(&current.pattern)
        .bind(current.state.as_str())
        .bind(current.incident_nbr as i64)
        .bind(Self::timestamp_to_millis(&Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_service(&self, name: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM services WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        debug!("deleted {} rows", result.rows_affected());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
