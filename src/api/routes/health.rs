//! Health check endpoint

use axum::{Json, extract::State};
use tracing::warn;

use crate::api::state::ApiState;
use crate::api::types::{HealthResponse, StorageHealth};

/// GET /api/v1/health
///
/// Liveness plus the health of the storage backend. Always answers `200`;
/// a failing backend is reported as `degraded`.
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let storage = match state.backend.health_check().await {
        Ok(health) => StorageHealth {
            healthy: health.healthy,
            message: health.message,
        },
        Err(e) => {
            warn!("storage health check failed: {}", e);
            StorageHealth {
                healthy: false,
                message: e.to_string(),
            }
        }
    };

    Json(HealthResponse {
        status: if storage.healthy { "ok" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        storage,
    })
}
