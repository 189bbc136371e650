//! Service endpoints: beats, configuration, deletion and queries

use std::sync::LazyLock;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{BeatRequest, ServicesResponse},
};
use crate::monitors::view::ALL_VIEW;
use crate::{ServiceSnapshot, Timeout};

static SERVICE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._-]+$").expect("service name pattern is valid")
});

/// Query parameters for the service list
#[derive(Debug, Deserialize)]
pub struct ServicesQuery {
    view: Option<String>,
}

pub fn validate_service_name(name: &str) -> ApiResult<()> {
    if SERVICE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ApiError::InvalidRequest(format!(
            "invalid service name '{name}' (allowed: letters, digits, '.', '_', '-')"
        )))
    }
}

/// Parse an optional JSON body; an empty body means "no changes"
fn parse_beat_request(body: &Bytes) -> ApiResult<BeatRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(BeatRequest::default());
    }

    let request: BeatRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid request body: {e}")))?;

    if let (Some(Timeout::Explicit(warning)), Some(Timeout::Explicit(error))) =
        (request.warning_timeout, request.error_timeout)
    {
        if error < warning {
            return Err(ApiError::InvalidRequest(format!(
                "error timeout ({}s) must not be below warning timeout ({}s)",
                error.as_secs(),
                warning.as_secs()
            )));
        }
    }

    Ok(request)
}

fn queue_upsert(
    state: &ApiState,
    name: String,
    body: &Bytes,
    register_beat: bool,
) -> ApiResult<StatusCode> {
    validate_service_name(&name)?;
    let request = parse_beat_request(body)?;

    debug!("queueing upsert for '{}' (beat: {})", name, register_beat);
    state.monitor.upsert(request.into_upsert(name, register_beat))?;

    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/services/:name
///
/// Register a beat, optionally changing the configuration
pub async fn beat_service(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    queue_upsert(&state, name, &body, true)
}

/// PUT /api/v1/services/:name
///
/// Change the configuration without registering a beat
pub async fn configure_service(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    queue_upsert(&state, name, &body, false)
}

/// DELETE /api/v1/services/:name
pub async fn delete_service(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    validate_service_name(&name)?;
    state.monitor.delete_service(name).await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/v1/services?view=
///
/// List services of a view (default: all)
pub async fn list_services(
    State(state): State<ApiState>,
    Query(query): Query<ServicesQuery>,
) -> ApiResult<Json<ServicesResponse>> {
    let view = query.view.unwrap_or_else(|| ALL_VIEW.to_string());
    let services = state.monitor.get_services(view.clone()).await?;

    Ok(Json(ServicesResponse {
        view,
        count: services.len(),
        services,
    }))
}

/// GET /api/v1/services/:name
pub async fn get_service(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ServiceSnapshot>> {
    state
        .monitor
        .get_service(name.clone())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("service '{name}' not found")))
}
