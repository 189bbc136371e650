//! Alert muting endpoints

use axum::{Json, extract::State, http::StatusCode};
use tracing::info;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::MuteRequest,
};

/// Longest accepted mute, one week
pub const MAX_MUTE_SECS: u64 = 7 * 24 * 3600;

/// POST /api/v1/alerts/mute
///
/// Alert events keep being counted but are not delivered until the
/// duration elapses.
pub async fn mute_alerts(
    State(state): State<ApiState>,
    Json(request): Json<MuteRequest>,
) -> ApiResult<StatusCode> {
    if request.duration_secs == 0 || request.duration_secs > MAX_MUTE_SECS {
        return Err(ApiError::InvalidRequest(format!(
            "duration_secs must be between 1 and {MAX_MUTE_SECS}"
        )));
    }

    info!("muting alerts for {}s", request.duration_secs);
    state.alerts.mute_alerts(request.duration_secs).await;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/alerts/mute
pub async fn unmute_alerts(State(state): State<ApiState>) -> StatusCode {
    info!("unmuting alerts");
    state.alerts.unmute_alerts().await;
    StatusCode::NO_CONTENT
}
