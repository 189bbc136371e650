//! View endpoints

use axum::{
    Json,
    extract::{Path, State},
};

use crate::ViewSnapshot;
use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::ViewsResponse,
};

/// GET /api/v1/views
pub async fn list_views(State(state): State<ApiState>) -> ApiResult<Json<ViewsResponse>> {
    let views = state.monitor.get_views().await?;

    Ok(Json(ViewsResponse {
        count: views.len(),
        views,
    }))
}

/// GET /api/v1/views/:name
pub async fn get_view(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ViewSnapshot>> {
    state
        .monitor
        .get_view(name.clone())
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("view '{name}' not found")))
}
