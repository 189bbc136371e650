//! REST API server for the monitoring hub
//!
//! This module provides HTTP endpoints for registering beats, configuring
//! and deleting services, and querying services, views and hub statistics.
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Actor handles** for talking to the monitor and alert actors
//! - **Bearer token** authentication (optional)
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/stats` - Monitor and alert statistics
//! - `POST /api/v1/alerts/mute` - Suppress alert delivery for a while
//! - `DELETE /api/v1/alerts/mute` - Resume alert delivery
//! - `POST /api/v1/services/{name}` - Register a beat
//! - `PUT /api/v1/services/{name}` - Configure a service without a beat
//! - `DELETE /api/v1/services/{name}` - Delete a service
//! - `GET /api/v1/services?view={view}` - List services of a view
//! - `GET /api/v1/services/{name}` - Service details
//! - `GET /api/v1/views` - List views
//! - `GET /api/v1/views/{name}` - View details

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

pub use crate::config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{
    BeatRequest, HealthResponse, MuteRequest, ServicesResponse, StatsResponse, ViewsResponse,
};

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the API router with all routes and configured layers
pub fn build_router(config: &ApiConfig, state: ApiState) -> Router {
    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route(
            "/api/v1/alerts/mute",
            post(routes::alerts::mute_alerts).delete(routes::alerts::unmute_alerts),
        )
        .route("/api/v1/services", get(routes::services::list_services))
        .route(
            "/api/v1/services/:name",
            get(routes::services::get_service)
                .post(routes::services::beat_service)
                .put(routes::services::configure_service)
                .delete(routes::services::delete_service),
        )
        .route("/api/v1/views", get(routes::views::list_views))
        .route("/api/v1/views/:name", get(routes::views::get_view))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Add CORS if enabled
    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    // Add auth middleware if token provided
    if let Some(token) = config.auth_token.clone() {
        app = app.layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = build_router(&config, state);

    // Bind and serve
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    // Spawn server in background
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
