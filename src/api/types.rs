//! Shared API request and response types
//!
//! Used by the HTTP handlers and by the `pulsewatch-beat` client, so both
//! sides agree on the wire format.

use serde::{Deserialize, Serialize};

use crate::actors::messages::{AlertStats, MonitorStats, UpsertService};
use crate::{ServiceSnapshot, Timeout, ViewSnapshot};

/// Optional body of `POST`/`PUT /api/v1/services/:name`
///
/// Absent fields leave the current configuration unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_timeout: Option<Timeout>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_timeout: Option<Timeout>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
}

impl BeatRequest {
    /// Turn the request into an upsert command for `name`
    pub fn into_upsert(self, name: impl Into<String>, register_beat: bool) -> UpsertService {
        UpsertService {
            name: name.into(),
            register_beat,
            warning_timeout: self.warning_timeout,
            error_timeout: self.error_timeout,
            paused: self.paused,
        }
    }
}

/// Response for GET /api/v1/services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesResponse {
    pub view: String,
    pub services: Vec<ServiceSnapshot>,
    pub count: usize,
}

/// Response for GET /api/v1/views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewsResponse {
    pub views: Vec<ViewSnapshot>,
    pub count: usize,
}

/// Response for GET /api/v1/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub storage: StorageHealth,
}

/// Backend subset of the health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageHealth {
    pub healthy: bool,
    pub message: String,
}

/// Body of `POST /api/v1/alerts/mute`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuteRequest {
    pub duration_secs: u64,
}

/// Response for GET /api/v1/stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub timestamp: String,
    pub monitor: MonitorStats,
    pub alerts: Option<AlertStats>,
}
