//! Message types for actor communication
//!
//! This module defines all message types used for communication between actors.
//!
//! ## Design Principles
//!
//! 1. **Commands**: Request/response messages sent to specific actors via mpsc
//! 2. **Events**: Broadcast notifications published to multiple subscribers
//! 3. **Snapshots**: Replies carry owned copies, never references into actor state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::{ServiceSnapshot, State, Timeout, ViewSnapshot};

/// Create-or-update request for a service
///
/// Sent on the high-capacity upsert queue; producers never wait for it to be applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertService {
    /// Service name (created on first use)
    pub name: String,

    /// Record a beat at processing time
    pub register_beat: bool,

    /// New warning timeout, `None` leaves it unchanged
    pub warning_timeout: Option<Timeout>,

    /// New error timeout, `None` leaves it unchanged
    pub error_timeout: Option<Timeout>,

    /// Explicit pause configuration, `None` leaves it unchanged
    pub paused: Option<bool>,
}

impl UpsertService {
    /// A plain beat without configuration changes
    pub fn beat(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            register_beat: true,
            ..Default::default()
        }
    }

    pub fn with_timeouts(mut self, warning: Option<Timeout>, error: Option<Timeout>) -> Self {
        self.warning_timeout = warning;
        self.error_timeout = error;
        self
    }

    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = Some(paused);
        self
    }
}

/// Read-only requests answered by the MonitorActor
#[derive(Debug)]
pub enum MonitorQuery {
    /// All services matching a view (empty for unknown views)
    GetServices {
        view: String,
        respond_to: oneshot::Sender<Vec<ServiceSnapshot>>,
    },

    GetService {
        name: String,
        respond_to: oneshot::Sender<Option<ServiceSnapshot>>,
    },

    GetViews {
        respond_to: oneshot::Sender<Vec<ViewSnapshot>>,
    },

    GetView {
        name: String,
        respond_to: oneshot::Sender<Option<ViewSnapshot>>,
    },

    GetStats {
        respond_to: oneshot::Sender<MonitorStats>,
    },
}

/// Lifecycle commands for the MonitorActor
#[derive(Debug)]
pub enum MonitorControl {
    /// Drop in-memory state and load everything from the backend again
    Reload { respond_to: oneshot::Sender<()> },

    /// Stop the actor loop
    Shutdown,
}

/// Counters maintained by the MonitorActor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub services: usize,
    pub views: usize,
    pub beats: u64,
    pub upserts: u64,
    pub services_created: u64,
    pub services_deleted: u64,
    pub ticks: u64,
    pub state_changes: u64,
    pub view_changes: u64,
    pub alerts_published: u64,
    pub storage_errors: u64,
    pub rejected_timeouts: u64,
}

/// Event published when a view transition is alert-worthy
///
/// Broadcast to the AlertActor (and any other subscriber). Publishing never
/// blocks the monitor; slow subscribers lag and drop events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewAlertEvent {
    /// View after the transition
    pub view: ViewSnapshot,

    /// State before the transition
    pub previous: State,

    /// State after the transition
    pub current: State,

    /// When the transition was detected
    pub timestamp: DateTime<Utc>,
}

/// Commands that can be sent to the AlertActor
#[derive(Debug)]
pub enum AlertCommand {
    /// Suppress deliveries for a duration
    ///
    /// Useful for maintenance windows.
    MuteAlerts { duration_secs: u64 },

    /// Resume deliveries immediately
    UnmuteAlerts,

    /// Get delivery statistics
    GetStats {
        respond_to: oneshot::Sender<AlertStats>,
    },

    /// Gracefully shut down the alert actor
    Shutdown,
}

/// Delivery statistics of the AlertActor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStats {
    /// Alert events received from the monitor
    pub received: u64,

    /// Successful deliveries (one per configured target)
    pub delivered: u64,

    /// Failed deliveries
    pub failed: u64,

    /// Events dropped while muted
    pub suppressed: u64,

    /// Whether alerts are currently muted
    pub muted: bool,
}
