//! API shared state containing actor handles

use std::sync::Arc;

use crate::actors::{alert::AlertHandle, monitor::MonitorHandle};
use crate::storage::StorageBackend;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Handle to the monitor actor for beats and queries
    pub monitor: MonitorHandle,

    /// Handle to the alert actor for delivery stats
    pub alerts: AlertHandle,

    /// Storage backend, used for health reporting only
    pub backend: Arc<dyn StorageBackend>,
}

impl ApiState {
    /// Create new API state with all actor handles
    pub fn new(
        monitor: MonitorHandle,
        alerts: AlertHandle,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            monitor,
            alerts,
            backend,
        }
    }
}
