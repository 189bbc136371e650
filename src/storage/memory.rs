//! In-memory storage backend (no persistence)
//!
//! Useful for:
//! - Testing without database dependencies
//! - Deployments configured with `"backend": "none"`
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use crate::{ServiceSnapshot, ViewSnapshot};

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    services: RwLock<HashMap<String, ServiceSnapshot>>,
    views: RwLock<HashMap<String, ViewSnapshot>>,

    /// Number of successful write operations (saves and deletes)
    writes: AtomicU64,

    /// When set, every operation fails with `StorageError::Unavailable`
    unavailable: AtomicBool,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-populated with stored records
    pub fn with_records(services: Vec<ServiceSnapshot>, views: Vec<ViewSnapshot>) -> Self {
        Self {
            services: RwLock::new(services.into_iter().map(|s| (s.name.clone(), s)).collect()),
            views: RwLock::new(views.into_iter().map(|v| (v.name.clone(), v)).collect()),
            ..Self::default()
        }
    }

    /// Simulate an outage (or recover from one)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn stored_service(&self, name: &str) -> Option<ServiceSnapshot> {
        self.services.read().await.get(name).cloned()
    }

    pub async fn stored_view(&self, name: &str) -> Option<ViewSnapshot> {
        self.views.read().await.get(name).cloned()
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "in-memory backend marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn load_services(&self) -> StorageResult<Vec<ServiceSnapshot>> {
        self.ensure_available()?;
        Ok(self.services.read().await.values().cloned().collect())
    }

    async fn load_views(&self) -> StorageResult<Vec<ViewSnapshot>> {
        self.ensure_available()?;
        Ok(self.views.read().await.values().cloned().collect())
    }

    async fn save_service(
        &self,
        previous: &ServiceSnapshot,
        current: &ServiceSnapshot,
    ) -> StorageResult<()> {
        self.ensure_available()?;
        if previous.state != current.state {
            debug!(
                "service '{}': {} -> {}",
                current.name, previous.state, current.state
            );
        }

        self.services
            .write()
            .await
            .insert(current.name.clone(), current.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn save_view(
        &self,
        _previous: &ViewSnapshot,
        current: &ViewSnapshot,
    ) -> StorageResult<()> {
        self.ensure_available()?;
        self.views
            .write()
            .await
            .insert(current.name.clone(), current.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_service(&self, name: &str) -> StorageResult<()> {
        self.ensure_available()?;
        self.services.write().await.remove(name);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let healthy = !self.unavailable.load(Ordering::SeqCst);
        Ok(HealthStatus {
            healthy,
            message: if healthy {
                "In-memory storage operational".to_string()
            } else {
                "In-memory storage marked unavailable".to_string()
            },
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                (
                    "services".to_string(),
                    self.services.read().await.len().to_string(),
                ),
                (
                    "views".to_string(),
                    self.views.read().await.len().to_string(),
                ),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
