//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! storage implementations must implement.

use async_trait::async_trait;

use super::error::StorageResult;
use crate::{ServiceSnapshot, ViewSnapshot};

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: std::collections::HashMap<String, String>,
}

/// Trait for persistent storage backends
///
/// The monitor treats the backend as the durable source of truth: it loads
/// everything once on startup and then writes every mutation incrementally.
///
/// ## Snapshot Pairs
///
/// Writes receive the state before and after the mutation. Implementations
/// may use the pair to skip no-op writes or to record transitions.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared between the
/// monitor actor, the API and the hub's startup code.
///
/// ## Error Handling
///
/// Methods return `StorageResult<T>`. The monitor logs failures and keeps
/// its in-memory state; it never retries.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Load every stored service
    async fn load_services(&self) -> StorageResult<Vec<ServiceSnapshot>>;

    /// Load every stored view
    async fn load_views(&self) -> StorageResult<Vec<ViewSnapshot>>;

    /// Persist a service mutation
    async fn save_service(
        &self,
        previous: &ServiceSnapshot,
        current: &ServiceSnapshot,
    ) -> StorageResult<()>;

    /// Persist a view mutation
    async fn save_view(&self, previous: &ViewSnapshot, current: &ViewSnapshot)
    -> StorageResult<()>;

    /// Remove a service; deleting an unknown service is not an error
    async fn delete_service(&self, name: &str) -> StorageResult<()>;

    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend
    /// is operational (e.g., ping database, check file access).
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
