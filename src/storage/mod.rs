//! Storage backends for service and view persistence
//!
//! This module provides a trait-based abstraction for storing service and
//! view snapshots in various backends.
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` trait allows swapping implementations
//! - **Async**: All operations are async for compatibility with Tokio actors
//! - **Snapshot pairs**: Writes receive the before and after copy of a mutation
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database
//! - **In-Memory** (fallback): No persistence, for testing
//!
//! ## Usage
//!
//! ```no_run
//! use pulsewatch::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./pulsewatch.db").await?;
//!     let services = backend.load_services().await?;
//!     println!("{} services stored", services.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;

use tracing::{debug, info};

use crate::ViewSnapshot;
use crate::config::ViewConfig;

/// Make the backend know every configured view
///
/// Unknown views are inserted in state `Ok`; known views keep their state
/// and incident number but take over the configured pattern. Views that
/// exist only in the backend are left alone. Returns the number of writes.
pub async fn seed_views(
    backend: &dyn StorageBackend,
    views: &[ViewConfig],
) -> StorageResult<usize> {
    let stored = backend.load_views().await?;
    let mut written = 0;

    for config in views {
        let current = match stored.iter().find(|v| v.name == config.name) {
            Some(existing) if existing.pattern == config.pattern => {
                debug!("view '{}' already stored", config.name);
                continue;
            }
            Some(existing) => {
                info!(
                    "view '{}': pattern changed from '{}' to '{}'",
                    config.name, existing.pattern, config.pattern
                );
                let previous = existing.clone();
                let current = ViewSnapshot {
                    pattern: config.pattern.clone(),
                    ..existing.clone()
                };
                (previous, current)
            }
            None => {
                info!("view '{}': adding with pattern '{}'", config.name, config.pattern);
                let current = ViewSnapshot::new(&config.name, &config.pattern);
                (current.clone(), current)
            }
        };

        backend.save_view(&current.0, &current.1).await?;
        written += 1;
    }

    Ok(written)
}
