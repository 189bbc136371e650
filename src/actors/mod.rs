//! Actor-based monitoring system
//!
//! This module implements an actor-based architecture for the monitoring system.
//! Each actor runs as an independent async task communicating via Tokio channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!     HTTP API / CLI / tests
//!              │ MonitorHandle (upsert, delete, query, control)
//!     ┌────────▼────────┐        ┌────────────────┐
//!     │  MonitorActor   │───────▶│ StorageBackend │
//!     │  (StateEngine)  │        └────────────────┘
//!     └────────┬────────┘
//!              │ ViewAlertEvent
//!     ┌────────▼────────┐
//!     │ Broadcast (MPMC)│
//!     └────────┬────────┘
//!              │ subscribe
//!     ┌────────▼────────┐
//!     │   AlertActor    │──▶ webhook / discord
//!     └─────────────────┘
//! ```
//!
//! ## Actor Types
//!
//! - **MonitorActor**: Owns services and views, evaluates timeouts every second
//! - **AlertActor**: Delivers view transitions to the configured alert targets
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: Each actor has mpsc command channels for control messages
//! 2. **Events**: Actors publish events to broadcast channels for fan-out
//! 3. **Request/Response**: oneshot channels for synchronous queries

pub mod alert;
pub mod messages;
pub mod monitor;
