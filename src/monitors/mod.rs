//! Health evaluation for services and views
//!
//! - [`service::Service`] - per-service state machine driven by beats and elapsed time
//! - [`view::View`] - regex-defined aggregate of services
//! - [`engine::StateEngine`] - owner of both maps, applying commands and ticks

pub mod engine;
pub mod service;
pub mod view;

pub use engine::StateEngine;
pub use service::{Service, TimeoutKind};
pub use view::View;
