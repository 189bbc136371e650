//! HTTP route handlers, one module per resource

pub mod alerts;
pub mod health;
pub mod services;
pub mod stats;
pub mod views;
