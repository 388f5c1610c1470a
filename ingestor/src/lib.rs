//! HTTP ingestion endpoint for temperature/humidity sensor readings.
//!
//! Devices push readings authenticated by a per-device token; clients fetch
//! the most recent reading per device. Readings live in memory only.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod rest;
pub mod store;
pub mod validate;

pub use config::Config;
pub use errors::{Error, Result};
pub use registry::DeviceRegistry;
pub use rest::{build_app, cors_layer, create_router, AppState};
pub use store::ReadingStore;
