//! Disaster Gateway - REST gateway for geospatial disaster reports
//!
//! Serves report, sensor and infrastructure data as JSON or TopoJSON with an
//! in-process response cache, and watches the backend connection with a
//! bounded reconnection policy.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod response;
pub mod shutdown;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use tasks::{spawn_cleanup_task, spawn_probe_task};
