//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cache sweep: removes expired response cache entries
//! - Backend probe: pings the store and reports connection loss

mod cleanup;
mod probe;

pub use cleanup::spawn_cleanup_task;
pub use probe::spawn_probe_task;
