//! Connection Monitor Module
//!
//! Detects backend connection loss and runs a bounded reconnection loop,
//! requesting a failing shutdown when every attempt fails.

mod connection;
mod state;

pub use connection::{ConnectionMonitor, Connector, FailureSignal, MonitorConfig};
pub use state::{MonitorEvent, Phase, ReconnectionState, Transition};
