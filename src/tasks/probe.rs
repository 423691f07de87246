//! Backend Probe Task
//!
//! Pool connections reconnect silently, so the store is pinged on an
//! interval and connection loss is reported to the connection monitor.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::Probe;
use crate::monitor::FailureSignal;

/// Spawns a background task that pings the store every `interval`.
///
/// Connection-class failures raise a failure signal; other errors are only
/// logged. Repeated signals during an outage are coalesced by the monitor.
pub fn spawn_probe_task<P: Probe>(probe: P, signal: FailureSignal, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Starting backend probe task");

        loop {
            tokio::time::sleep(interval).await;

            match probe.ping().await {
                Ok(()) => debug!("Backend probe ok"),
                Err(e) if e.is_connection_loss() => signal.connection_lost(e.to_string()),
                Err(e) => warn!(error = %e, "Backend probe query failed"),
            }
        }
    })
}
