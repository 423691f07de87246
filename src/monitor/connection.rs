//! Connection Monitor Task
//!
//! Consumes failure signals and attempt outcomes from one channel, drives the
//! [`ReconnectionState`] machine and runs each connect attempt as its own
//! spawned task. State changes are published on a watch channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::BackendError;
use crate::monitor::{MonitorEvent, ReconnectionState, Transition};
use crate::shutdown::{ExitStatus, ShutdownHandle};

// == Connector ==
/// Establishes a fresh connection to the backend store.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<(), BackendError>;
}

/// Reconnection limits, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub max_attempts: u32,
    pub delay: Duration,
}

// == Failure Signal ==
/// Cloneable handle for reporting backend connection loss.
///
/// Reporting is fire-and-forget and safe to repeat; duplicates are coalesced
/// by the monitor.
#[derive(Debug, Clone)]
pub struct FailureSignal {
    tx: mpsc::UnboundedSender<MonitorEvent>,
}

impl FailureSignal {
    /// Signal whose events land in the returned receiver instead of a monitor.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn connection_lost(&self, reason: impl Into<String>) {
        let event = MonitorEvent::ConnectionLost {
            reason: reason.into(),
        };
        if self.tx.send(event).is_err() {
            debug!("Connection monitor stopped, failure signal dropped");
        }
    }
}

// == Connection Monitor ==
pub struct ConnectionMonitor {
    state: ReconnectionState,
    connector: Arc<dyn Connector>,
    shutdown: ShutdownHandle,
    events_tx: mpsc::UnboundedSender<MonitorEvent>,
    events_rx: mpsc::UnboundedReceiver<MonitorEvent>,
    state_tx: watch::Sender<ReconnectionState>,
}

impl ConnectionMonitor {
    /// Creates a monitor in the `Connected` phase.
    pub fn new(config: MonitorConfig, connector: Arc<dyn Connector>, shutdown: ShutdownHandle) -> Self {
        let state = ReconnectionState::new(config.max_attempts, config.delay);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(state.clone());

        Self {
            state,
            connector,
            shutdown,
            events_tx,
            events_rx,
            state_tx,
        }
    }

    /// Handle for reporting connection loss to this monitor.
    pub fn failure_signal(&self) -> FailureSignal {
        FailureSignal {
            tx: self.events_tx.clone(),
        }
    }

    /// Observes the reconnection state.
    pub fn subscribe(&self) -> watch::Receiver<ReconnectionState> {
        self.state_tx.subscribe()
    }

    /// Runs the monitor on the tokio runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Processes events until the attempt budget is exhausted.
    ///
    /// On exhaustion a failing shutdown is requested exactly once and the
    /// loop returns.
    pub async fn run(mut self) {
        info!(
            max_attempts = self.state.max_attempts,
            delay_ms = self.state.delay.as_millis() as u64,
            "Connection monitor started"
        );

        while let Some(event) = self.events_rx.recv().await {
            let transition = self.state.apply(&event);
            self.state_tx.send_replace(self.state.clone());

            match transition {
                Transition::Ignored => {
                    debug!(phase = ?self.state.phase, event = ?event, "Monitor event ignored");
                }
                Transition::ScheduleAttempt(delay) => {
                    match &event {
                        MonitorEvent::ConnectionLost { reason } => {
                            error!(reason = %reason, "Backend connection error, attempting to reconnect at intervals");
                        }
                        MonitorEvent::AttemptFailed { reason } => {
                            warn!(
                                reason = %reason,
                                attempt = self.state.attempt,
                                max_attempts = self.state.max_attempts,
                                delay_ms = delay.as_millis() as u64,
                                "Backend reconnection failed, queuing next attempt"
                            );
                        }
                        MonitorEvent::AttemptSucceeded => {}
                    }
                    self.schedule_attempt(delay);
                }
                Transition::Recovered => {
                    info!("Backend connection re-established");
                }
                Transition::Exhausted => {
                    error!(
                        attempts = self.state.attempt,
                        event = ?event,
                        "Backend reconnection failed, maximum reconnection attempts reached"
                    );
                    self.shutdown
                        .request(ExitStatus::Failure, "backend reconnection attempts exhausted");
                    break;
                }
            }
        }
    }

    /// Spawns one connect attempt that reports back on the event channel.
    fn schedule_attempt(&self, delay: Duration) {
        let connector = Arc::clone(&self.connector);
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let event = match connector.connect().await {
                Ok(()) => MonitorEvent::AttemptSucceeded,
                Err(e) => MonitorEvent::AttemptFailed {
                    reason: e.to_string(),
                },
            };
            // The monitor only stops after exhaustion, when outcomes no longer matter
            let _ = events.send(event);
        });
    }
}
