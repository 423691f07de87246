//! Reconnection state machine.
//!
//! Pure transitions; the monitor task owns the single instance and acts on
//! the returned [`Transition`].

use std::time::Duration;

// == Phase ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connected,
    Reconnecting,
    /// Terminal; only process shutdown follows
    Exhausted,
}

// == Monitor Event ==
/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// The backend connection became unusable. May arrive any number of times.
    ConnectionLost { reason: String },
    /// A reconnection attempt succeeded.
    AttemptSucceeded,
    /// A reconnection attempt failed.
    AttemptFailed { reason: String },
}

// == Transition ==
/// What the monitor has to do after applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Event did not apply in the current phase
    Ignored,
    /// Run one connect attempt after the given delay
    ScheduleAttempt(Duration),
    /// Back to `Connected`
    Recovered,
    /// Attempts used up; shut the process down
    Exhausted,
}

// == Reconnection State ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectionState {
    /// Failed attempts in the current episode
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    pub phase: Phase,
}

impl ReconnectionState {
    /// Starts in `Connected` with no attempts made.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
            delay,
            phase: Phase::Connected,
        }
    }

    /// Applies `event` and returns the action it requires.
    ///
    /// Only a `Connected` state reacts to connection loss, so at most one
    /// reconnection episode is in progress at any time.
    pub fn apply(&mut self, event: &MonitorEvent) -> Transition {
        match (self.phase, event) {
            (Phase::Connected, MonitorEvent::ConnectionLost { .. }) => {
                self.phase = Phase::Reconnecting;
                self.attempt = 0;
                Transition::ScheduleAttempt(Duration::ZERO)
            }
            (Phase::Reconnecting, MonitorEvent::AttemptSucceeded) => {
                self.phase = Phase::Connected;
                self.attempt = 0;
                Transition::Recovered
            }
            (Phase::Reconnecting, MonitorEvent::AttemptFailed { .. }) => {
                self.attempt += 1;
                if self.attempt >= self.max_attempts {
                    self.phase = Phase::Exhausted;
                    Transition::Exhausted
                } else {
                    Transition::ScheduleAttempt(self.delay)
                }
            }
            _ => Transition::Ignored,
        }
    }
}
