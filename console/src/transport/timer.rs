//! Cancellable reconnect timer owned by a channel worker

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Shortest delay a timer accepts; smaller values would spin on a dead
/// endpoint
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(100);

/// Fixed-delay reconnect timer.
///
/// The delay never grows and attempts are unbounded; the timer only stops
/// when it is cancelled.
#[derive(Debug)]
pub struct ReconnectTimer {
    delay: Duration,
    deadline: Option<Instant>,
    attempts: u64,
}

impl ReconnectTimer {
    /// Delays below [`MIN_RECONNECT_DELAY`] are raised to it
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: delay.max(MIN_RECONNECT_DELAY),
            deadline: None,
            attempts: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm the timer from now and return its deadline
    pub fn arm(&mut self) -> Instant {
        let deadline = Instant::now() + self.delay;
        self.deadline = Some(deadline);
        self.attempts += 1;
        deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Reconnect attempts since the last successful open
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
    }

    /// Resolve when the armed deadline passes; pending forever while disarmed
    pub async fn expired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
