//! Repaint coalescing
//!
//! Any number of repaint requests between two frames collapse into a single
//! paint. The paint closure reads live state when it runs, so it always shows
//! the latest mutations; intermediate states are never rendered on their own.

use std::time::Duration;

use tokio::time::Instant;

/// One frame at 60 Hz
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(16);

/// Frame-paced repaint scheduler
#[derive(Debug, Clone)]
pub struct RenderScheduler {
    refresh_interval: Duration,
    dirty: bool,
    deadline: Option<Instant>,
    last_paint: Option<Instant>,
    paints: u64,
    requests: u64,
}

impl RenderScheduler {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            refresh_interval,
            dirty: false,
            deadline: None,
            last_paint: None,
            paints: 0,
            requests: 0,
        }
    }

    /// Ask for a repaint. Cheap and safe to call for every incoming event.
    pub fn request_repaint(&mut self, now: Instant) {
        self.requests += 1;
        self.dirty = true;

        if self.deadline.is_none() {
            let earliest = self
                .last_paint
                .map(|last| last + self.refresh_interval)
                .unwrap_or(now);
            self.deadline = Some(earliest.max(now));
        }
    }

    /// When the pending frame is due, if one is pending
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.dirty
    }

    /// Run `paint` if a frame is pending and due at `now`.
    ///
    /// Returns whether a paint happened.
    pub fn fire<F>(&mut self, now: Instant, paint: F) -> bool
    where
        F: FnOnce(),
    {
        match self.deadline {
            Some(deadline) if self.dirty && now >= deadline => {
                self.dirty = false;
                self.deadline = None;
                self.last_paint = Some(now);
                self.paints += 1;
                paint();
                true
            }
            _ => false,
        }
    }

    /// Paints executed so far
    pub fn paints(&self) -> u64 {
        self.paints
    }

    /// Repaint requests received so far
    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_INTERVAL)
    }
}
