//! Routes decoded events to the state they mutate

use tracing::trace;

use crate::buffer::{MetricsAggregator, RollingLogBuffer};
use crate::console::events::{InboundEvent, StatusChange};
use crate::console::surface::ConsoleSurface;

/// Console state fed by the router
#[derive(Debug, Clone)]
pub struct ConsoleState {
    pub logs: RollingLogBuffer,
    pub metrics: MetricsAggregator,
    pub status: Option<StatusChange>,
}

impl ConsoleState {
    pub fn new(log_capacity: usize, history_capacity: usize) -> Self {
        Self {
            logs: RollingLogBuffer::new(log_capacity),
            metrics: MetricsAggregator::new(history_capacity),
            status: None,
        }
    }
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self {
            logs: RollingLogBuffer::default(),
            metrics: MetricsAggregator::default(),
            status: None,
        }
    }
}

/// Where an event went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Appended to the log buffer with this id
    Log(u64),
    Metrics,
    Status { changed: bool },
    Diagnostic,
    /// Dropped on purpose (empty line)
    Ignored,
}

impl Routed {
    pub fn needs_repaint(&self) -> bool {
        matches!(
            self,
            Routed::Log(_) | Routed::Metrics | Routed::Status { changed: true }
        )
    }
}

/// Counters kept by the router
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub lines: u64,
    pub samples: u64,
    pub status_changes: u64,
    pub malformed: u64,
    pub ignored: u64,
}

/// Single dispatch point for every decoded event
#[derive(Debug, Default)]
pub struct Router {
    stats: RouterStats,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event.
    ///
    /// Log lines go to the buffer, samples to the aggregator, status to the
    /// surface's observers (only when it changed), malformed frames to the
    /// surface's diagnostic sink.
    pub fn dispatch(
        &mut self,
        event: InboundEvent,
        state: &mut ConsoleState,
        surface: &mut dyn ConsoleSurface,
    ) -> Routed {
        match event {
            InboundEvent::LogLine { text, .. } if text.is_empty() => {
                self.stats.ignored += 1;
                Routed::Ignored
            }
            InboundEvent::LogLine {
                text,
                stream,
                sequence,
            } => {
                trace!(sequence, "log line");
                self.stats.lines += 1;
                Routed::Log(state.logs.append(text, stream))
            }
            InboundEvent::MetricSample(sample) => {
                self.stats.samples += 1;
                state.metrics.record_sample(sample);
                Routed::Metrics
            }
            InboundEvent::StatusChange(status) => {
                if state.status.as_ref() == Some(&status) {
                    return Routed::Status { changed: false };
                }
                self.stats.status_changes += 1;
                surface.status_changed(state.logs.next_id(), &status);
                state.status = Some(status);
                Routed::Status { changed: true }
            }
            InboundEvent::Malformed { raw } => {
                self.stats.malformed += 1;
                surface.diagnostic(state.logs.next_id(), &raw);
                Routed::Diagnostic
            }
        }
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }
}
