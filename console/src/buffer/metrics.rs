//! Metrics aggregator

use std::collections::vec_deque;

use serde::Serialize;

use crate::buffer::ring::Ring;
use crate::console::events::MetricSample;

/// Default number of trend points kept
pub const HISTORY_CAPACITY: usize = 30;

/// One point of the short-horizon trend
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricPoint {
    pub cpu: f64,
    pub mem: f64,
}

/// Keeps the latest raw sample and a rolling window for trend display.
///
/// Values are stored exactly as reported; nothing is smoothed.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    latest: Option<MetricSample>,
    history: Ring<MetricPoint>,
}

impl MetricsAggregator {
    pub fn new(capacity: usize) -> Self {
        Self {
            latest: None,
            history: Ring::new(capacity),
        }
    }

    /// Record a full sample: it becomes `latest` and adds one trend point
    pub fn record_sample(&mut self, sample: MetricSample) {
        self.record(sample.cpu_percent, sample.memory_used_mb);
        self.latest = Some(sample);
    }

    /// Add one trend point
    pub fn record(&mut self, cpu_percent: f64, memory_used_mb: f64) {
        self.history.push(MetricPoint {
            cpu: cpu_percent,
            mem: memory_used_mb,
        });
    }

    pub fn latest(&self) -> Option<&MetricSample> {
        self.latest.as_ref()
    }

    /// Trend points, oldest first
    pub fn history(&self) -> vec_deque::Iter<'_, MetricPoint> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn capacity(&self) -> usize {
        self.history.capacity()
    }

    pub fn memory_percent(&self) -> Option<f64> {
        self.latest.as_ref().and_then(MetricSample::memory_percent)
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}
