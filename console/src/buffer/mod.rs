//! Bounded in-memory state behind the console view

pub mod log;
pub mod metrics;
pub mod ring;

pub use log::{LogEntry, LogSnapshot, RollingLogBuffer, LOG_CAPACITY};
pub use metrics::{MetricPoint, MetricsAggregator, HISTORY_CAPACITY};
