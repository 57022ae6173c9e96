//! Typed events decoded from stream frames and commands sent back

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output stream a log line came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    #[default]
    Stdout,
    Stderr,
}

impl LogStream {
    /// Wire value; anything but `stderr` is treated as stdout
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("stderr") => LogStream::Stderr,
            _ => LogStream::Stdout,
        }
    }
}

/// Raw resource sample as reported by the remote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub cpu_percent: f64,
    pub memory_used_mb: f64,
    pub memory_max_mb: f64,
    /// Stamped on arrival
    pub received_at: DateTime<Utc>,
}

impl MetricSample {
    /// Memory use as a percentage of the limit, `None` without a limit
    pub fn memory_percent(&self) -> Option<f64> {
        (self.memory_max_mb > 0.0).then(|| self.memory_used_mb / self.memory_max_mb * 100.0)
    }
}

/// Process status carried by every status frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub running: bool,
    pub address: String,
}

impl StatusChange {
    pub fn label(&self) -> &'static str {
        if self.running {
            "Online"
        } else {
            "Offline"
        }
    }
}

/// Event decoded from one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    LogLine {
        text: String,
        stream: LogStream,
        sequence: u64,
    },
    MetricSample(MetricSample),
    StatusChange(StatusChange),
    /// Frame that did not parse; kept so the operator sees it
    Malformed { raw: String },
}

/// Lifecycle signal for the remote server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Start,
    Stop,
    Restart,
    Kill,
}

impl ControlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::Start => "start",
            ControlKind::Stop => "stop",
            ControlKind::Restart => "restart",
            ControlKind::Kill => "kill",
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "start" => Ok(ControlKind::Start),
            "stop" => Ok(ControlKind::Stop),
            "restart" => Ok(ControlKind::Restart),
            "kill" => Ok(ControlKind::Kill),
            _ => Err(format!("Unknown control action: {}", s)),
        }
    }
}

/// Command sent to the remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCommand {
    ControlAction { kind: ControlKind },
    ShellCommand { text: String },
}
