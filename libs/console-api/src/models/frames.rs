//! Stream frames
//!
//! Every frame is a JSON object whose `type` field selects the variant.
//! Numeric telemetry arrives pre-formatted as strings ("12.5"), although
//! plain JSON numbers are accepted as well.

use serde::{Deserialize, Serialize};

/// Frame received from the remote process monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundFrame {
    /// One log line
    #[serde(rename = "log-data")]
    LogData(LogData),

    /// Periodic metrics and status sample
    #[serde(rename = "status-data")]
    StatusData { data: StatusData },
}

/// Payload of a `log-data` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogData {
    pub line: String,

    /// `stdout` or `stderr`; absent means stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,

    /// Informational sequence number, never used for ordering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

/// Payload of a `status-data` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusData {
    pub cpu: CpuUsage,
    pub memory: MemoryUsage,
    #[serde(default)]
    pub info: ServerInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub used: WireNumber,
}

/// Memory figures in MB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub used: WireNumber,
    pub max: WireNumber,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ip: String,
}

/// A number that may be sent either as a JSON number or as a numeric string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireNumber {
    Number(f64),
    Text(String),
}

impl WireNumber {
    /// Numeric value, `None` when the text is not a finite number
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            WireNumber::Number(n) => *n,
            WireNumber::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// Frame sent to the remote process monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundFrame {
    /// Lifecycle control signal (`start`, `stop`, `restart`, `kill`)
    #[serde(rename = "server-action")]
    ServerAction { action: String },

    /// Shell command executed in the target process context
    #[serde(rename = "command")]
    Command { action: String, command: String },
}

impl OutboundFrame {
    pub fn exec(command: impl Into<String>) -> Self {
        OutboundFrame::Command {
            action: "exec".to_string(),
            command: command.into(),
        }
    }
}
