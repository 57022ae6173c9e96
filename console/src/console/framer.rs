//! Frame codec
//!
//! `decode` is total: whatever arrives on the stream becomes at least one
//! event, and anything that is not a known frame becomes `Malformed`.

use chrono::Utc;
use console_api::{InboundFrame, LogData, OutboundFrame, StatusData};
use tracing::debug;

use crate::console::events::{
    InboundEvent, LogStream, MetricSample, OutboundCommand, StatusChange,
};

/// Status reported by a running server
const RUNNING: &str = "running";

/// Decode one raw frame.
///
/// A `log-data` frame yields a single `LogLine`. A `status-data` frame
/// yields a `MetricSample` followed by a `StatusChange`.
pub fn decode(raw: &str) -> Vec<InboundEvent> {
    match serde_json::from_str::<InboundFrame>(raw) {
        Ok(InboundFrame::LogData(data)) => vec![log_line(data)],
        Ok(InboundFrame::StatusData { data }) => match status(data) {
            Some((sample, status)) => vec![
                InboundEvent::MetricSample(sample),
                InboundEvent::StatusChange(status),
            ],
            None => malformed(raw, "non-numeric telemetry"),
        },
        Err(e) => malformed(raw, &e.to_string()),
    }
}

/// Serialize a command to its wire frame
pub fn encode(command: &OutboundCommand) -> String {
    let frame = match command {
        OutboundCommand::ControlAction { kind } => OutboundFrame::ServerAction {
            action: kind.as_str().to_string(),
        },
        OutboundCommand::ShellCommand { text } => OutboundFrame::exec(text.clone()),
    };

    // Both variants only hold strings, so serialization cannot fail
    serde_json::to_string(&frame).unwrap_or_default()
}

fn log_line(data: LogData) -> InboundEvent {
    InboundEvent::LogLine {
        stream: LogStream::from_wire(data.stream.as_deref()),
        sequence: data.sequence.unwrap_or(0),
        text: data.line,
    }
}

fn status(data: StatusData) -> Option<(MetricSample, StatusChange)> {
    let sample = MetricSample {
        cpu_percent: data.cpu.used.value()?,
        memory_used_mb: data.memory.used.value()?,
        memory_max_mb: data.memory.max.value()?,
        received_at: Utc::now(),
    };
    let status = StatusChange {
        running: data.info.status == RUNNING,
        address: data.info.ip,
    };
    Some((sample, status))
}

fn malformed(raw: &str, reason: &str) -> Vec<InboundEvent> {
    debug!("Malformed frame ({}): {}", reason, raw);
    vec![InboundEvent::Malformed {
        raw: raw.to_string(),
    }]
}
