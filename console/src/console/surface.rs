//! Consumption contract of a console rendering surface

use crate::buffer::{MetricsAggregator, RollingLogBuffer};
use crate::console::events::StatusChange;
use crate::transport::{ChannelIdentity, ConnectionState};

/// Read-only view of the console state handed to a paint
#[derive(Debug, Clone, Copy)]
pub struct ConsoleView<'a> {
    pub identity: &'a ChannelIdentity,
    pub connection: ConnectionState,
    pub status: Option<&'a StatusChange>,
    pub logs: &'a RollingLogBuffer,
    pub metrics: &'a MetricsAggregator,
}

impl ConsoleView<'_> {
    /// Whether the remote server reports itself running
    pub fn is_online(&self) -> bool {
        self.status.map(|status| status.running).unwrap_or(false)
    }

    /// Address reported by the server, `0.0.0.0` until one is known
    pub fn address(&self) -> &str {
        self.status
            .map(|status| status.address.as_str())
            .filter(|address| !address.is_empty())
            .unwrap_or("0.0.0.0")
    }
}

/// Something that displays a console.
///
/// `paint` is driven by the render scheduler; the other hooks are called
/// synchronously from the dispatch path and must not block.
///
/// Every hook receives `at`, the id the next log line will get. A surface
/// that shows messages inline with the log puts the message right before
/// that line.
pub trait ConsoleSurface {
    /// Render the latest state
    fn paint(&mut self, view: &ConsoleView<'_>);

    /// A frame that could not be decoded
    fn diagnostic(&mut self, at: u64, raw: &str);

    /// The remote reported a different running state or address
    fn status_changed(&mut self, _at: u64, _status: &StatusChange) {}

    /// The channel changed state
    fn connection_changed(&mut self, _at: u64, _state: ConnectionState) {}

    /// Local feedback for the operator, e.g. a command that was not sent
    fn notice(&mut self, _at: u64, _message: &str) {}
}
