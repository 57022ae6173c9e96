//! Duplex stream transport
//!
//! The [`Connector`] / [`Connection`] traits separate the socket from the
//! channel state machine so the reconnect logic runs the same against a
//! websocket or an in-memory fake.

pub mod channel;
pub mod fsm;
pub mod timer;
pub mod ws;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use channel::{ChannelEvent, ChannelHandle, ChannelRegistry, Options};
pub use fsm::{ChannelFsm, Transition};
pub use timer::{ReconnectTimer, MIN_RECONNECT_DELAY};

/// Opaque key of the remote process a stream belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelIdentity(String);

impl ChannelIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelIdentity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Connection state of a channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
        };
        f.write_str(label)
    }
}

/// Transport-level failure; recovered by the reconnect loop
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid endpoint: {0}")]
    Endpoint(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connect timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Connection closed")]
    Closed,
}

/// Returned by `send` when the channel is not open
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Channel not connected (state: {state})")]
pub struct NotConnected {
    pub state: ConnectionState,
}

/// An established duplex connection carrying text frames
#[async_trait]
pub trait Connection: Send {
    /// Next inbound frame; `None` once the remote closed the stream
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens connections to the stream endpoint of an identity
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(
        &self,
        identity: &ChannelIdentity,
    ) -> Result<Box<dyn Connection>, TransportError>;
}
