//! Finite State Machine for the channel connection

use crate::transport::ConnectionState;

/// Channel transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Consumer opened the channel
    Connect,

    /// Socket handshake completed
    SocketOpened,

    /// Connect attempt failed
    ConnectFailed,

    /// Socket errored or the remote closed it
    SocketLost,

    /// Reconnect delay elapsed
    RetryElapsed,

    /// Consumer asked for teardown
    CloseRequested,

    /// Teardown finished
    Closed,
}

/// Channel FSM
#[derive(Debug, Clone)]
pub struct ChannelFsm {
    state: ConnectionState,
    terminal: bool,
}

impl ChannelFsm {
    /// Create a new FSM in disconnected state
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            terminal: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True once the consumer closed the channel; no reconnect follows
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Process a transition and return the new state
    pub fn process(&mut self, transition: Transition) -> Result<ConnectionState, String> {
        use ConnectionState::*;

        if self.terminal {
            // Repeated teardown is a no-op
            return match transition {
                Transition::CloseRequested | Transition::Closed => Ok(self.state),
                _ => Err(format!(
                    "Invalid transition: {:?} -> {:?} (channel closed)",
                    self.state, transition
                )),
            };
        }

        let new_state = match (self.state, transition) {
            (Disconnected, Transition::Connect) => Connecting,
            (Disconnected, Transition::RetryElapsed) => Connecting,

            (Connecting, Transition::SocketOpened) => Open,
            (Connecting, Transition::ConnectFailed) => Disconnected,

            (Open, Transition::SocketLost) => Disconnected,

            (Disconnected | Connecting | Open, Transition::CloseRequested) => Closing,
            (Closing, Transition::CloseRequested) => Closing,
            (Closing, Transition::Closed) => {
                self.terminal = true;
                Disconnected
            }

            (state, transition) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, transition));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for ChannelFsm {
    fn default() -> Self {
        Self::new()
    }
}
