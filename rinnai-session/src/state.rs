//! Connection state machine
//!
//! Tracks the lifecycle of the TCP session so operations are only
//! performed in the right state.
//!
//! # State Transitions
//! ```text
//! Disconnected -> Connecting (on connect())
//! Connecting   -> Connected  (first status received)
//! Connected    -> Error      (socket error / idle timeout)
//! Error        -> Connecting (reconnect cycle)
//! Connected    -> Closing    (deliberate shutdown)
//! Closing      -> Disconnected
//! ```

use rinnai_core::{RinnaiError, RinnaiResult};

/// Connection state of the session transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; initial state and the result of a deliberate close.
    #[default]
    Disconnected,
    /// Address resolution and TCP connect in progress.
    Connecting,
    /// Socket open and the first status snapshot received.
    Connected,
    /// Deliberate shutdown in progress.
    Closing,
    /// Socket torn down after a failure; a reconnect cycle follows.
    Error,
}

impl ConnectionState {
    /// Whether commands can be written in this state.
    pub fn can_write(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Whether the connection is fully established.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Validate a transition to `new_state`.
    ///
    /// Self-transitions are permitted so that idempotent operations
    /// (repeated close, repeated error) need no special casing.
    pub fn validate_transition(&self, new_state: ConnectionState) -> RinnaiResult<()> {
        use ConnectionState::*;

        let valid = match (*self, new_state) {
            (Disconnected, Connecting) => true,
            (Connecting, Connected) => true,
            (Connecting, Error) => true,
            (Connecting, Disconnected) => true,
            (Connected, Closing) => true,
            (Connected, Error) => true,
            (Closing, Disconnected) => true,
            (Error, Connecting) => true,
            (Error, Disconnected) => true,
            (a, b) if a == b => true,
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            Err(RinnaiError::InvalidData(format!(
                "Invalid connection state transition: {:?} -> {:?}",
                self, new_state
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Closing => "Closing",
            ConnectionState::Error => "Error",
        }
    }
}
