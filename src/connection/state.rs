//! Connection lifecycle state machine.
//!
//! The machine has no terminal state. It only encodes which transitions are
//! legal; side effects (opening transports, scheduling retries) belong to
//! the stream client.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InvalidTransition;

/// Health of the metrics stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// A handshake is in flight.
    Connecting,
    /// The stream is live.
    Connected,
    /// Closed cleanly, torn down, or retries exhausted.
    Disconnected,
    /// The last connection failed.
    Error,
    /// A retry is scheduled.
    Reconnecting,
}

impl ConnectionState {
    /// True for states where the rendering layer should offer a manual retry.
    #[must_use]
    pub const fn offers_retry(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }

    /// True while a connection attempt is pending or in flight.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Error => "ERROR",
            Self::Reconnecting => "RECONNECTING",
        };
        f.write_str(s)
    }
}

/// Inputs that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionEvent {
    /// Owner or user asked for a (re)connect.
    ConnectRequested,
    /// Transport handshake completed.
    HandshakeSucceeded,
    /// Transport handshake failed.
    HandshakeFailed,
    /// Remote side closed the connection cleanly.
    ClosedCleanly,
    /// Abnormal close or transport-level failure on a live connection.
    TransportFailed,
    /// The reconnection policy scheduled a retry.
    RetryScheduled,
    /// A scheduled retry fired and a new handshake begins.
    RetryStarted,
    /// The reconnection policy reached its attempt ceiling.
    RetriesExhausted,
    /// The owner tore the client down.
    TornDown,
}

/// A legal transition that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before the event.
    pub from: ConnectionState,
    /// State after the event.
    pub to: ConnectionState,
}

impl Transition {
    /// True if the visible state changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Tracks the current [`ConnectionState`] and enforces the transition table.
#[derive(Debug, Clone)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateMachine {
    /// A machine that has not opened anything yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Computes the target state for `event` without applying it.
    pub fn next(state: ConnectionState, event: ConnectionEvent) -> Result<ConnectionState, InvalidTransition> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        let to = match (state, event) {
            (_, E::ConnectRequested) => S::Connecting,
            (_, E::TornDown) => S::Disconnected,
            (S::Connecting, E::HandshakeSucceeded) => S::Connected,
            (S::Connecting, E::HandshakeFailed) => S::Error,
            (S::Connected, E::ClosedCleanly) => S::Disconnected,
            (S::Connected, E::TransportFailed) => S::Error,
            (S::Error | S::Disconnected, E::RetryScheduled) => S::Reconnecting,
            (S::Error | S::Disconnected, E::RetriesExhausted) => S::Disconnected,
            (S::Reconnecting, E::RetryStarted) => S::Connecting,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(to)
    }

    /// Applies `event`. On error the state is left unchanged.
    pub fn apply(&mut self, event: ConnectionEvent) -> Result<Transition, InvalidTransition> {
        let from = self.state;
        let to = Self::next(from, event)?;
        self.state = to;
        Ok(Transition { from, to })
    }
}
