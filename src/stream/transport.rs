//! Seams between the stream client and the outside world.
//!
//! The client never blocks and never sleeps. It asks a [`Transport`] to open
//! or close connections and a [`RetryScheduler`] to arm or cancel the single
//! retry timer. Outcomes come back through
//! [`StreamClient::handle_transport_event`](super::StreamClient::handle_transport_event)
//! and [`StreamClient::handle_retry_due`](super::StreamClient::handle_retry_due).

use std::fmt;
use std::time::Duration;

use crate::error::TransportError;

/// Generation number of one opened connection.
///
/// Events tagged with an id other than the client's active connection come
/// from an abandoned transport and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw generation number.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw generation number.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Identifies one scheduled retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryToken(u64);

impl RetryToken {
    /// Wraps a raw token.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw token.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Something that happened on a transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed; the stream is live.
    Opened,
    /// A text frame arrived.
    Text(String),
    /// A binary frame arrived.
    Binary(Vec<u8>),
    /// The remote side closed the connection normally.
    Closed,
    /// The handshake failed or the live connection broke.
    Failed(TransportError),
}

/// Opens and closes stream connections.
pub trait Transport {
    /// Starts opening a connection to `endpoint`.
    ///
    /// Completion is reported later as [`TransportEvent::Opened`] or
    /// [`TransportEvent::Failed`] for `id`. An `Err` here means the attempt
    /// could not even be started and counts as a handshake failure.
    fn open(&mut self, endpoint: &str, id: ConnectionId) -> Result<(), TransportError>;

    /// Closes or abandons connection `id`. Must tolerate unknown or already
    /// closed ids.
    fn close(&mut self, id: ConnectionId);
}

/// Arms and cancels the retry timer.
pub trait RetryScheduler {
    /// Arms a timer that reports `token` after `delay`.
    fn schedule(&mut self, token: RetryToken, delay: Duration);

    /// Disarms `token`. Must tolerate tokens that already fired.
    fn cancel(&mut self, token: RetryToken);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, endpoint: &str, id: ConnectionId) -> Result<(), TransportError> {
        (**self).open(endpoint, id)
    }

    fn close(&mut self, id: ConnectionId) {
        (**self).close(id);
    }
}

impl<S: RetryScheduler + ?Sized> RetryScheduler for Box<S> {
    fn schedule(&mut self, token: RetryToken, delay: Duration) {
        (**self).schedule(token, delay);
    }

    fn cancel(&mut self, token: RetryToken) {
        (**self).cancel(token);
    }
}
