//! Blocking connection seam used by the runtime's reader threads.

use crate::error::TransportError;

/// One frame read from a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
    /// The remote side closed normally.
    Closed,
}

/// Opens blocking connections to a metrics endpoint.
pub trait Connector: Send + Sync + 'static {
    /// Connection type produced by this connector.
    type Connection: Connection;

    /// Connects and completes the handshake, blocking until done.
    fn connect(&self, endpoint: &str) -> Result<Self::Connection, TransportError>;
}

/// A live, blocking connection.
pub trait Connection: Send + 'static {
    /// Waits for the next frame.
    ///
    /// Must return `Ok(None)` periodically when idle so the reader can notice
    /// that the connection was abandoned. Abnormal closes are errors.
    fn recv(&mut self) -> Result<Option<Frame>, TransportError>;

    /// Closes the connection; best-effort.
    fn close(&mut self);
}
