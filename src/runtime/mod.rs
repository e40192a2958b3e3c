//! Threaded runtime for the metrics stream client.
//!
//! [`StreamRuntime::start`] moves a [`StreamClient`](crate::stream::StreamClient)
//! onto a worker thread and returns a [`StreamHandle`]. Connections come from
//! a [`Connector`]; the `websocket` feature provides one over `tungstenite`.

/// Blocking connection seam.
pub mod connector;
/// Worker thread and handle.
pub mod worker;

#[cfg(feature = "websocket")]
/// WebSocket connector.
pub mod websocket;

pub use connector::{Connection, Connector, Frame};
pub use worker::{StreamHandle, StreamRuntime, StreamStatus};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};
