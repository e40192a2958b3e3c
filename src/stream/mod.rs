//! Real-time metrics stream client.
//!
//! The client keeps one live connection to the metrics source, exposes the
//! latest snapshot plus connection state to subscribers, and recovers from
//! failures through the reconnection policy. Driving it against a real
//! network lives in [`crate::runtime`].

/// Sans-IO client core.
pub mod client;
/// Inbound message envelope and decoding.
pub mod message;
/// Latest metrics aggregate.
pub mod snapshot;
/// Listener registry.
pub mod subscribers;
/// Transport and timer seams.
pub mod transport;

pub use client::StreamClient;
pub use message::{decode_binary, decode_text, Inbound, StreamMessage, METRICS_UPDATE};
pub use snapshot::MetricsSnapshot;
pub use subscribers::{Listener, SubscriberRegistry, Subscription, SubscriptionId};
pub use transport::{ConnectionId, RetryScheduler, RetryToken, Transport, TransportEvent};
