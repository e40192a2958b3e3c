//! Connection health tracking.
//!
//! The state machine decides which lifecycle transitions are legal; the
//! policy decides how long to wait before the next automatic attempt.

/// Reconnection backoff policy.
pub mod policy;
/// Lifecycle state machine.
pub mod state;

pub use policy::ReconnectPolicy;
pub use state::{ConnectionEvent, ConnectionState, ConnectionStateMachine, Transition};
