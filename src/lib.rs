//! # eventara-client - Dashboard core for the Eventara event platform
//!
//! Two services sit under the dashboard's rendering layer:
//!
//! - a **real-time metrics stream client** that keeps one live connection to
//!   the metrics source, reports connection health through an explicit state
//!   machine and recovers from failures with bounded exponential backoff;
//! - an **alert-rule model and validator** covering four rule shapes (simple
//!   threshold, composite, event ratio, rate of change) that checks rules
//!   before they are tested or saved against the rule backend.
//!
//! ## Core Concepts
//!
//! - **`StreamClient`**: sans-IO client core; transport and timer are seams
//! - **`StreamRuntime`**: runs a client on a worker thread behind a cloneable handle
//! - **`RuleConfig`**: closed sum type over the rule shapes, inferred from raw JSON
//! - **`validate`**: pure structural check mirroring the backend
//!
//! ## Usage
//!
//! ```rust,ignore
//! use eventara_client::{StreamConfig, StreamRuntime, WebSocketConnector};
//!
//! let config = StreamConfig::from_json_file("stream.json")?;
//! let handle = StreamRuntime::start(&config, WebSocketConnector::new())?;
//! let _sub = handle.subscribe(|state, snapshot| {
//!     println!("{state}: {:?}", snapshot.and_then(|s| s.total_events()));
//! });
//!
//! let rule = eventara_client::rule::from_json(r#"{"metricType":"ERROR_RATE","condition":"GREATER_THAN","thresholdValue":5}"#)?;
//! assert!(eventara_client::validate(&rule).is_valid());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod connection;
pub mod error;
pub mod rule;
pub mod runtime;
pub mod stream;

pub use config::StreamConfig;
pub use connection::{ConnectionEvent, ConnectionState, ConnectionStateMachine, ReconnectPolicy, Transition};
pub use error::{
    BackendError, ClientError, ClientResult, ConfigError, DecodeError, InvalidTransition, RuleDecodeError,
    RuleViolation, SubmitError, TransportError,
};
pub use rule::{
    validate, ChangeRule, CompositeRule, LeafCondition, RatioRule, RuleBackend, RuleConfig, RuleDraft, RuleMetadata,
    RuleShape, RuleSubmitter, SimpleRule, ValidationResult,
};
pub use runtime::{Connection, Connector, Frame, StreamHandle, StreamRuntime, StreamStatus};
pub use stream::{MetricsSnapshot, StreamClient, Subscription};

#[cfg(feature = "websocket")]
pub use runtime::{WebSocketConnection, WebSocketConnector};
