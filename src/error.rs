//! Error types for the Eventara client.
//!
//! All errors are strongly typed using thiserror. Transport and decode
//! failures never reach stream subscribers (they only observe state
//! transitions); they surface here for logging and for the runtime.

use thiserror::Error;

use crate::connection::{ConnectionEvent, ConnectionState};
use crate::rule::RuleShape;

/// Transport errors raised while opening or reading a stream connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        message: String,
    },

    #[error("Handshake failed: {message}")]
    HandshakeFailed {
        message: String,
    },

    #[error("I/O error: {message}")]
    Io {
        message: String,
    },

    #[error("Connection closed abnormally (code {code:?}): {reason}")]
    Closed {
        code: Option<u16>,
        reason: String,
    },

    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
    },
}

impl TransportError {
    /// Returns true if reconnecting could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Protocol { .. })
    }
}

/// Errors decoding an inbound stream message.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Inbound message is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Inbound message is not valid UTF-8")]
    Utf8,

    #[error("Inbound message has an empty type")]
    EmptyType,

    #[error("Metrics update payload is not a JSON object")]
    PayloadNotObject,
}

/// A state-machine event that is not allowed from the current state.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Invalid connection transition: {event:?} while {from}")]
pub struct InvalidTransition {
    /// State the machine was in.
    pub from: ConnectionState,
    /// Event that was rejected.
    pub event: ConnectionEvent,
}

/// Errors loading or validating stream configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {reason}")]
    Invalid {
        reason: String,
    },
}

/// A structural problem found by the rule validator.
///
/// The display strings are the exact messages shown next to rule fields.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleViolation {
    #[error("{field} is required")]
    MissingField {
        field: &'static str,
    },

    #[error("{field} must be a positive integer")]
    NotPositiveInteger {
        field: &'static str,
    },

    #[error("conditions array cannot be empty")]
    EmptyConditions,

    #[error("config describes a {shape} rule, not a simple rule")]
    WrongShape {
        /// Shape the config would be read back as.
        shape: RuleShape,
    },

    #[error("condition {}: {violation}", .index + 1)]
    Condition {
        /// Zero-based position in the composite `conditions` array.
        index: usize,
        violation: Box<RuleViolation>,
    },
}

impl RuleViolation {
    pub(crate) const fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    pub(crate) const fn not_positive(field: &'static str) -> Self {
        Self::NotPositiveInteger { field }
    }

    pub(crate) fn at(index: usize, violation: Self) -> Self {
        Self::Condition {
            index,
            violation: Box::new(violation),
        }
    }
}

/// Errors decoding a raw (structured) rule configuration.
#[derive(Debug, Error)]
pub enum RuleDecodeError {
    #[error("Rule configuration must be a JSON object")]
    NotAnObject,

    #[error("Invalid rule configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejection or failure reported by the rule backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend refused the rule; messages are passed through verbatim.
    #[error("Backend rejected rule (status {status}): {message}")]
    Rejected {
        status: u16,
        message: String,
        errors: Vec<String>,
    },

    #[error("Rule not found: {id}")]
    NotFound {
        id: i64,
    },

    #[error("Backend unavailable: {message}")]
    Unavailable {
        message: String,
    },
}

/// Errors returned by rule test/save submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// Local validation failed; nothing was sent.
    #[error("Rule is invalid: {}", join_violations(.0))]
    Invalid(Vec<RuleViolation>),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

fn join_violations(violations: &[RuleViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Top-level error type for the Eventara client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rule decode error: {0}")]
    RuleDecode(#[from] RuleDecodeError),

    #[error("Submit error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Stream runtime is shut down")]
    RuntimeClosed,

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ClientError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a transport error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if retrying the same operation could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Submit(SubmitError::Backend(BackendError::Unavailable { .. })) => true,
            _ => false,
        }
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
