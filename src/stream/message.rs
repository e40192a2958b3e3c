//! Inbound stream message envelope.
//!
//! Every frame is a JSON object `{ type, payload, timestamp }`. Only
//! [`METRICS_UPDATE`] carries a snapshot; other types are recognized as
//! well-formed but ignored by the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;

use super::snapshot::MetricsSnapshot;

/// The only message type that carries a metrics snapshot.
pub const METRICS_UPDATE: &str = "METRICS_UPDATE";

/// Wire envelope for every inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    /// Message discriminator.
    #[serde(rename = "type")]
    pub message_type: String,

    /// Type-specific body.
    #[serde(default)]
    pub payload: Value,

    /// ISO-8601 send time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl StreamMessage {
    /// Builds a metrics update message stamped with the current time.
    #[must_use]
    pub fn metrics_update(payload: Value) -> Self {
        Self {
            message_type: METRICS_UPDATE.to_string(),
            payload,
            timestamp: Some(Utc::now()),
        }
    }

    /// Serializes the envelope to a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Decoded meaning of an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A replacement snapshot.
    MetricsUpdate(MetricsSnapshot),
    /// A well-formed message of a type this client does not handle.
    Ignored {
        /// The unrecognized type.
        message_type: String,
    },
}

/// Decodes a text frame.
pub fn decode_text(text: &str) -> Result<Inbound, DecodeError> {
    let msg: StreamMessage = serde_json::from_str(text)?;
    classify(msg)
}

/// Decodes a binary frame holding UTF-8 JSON.
pub fn decode_binary(bytes: &[u8]) -> Result<Inbound, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::Utf8)?;
    decode_text(text)
}

fn classify(msg: StreamMessage) -> Result<Inbound, DecodeError> {
    if msg.message_type.trim().is_empty() {
        return Err(DecodeError::EmptyType);
    }
    if msg.message_type == METRICS_UPDATE {
        if !msg.payload.is_object() {
            return Err(DecodeError::PayloadNotObject);
        }
        return Ok(Inbound::MetricsUpdate(MetricsSnapshot::new(msg.payload, msg.timestamp)));
    }
    Ok(Inbound::Ignored {
        message_type: msg.message_type,
    })
}
