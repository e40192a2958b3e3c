//! The latest metrics aggregate delivered by the stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque, backend-defined metrics aggregate.
///
/// The client never merges snapshots: each update replaces the previous one.
/// The accessors below only read well-known paths and never validate the
/// rest of the payload.
///
/// Equality compares the payload and server timestamp only; the local
/// receive time is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
    received_at: DateTime<Utc>,
}

impl PartialEq for MetricsSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload && self.timestamp == other.timestamp
    }
}

impl MetricsSnapshot {
    /// Wraps a payload received now.
    #[must_use]
    pub fn new(payload: Value, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            payload,
            timestamp,
            received_at: Utc::now(),
        }
    }

    /// Raw payload as sent by the backend.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Consumes the snapshot and returns the raw payload.
    #[must_use]
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Server-side timestamp of the message, if it carried one.
    #[must_use]
    pub const fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// When the client decoded this snapshot.
    #[must_use]
    pub const fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Looks up a value by JSON pointer (e.g. `/summary/totalEvents`).
    #[must_use]
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        self.payload.pointer(pointer)
    }

    /// `summary.totalEvents`, when present and numeric.
    #[must_use]
    pub fn total_events(&self) -> Option<u64> {
        self.get("/summary/totalEvents").and_then(Value::as_u64)
    }

    /// `summary.systemHealth` ("healthy", "degraded", "critical").
    #[must_use]
    pub fn system_health(&self) -> Option<&str> {
        self.get("/summary/systemHealth").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_summary_fields() {
        let snap = MetricsSnapshot::new(
            json!({"summary": {"totalEvents": 42, "systemHealth": "degraded"}}),
            None,
        );
        assert_eq!(snap.total_events(), Some(42));
        assert_eq!(snap.system_health(), Some("degraded"));
        assert_eq!(snap.get("/summary/totalEvents"), Some(&json!(42)));
    }

    #[test]
    fn missing_paths_are_none() {
        let snap = MetricsSnapshot::new(json!({"throughput": {}}), None);
        assert_eq!(snap.total_events(), None);
        assert_eq!(snap.system_health(), None);
        assert!(snap.get("/anomalies/0").is_none());
    }

    #[test]
    fn equality_ignores_receive_time() {
        let sent = Utc::now();
        let a = MetricsSnapshot::new(json!({"summary": {"totalEvents": 1}}), Some(sent));
        let mut b = a.clone();
        b.received_at = sent + chrono::Duration::seconds(5);
        assert_eq!(a, b);

        let c = MetricsSnapshot::new(json!({"summary": {"totalEvents": 2}}), Some(sent));
        assert_ne!(a, c);
    }

    #[test]
    fn into_payload_returns_untouched_value() {
        let payload = json!({"eventsByType": {"login": {"count": 3}}, "custom": [1, 2]});
        let snap = MetricsSnapshot::new(payload.clone(), Some(Utc::now()));
        assert!(snap.timestamp().is_some());
        assert_eq!(snap.into_payload(), payload);
    }
}
