//! Stream runtime configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::ReconnectPolicy;
use crate::error::ConfigError;

/// Configuration for [`StreamRuntime`](crate::runtime::StreamRuntime).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    /// Metrics stream endpoint, e.g. `ws://localhost:8080/ws`.
    pub url: String,
    /// Backoff between automatic reconnect attempts.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    /// How often idle readers and the worker wake up, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Max queued commands from handles before callers block.
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,
    /// Max queued transport events before reader threads block.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

const fn default_poll_interval_ms() -> u64 {
    100
}

const fn default_command_queue_capacity() -> usize {
    64
}

const fn default_event_queue_capacity() -> usize {
    1024
}

impl StreamConfig {
    /// Config for `url` with every other field at its default.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectPolicy::default(),
            poll_interval_ms: default_poll_interval_ms(),
            command_queue_capacity: default_command_queue_capacity(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }

    /// Replaces the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Checks the config for values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(invalid("url must not be empty"));
        }
        if self.reconnect.base_delay_ms == 0 {
            return Err(invalid("reconnect.baseDelayMs must be > 0"));
        }
        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(invalid("reconnect.maxDelayMs must be >= reconnect.baseDelayMs"));
        }
        if self.reconnect.multiplier.is_nan() || self.reconnect.multiplier < 1.0 {
            return Err(invalid("reconnect.multiplier must be >= 1.0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("pollIntervalMs must be > 0"));
        }
        Ok(())
    }

    /// Poll interval as a `Duration`.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = StreamConfig::from_json_str(r#"{"url": "ws://localhost:8080/ws"}"#).unwrap();
        assert_eq!(cfg, StreamConfig::new("ws://localhost:8080/ws"));
        assert_eq!(cfg.reconnect.base_delay_ms, 1_000);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn nested_reconnect_policy_is_camel_case() {
        let cfg = StreamConfig::from_json_str(
            r#"{"url": "ws://h/ws", "reconnect": {"baseDelayMs": 500, "maxDelayMs": 4000, "maxAttempts": 3}}"#,
        )
        .unwrap();
        assert_eq!(cfg.reconnect.base_delay_ms, 500);
        assert_eq!(cfg.reconnect.max_delay_ms, 4_000);
        assert_eq!(cfg.reconnect.max_attempts, Some(3));
        assert!((cfg.reconnect.multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_url_is_a_parse_error() {
        let err = StreamConfig::from_json_str("{}").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn blank_url_rejected() {
        let err = StreamConfig::from_json_str(r#"{"url": "  "}"#).unwrap_err();
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn inverted_delays_rejected() {
        let err = StreamConfig::from_json_str(
            r#"{"url": "ws://h/ws", "reconnect": {"baseDelayMs": 5000, "maxDelayMs": 1000}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("maxDelayMs"));
    }

    #[test]
    fn shrinking_multiplier_rejected() {
        let err = StreamConfig::from_json_str(r#"{"url": "ws://h/ws", "reconnect": {"multiplier": 0.5}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("multiplier"));
    }

    #[test]
    fn load_from_file_works() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.json");
        std::fs::write(&path, r#"{"url": "ws://s/ws", "pollIntervalMs": 25}"#).unwrap();
        let cfg = StreamConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.url, "ws://s/ws");
        assert_eq!(cfg.poll_interval_ms, 25);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StreamConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
