//! Raw JSON editing helpers for rule configs.
//!
//! The raw editor and the form editor share one [`RuleConfig`] value; these
//! helpers convert between it and the text in the raw editor.

use serde_json::Value;

use crate::error::RuleDecodeError;

use super::config::RuleConfig;

/// Serialize a rule config to pretty JSON.
pub fn to_json_pretty(config: &RuleConfig) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(config)
}

/// Parse raw editor text into a rule config, inferring its shape.
///
/// Callers should then run [`validate`](super::validate) before submitting.
pub fn from_json(s: &str) -> Result<RuleConfig, RuleDecodeError> {
    from_value(serde_json::from_str(s)?)
}

/// Decode an already-parsed JSON value.
pub fn from_value(value: Value) -> Result<RuleConfig, RuleDecodeError> {
    match value {
        Value::Object(map) => Ok(RuleConfig::from_map(map)?),
        _ => Err(RuleDecodeError::NotAnObject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::config::{CompositeRule, LeafCondition};
    use crate::rule::types::{CompositeOperator, Condition, MetricType};

    #[test]
    fn json_roundtrip_works() {
        let config: RuleConfig = CompositeRule::new(CompositeOperator::And)
            .with_condition(LeafCondition::new(MetricType::ErrorRate, Condition::GreaterThan, 5.0))
            .with_condition(LeafCondition::new(MetricType::P95Latency, Condition::GreaterThan, "500"))
            .into();

        let json = to_json_pretty(&config).unwrap();
        assert_eq!(from_json(&json).unwrap(), config);
    }

    #[test]
    fn non_object_rejected() {
        assert!(matches!(from_json("[1, 2]"), Err(RuleDecodeError::NotAnObject)));
        assert!(matches!(from_json("\"ERROR_RATE\""), Err(RuleDecodeError::NotAnObject)));
    }

    #[test]
    fn malformed_text_is_json_error() {
        assert!(matches!(from_json("{\"metricType\": "), Err(RuleDecodeError::Json(_))));
    }
}
