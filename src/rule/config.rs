//! Rule configuration: one closed sum type over the four rule shapes.
//!
//! The backend stores a rule config as a flat JSON object. Deserializing a
//! [`RuleConfig`] infers the shape from the keys present (see
//! [`RuleShape::infer`]); serializing emits the same flat object, so the form
//! editor and the raw JSON editor work on one value. Keys this crate does not
//! model are preserved per shape in `extra`.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::{ChangeMetric, CompositeOperator, Condition, MetricType, Minutes, ThresholdValue};

pub(crate) const KEY_METRIC_TYPE: &str = "metricType";
const KEY_OPERATOR: &str = "operator";
const KEY_CONDITIONS: &str = "conditions";
const KEY_NUMERATOR: &str = "numeratorEventType";
const KEY_DENOMINATOR: &str = "denominatorEventType";

/// Discriminant of a [`RuleConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleShape {
    /// Single metric against a threshold.
    Simple,
    /// Several leaf conditions joined by AND/OR.
    Composite,
    /// Ratio of two event-type counts.
    Ratio,
    /// Percent change of a metric.
    Change,
}

impl RuleShape {
    /// Infers the shape of a raw config object.
    ///
    /// Composite if `conditions` or `operator` is present; Ratio if either
    /// event-type key is present or the metric is `EVENT_RATIO`; Change if the
    /// metric is in the rate-of-change family; Simple otherwise.
    #[must_use]
    pub fn infer(raw: &Map<String, Value>) -> Self {
        if raw.contains_key(KEY_CONDITIONS) || raw.contains_key(KEY_OPERATOR) {
            return Self::Composite;
        }
        if raw.contains_key(KEY_NUMERATOR) || raw.contains_key(KEY_DENOMINATOR) {
            return Self::Ratio;
        }
        match raw.get(KEY_METRIC_TYPE).and_then(Value::as_str).map(MetricType::from_name) {
            Some(MetricType::EventRatio) => Self::Ratio,
            Some(m) if m.is_change() => Self::Change,
            _ => Self::Simple,
        }
    }
}

impl fmt::Display for RuleShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simple => "simple",
            Self::Composite => "composite",
            Self::Ratio => "ratio",
            Self::Change => "change",
        })
    }
}

/// Simple threshold rule.
///
/// A Simple rule whose metric is `EVENT_RATIO` or a rate-of-change metric
/// would be read back as a Ratio or Change rule, so the validator rejects it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleRule {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<MetricType>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_value: Option<ThresholdValue>,
    /// Evaluation window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window_minutes: Option<Minutes>,
    /// Only evaluate events from these sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_filter: Option<Vec<String>>,
    /// Only evaluate these event types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type_filter: Option<Vec<String>>,
    /// Minimum gap between two alerts from this rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_minutes: Option<Minutes>,
    /// Skip evaluation below this many events in the window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_events_to_evaluate: Option<u64>,
    /// Keys not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SimpleRule {
    /// Rule comparing `metric_type` against `threshold`.
    pub fn new(metric_type: MetricType, condition: Condition, threshold: impl Into<ThresholdValue>) -> Self {
        Self {
            metric_type: Some(metric_type),
            condition: Some(condition),
            threshold_value: Some(threshold.into()),
            ..Self::default()
        }
    }

    /// Sets the evaluation window.
    #[must_use]
    pub fn with_time_window(mut self, minutes: impl Into<Minutes>) -> Self {
        self.time_window_minutes = Some(minutes.into());
        self
    }

    /// Sets the cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, minutes: impl Into<Minutes>) -> Self {
        self.cooldown_minutes = Some(minutes.into());
        self
    }

    /// Restricts the rule to `sources`.
    #[must_use]
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_filter = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts the rule to `event_types`.
    #[must_use]
    pub fn with_event_types<I, S>(mut self, event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_type_filter = Some(event_types.into_iter().map(Into::into).collect());
        self
    }
}

/// One leaf of a composite rule.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<MetricType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ThresholdValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LeafCondition {
    /// Leaf comparing `metric_type` against `value`.
    pub fn new(metric_type: MetricType, condition: Condition, value: impl Into<ThresholdValue>) -> Self {
        Self {
            metric_type: Some(metric_type),
            condition: Some(condition),
            value: Some(value.into()),
            extra: Map::new(),
        }
    }
}

/// Composite boolean rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRule {
    /// How the leaves combine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<CompositeOperator>,
    /// Leaf conditions; must be non-empty.
    #[serde(default)]
    pub conditions: Vec<LeafCondition>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_filter: Option<Vec<String>>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_events_to_evaluate: Option<u64>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_minutes: Option<Minutes>,
    /// Keys not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompositeRule {
    /// Empty composite with `operator`.
    #[must_use]
    pub fn new(operator: CompositeOperator) -> Self {
        Self {
            operator: Some(operator),
            ..Self::default()
        }
    }

    /// Appends a leaf condition.
    #[must_use]
    pub fn with_condition(mut self, leaf: LeafCondition) -> Self {
        self.conditions.push(leaf);
        self
    }
}

/// Event ratio rule: `count(numerator) / count(denominator)` against a
/// threshold conventionally in `[0, 1]`.
///
/// Always serialized with `metricType: EVENT_RATIO`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatioRule {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numerator_event_type: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denominator_event_type: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_value: Option<ThresholdValue>,
    /// Skip evaluation below this many denominator events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_denominator_events: Option<u64>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window_minutes: Option<Minutes>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_minutes: Option<Minutes>,
    /// Keys not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RatioRule {
    /// Ratio of `numerator` to `denominator` compared against `threshold`.
    pub fn new(
        numerator: impl Into<String>,
        denominator: impl Into<String>,
        condition: Condition,
        threshold: impl Into<ThresholdValue>,
    ) -> Self {
        Self {
            numerator_event_type: Some(numerator.into()),
            denominator_event_type: Some(denominator.into()),
            condition: Some(condition),
            threshold_value: Some(threshold.into()),
            ..Self::default()
        }
    }
}

/// Rate-of-change rule. The threshold is a signed percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRule {
    #[allow(missing_docs)]
    pub metric_type: ChangeMetric,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_value: Option<ThresholdValue>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window_minutes: Option<Minutes>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_filter: Option<Vec<String>>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type_filter: Option<Vec<String>>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_minutes: Option<Minutes>,
    /// Keys not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChangeRule {
    /// Change of `metric` compared against `threshold` percent.
    pub fn new(metric: ChangeMetric, condition: Condition, threshold: impl Into<ThresholdValue>) -> Self {
        Self {
            metric_type: metric,
            condition: Some(condition),
            threshold_value: Some(threshold.into()),
            time_window_minutes: None,
            source_filter: None,
            event_type_filter: None,
            cooldown_minutes: None,
            extra: Map::new(),
        }
    }
}

/// A rule configuration in exactly one shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleConfig {
    #[allow(missing_docs)]
    Simple(SimpleRule),
    #[allow(missing_docs)]
    Composite(CompositeRule),
    #[allow(missing_docs)]
    Ratio(RatioRule),
    #[allow(missing_docs)]
    Change(ChangeRule),
}

impl RuleConfig {
    /// Which shape this config has.
    #[must_use]
    pub const fn shape(&self) -> RuleShape {
        match self {
            Self::Simple(_) => RuleShape::Simple,
            Self::Composite(_) => RuleShape::Composite,
            Self::Ratio(_) => RuleShape::Ratio,
            Self::Change(_) => RuleShape::Change,
        }
    }

    /// Decodes a raw config object, inferring its shape.
    pub fn from_map(mut raw: Map<String, Value>) -> Result<Self, serde_json::Error> {
        match RuleShape::infer(&raw) {
            RuleShape::Simple => serde_json::from_value(Value::Object(raw)).map(Self::Simple),
            RuleShape::Composite => serde_json::from_value(Value::Object(raw)).map(Self::Composite),
            RuleShape::Ratio => {
                // Re-emitted on serialize.
                raw.remove(KEY_METRIC_TYPE);
                serde_json::from_value(Value::Object(raw)).map(Self::Ratio)
            }
            RuleShape::Change => serde_json::from_value(Value::Object(raw)).map(Self::Change),
        }
    }

    /// The flat JSON object the backend expects.
    pub fn to_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            // Every shape serializes as a struct.
            other => Err(de::Error::custom(format!("rule config serialized to non-object {other}"))),
        }
    }
}

impl From<SimpleRule> for RuleConfig {
    fn from(rule: SimpleRule) -> Self {
        Self::Simple(rule)
    }
}

impl From<CompositeRule> for RuleConfig {
    fn from(rule: CompositeRule) -> Self {
        Self::Composite(rule)
    }
}

impl From<RatioRule> for RuleConfig {
    fn from(rule: RatioRule) -> Self {
        Self::Ratio(rule)
    }
}

impl From<ChangeRule> for RuleConfig {
    fn from(rule: ChangeRule) -> Self {
        Self::Change(rule)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RatioWire<'a> {
    metric_type: MetricType,
    #[serde(flatten)]
    rule: &'a RatioRule,
}

impl Serialize for RuleConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Simple(rule) => rule.serialize(serializer),
            Self::Composite(rule) => rule.serialize(serializer),
            Self::Ratio(rule) => RatioWire {
                metric_type: MetricType::EventRatio,
                rule,
            }
            .serialize(serializer),
            Self::Change(rule) => rule.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for RuleConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        Self::from_map(raw).map_err(de::Error::custom)
    }
}
