//! Client-side structural validation of rule configs.
//!
//! Mirrors the backend's required-field checks so obvious mistakes are caught
//! before a test or save round trip. It is not a replacement: the backend
//! stays authoritative and may still reject a config accepted here, for
//! example one naming an unknown metric.
//!
//! Simple, Ratio and Change configs report only their first violation.
//! Composite configs report every violation, leaf violations indexed from 1.

use crate::error::RuleViolation;

use serde_json::{Map, Value};

use super::config::{ChangeRule, CompositeRule, LeafCondition, RatioRule, RuleConfig, RuleShape, SimpleRule, KEY_METRIC_TYPE};
use super::types::{Condition, MetricType, Minutes, ThresholdValue};

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// No violations.
    Valid,
    /// At least one violation.
    Invalid(Vec<RuleViolation>),
}

impl ValidationResult {
    /// True if no violations were found.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Violations found; empty when valid.
    #[must_use]
    pub fn violations(&self) -> &[RuleViolation] {
        match self {
            Self::Valid => &[],
            Self::Invalid(v) => v,
        }
    }

    /// Violation messages as shown to the user.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.violations().iter().map(ToString::to_string).collect()
    }

    /// `Ok(())` when valid, the violations otherwise.
    pub fn into_result(self) -> Result<(), Vec<RuleViolation>> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid(v) => Err(v),
        }
    }

    fn from_violations(violations: Vec<RuleViolation>) -> Self {
        if violations.is_empty() {
            Self::Valid
        } else {
            Self::Invalid(violations)
        }
    }
}

impl From<Result<(), RuleViolation>> for ValidationResult {
    fn from(r: Result<(), RuleViolation>) -> Self {
        match r {
            Ok(()) => Self::Valid,
            Err(v) => Self::Invalid(vec![v]),
        }
    }
}

/// Checks `config` for structural completeness. Never mutates it.
#[must_use]
pub fn validate(config: &RuleConfig) -> ValidationResult {
    match config {
        RuleConfig::Simple(rule) => validate_simple(rule).into(),
        RuleConfig::Composite(rule) => ValidationResult::from_violations(validate_composite(rule)),
        RuleConfig::Ratio(rule) => validate_ratio(rule).into(),
        RuleConfig::Change(rule) => validate_change(rule).into(),
    }
}

fn validate_simple(rule: &SimpleRule) -> Result<(), RuleViolation> {
    require_metric(rule.metric_type.as_ref())?;
    require_simple_shape(rule)?;
    require_condition(rule.condition.as_ref())?;
    require_threshold(rule.threshold_value.as_ref(), "thresholdValue")?;
    positive_if_present(rule.time_window_minutes.as_ref(), "timeWindowMinutes")?;
    positive_if_present(rule.cooldown_minutes.as_ref(), "cooldownMinutes")
}

/// A Simple rule must not carry a metric or key that reads back as
/// another shape.
fn require_simple_shape(rule: &SimpleRule) -> Result<(), RuleViolation> {
    let mut keys: Map<String, Value> = rule.extra.clone();
    if let Some(metric) = &rule.metric_type {
        keys.insert(KEY_METRIC_TYPE.to_string(), Value::String(metric.as_str().to_string()));
    }
    match RuleShape::infer(&keys) {
        RuleShape::Simple => Ok(()),
        shape => Err(RuleViolation::WrongShape { shape }),
    }
}

fn validate_composite(rule: &CompositeRule) -> Vec<RuleViolation> {
    let mut out = Vec::new();

    if rule.operator.is_none() {
        out.push(RuleViolation::missing("operator"));
    }

    if rule.conditions.is_empty() {
        out.push(RuleViolation::EmptyConditions);
        return out;
    }

    for (index, leaf) in rule.conditions.iter().enumerate() {
        out.extend(leaf_violations(leaf).into_iter().map(|v| RuleViolation::at(index, v)));
    }
    out
}

fn leaf_violations(leaf: &LeafCondition) -> Vec<RuleViolation> {
    [
        require_metric(leaf.metric_type.as_ref()),
        require_condition(leaf.condition.as_ref()),
        require_threshold(leaf.value.as_ref(), "value"),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect()
}

fn validate_ratio(rule: &RatioRule) -> Result<(), RuleViolation> {
    require_text(rule.numerator_event_type.as_deref(), "numeratorEventType")?;
    require_text(rule.denominator_event_type.as_deref(), "denominatorEventType")?;
    require_condition(rule.condition.as_ref())?;
    require_threshold(rule.threshold_value.as_ref(), "thresholdValue")
}

fn validate_change(rule: &ChangeRule) -> Result<(), RuleViolation> {
    // The metric is a change-family metric by construction.
    require_condition(rule.condition.as_ref())?;
    require_threshold(rule.threshold_value.as_ref(), "thresholdValue")
}

fn require_metric(metric: Option<&MetricType>) -> Result<(), RuleViolation> {
    match metric {
        Some(m) if !m.is_blank() => Ok(()),
        _ => Err(RuleViolation::missing("metricType")),
    }
}

fn require_condition(condition: Option<&Condition>) -> Result<(), RuleViolation> {
    match condition {
        Some(c) if !c.is_blank() => Ok(()),
        _ => Err(RuleViolation::missing("condition")),
    }
}

fn require_threshold(value: Option<&ThresholdValue>, field: &'static str) -> Result<(), RuleViolation> {
    match value {
        Some(v) if !v.is_blank() => Ok(()),
        _ => Err(RuleViolation::missing(field)),
    }
}

fn require_text(value: Option<&str>, field: &'static str) -> Result<(), RuleViolation> {
    match value {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(RuleViolation::missing(field)),
    }
}

fn positive_if_present(minutes: Option<&Minutes>, field: &'static str) -> Result<(), RuleViolation> {
    match minutes {
        Some(m) if m.positive().is_none() => Err(RuleViolation::not_positive(field)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::types::{ChangeMetric, CompositeOperator};
    use serde_json::json;

    fn messages(config: &RuleConfig) -> Vec<String> {
        validate(config).messages()
    }

    #[test]
    fn simple_valid() {
        let c = SimpleRule::new(MetricType::ErrorRate, Condition::GreaterThan, "5.0").into();
        assert_eq!(validate(&c), ValidationResult::Valid);
    }

    #[test]
    fn simple_missing_threshold() {
        let c = RuleConfig::Simple(SimpleRule {
            metric_type: Some(MetricType::ErrorRate),
            condition: Some(Condition::GreaterThan),
            ..SimpleRule::default()
        });
        assert_eq!(messages(&c), vec!["thresholdValue is required"]);
    }

    #[test]
    fn simple_is_fail_fast() {
        let c = RuleConfig::Simple(SimpleRule::default());
        assert_eq!(messages(&c), vec!["metricType is required"]);
    }

    #[test]
    fn empty_string_threshold_is_missing() {
        let c = SimpleRule::new(MetricType::ErrorRate, Condition::GreaterThan, "").into();
        assert_eq!(messages(&c), vec!["thresholdValue is required"]);
    }

    #[test]
    fn zero_is_a_valid_threshold() {
        let c = SimpleRule::new(MetricType::TotalErrors, Condition::Equals, 0.0).into();
        assert!(validate(&c).is_valid());
    }

    #[test]
    fn time_window_must_be_positive_integer() {
        for bad in [json!(0), json!(-1), json!(1.5), json!("5")] {
            let c = SimpleRule::new(MetricType::ErrorRate, Condition::GreaterThan, 5.0)
                .with_time_window(Minutes::from_value(bad).unwrap())
                .into();
            assert_eq!(messages(&c), vec!["timeWindowMinutes must be a positive integer"]);
        }
    }

    #[test]
    fn cooldown_must_be_positive_integer() {
        let c = SimpleRule::new(MetricType::ErrorRate, Condition::GreaterThan, 5.0)
            .with_time_window(5u64)
            .with_cooldown(Minutes::from_value(json!(0)).unwrap())
            .into();
        assert_eq!(messages(&c), vec!["cooldownMinutes must be a positive integer"]);
    }

    #[test]
    fn simple_rejects_metrics_of_other_shapes() {
        let change = RuleConfig::from(SimpleRule::new(MetricType::SpikeDetection, Condition::GreaterThan, "50"));
        assert_eq!(messages(&change), vec!["config describes a change rule, not a simple rule"]);

        let ratio = RuleConfig::from(SimpleRule::new(MetricType::EventRatio, Condition::LessThan, 0.5));
        assert_eq!(
            validate(&ratio).violations(),
            &[RuleViolation::WrongShape { shape: RuleShape::Ratio }]
        );

        let mut extra = SimpleRule::new(MetricType::ErrorRate, Condition::GreaterThan, 5.0);
        extra.extra.insert("operator".to_string(), json!("AND"));
        assert_eq!(
            validate(&extra.into()).violations(),
            &[RuleViolation::WrongShape { shape: RuleShape::Composite }]
        );
    }

    #[test]
    fn valid_simple_rule_keeps_its_shape_through_json() {
        let c = RuleConfig::from(
            SimpleRule::new(MetricType::from("QUEUE_DEPTH"), Condition::GreaterThan, 10.0).with_time_window(5u64),
        );
        assert!(validate(&c).is_valid());
        let back: RuleConfig = serde_json::from_value(serde_json::to_value(&c).unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn composite_empty_conditions() {
        let c = CompositeRule::new(CompositeOperator::And).into();
        assert_eq!(messages(&c), vec!["conditions array cannot be empty"]);
    }

    #[test]
    fn composite_collects_indexed_leaf_errors() {
        let c = CompositeRule::new(CompositeOperator::Or)
            .with_condition(LeafCondition::new(MetricType::ErrorRate, Condition::GreaterThan, 5.0))
            .with_condition(LeafCondition {
                metric_type: Some(MetricType::AvgLatency),
                ..LeafCondition::default()
            })
            .with_condition(LeafCondition {
                value: Some(ThresholdValue::text("")),
                ..LeafCondition::default()
            })
            .into();

        assert_eq!(
            messages(&c),
            vec![
                "condition 2: condition is required",
                "condition 2: value is required",
                "condition 3: metricType is required",
                "condition 3: condition is required",
                "condition 3: value is required",
            ]
        );
    }

    #[test]
    fn composite_missing_operator_is_reported() {
        let c = RuleConfig::Composite(CompositeRule {
            conditions: vec![LeafCondition::new(MetricType::ErrorRate, Condition::GreaterThan, 1.0)],
            ..CompositeRule::default()
        });
        assert_eq!(messages(&c), vec!["operator is required"]);
    }

    #[test]
    fn ratio_valid_and_missing_fields() {
        let ok = RatioRule::new("login.success", "login.attempt", Condition::LessThan, "0.8").into();
        assert!(validate(&ok).is_valid());

        let c = RuleConfig::Ratio(RatioRule {
            numerator_event_type: Some("login.success".into()),
            denominator_event_type: Some("  ".into()),
            ..RatioRule::default()
        });
        assert_eq!(messages(&c), vec!["denominatorEventType is required"]);
    }

    #[test]
    fn change_requires_threshold() {
        let ok = ChangeRule::new(ChangeMetric::SpikeDetection, Condition::GreaterThan, "50").into();
        assert!(validate(&ok).is_valid());

        let mut rule = ChangeRule::new(ChangeMetric::SpikeDetection, Condition::GreaterThan, "50");
        rule.threshold_value = None;
        assert_eq!(messages(&rule.into()), vec!["thresholdValue is required"]);
    }

    #[test]
    fn negative_change_threshold_is_valid() {
        let c = ChangeRule::new(ChangeMetric::ThroughputChange, Condition::LessThan, -30.0).into();
        assert!(validate(&c).is_valid());
    }

    #[test]
    fn validation_does_not_mutate() {
        let c: RuleConfig = CompositeRule::new(CompositeOperator::And).into();
        let before = c.clone();
        let _ = validate(&c);
        assert_eq!(c, before);
    }
}
