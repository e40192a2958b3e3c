//! Alert-rule configuration model, validator and submission flow.

/// Rule shapes and shape inference.
pub mod config;
/// Name, severity and the draft type.
pub mod metadata;
/// Raw JSON helpers.
pub mod serialization;
/// Backend wire types and submitter.
pub mod submission;
/// Leaf value types.
pub mod types;
/// Structural validator.
pub mod validation;

pub use config::{ChangeRule, CompositeRule, LeafCondition, RatioRule, RuleConfig, RuleShape, SimpleRule};
pub use metadata::{RuleDraft, RuleMetadata, RuleStatus, RuleType, Severity};
pub use serialization::{from_json, from_value, to_json_pretty};
pub use submission::{
    rule_path, CreateRuleRequest, RuleAction, RuleBackend, RuleResponse, RuleSubmitter, RuleTestResult,
    TestRuleRequest, UpdateRuleRequest, RULES_PATH, RULE_TEST_PATH,
};
pub use types::{ChangeMetric, CompositeOperator, Condition, MetricType, Minutes, ThresholdValue};
pub use validation::{validate, ValidationResult};
