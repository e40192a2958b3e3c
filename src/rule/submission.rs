//! Rule API wire types and the validate-then-submit flow.
//!
//! The backend is the system of record. [`RuleSubmitter`] runs the local
//! validator before every test or save call and never contacts the backend
//! with a config that fails it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{BackendError, RuleDecodeError, SubmitError};

use super::config::RuleConfig;
use super::metadata::{RuleDraft, RuleMetadata, RuleStatus, RuleType, Severity};
use super::validation::{validate, ValidationResult};

/// Collection path of the rule API.
pub const RULES_PATH: &str = "/api/v1/rules";

/// Dry-run path of the rule API.
pub const RULE_TEST_PATH: &str = "/api/v1/rules/test";

/// Path of one rule.
#[must_use]
pub fn rule_path(id: i64) -> String {
    format!("{RULES_PATH}/{id}")
}

/// Lifecycle action on a stored rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Set status to `ACTIVE`.
    Enable,
    /// Set status to `INACTIVE`.
    Disable,
    /// Set status to `ARCHIVED`.
    Archive,
}

impl RuleAction {
    /// Path that performs this action on rule `id`.
    #[must_use]
    pub fn path(self, id: i64) -> String {
        let verb = match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Archive => "archive",
        };
        format!("{RULES_PATH}/{id}/{verb}")
    }

    /// Status the rule has after the action.
    #[must_use]
    pub const fn resulting_status(self) -> RuleStatus {
        match self {
            Self::Enable => RuleStatus::Active,
            Self::Disable => RuleStatus::Inactive,
            Self::Archive => RuleStatus::Archived,
        }
    }
}

/// Body of a create call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRuleRequest {
    /// Descriptive settings, flattened into the body.
    #[serde(flatten)]
    pub metadata: RuleMetadata,
    /// Flat rule config object.
    pub rule_config: RuleConfig,
}

impl From<&RuleDraft> for CreateRuleRequest {
    fn from(draft: &RuleDraft) -> Self {
        Self {
            metadata: draft.metadata.clone(),
            rule_config: draft.config.clone(),
        }
    }
}

/// Body of an update call. Absent fields are left unchanged.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRuleRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<RuleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_config: Option<RuleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_channels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_config: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppression_window_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_alerts_per_hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl From<&RuleDraft> for UpdateRuleRequest {
    fn from(draft: &RuleDraft) -> Self {
        let m = draft.metadata.clone();
        Self {
            name: Some(m.name),
            description: m.description,
            rule_type: Some(m.rule_type),
            rule_config: Some(draft.config.clone()),
            severity: Some(m.severity),
            priority: m.priority,
            notification_channels: m.notification_channels,
            notification_config: m.notification_config,
            suppression_window_minutes: m.suppression_window_minutes,
            max_alerts_per_hour: m.max_alerts_per_hour,
            created_by: m.created_by,
        }
    }
}

/// Body of a dry-run call.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRuleRequest {
    pub rule_type: RuleType,
    pub rule_config: RuleConfig,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&RuleDraft> for TestRuleRequest {
    fn from(draft: &RuleDraft) -> Self {
        let name = draft.metadata.name.trim();
        Self {
            rule_type: draft.metadata.rule_type,
            rule_config: draft.config.clone(),
            severity: draft.metadata.severity.clone(),
            priority: draft.metadata.priority,
            name: (!name.is_empty()).then(|| name.to_string()),
        }
    }
}

/// A stored rule as returned by the backend.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResponse {
    pub id: i64,
    #[serde(flatten)]
    pub metadata: RuleMetadata,
    pub status: RuleStatus,
    /// Raw config as stored; see [`RuleResponse::config`].
    pub rule_config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl RuleResponse {
    /// Decodes the stored config.
    pub fn config(&self) -> Result<RuleConfig, RuleDecodeError> {
        Ok(RuleConfig::from_map(self.rule_config.clone())?)
    }

    /// Editable draft of this rule.
    pub fn to_draft(&self) -> Result<RuleDraft, RuleDecodeError> {
        Ok(RuleDraft::new(self.metadata.clone(), self.config()?))
    }
}

/// Outcome of a dry run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTestResult {
    /// True if the backend accepted and compiled the rule.
    pub success: bool,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Backend-generated rule source, for display only.
    #[serde(default, alias = "generatedDrl", skip_serializing_if = "Option::is_none")]
    pub generated_artifact: Option<String>,
    /// Backend errors; `null` on the wire reads as empty.
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[allow(missing_docs)]
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The rule-evaluation backend, as far as editing needs it.
pub trait RuleBackend {
    /// Dry-runs a rule without storing it.
    fn test(&self, request: &TestRuleRequest) -> Result<RuleTestResult, BackendError>;

    /// Stores a new rule.
    fn create(&self, request: &CreateRuleRequest) -> Result<RuleResponse, BackendError>;

    /// Replaces fields of rule `id`.
    fn update(&self, id: i64, request: &UpdateRuleRequest) -> Result<RuleResponse, BackendError>;

    /// Fetches rule `id`.
    fn get(&self, id: i64) -> Result<RuleResponse, BackendError>;

    /// Lists stored rules.
    fn list(&self) -> Result<Vec<RuleResponse>, BackendError>;

    /// Deletes rule `id`.
    fn delete(&self, id: i64) -> Result<(), BackendError>;

    /// Applies a lifecycle action to rule `id`.
    fn act(&self, id: i64, action: RuleAction) -> Result<RuleResponse, BackendError>;
}

impl<B: RuleBackend + ?Sized> RuleBackend for &B {
    fn test(&self, request: &TestRuleRequest) -> Result<RuleTestResult, BackendError> {
        (**self).test(request)
    }

    fn create(&self, request: &CreateRuleRequest) -> Result<RuleResponse, BackendError> {
        (**self).create(request)
    }

    fn update(&self, id: i64, request: &UpdateRuleRequest) -> Result<RuleResponse, BackendError> {
        (**self).update(id, request)
    }

    fn get(&self, id: i64) -> Result<RuleResponse, BackendError> {
        (**self).get(id)
    }

    fn list(&self) -> Result<Vec<RuleResponse>, BackendError> {
        (**self).list()
    }

    fn delete(&self, id: i64) -> Result<(), BackendError> {
        (**self).delete(id)
    }

    fn act(&self, id: i64, action: RuleAction) -> Result<RuleResponse, BackendError> {
        (**self).act(id, action)
    }
}

/// Validates drafts and forwards them to a [`RuleBackend`].
#[derive(Debug, Clone)]
pub struct RuleSubmitter<B> {
    backend: B,
}

impl<B: RuleBackend> RuleSubmitter<B> {
    #[allow(missing_docs)]
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The wrapped backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Dry-runs `draft`. Only the config has to be valid; a name is optional.
    ///
    /// A result with `success == false` is returned as `Ok` so the caller
    /// can show the backend's `errors` and `warnings` verbatim.
    pub fn test(&self, draft: &RuleDraft) -> Result<RuleTestResult, SubmitError> {
        check(validate(&draft.config))?;
        debug!(shape = ?draft.config.shape(), "testing rule");
        let result = self.backend.test(&TestRuleRequest::from(draft)).map_err(rejected)?;
        if !result.success {
            info!(errors = result.errors.len(), "backend test reported failure");
        }
        Ok(result)
    }

    /// Creates `draft`, or updates rule `existing` when given.
    pub fn save(&self, draft: &RuleDraft, existing: Option<i64>) -> Result<RuleResponse, SubmitError> {
        check(draft.validate())?;
        let saved = match existing {
            Some(id) => {
                debug!(rule_id = id, "updating rule");
                self.backend.update(id, &UpdateRuleRequest::from(draft))
            }
            None => {
                debug!(name = %draft.metadata.name, "creating rule");
                self.backend.create(&CreateRuleRequest::from(draft))
            }
        }
        .map_err(rejected)?;
        info!(rule_id = saved.id, version = ?saved.version, "rule saved");
        Ok(saved)
    }

    /// Fetches rule `id`; see [`RuleResponse::to_draft`] to edit it.
    pub fn get(&self, id: i64) -> Result<RuleResponse, SubmitError> {
        self.backend.get(id).map_err(rejected)
    }

    /// Every stored rule, as the backend returns them.
    pub fn list(&self) -> Result<Vec<RuleResponse>, SubmitError> {
        self.backend.list().map_err(rejected)
    }

    /// Deletes rule `id`.
    pub fn delete(&self, id: i64) -> Result<(), SubmitError> {
        self.backend.delete(id).map_err(rejected)?;
        info!(rule_id = id, "rule deleted");
        Ok(())
    }

    /// Enables, disables or archives rule `id`.
    pub fn apply(&self, id: i64, action: RuleAction) -> Result<RuleResponse, SubmitError> {
        let updated = self.backend.act(id, action).map_err(rejected)?;
        if updated.status == action.resulting_status() {
            info!(rule_id = id, status = ?updated.status, "rule status changed");
        } else {
            warn!(
                rule_id = id,
                expected = ?action.resulting_status(),
                status = ?updated.status,
                "backend reported an unexpected status"
            );
        }
        Ok(updated)
    }

    /// Consumes the submitter, returning the backend.
    pub fn into_inner(self) -> B {
        self.backend
    }
}

fn check(result: ValidationResult) -> Result<(), SubmitError> {
    result.into_result().map_err(|violations| {
        debug!(count = violations.len(), "rule failed local validation");
        SubmitError::Invalid(violations)
    })
}

fn rejected(err: BackendError) -> SubmitError {
    warn!(error = %err, "rule backend call failed");
    SubmitError::Backend(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::config::SimpleRule;
    use crate::rule::types::{Condition, MetricType};
    use serde_json::json;

    fn draft() -> RuleDraft {
        RuleDraft::new(
            RuleMetadata::named("High error rate").with_severity(Severity::critical()),
            SimpleRule::new(MetricType::ErrorRate, Condition::GreaterThan, 5.0)
                .with_time_window(5u64)
                .into(),
        )
    }

    #[test]
    fn paths() {
        assert_eq!(rule_path(7), "/api/v1/rules/7");
        assert_eq!(RuleAction::Archive.path(7), "/api/v1/rules/7/archive");
        assert_eq!(RuleAction::Enable.resulting_status(), RuleStatus::Active);
    }

    #[test]
    fn create_request_is_flat_camel_case() {
        let v = serde_json::to_value(CreateRuleRequest::from(&draft())).unwrap();
        assert_eq!(v["name"], json!("High error rate"));
        assert_eq!(v["ruleType"], json!("THRESHOLD"));
        assert_eq!(v["severity"], json!("CRITICAL"));
        assert_eq!(v["ruleConfig"]["metricType"], json!("ERROR_RATE"));
        assert_eq!(v["ruleConfig"]["timeWindowMinutes"], json!(5));
    }

    #[test]
    fn test_request_omits_blank_name() {
        let mut d = draft();
        d.metadata.name = " ".to_string();
        let v = serde_json::to_value(TestRuleRequest::from(&d)).unwrap();
        assert!(v.get("name").is_none());
    }

    #[test]
    fn update_request_carries_everything() {
        let req = UpdateRuleRequest::from(&draft());
        assert_eq!(req.name.as_deref(), Some("High error rate"));
        assert!(req.rule_config.is_some());
        assert_eq!(req.severity, Some(Severity::critical()));
    }

    #[test]
    fn test_result_reads_null_lists_as_empty() {
        let r: RuleTestResult = serde_json::from_value(json!({
            "success": true,
            "message": "Rule configuration is valid",
            "generatedDrl": "rule x end",
            "errors": null,
            "warnings": null,
        }))
        .unwrap();
        assert!(r.success);
        assert_eq!(r.message.as_deref(), Some("Rule configuration is valid"));
        assert!(r.errors.is_empty());
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn test_result_accepts_legacy_artifact_name() {
        let r: RuleTestResult = serde_json::from_value(json!({
            "success": true,
            "generatedDrl": "rule \"x\" when then end",
            "warnings": ["no source filter"],
        }))
        .unwrap();
        assert_eq!(r.generated_artifact.as_deref(), Some("rule \"x\" when then end"));
        assert_eq!(r.warnings, vec!["no source filter"]);
        assert!(r.errors.is_empty());
    }

    #[test]
    fn response_decodes_config_and_metadata() {
        let r: RuleResponse = serde_json::from_value(json!({
            "id": 3,
            "name": "Spike",
            "ruleType": "THRESHOLD",
            "status": "ACTIVE",
            "severity": "WARNING",
            "ruleConfig": {"metricType": "SPIKE_DETECTION", "condition": "GREATER_THAN", "thresholdValue": 50},
            "createdAt": "2025-01-01T10:00:00",
            "triggerCount": 4,
            "version": 2,
        }))
        .unwrap();
        let d = r.to_draft().unwrap();
        assert_eq!(d.metadata.name, "Spike");
        assert_eq!(d.config.shape(), crate::rule::RuleShape::Change);
        assert_eq!(r.trigger_count, Some(4));
    }
}
