//! Rule metadata carried alongside the config.
//!
//! Everything here is passed through to the backend unchanged. Only the
//! presence of a name is checked client-side.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RuleViolation;

use super::config::RuleConfig;
use super::validation::{validate, ValidationResult};

/// Evaluation engine family of a rule.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    #[default]
    Threshold,
    Pattern,
    Anomaly,
    Cep,
}

/// Lifecycle status reported by the backend.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    Active,
    Inactive,
    Archived,
    Draft,
}

/// Alert severity name. Kept as a string; the backend owns the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Severity(String);

impl Severity {
    /// Highest severity.
    pub const CRITICAL: &'static str = "CRITICAL";
    /// Needs attention.
    pub const WARNING: &'static str = "WARNING";
    /// Informational.
    pub const INFO: &'static str = "INFO";

    /// Wraps a severity name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// `CRITICAL`.
    #[must_use]
    pub fn critical() -> Self {
        Self::new(Self::CRITICAL)
    }

    /// `WARNING`.
    #[must_use]
    pub fn warning() -> Self {
        Self::new(Self::WARNING)
    }

    /// `INFO`.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Self::INFO)
    }

    /// Severity name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::warning()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive and delivery settings of a rule.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub rule_type: RuleType,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Channel references; resolved by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_channels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_config: Option<Map<String, Value>>,
    /// Minimum minutes between repeated alerts for the same rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppression_window_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_alerts_per_hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl RuleMetadata {
    /// Metadata with `name` and defaults elsewhere.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A rule being edited: metadata plus config.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDraft {
    /// Descriptive settings.
    pub metadata: RuleMetadata,
    /// Rule condition.
    pub config: RuleConfig,
}

impl RuleDraft {
    /// Draft from its two halves.
    #[must_use]
    pub const fn new(metadata: RuleMetadata, config: RuleConfig) -> Self {
        Self { metadata, config }
    }

    /// Name check followed by config validation.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut violations = Vec::new();
        if self.metadata.name.trim().is_empty() {
            violations.push(RuleViolation::missing("name"));
        }
        if let ValidationResult::Invalid(v) = validate(&self.config) {
            violations.extend(v);
        }
        if violations.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid(violations)
        }
    }
}
