use std::cell::RefCell;
use std::collections::BTreeMap;

use serde_json::json;

use eventara_client::rule::{
    ChangeMetric, ChangeRule, CompositeOperator, CompositeRule, Condition, CreateRuleRequest, MetricType, RuleAction,
    RuleResponse, RuleStatus, RuleTestResult, Severity, SimpleRule, TestRuleRequest, UpdateRuleRequest,
};
use eventara_client::{BackendError, RuleBackend, RuleDraft, RuleMetadata, RuleSubmitter, RuleViolation, SubmitError};

#[derive(Default)]
struct FakeBackend {
    tests: RefCell<Vec<serde_json::Value>>,
    creates: RefCell<Vec<serde_json::Value>>,
    updates: RefCell<Vec<(i64, serde_json::Value)>>,
    rules: RefCell<BTreeMap<i64, RuleResponse>>,
    test_result: RuleTestResult,
    reject: Option<BackendError>,
}

impl FakeBackend {
    fn calls(&self) -> usize {
        self.tests.borrow().len() + self.creates.borrow().len() + self.updates.borrow().len()
    }

    fn stored(&self, id: i64, body: &serde_json::Value) -> RuleResponse {
        let mut v = body.clone();
        v["id"] = json!(id);
        v["status"] = json!("ACTIVE");
        v["version"] = json!(1);
        let rule: RuleResponse = serde_json::from_value(v).unwrap();
        self.rules.borrow_mut().insert(id, rule.clone());
        rule
    }

    fn find(&self, id: i64) -> Result<RuleResponse, BackendError> {
        self.rules.borrow().get(&id).cloned().ok_or(BackendError::NotFound { id })
    }
}

impl RuleBackend for FakeBackend {
    fn test(&self, request: &TestRuleRequest) -> Result<RuleTestResult, BackendError> {
        self.tests.borrow_mut().push(serde_json::to_value(request).unwrap());
        match &self.reject {
            Some(err) => Err(err.clone()),
            None => Ok(self.test_result.clone()),
        }
    }

    fn create(&self, request: &CreateRuleRequest) -> Result<RuleResponse, BackendError> {
        let body = serde_json::to_value(request).unwrap();
        self.creates.borrow_mut().push(body.clone());
        match &self.reject {
            Some(err) => Err(err.clone()),
            None => Ok(self.stored(1, &body)),
        }
    }

    fn update(&self, id: i64, request: &UpdateRuleRequest) -> Result<RuleResponse, BackendError> {
        let body = serde_json::to_value(request).unwrap();
        self.updates.borrow_mut().push((id, body.clone()));
        match &self.reject {
            Some(err) => Err(err.clone()),
            None => Ok(self.stored(id, &body)),
        }
    }

    fn get(&self, id: i64) -> Result<RuleResponse, BackendError> {
        self.find(id)
    }

    fn list(&self) -> Result<Vec<RuleResponse>, BackendError> {
        Ok(self.rules.borrow().values().cloned().collect())
    }

    fn delete(&self, id: i64) -> Result<(), BackendError> {
        self.rules.borrow_mut().remove(&id).map(|_| ()).ok_or(BackendError::NotFound { id })
    }

    fn act(&self, id: i64, action: RuleAction) -> Result<RuleResponse, BackendError> {
        let mut rule = self.find(id)?;
        rule.status = action.resulting_status();
        self.rules.borrow_mut().insert(id, rule.clone());
        Ok(rule)
    }
}

fn valid_draft() -> RuleDraft {
    RuleDraft::new(
        RuleMetadata::named("Error spike").with_severity(Severity::critical()),
        ChangeRule::new(ChangeMetric::ErrorRateChange, Condition::GreaterThan, 50.0).into(),
    )
}

#[test]
fn invalid_draft_never_reaches_backend() {
    let backend = FakeBackend::default();
    let submitter = RuleSubmitter::new(&backend);
    let draft = RuleDraft::new(
        RuleMetadata::named("Empty composite"),
        CompositeRule::new(CompositeOperator::And).into(),
    );

    let err = submitter.test(&draft).unwrap_err();
    assert_eq!(err, SubmitError::Invalid(vec![RuleViolation::EmptyConditions]));

    let err = submitter.save(&draft, None).unwrap_err();
    assert_eq!(err.to_string(), "Rule is invalid: conditions array cannot be empty");
    assert_eq!(backend.calls(), 0);
}

#[test]
fn save_requires_a_name_but_test_does_not() {
    let backend = FakeBackend {
        test_result: RuleTestResult {
            success: true,
            ..RuleTestResult::default()
        },
        ..FakeBackend::default()
    };
    let submitter = RuleSubmitter::new(&backend);
    let mut draft = valid_draft();
    draft.metadata.name = String::new();

    assert!(submitter.test(&draft).unwrap().success);
    assert_eq!(
        submitter.save(&draft, None).unwrap_err(),
        SubmitError::Invalid(vec![RuleViolation::MissingField { field: "name" }])
    );
    assert_eq!(backend.tests.borrow().len(), 1);
    assert!(backend.creates.borrow().is_empty());
}

#[test]
fn test_result_with_errors_is_returned_verbatim() {
    let backend = FakeBackend {
        test_result: RuleTestResult {
            success: false,
            message: Some("compilation failed".to_string()),
            generated_artifact: None,
            errors: vec!["Unknown metric: QUEUE_DEPTH".to_string()],
            warnings: vec!["no source filter".to_string()],
        },
        ..FakeBackend::default()
    };
    let submitter = RuleSubmitter::new(&backend);
    let draft = RuleDraft::new(
        RuleMetadata::named("Queue"),
        SimpleRule::new(MetricType::from("QUEUE_DEPTH"), Condition::GreaterThan, 10.0).into(),
    );

    let result = submitter.test(&draft).unwrap();
    assert!(!result.success);
    assert_eq!(result.errors, vec!["Unknown metric: QUEUE_DEPTH"]);
    assert_eq!(result.warnings, vec!["no source filter"]);

    let sent = &backend.tests.borrow()[0];
    assert_eq!(sent["ruleType"], json!("THRESHOLD"));
    assert_eq!(sent["ruleConfig"]["metricType"], json!("QUEUE_DEPTH"));
    assert_eq!(sent["name"], json!("Queue"));
}

#[test]
fn create_and_update_send_flat_bodies() {
    let backend = FakeBackend::default();
    let submitter = RuleSubmitter::new(&backend);
    let draft = valid_draft();

    let created = submitter.save(&draft, None).unwrap();
    assert_eq!(created.id, 1);
    assert_eq!(created.status, RuleStatus::Active);
    assert_eq!(created.to_draft().unwrap(), draft);

    let body = &backend.creates.borrow()[0];
    assert_eq!(body["name"], json!("Error spike"));
    assert_eq!(body["severity"], json!("CRITICAL"));
    assert_eq!(
        body["ruleConfig"],
        json!({"metricType": "ERROR_RATE_CHANGE", "condition": "GREATER_THAN", "thresholdValue": 50.0})
    );

    let updated = submitter.save(&draft, Some(9)).unwrap();
    assert_eq!(updated.id, 9);
    assert_eq!(backend.updates.borrow()[0].0, 9);
}

#[test]
fn backend_rejection_passes_through() {
    let rejection = BackendError::Rejected {
        status: 400,
        message: "Invalid metric type: FOO".to_string(),
        errors: vec!["Invalid metric type: FOO".to_string()],
    };
    let backend = FakeBackend {
        reject: Some(rejection.clone()),
        ..FakeBackend::default()
    };
    let submitter = RuleSubmitter::new(&backend);

    let err = submitter.save(&valid_draft(), None).unwrap_err();
    assert_eq!(err, SubmitError::Backend(rejection));
    assert_eq!(backend.creates.borrow().len(), 1);
}

#[test]
fn stored_rules_can_be_listed_fetched_and_retired() {
    let backend = FakeBackend::default();
    let submitter = RuleSubmitter::new(&backend);
    submitter.save(&valid_draft(), None).unwrap();
    submitter.save(&valid_draft(), Some(4)).unwrap();

    let ids: Vec<i64> = submitter.list().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 4]);
    assert_eq!(submitter.get(4).unwrap().to_draft().unwrap(), valid_draft());

    let disabled = submitter.apply(4, RuleAction::Disable).unwrap();
    assert_eq!(disabled.status, RuleStatus::Inactive);
    assert_eq!(submitter.apply(4, RuleAction::Archive).unwrap().status, RuleStatus::Archived);
    assert_eq!(submitter.get(4).unwrap().status, RuleStatus::Archived);

    submitter.delete(1).unwrap();
    assert_eq!(
        submitter.get(1).unwrap_err(),
        SubmitError::Backend(BackendError::NotFound { id: 1 })
    );
    assert_eq!(submitter.delete(1).unwrap_err(), SubmitError::Backend(BackendError::NotFound { id: 1 }));
}

#[test]
fn backend_success_with_null_lists_is_readable() {
    let backend = FakeBackend {
        test_result: serde_json::from_value(json!({
            "success": true,
            "message": "Rule configuration is valid",
            "generatedDrl": "rule \"Error spike\" when then end",
            "errors": null,
            "warnings": null,
        }))
        .unwrap(),
        ..FakeBackend::default()
    };
    let result = RuleSubmitter::new(&backend).test(&valid_draft()).unwrap();
    assert!(result.success);
    assert!(result.errors.is_empty() && result.warnings.is_empty());
    assert!(result.generated_artifact.is_some());
}
