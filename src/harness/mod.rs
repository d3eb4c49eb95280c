//! Integration checks and the offline test suite.
//!
//! [`run_integration_test`] drives a create/verify/activate/delete cycle
//! against any [`WorkflowApi`]. [`run_suite`] chains validation, a dry-run
//! deploy and that cycle against an in-process mock server.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::client::{ApiClient, DryRunApi, WorkflowApi};
use crate::config::{HttpConfig, Target};
use crate::error::Result;
use crate::mock::{MockAuthConfig, MockServer, MockStore};
use crate::sync::{DeploySummary, Deployer};
use crate::workflow::{document_id, parse_document_file, validate_paths, ValidationSummary};

/// Key the suite's mock server requires.
const SUITE_API_KEY: &str = "flowctl-suite-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    /// Did not work, but does not fail the run
    Warning,
    Failed,
    /// Not attempted because an earlier step failed
    Skipped,
}

/// Outcome of one step of an integration run.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step: &'static str,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result of [`run_integration_test`].
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationReport {
    pub workflow: String,
    /// Id assigned on create, if the create step got that far
    pub workflow_id: Option<String>,
    pub steps: Vec<StepOutcome>,
}

impl IntegrationReport {
    pub fn passed(&self) -> bool {
        !self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    pub fn step(&self, name: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == name)
    }

    fn record(&mut self, step: &'static str, status: StepStatus, detail: Option<String>) {
        match status {
            StepStatus::Passed => info!(step, "Integration step passed"),
            StepStatus::Warning => warn!(step, detail = ?detail, "Integration step warning"),
            StepStatus::Failed => error!(step, detail = ?detail, "Integration step failed"),
            StepStatus::Skipped => {}
        }
        self.steps.push(StepOutcome {
            step,
            status,
            detail,
        });
    }
}

/// Create the workflow, check it reads back, try to activate it, then
/// delete it.
///
/// Activation failing is a warning: the platform refuses to activate
/// workflows without a trigger node. Cleanup runs whenever create
/// succeeded.
pub async fn run_integration_test(api: &dyn WorkflowApi, document: &Value) -> IntegrationReport {
    let name = document
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let mut report = IntegrationReport {
        workflow: name.clone(),
        workflow_id: None,
        steps: Vec::new(),
    };

    let mut payload = document.clone();
    if let Some(fields) = payload.as_object_mut() {
        fields.remove("id");
        fields.remove("active");
    }

    let created = api.create_workflow(&payload).await;
    let id = match created.as_ref().map(document_id) {
        Ok(Some(id)) => {
            report.record("create", StepStatus::Passed, Some(format!("id {}", id)));
            id
        }
        Ok(None) => {
            report.record(
                "create",
                StepStatus::Failed,
                Some("response carried no id".to_string()),
            );
            skip_remaining(&mut report);
            return report;
        }
        Err(e) => {
            report.record("create", StepStatus::Failed, Some(e.to_string()));
            skip_remaining(&mut report);
            return report;
        }
    };
    report.workflow_id = Some(id.clone());

    match api.get_workflow(&id).await {
        Ok(fetched) => {
            let fetched_name = fetched.get("name").and_then(Value::as_str).unwrap_or_default();
            if fetched_name == name {
                report.record("verify", StepStatus::Passed, None);
            } else {
                report.record(
                    "verify",
                    StepStatus::Failed,
                    Some(format!("expected name '{}', got '{}'", name, fetched_name)),
                );
            }
        }
        Err(e) => report.record("verify", StepStatus::Failed, Some(e.to_string())),
    }

    match api.activate_workflow(&id).await {
        Ok(_) => report.record("activate", StepStatus::Passed, None),
        Err(e) => report.record("activate", StepStatus::Warning, Some(e.to_string())),
    }

    match api.delete_workflow(&id).await {
        Ok(()) => report.record("cleanup", StepStatus::Passed, None),
        Err(e) => report.record("cleanup", StepStatus::Failed, Some(e.to_string())),
    }

    report
}

fn skip_remaining(report: &mut IntegrationReport) {
    for step in ["verify", "activate", "cleanup"] {
        report.record(step, StepStatus::Skipped, None);
    }
}

/// Result of [`run_suite`].
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    pub validation: ValidationSummary,
    pub deploy: DeploySummary,
    /// `None` when no document passed validation
    pub integration: Option<IntegrationReport>,
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.validation.all_passed()
            && self.deploy.all_succeeded()
            && self.integration.as_ref().map_or(true, IntegrationReport::passed)
    }
}

/// Validate every path, dry-run deploy the ones that passed, and run the
/// integration cycle for the first of them against a local mock server.
pub async fn run_suite<P: AsRef<Path>>(paths: &[P]) -> Result<SuiteReport> {
    let validation = validate_paths(paths);
    info!(
        files = validation.files,
        passed = validation.passed,
        failed = validation.failed,
        "Validation finished"
    );

    let valid: Vec<PathBuf> = validation
        .reports
        .iter()
        .filter(|r| r.report.passed())
        .map(|r| r.path.clone())
        .collect();

    let dry_run = DryRunApi::new();
    let deploy = Deployer::new(&dry_run).deploy(&valid).await;
    info!(
        imported = deploy.imported,
        failed = deploy.failed,
        "Dry-run deploy finished"
    );

    let integration = match valid.first() {
        Some(path) => {
            let document = parse_document_file(path)?;
            Some(run_against_mock(&document).await?)
        }
        None => {
            warn!("No valid workflow to run the integration test with");
            None
        }
    };

    Ok(SuiteReport {
        validation,
        deploy,
        integration,
    })
}

async fn run_against_mock(document: &Value) -> Result<IntegrationReport> {
    let server = MockServer::start(
        "127.0.0.1:0",
        MockStore::new(),
        MockAuthConfig::requiring(SUITE_API_KEY),
    )
    .await?;

    let target = Target {
        base_url: server.base_url(),
        api_key: SUITE_API_KEY.to_string(),
    };
    let report = match ApiClient::new(&target, &HttpConfig::default()) {
        Ok(client) => Ok(run_integration_test(&client, document).await),
        Err(e) => Err(e),
    };

    server.shutdown().await?;
    report
}
