//! Import local workflow documents into a remote instance.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use super::ItemFailure;
use crate::client::WorkflowApi;
use crate::error::{Error, Result};
use crate::workflow::{document_id, parse_document_file, validate_document};

/// What a deploy will do with one document.
#[derive(Debug, Clone, PartialEq)]
pub enum DeployPlan {
    /// No `id`: the platform assigns one.
    Create { payload: Value },
    /// `id` present: replace the remote record. The payload carries neither
    /// `id` nor `active`, so a deploy never flips activation state.
    Update { id: String, payload: Value },
}

impl DeployPlan {
    pub fn from_document(document: Value) -> Result<Self> {
        let Value::Object(mut fields) = document else {
            return Err(Error::Parse(
                "Workflow document must be a JSON object".to_string(),
            ));
        };

        match document_id(&Value::Object(fields.clone())) {
            Some(id) => {
                fields.remove("id");
                fields.remove("active");
                Ok(DeployPlan::Update {
                    id,
                    payload: Value::Object(fields),
                })
            }
            None => {
                // A null or empty id means "not created yet"
                fields.remove("id");
                Ok(DeployPlan::Create {
                    payload: Value::Object(fields),
                })
            }
        }
    }

    pub fn action(&self) -> DeployAction {
        match self {
            DeployPlan::Create { .. } => DeployAction::Created,
            DeployPlan::Update { .. } => DeployAction::Updated,
        }
    }

    pub fn payload(&self) -> &Value {
        match self {
            DeployPlan::Create { payload } | DeployPlan::Update { payload, .. } => payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployAction {
    Created,
    Updated,
}

impl std::fmt::Display for DeployAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeployAction::Created => write!(f, "created"),
            DeployAction::Updated => write!(f, "updated"),
        }
    }
}

/// A document that made it to the remote.
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub action: DeployAction,
    /// Remote id, assigned by the platform on create
    pub id: Option<String>,
    /// Document as returned by the remote
    pub document: Value,
}

/// Per-file line of a deploy summary.
#[derive(Debug, Clone, Serialize)]
pub struct DeployRecord {
    pub path: PathBuf,
    pub action: DeployAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Result of a deploy run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeploySummary {
    pub imported: usize,
    pub failed: usize,
    pub created: usize,
    pub updated: usize,
    pub records: Vec<DeployRecord>,
    pub failures: Vec<ItemFailure>,
}

impl DeploySummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Sends local documents to the remote, one at a time.
pub struct Deployer<'a> {
    api: &'a dyn WorkflowApi,
    validate: bool,
}

impl<'a> Deployer<'a> {
    pub fn new(api: &'a dyn WorkflowApi) -> Self {
        Self {
            api,
            validate: false,
        }
    }

    /// Refuse to send documents that fail validation.
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }

    /// Deploy every path. Failures are recorded and the batch continues.
    pub async fn deploy<P: AsRef<Path>>(&self, paths: &[P]) -> DeploySummary {
        let mut summary = DeploySummary::default();

        for path in paths {
            let path = path.as_ref();
            let result = match parse_document_file(path) {
                Ok(document) => self.deploy_document(document).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(outcome) => {
                    info!(
                        path = %path.display(),
                        action = %outcome.action,
                        id = ?outcome.id,
                        "Deployed workflow"
                    );
                    summary.imported += 1;
                    match outcome.action {
                        DeployAction::Created => summary.created += 1,
                        DeployAction::Updated => summary.updated += 1,
                    }
                    summary.records.push(DeployRecord {
                        path: path.to_path_buf(),
                        action: outcome.action,
                        id: outcome.id,
                    });
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to deploy workflow");
                    summary.failed += 1;
                    summary
                        .failures
                        .push(ItemFailure::new(path.display().to_string(), &e));
                }
            }
        }

        summary
    }

    /// Deploy one parsed document.
    pub async fn deploy_document(&self, document: Value) -> Result<DeployOutcome> {
        if self.validate {
            let report = validate_document(&document);
            for warning in &report.warnings {
                warn!("{}", warning);
            }
            if !report.passed() {
                return Err(Error::Validation(report.errors.join("; ")));
            }
        }

        let plan = DeployPlan::from_document(document)?;
        let action = plan.action();
        let returned = match &plan {
            DeployPlan::Create { payload } => self.api.create_workflow(payload).await?,
            DeployPlan::Update { id, payload } => self.api.update_workflow(id, payload).await?,
        };

        let id = document_id(&returned).or_else(|| match plan {
            DeployPlan::Update { id, .. } => Some(id),
            DeployPlan::Create { .. } => None,
        });

        Ok(DeployOutcome {
            action,
            id,
            document: returned,
        })
    }
}
