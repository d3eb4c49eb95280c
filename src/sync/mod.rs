//! Moving workflow documents between the local directory and a remote
//! instance.
//!
//! Both directions work through a batch one item at a time. A failing item
//! is recorded in the summary and the batch continues.

mod deploy;
mod export;

use serde::Serialize;

use crate::error::{Error, ErrorKind};

pub use deploy::{DeployAction, DeployOutcome, DeployPlan, DeployRecord, DeploySummary, Deployer};
pub use export::{ExportSummary, Exporter};

/// One item of a batch that did not go through.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    /// Workflow id or file path
    pub item: String,
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
}

impl ItemFailure {
    pub fn new(item: impl Into<String>, error: &Error) -> Self {
        Self {
            item: item.into(),
            kind: error.kind(),
            code: error.code(),
            message: error.to_string(),
        }
    }
}
