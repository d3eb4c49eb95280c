//! Export remote workflows into the local directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::ItemFailure;
use crate::client::WorkflowApi;
use crate::error::Result;
use crate::workflow::{render_document, workflow_file_name, write_document};

/// Result of an export run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    pub exported: usize,
    pub failed: usize,
    pub written: Vec<PathBuf>,
    pub failures: Vec<ItemFailure>,
}

impl ExportSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Fetches workflows and writes one pretty-printed JSON file per workflow.
pub struct Exporter<'a> {
    api: &'a dyn WorkflowApi,
    output_dir: PathBuf,
    dry_run: bool,
}

impl<'a> Exporter<'a> {
    pub fn new(api: &'a dyn WorkflowApi, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            output_dir: output_dir.into(),
            dry_run: false,
        }
    }

    /// Render every document and report its path without touching the disk.
    pub fn with_dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Export the given ids, or every workflow when `ids` is `None`.
    ///
    /// Only the initial listing and creating the output directory can fail
    /// the whole run. Files are overwritten; two workflows whose names map
    /// to the same slug end with the later one on disk. In a dry run
    /// `written` lists the paths that would have been written.
    pub async fn export(&self, ids: Option<&[String]>) -> Result<ExportSummary> {
        let ids: Vec<String> = match ids {
            Some(ids) => ids.to_vec(),
            None => {
                let listed = self.api.list_workflows().await?;
                info!(count = listed.len(), "Listed remote workflows");
                listed.into_iter().map(|w| w.id).collect()
            }
        };

        if !self.dry_run {
            std::fs::create_dir_all(&self.output_dir)?;
        }

        let mut summary = ExportSummary::default();
        let mut written_by: HashMap<PathBuf, String> = HashMap::new();

        for id in &ids {
            match self.export_one(id).await {
                Ok(path) => {
                    if let Some(previous) = written_by.insert(path.clone(), id.clone()) {
                        warn!(
                            path = %path.display(),
                            previous_id = %previous,
                            id = %id,
                            "Two workflows map to the same file; keeping the later one"
                        );
                    }
                    info!(id = %id, path = %path.display(), "Exported workflow");
                    summary.exported += 1;
                    summary.written.push(path);
                }
                Err(e) => {
                    error!(id = %id, error = %e, "Failed to export workflow");
                    summary.failed += 1;
                    summary.failures.push(ItemFailure::new(id.clone(), &e));
                }
            }
        }

        Ok(summary)
    }

    async fn export_one(&self, id: &str) -> Result<PathBuf> {
        let document = self.api.get_workflow(id).await?;
        let name = document.get("name").and_then(Value::as_str).unwrap_or("");
        let path = self.output_dir.join(workflow_file_name(name, id));
        if self.dry_run {
            let text = render_document(&document)?;
            debug!(path = %path.display(), bytes = text.len(), "dry run: file not written");
        } else {
            write_document(&path, &document)?;
        }
        Ok(path)
    }
}
