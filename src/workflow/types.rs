//! Workflow document types.
//!
//! Documents are transported verbatim: fields this crate does not know about
//! (`settings`, `staticData`, `pinData`, ...) are kept in `extra` and written
//! back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node type of the webhook trigger.
pub const WEBHOOK_NODE_TYPE: &str = "n8n-nodes-base.webhook";

/// Node type of the error trigger.
pub const ERROR_TRIGGER_NODE_TYPE: &str = "n8n-nodes-base.errorTrigger";

/// Prefixes that mark a string as a templated expression rather than a literal.
pub const EXPRESSION_MARKERS: &[&str] = &["=", "{{"];

/// A complete workflow document.
///
/// # Example
///
/// ```json
/// {
///   "name": "Test Workflow - Ping API",
///   "nodes": [
///     {
///       "id": "a1",
///       "name": "Start",
///       "type": "n8n-nodes-base.manualTrigger",
///       "position": [250, 300]
///     }
///   ],
///   "connections": {}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    /// Remote identifier. Absent until the platform has created the workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name
    pub name: String,

    /// Nodes in canvas order
    pub nodes: Vec<NodeRecord>,

    /// Routing between nodes, opaque to this crate
    pub connections: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowDocument {
    /// Build a document from a parsed JSON value.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

/// A single step in a workflow document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,

    pub name: String,

    #[serde(rename = "type")]
    pub node_type: String,

    /// Canvas coordinates `[x, y]`
    pub position: [serde_json::Number; 2],

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub parameters: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Map<String, Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entry of the `data` array returned by `GET /api/v1/workflows`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

/// Body of `GET /api/v1/workflows`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowList {
    pub data: Vec<WorkflowSummary>,

    #[serde(default, rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

/// Whether a string looks like a templated expression.
pub fn is_expression(value: &str) -> bool {
    let trimmed = value.trim_start();
    EXPRESSION_MARKERS.iter().any(|m| trimmed.starts_with(m))
}

/// Read a workflow's `id` field, accepting numeric ids as well as strings.
pub fn document_id(document: &Value) -> Option<String> {
    match document.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
