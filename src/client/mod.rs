//! Client for the platform's public REST API (`/api/v1/workflows`).
//!
//! [`WorkflowApi`] is the seam used by export, deploy and the integration
//! test. [`ApiClient`] talks HTTP; [`DryRunApi`] records what would have been
//! sent and never opens a socket.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Client, Response, Url};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{Config, HttpConfig, Instance, Target};
use crate::error::{Error, Result};
use crate::workflow::{WorkflowList, WorkflowSummary};

/// Header carrying the API key on every request (`X-N8N-API-KEY`).
pub const API_KEY_HEADER: &str = "x-n8n-api-key";

/// Upper bound on list pages, in case a server keeps returning a cursor.
const MAX_LIST_PAGES: usize = 1000;

/// Operations on remote workflows.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// List every workflow, following pagination cursors.
    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>>;

    /// Fetch the full document.
    async fn get_workflow(&self, id: &str) -> Result<Value>;

    /// Create a workflow. Returns the stored document including its new `id`.
    async fn create_workflow(&self, payload: &Value) -> Result<Value>;

    /// Replace an existing workflow.
    async fn update_workflow(&self, id: &str, payload: &Value) -> Result<Value>;

    async fn delete_workflow(&self, id: &str) -> Result<()>;

    async fn activate_workflow(&self, id: &str) -> Result<Value>;
}

/// API for the given instance, or a [`DryRunApi`] when the config asks for a
/// dry run. Fails on missing or malformed settings before anything is sent.
pub fn connect(config: &Config, instance: Instance) -> Result<Box<dyn WorkflowApi>> {
    if config.dry_run {
        info!("Dry run: no requests will be sent");
        return Ok(Box::new(DryRunApi::new()));
    }
    let client = ApiClient::new(&config.target(instance)?, &config.http)?;
    debug!(base_url = %client.base_url(), "Using remote API");
    Ok(Box::new(client))
}

/// HTTP implementation of [`WorkflowApi`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(target: &Target, http: &HttpConfig) -> Result<Self> {
        let base = Url::parse(&target.base_url)
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", target.base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "Base URL '{}' cannot carry a path",
                target.base_url
            )));
        }

        let mut key = HeaderValue::from_str(&target.api_key)
            .map_err(|_| Error::Config("API key contains invalid header characters".into()))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(http.timeout())
            .connect_timeout(http.connect_timeout())
            .build()?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Internal("Base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["api", "v1", "workflows"])
            .extend(segments);
        Ok(url)
    }
}

/// Turn a non-2xx response into [`Error::Api`].
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl WorkflowApi for ApiClient {
    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>> {
        let mut workflows = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let mut url = self.url(&[])?;
            if let Some(c) = &cursor {
                url.query_pairs_mut().append_pair("cursor", c);
            }
            debug!("GET {}", url);

            let response = check(self.client.get(url).send().await?).await?;
            let page: WorkflowList = response.json().await?;
            workflows.extend(page.data);

            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => return Ok(workflows),
            }
        }

        Err(Error::Internal(format!(
            "Workflow listing did not finish after {} pages",
            MAX_LIST_PAGES
        )))
    }

    async fn get_workflow(&self, id: &str) -> Result<Value> {
        let url = self.url(&[id])?;
        debug!("GET {}", url);
        let response = check(self.client.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn create_workflow(&self, payload: &Value) -> Result<Value> {
        let url = self.url(&[])?;
        debug!("POST {}", url);
        let response = check(self.client.post(url).json(payload).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn update_workflow(&self, id: &str, payload: &Value) -> Result<Value> {
        let url = self.url(&[id])?;
        debug!("PUT {}", url);
        let response = check(self.client.put(url).json(payload).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn delete_workflow(&self, id: &str) -> Result<()> {
        let url = self.url(&[id])?;
        debug!("DELETE {}", url);
        check(self.client.delete(url).send().await?).await?;
        Ok(())
    }

    async fn activate_workflow(&self, id: &str) -> Result<Value> {
        let url = self.url(&[id, "activate"])?;
        debug!("POST {}", url);
        let response = check(self.client.post(url).send().await?).await?;
        Ok(response.json().await?)
    }
}

/// A request that a dry run would have sent.
#[derive(Debug, Clone, PartialEq)]
pub struct DryRunCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

/// [`WorkflowApi`] that logs and records calls instead of sending them.
///
/// Writes echo the payload back so callers exercise the same formatting and
/// bookkeeping as a real run. Listing returns nothing; fetching one id returns
/// an empty placeholder document carrying that id as its name.
#[derive(Debug, Default)]
pub struct DryRunApi {
    calls: Mutex<Vec<DryRunCall>>,
}

impl DryRunApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<DryRunCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, method: &'static str, path: String, body: Option<&Value>) {
        info!(method, path = %path, "dry run: request not sent");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(DryRunCall {
                method,
                path,
                body: body.cloned(),
            });
        }
    }
}

#[async_trait]
impl WorkflowApi for DryRunApi {
    async fn list_workflows(&self) -> Result<Vec<WorkflowSummary>> {
        self.record("GET", "/api/v1/workflows".into(), None);
        Ok(Vec::new())
    }

    async fn get_workflow(&self, id: &str) -> Result<Value> {
        self.record("GET", format!("/api/v1/workflows/{}", id), None);
        Ok(json!({"id": id, "name": id, "nodes": [], "connections": {}}))
    }

    async fn create_workflow(&self, payload: &Value) -> Result<Value> {
        self.record("POST", "/api/v1/workflows".into(), Some(payload));
        let mut created = payload.clone();
        if let Some(obj) = created.as_object_mut() {
            obj.insert("id".into(), json!("dry-run"));
        }
        Ok(created)
    }

    async fn update_workflow(&self, id: &str, payload: &Value) -> Result<Value> {
        self.record("PUT", format!("/api/v1/workflows/{}", id), Some(payload));
        let mut updated = payload.clone();
        if let Some(obj) = updated.as_object_mut() {
            obj.insert("id".into(), json!(id));
        }
        Ok(updated)
    }

    async fn delete_workflow(&self, id: &str) -> Result<()> {
        self.record("DELETE", format!("/api/v1/workflows/{}", id), None);
        Ok(())
    }

    async fn activate_workflow(&self, id: &str) -> Result<Value> {
        self.record("POST", format!("/api/v1/workflows/{}/activate", id), None);
        Ok(json!({"id": id, "active": true}))
    }
}
