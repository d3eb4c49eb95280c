//! In-memory stand-in for the platform's workflow API.
//!
//! Serves the subset of `/api/v1/workflows` that export, deploy and the
//! integration test use, backed by a map that lives as long as the process.

mod middleware;

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::workflow::WorkflowDocument;

pub use middleware::{
    access_log_middleware, mock_auth_middleware, MockAuthConfig, INVALID_API_KEY,
};

/// Store shared between handlers.
pub type SharedStore = Arc<RwLock<MockStore>>;

/// Workflows by numeric id. Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct MockStore {
    workflows: BTreeMap<u64, WorkflowDocument>,
    last_id: u64,
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn parse_id(id: &str) -> Option<u64> {
    id.parse().ok()
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new workflow under the next id and return it as stored.
    pub fn insert(&mut self, mut document: WorkflowDocument) -> WorkflowDocument {
        self.last_id += 1;
        let stamp = now();
        document.id = Some(self.last_id.to_string());
        document.active = Some(document.active.unwrap_or(false));
        document.extra.insert("createdAt".into(), stamp.clone());
        document.extra.insert("updatedAt".into(), stamp);
        self.workflows.insert(self.last_id, document.clone());
        document
    }

    /// Store every parsed seed document, in order.
    pub fn seed(&mut self, documents: Vec<Value>) -> Result<()> {
        for document in documents {
            let document = into_document(document)
                .map_err(|e| Error::Parse(format!("Invalid seed document: {}", e)))?;
            self.insert(document);
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&WorkflowDocument> {
        self.workflows.get(&parse_id(id)?)
    }

    pub fn list(&self) -> Vec<WorkflowDocument> {
        self.workflows.values().cloned().collect()
    }

    /// Replace the document, keeping its id, activation state and creation time.
    pub fn replace(&mut self, id: &str, mut document: WorkflowDocument) -> Option<WorkflowDocument> {
        let stored = self.workflows.get_mut(&parse_id(id)?)?;
        document.id = stored.id.clone();
        document.active = stored.active;
        if let Some(created) = stored.extra.get("createdAt") {
            document.extra.insert("createdAt".into(), created.clone());
        }
        document.extra.insert("updatedAt".into(), now());
        *stored = document;
        Some(stored.clone())
    }

    pub fn remove(&mut self, id: &str) -> Option<WorkflowDocument> {
        self.workflows.remove(&parse_id(id)?)
    }

    pub fn set_active(&mut self, id: &str, active: bool) -> Option<WorkflowDocument> {
        let stored = self.workflows.get_mut(&parse_id(id)?)?;
        stored.active = Some(active);
        stored.extra.insert("updatedAt".into(), now());
        Some(stored.clone())
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

/// Parse a request body or seed into a document. Ids and timestamps in the
/// body are ignored; the store owns them.
fn into_document(mut value: Value) -> std::result::Result<WorkflowDocument, String> {
    let fields = value
        .as_object_mut()
        .ok_or_else(|| "request body must be a JSON object".to_string())?;
    fields.remove("id");
    fields.remove("createdAt");
    fields.remove("updatedAt");
    WorkflowDocument::from_value(value).map_err(|e| e.to_string())
}

fn message(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "message": message.into() }))).into_response()
}

fn not_found(id: &str) -> Response {
    message(StatusCode::NOT_FOUND, format!("Workflow {} not found", id))
}

fn body_document(
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> std::result::Result<WorkflowDocument, Response> {
    let Json(value) = body.map_err(|e| message(StatusCode::BAD_REQUEST, e.body_text()))?;
    into_document(value)
        .map_err(|e| message(StatusCode::BAD_REQUEST, format!("Invalid workflow: {}", e)))
}

/// Build the router over a shared store.
pub fn create_router(store: SharedStore, auth: MockAuthConfig) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/v1/workflows", get(list_workflows).post(create_workflow))
        .route(
            "/api/v1/workflows/{id}",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
        .route("/api/v1/workflows/{id}/activate", post(activate_workflow))
        .route("/api/v1/workflows/{id}/deactivate", post(deactivate_workflow))
        .layer(axum::middleware::from_fn_with_state(auth, mock_auth_middleware))
        .layer(axum::middleware::from_fn(access_log_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn list_workflows(State(store): State<SharedStore>) -> impl IntoResponse {
    let data = store.read().await.list();
    Json(json!({"data": data, "nextCursor": null}))
}

async fn get_workflow(State(store): State<SharedStore>, Path(id): Path<String>) -> Response {
    let found = store.read().await.get(&id).cloned();
    match found {
        Some(document) => Json(document).into_response(),
        None => not_found(&id),
    }
}

async fn create_workflow(
    State(store): State<SharedStore>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Response {
    let document = match body_document(body) {
        Ok(document) => document,
        Err(response) => return response,
    };
    let stored = store.write().await.insert(document);
    info!(id = ?stored.id, name = %stored.name, "Mock created workflow");
    Json(stored).into_response()
}

async fn update_workflow(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Response {
    let document = match body_document(body) {
        Ok(document) => document,
        Err(response) => return response,
    };
    let replaced = store.write().await.replace(&id, document);
    match replaced {
        Some(stored) => {
            info!(id = %id, "Mock updated workflow");
            Json(stored).into_response()
        }
        None => not_found(&id),
    }
}

async fn delete_workflow(State(store): State<SharedStore>, Path(id): Path<String>) -> Response {
    let removed = store.write().await.remove(&id);
    match removed {
        Some(removed) => {
            info!(id = %id, "Mock deleted workflow");
            Json(removed).into_response()
        }
        None => not_found(&id),
    }
}

async fn activate_workflow(State(store): State<SharedStore>, Path(id): Path<String>) -> Response {
    set_active(store, id, true).await
}

async fn deactivate_workflow(State(store): State<SharedStore>, Path(id): Path<String>) -> Response {
    set_active(store, id, false).await
}

async fn set_active(store: SharedStore, id: String, active: bool) -> Response {
    let updated = store.write().await.set_active(&id, active);
    match updated {
        Some(stored) => Json(stored).into_response(),
        None => not_found(&id),
    }
}

/// Serve the router until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// A mock server running on a background task.
pub struct MockServer {
    addr: SocketAddr,
    store: SharedStore,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
}

impl MockServer {
    /// Bind `addr` (use port 0 for an ephemeral port) and start serving.
    pub async fn start(addr: impl ToSocketAddrs, store: MockStore, auth: MockAuthConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let store: SharedStore = Arc::new(RwLock::new(store));
        let router = create_router(store.clone(), auth);

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(listener, router, async move {
            let _ = rx.await;
        }));

        info!(addr = %addr, "Mock server listening");
        Ok(Self {
            addr,
            store,
            shutdown: Some(tx),
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL to hand to an API client.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Mock server task failed: {}", e);
                Err(Error::Internal(format!("mock server task failed: {}", e)))
            }
        }
    }
}
