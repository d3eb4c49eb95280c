//! Export, deploy and the integration cycle against a mock server on a real
//! socket, driven by the HTTP client.

use serde_json::{json, Value};

use flowctl::client::{connect, ApiClient, WorkflowApi};
use flowctl::config::{Config, HttpConfig, Instance, Target};
use flowctl::harness::{run_integration_test, StepStatus};
use flowctl::mock::{MockAuthConfig, MockServer, MockStore, INVALID_API_KEY};
use flowctl::sync::{DeployAction, Deployer, Exporter};
use flowctl::workflow::parse_document_file;

const KEY: &str = "e2e-key";

fn ping_workflow() -> Value {
    json!({
        "name": "Test Workflow - Ping API",
        "nodes": [
            {
                "id": "node-a",
                "name": "Start",
                "type": "n8n-nodes-base.manualTrigger",
                "position": [250, 300],
                "parameters": {}
            },
            {
                "id": "node-b",
                "name": "Ping",
                "type": "n8n-nodes-base.httpRequest",
                "position": [450, 300],
                "parameters": {"url": "https://example.com/ping"}
            }
        ],
        "connections": {
            "Start": {"main": [[{"node": "Ping", "type": "main", "index": 0}]]}
        }
    })
}

async fn start(store: MockStore) -> MockServer {
    MockServer::start("127.0.0.1:0", store, MockAuthConfig::requiring(KEY))
        .await
        .unwrap()
}

fn client(server: &MockServer, key: &str) -> ApiClient {
    let target = Target {
        base_url: server.base_url(),
        api_key: key.to_string(),
    };
    ApiClient::new(&target, &HttpConfig::default()).unwrap()
}

#[tokio::test]
async fn test_deploy_creates_then_updates() {
    let server = start(MockStore::new()).await;
    let api = client(&server, KEY);
    let deployer = Deployer::new(&api).with_validation(true);

    let created = deployer.deploy_document(ping_workflow()).await.unwrap();
    assert_eq!(created.action, DeployAction::Created);
    assert_eq!(created.id.as_deref(), Some("1"));
    assert_eq!(created.document["name"], "Test Workflow - Ping API");
    assert_eq!(created.document["nodes"], ping_workflow()["nodes"]);

    let mut edited = created.document.clone();
    edited["name"] = json!("Test Workflow - Ping API v2");
    let updated = deployer.deploy_document(edited).await.unwrap();
    assert_eq!(updated.action, DeployAction::Updated);
    assert_eq!(updated.id.as_deref(), Some("1"));

    let store = server.store();
    {
        let store = store.read().await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("1").unwrap().name, "Test Workflow - Ping API v2");
    }

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_deploy_never_flips_activation() {
    let mut store = MockStore::new();
    store.seed(vec![ping_workflow()]).unwrap();
    store.set_active("1", true);
    let server = start(store).await;
    let api = client(&server, KEY);

    let mut document = ping_workflow();
    document["id"] = json!("1");
    document["active"] = json!(false);
    let outcome = Deployer::new(&api).deploy_document(document).await.unwrap();

    assert_eq!(outcome.action, DeployAction::Updated);
    assert_eq!(outcome.document["active"], true);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_hardcoded_password_blocks_deploy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("leaky.json");
    let mut document = ping_workflow();
    document["nodes"][1]["parameters"]["password"] = json!("supersecretpassword12345");
    std::fs::write(&path, document.to_string()).unwrap();

    let server = start(MockStore::new()).await;
    let api = client(&server, KEY);
    let summary = Deployer::new(&api)
        .with_validation(true)
        .deploy(&[path])
        .await;

    assert_eq!(summary.imported, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].code, "VALIDATION_ERROR");
    assert!(server.store().read().await.is_empty());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_export_all_writes_one_file_per_workflow() {
    let mut store = MockStore::new();
    store
        .seed(vec![json!({
            "name": "Test Workflow",
            "nodes": [],
            "connections": {}
        })])
        .unwrap();
    let server = start(store).await;
    let api = client(&server, KEY);
    let dir = tempfile::tempdir().unwrap();

    let summary = Exporter::new(&api, dir.path()).export(None).await.unwrap();
    assert_eq!(summary.exported, 1);
    assert_eq!(summary.failed, 0);

    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);

    let written = parse_document_file(&dir.path().join("test-workflow.json")).unwrap();
    let fetched = api.get_workflow("1").await.unwrap();
    assert_eq!(written, fetched);
    assert_eq!(written["id"], "1");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_export_records_missing_ids() {
    let mut store = MockStore::new();
    store.seed(vec![ping_workflow()]).unwrap();
    let server = start(store).await;
    let api = client(&server, KEY);
    let dir = tempfile::tempdir().unwrap();

    let ids = vec!["1".to_string(), "99".to_string()];
    let summary = Exporter::new(&api, dir.path())
        .export(Some(&ids))
        .await
        .unwrap();

    assert_eq!(summary.exported, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].item, "99");
    assert!(summary.failures[0].message.contains("404"));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_base_url_stops_export_before_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("exported");
    let config = Config {
        workflows_dir: output_dir.clone(),
        ..Config::default()
    };

    let result = match connect(&config, Instance::Primary) {
        Ok(api) => Exporter::new(api.as_ref(), &config.workflows_dir)
            .export(None)
            .await
            .map(|_| ()),
        Err(e) => Err(e),
    };

    let err = result.unwrap_err();
    assert_eq!(err.code(), "CONFIG_ERROR");
    assert!(err.to_string().contains("FLOWCTL_BASE_URL"));
    assert!(!output_dir.exists());
}

#[tokio::test]
async fn test_rejected_keys_are_api_errors() {
    let server = start(MockStore::new()).await;

    let err = client(&server, INVALID_API_KEY)
        .list_workflows()
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));

    let err = client(&server, "wrong-key")
        .list_workflows()
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_integration_cycle_leaves_no_workflow_behind() {
    let server = start(MockStore::new()).await;
    let api = client(&server, KEY);

    let report = run_integration_test(&api, &ping_workflow()).await;
    assert!(report.passed());
    assert_eq!(report.workflow_id.as_deref(), Some("1"));
    assert_eq!(report.step("activate").unwrap().status, StepStatus::Passed);
    assert!(server.store().read().await.is_empty());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_healthz_needs_no_key() {
    let server = start(MockStore::new()).await;

    let body: Value = reqwest::get(format!("{}/healthz", server.base_url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");

    let status = reqwest::get(format!("{}/api/v1/workflows", server.base_url()))
        .await
        .unwrap()
        .status();
    assert_eq!(status.as_u16(), 401);

    server.shutdown().await.unwrap();
}
