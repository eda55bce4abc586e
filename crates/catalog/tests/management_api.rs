//! Integration tests for the REST management API.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};

use mcp_catalog::config::Store;
use mcp_catalog::manager::HealthManager;
use mcp_catalog::server;

async fn spawn_app(store: Arc<Store>) -> SocketAddr {
    let manager = Arc::new(HealthManager::new(Arc::clone(&store)));
    let state = server::build_state(store, manager);
    let router = server::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn new_store(dir: &tempfile::TempDir) -> Arc<Store> {
    let store = Arc::new(Store::new(dir.path().join("config.json")));
    store.load().unwrap();
    store
}

#[tokio::test]
async fn server_crud_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_app(new_store(&dir)).await;
    let client = reqwest::Client::new();

    // Add a disabled server.
    let response = client
        .put(format!("http://{addr}/api/servers/files"))
        .json(&json!({"command": "mcp-files", "args": ["--root", "/srv"], "enabled": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // It shows up, unchecked, in both views.
    let info: Value = client
        .get(format!("http://{addr}/api/servers/files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["name"], "files");
    assert_eq!(info["status"], "unchecked");
    assert_eq!(info["config"]["command"], "mcp-files");

    let all: Value = client
        .get(format!("http://{addr}/api/servers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(all.get("files").is_some());

    // Delete it; it is gone from both the registry and the manager.
    let response = client
        .delete(format!("http://{addr}/api/servers/files"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .get(format!("http://{addr}/api/servers/files"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn settings_persist_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&dir);
    let addr = spawn_app(Arc::clone(&store)).await;
    let client = reqwest::Client::new();

    let settings: Value = client
        .get(format!("http://{addr}/api/settings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(settings["healthCheckInterval"], 0);

    let response = client
        .put(format!("http://{addr}/api/settings"))
        .json(&json!({"healthCheckInterval": 30}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let settings: Value = client
        .get(format!("http://{addr}/api/settings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(settings["healthCheckInterval"], 30);
    assert_eq!(store.health_check_interval(), 30);
}

#[tokio::test]
async fn config_replace_export_import() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_app(new_store(&dir)).await;
    let client = reqwest::Client::new();

    let document = json!({
        "mcpServers": {
            "remote": {"url": "https://mcp.example.com/mcp", "enabled": true}
        },
        "healthCheckInterval": 15
    });

    let response = client
        .put(format!("http://{addr}/api/config"))
        .json(&document)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Normalization inferred the transport for the url-only server.
    let config: Value = client
        .get(format!("http://{addr}/api/config"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(config["mcpServers"]["remote"]["type"], "streamableHttp");
    assert_eq!(config["healthCheckInterval"], 15);

    let response = client
        .get(format!("http://{addr}/api/config/export"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        "attachment; filename=mcp-servers.json"
    );
    let exported = response.text().await.unwrap();
    assert!(exported.contains("mcpServers"));

    // Import replaces the document wholesale.
    let response = client
        .post(format!("http://{addr}/api/config/import"))
        .json(&json!({"mcpServers": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let config: Value = client
        .get(format!("http://{addr}/api/config"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(config["mcpServers"].as_object().unwrap().is_empty());
}
