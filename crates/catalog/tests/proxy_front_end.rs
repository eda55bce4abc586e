//! Integration tests for the aggregating proxy core and its stdio binding.

mod common;

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::BufReader;

use mcp_catalog::config::{McpServer, Store};
use mcp_catalog::proxy::{self, ProxyCore, ToolRoute};

use common::{echoing_server, hosts_resource_server, ping_tool_server};

fn new_store(dir: &tempfile::TempDir) -> Arc<Store> {
    let store = Arc::new(Store::new(dir.path().join("config.json")));
    store.load().unwrap();
    store
}

/// Drive the stdio binding with a scripted upstream conversation and return
/// the parsed response lines.
async fn drive_stdio(store: Arc<Store>, requests: &[Value]) -> Vec<Value> {
    let mut input = String::new();
    for request in requests {
        input.push_str(&request.to_string());
        input.push('\n');
    }
    let mut output: Vec<u8> = Vec::new();
    proxy::stdio::serve(ProxyCore::new(store), BufReader::new(input.as_bytes()), &mut output)
        .await
        .unwrap();

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn aggregates_tools_from_every_enabled_downstream() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&dir);
    store.add_server("a", ping_tool_server()).unwrap();
    store.add_server("b", ping_tool_server()).unwrap();

    let proxy = ProxyCore::new(store);
    let (tools, routes) = proxy.aggregate_tools().await;

    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["a__ping", "b__ping"]);
    assert_eq!(
        routes.get("a__ping"),
        Some(&ToolRoute {
            server_name: "a".into(),
            tool_name: "ping".into()
        })
    );
}

#[tokio::test]
async fn broken_and_disabled_downstreams_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&dir);
    store.add_server("good", ping_tool_server()).unwrap();
    store
        .add_server(
            "broken",
            McpServer {
                command: "false".into(),
                enabled: true,
                ..Default::default()
            },
        )
        .unwrap();
    let mut disabled = ping_tool_server();
    disabled.enabled = false;
    store.add_server("disabled", disabled).unwrap();

    let proxy = ProxyCore::new(store);
    let (tools, _) = proxy.aggregate_tools().await;
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["good__ping"]);
}

#[tokio::test]
async fn call_tool_forwards_the_original_name() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&dir);
    store.add_server("a", echoing_server()).unwrap();

    let proxy = ProxyCore::new(store);
    let route = ToolRoute {
        server_name: "a".into(),
        tool_name: "ping".into(),
    };
    let result = proxy.call_tool(&route, Some(json!({"n": 7}))).await.unwrap();

    assert_eq!(result["echo"]["method"], "tools/call");
    assert_eq!(result["echo"]["params"]["name"], "ping");
    assert_eq!(result["echo"]["params"]["arguments"]["n"], 7);
}

#[tokio::test]
async fn call_tool_defaults_arguments_to_an_empty_object() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&dir);
    store.add_server("a", echoing_server()).unwrap();

    let proxy = ProxyCore::new(store);
    let route = ToolRoute {
        server_name: "a".into(),
        tool_name: "ping".into(),
    };
    let result = proxy.call_tool(&route, None).await.unwrap();
    assert_eq!(result["echo"]["params"]["arguments"], json!({}));
}

#[tokio::test]
async fn stdio_binding_answers_initialize() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&dir);

    let responses = drive_stdio(
        store,
        &[json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}})],
    )
    .await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "mcp-catalog-proxy");
}

#[tokio::test]
async fn stdio_binding_resolves_tools_without_a_prior_listing() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&dir);
    store.add_server("srv", echoing_server()).unwrap();

    // No tools/list first: resolution falls back to the `server__tool` split.
    let responses = drive_stdio(
        store,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "srv__do", "arguments": {"x": true}}}),
        ],
    )
    .await;

    assert_eq!(responses.len(), 2);
    let call = &responses[1];
    assert_eq!(call["id"], 2);
    assert_eq!(call["result"]["echo"]["params"]["name"], "do");
    assert_eq!(call["result"]["echo"]["params"]["arguments"]["x"], true);
}

#[tokio::test]
async fn stdio_binding_reports_unknown_tools_and_methods() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&dir);

    let responses = drive_stdio(
        store,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {"name": "no-separator"}}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "bogus/method"}),
        ],
    )
    .await;

    assert_eq!(responses[0]["error"]["code"], -32601);
    assert_eq!(responses[0]["error"]["message"], "tool not found");
    assert_eq!(responses[1]["error"]["code"], -32601);
    assert_eq!(responses[1]["error"]["message"], "method not found: bogus/method");
}

#[tokio::test]
async fn stdio_binding_answers_parse_errors_with_id_zero() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&dir);

    let mut output: Vec<u8> = Vec::new();
    proxy::stdio::serve(
        ProxyCore::new(store),
        BufReader::new("this is not json\n".as_bytes()),
        &mut output,
    )
    .await
    .unwrap();

    let response: Value = serde_json::from_str(String::from_utf8(output).unwrap().trim()).unwrap();
    assert_eq!(response["id"], 0);
    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["error"]["message"], "parse error");
}

#[tokio::test]
async fn stdio_binding_ignores_notifications_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&dir);

    let input = "\n{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n";
    let mut output: Vec<u8> = Vec::new();
    proxy::stdio::serve(ProxyCore::new(store), BufReader::new(input.as_bytes()), &mut output)
        .await
        .unwrap();
    assert!(output.is_empty());
}

#[tokio::test]
async fn resource_uris_rewrite_and_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(&dir);
    store.add_server("fs", hosts_resource_server()).unwrap();

    let expected_proxy_uri = "mcp-catalog://resource/fs/66696c653a2f2f2f6574632f686f737473";
    let responses = drive_stdio(
        store,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list", "params": {}}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "resources/read",
                   "params": {"uri": expected_proxy_uri}}),
        ],
    )
    .await;

    let listing = &responses[1]["result"]["resources"];
    assert_eq!(listing[0]["uri"], expected_proxy_uri);
    assert_eq!(listing[0]["name"], "fs :: hosts");

    // The read forwards the original URI, not the proxy one.
    let read = &responses[2]["result"]["echo"];
    assert_eq!(read["method"], "resources/read");
    assert_eq!(read["params"]["uri"], "file:///etc/hosts");
}
