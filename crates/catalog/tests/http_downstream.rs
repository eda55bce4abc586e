//! Integration tests for the streamable HTTP sub-driver against a fake
//! downstream server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};

use mcp_catalog::client;
use mcp_catalog::config::McpServer;

const SESSION_HEADER: &str = "MCP-Session-Id";
const FAKE_SESSION: &str = "feedfacefeedfacefeedfacefeedface";

/// What the fake downstream observed, for assertions.
#[derive(Debug, Default)]
struct Observed {
    /// (method, presented session id) per POST.
    posts: Vec<(String, Option<String>)>,
    /// Session ids presented on DELETE.
    deletes: Vec<Option<String>>,
}

#[derive(Clone)]
struct Downstream {
    observed: Arc<Mutex<Observed>>,
    /// Serve the id-2 response as SSE frames instead of a plain object.
    sse: bool,
}

async fn handle_post(State(downstream): State<Downstream>, headers: HeaderMap, body: String) -> Response {
    let request: Value = serde_json::from_str(&body).unwrap();
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let presented = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    downstream
        .observed
        .lock()
        .unwrap()
        .posts
        .push((method.clone(), presented));

    match method.as_str() {
        "initialize" => {
            let body = json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {
                    "protocolVersion": "2024-11-05",
                    "serverInfo": {"name": "fake-http", "version": "2.0"}
                }
            });
            ([(SESSION_HEADER, FAKE_SESSION)], body.to_string()).into_response()
        }
        "notifications/initialized" => StatusCode::ACCEPTED.into_response(),
        _ => {
            let envelope = json!({"jsonrpc": "2.0", "id": 2, "result": {"ok": true}});
            if downstream.sse {
                let body = format!("data: {envelope}\n\ndata: [DONE]\n");
                ([("content-type", "text/event-stream")], body).into_response()
            } else {
                envelope.to_string().into_response()
            }
        }
    }
}

async fn handle_delete(State(downstream): State<Downstream>, headers: HeaderMap) -> StatusCode {
    let presented = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    downstream.observed.lock().unwrap().deletes.push(presented);
    StatusCode::NO_CONTENT
}

async fn spawn_downstream(sse: bool) -> (SocketAddr, Arc<Mutex<Observed>>) {
    let observed = Arc::new(Mutex::new(Observed::default()));
    let downstream = Downstream {
        observed: Arc::clone(&observed),
        sse,
    };
    let router = Router::new()
        .route("/", post(handle_post).delete(handle_delete))
        .with_state(downstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, observed)
}

fn http_server(addr: SocketAddr) -> McpServer {
    let mut server = McpServer {
        url: format!("http://{addr}/"),
        enabled: true,
        ..Default::default()
    };
    server.normalize();
    server
}

#[tokio::test]
async fn forward_echoes_the_session_and_discards_it() {
    let (addr, observed) = spawn_downstream(false).await;
    let server = http_server(addr);

    let result = client::forward(&server, "tools/call", json!({"name": "ping"}))
        .await
        .unwrap();
    assert_eq!(result, json!({"ok": true}));

    let observed = observed.lock().unwrap();
    let methods: Vec<&str> = observed.posts.iter().map(|(m, _)| m.as_str()).collect();
    assert_eq!(methods, ["initialize", "notifications/initialized", "tools/call"]);

    // No session on the first request, the downstream's id echoed afterwards.
    assert_eq!(observed.posts[0].1, None);
    assert_eq!(observed.posts[1].1.as_deref(), Some(FAKE_SESSION));
    assert_eq!(observed.posts[2].1.as_deref(), Some(FAKE_SESSION));

    // Best-effort DELETE closed the session out.
    assert_eq!(observed.deletes.len(), 1);
    assert_eq!(observed.deletes[0].as_deref(), Some(FAKE_SESSION));
}

#[tokio::test]
async fn forward_decodes_sse_framed_responses() {
    let (addr, _) = spawn_downstream(true).await;
    let server = http_server(addr);

    let result = client::forward(&server, "tools/call", json!({"name": "ping"}))
        .await
        .unwrap();
    assert_eq!(result, json!({"ok": true}));
}

#[tokio::test]
async fn http_error_statuses_carry_the_body() {
    let router = Router::new().route(
        "/",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "try later") }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let server = http_server(addr);
    let err = client::forward(&server, "tools/list", json!({})).await.unwrap_err();
    assert_eq!(err.to_string(), "http status 503: try later");
}

#[tokio::test]
async fn missing_url_is_rejected() {
    let server = McpServer {
        transport: Some(mcp_catalog::config::TransportKind::StreamableHttp),
        ..Default::default()
    };
    let err = client::forward(&server, "tools/list", json!({})).await.unwrap_err();
    assert_eq!(err.to_string(), "missing url for streamableHttp server");
}
