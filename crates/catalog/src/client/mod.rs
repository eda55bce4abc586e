//! Downstream session driver.
//!
//! Each call performs a full MCP handshake with a downstream server (spawn
//! or connect, `initialize`, `notifications/initialized`, the real request)
//! and tears the session down again. Re-handshaking per request trades some
//! latency for total statelessness: nothing multiplexes request ids over a
//! long-lived child, so the proxy layer stays trivially concurrency-safe.

mod decode;
mod http;
mod stdio;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::time::timeout;

use crate::config::McpServer;
use crate::rpc::{RpcResponse, JSONRPC_VERSION};
use crate::types::{LogLevel, McpTool};

pub(crate) use decode::decode_response;

/// Hard deadline for one downstream interaction, handshake included.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// MCP protocol version advertised in both directions.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client identity presented when forwarding proxy traffic.
pub const PROXY_CLIENT_NAME: &str = "mcp-catalog-proxy";

/// Client identity presented during health checks.
pub const MANAGER_CLIENT_NAME: &str = "mcp-manager";

pub const CLIENT_VERSION: &str = "1.0.0";

/// Receives progress and stderr lines emitted while a session is driven.
pub type LogSink = Arc<dyn Fn(LogLevel, String) + Send + Sync>;

/// Metadata a downstream reported in its `initialize` result.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    pub server_name: String,
    pub server_version: String,
    pub protocol_version: String,
}

impl Handshake {
    /// Pull the interesting fields out of an `initialize` result, tolerating
    /// any shape: a downstream that omits them still counts as initialized.
    fn from_initialize_result(result: &Value) -> Self {
        let text = |v: Option<&Value>| v.and_then(Value::as_str).unwrap_or_default().to_string();
        let server_info = result.get("serverInfo");
        Self {
            server_name: text(server_info.and_then(|v| v.get("name"))),
            server_version: text(server_info.and_then(|v| v.get("version"))),
            protocol_version: text(result.get("protocolVersion")),
        }
    }
}

/// Everything a health check learns from one downstream session.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub handshake: Handshake,
    pub tools: Vec<McpTool>,
    /// `tools/list` failure after a successful handshake; non-fatal.
    pub tools_error: Option<String>,
}

/// Errors from driving a downstream session.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("missing command for stdio server")]
    MissingCommand,

    #[error("missing url for streamableHttp server")]
    MissingUrl,

    #[error("spawn: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("write request: {0}")]
    Write(#[source] std::io::Error),

    #[error("read response: {0}")]
    Read(#[source] std::io::Error),

    #[error("parse response: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("http request: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("empty response body")]
    EmptyBody,

    #[error("unable to decode response: {0}")]
    Decode(String),

    #[error("response id={0} not found")]
    ResponseIdNotFound(i64),

    #[error("initialize: {0}")]
    Initialize(String),

    #[error("{method}: {message}")]
    Call { method: String, message: String },

    #[error("timed out after {}s", CALL_TIMEOUT.as_secs())]
    Timeout,
}

/// One live downstream session, independent of transport.
#[async_trait]
trait Session: Send {
    /// Perform the `initialize` handshake and send
    /// `notifications/initialized`, returning the reported metadata.
    async fn initialize(&mut self, client_name: &str) -> Result<Handshake, DriverError>;

    /// Issue a request with the given id and return the raw envelope.
    async fn call(&mut self, id: i64, method: &str, params: Value) -> Result<RpcResponse, DriverError>;
}

/// Forward one request to a downstream server and return its raw result.
///
/// The entire interaction, from spawn/connect through teardown, is bounded
/// by [`CALL_TIMEOUT`]. Child processes and HTTP sessions are cleaned up on
/// every exit path, timeouts included.
pub async fn forward(server: &McpServer, method: &str, params: Value) -> Result<Value, DriverError> {
    let call = async {
        if server.is_streamable_http() {
            let mut session = http::HttpSession::connect(server)?;
            let outcome = drive(&mut session, PROXY_CLIENT_NAME, method, params).await;
            session.close().await;
            outcome
        } else {
            let mut session = stdio::StdioSession::spawn(server, stdio::StderrMode::Drain)?;
            let outcome = drive(&mut session, PROXY_CLIENT_NAME, method, params).await;
            session.shutdown().await;
            outcome
        }
    };
    match timeout(CALL_TIMEOUT, call).await {
        Ok(outcome) => outcome,
        Err(_) => Err(DriverError::Timeout),
    }
}

/// Handshake with a downstream server, discover its tools, and report what
/// was learned. Progress and captured stderr lines go to `sink`.
///
/// A `tools/list` failure after a successful handshake is recorded on the
/// returned [`Inspection`] instead of failing the call.
pub async fn inspect(server: &McpServer, sink: LogSink) -> Result<Inspection, DriverError> {
    let probe_session = async {
        if server.is_streamable_http() {
            let mut session = http::HttpSession::connect(server)?;
            sink(
                LogLevel::Info,
                format!("Connecting via streamable HTTP: {}", session.url()),
            );
            let outcome = probe(&mut session, &sink).await;
            session.close().await;
            outcome
        } else {
            let mut session = stdio::StdioSession::spawn(server, stdio::StderrMode::Capture(sink.clone()))?;
            if let Some(pid) = session.pid() {
                sink(LogLevel::Info, format!("Started with PID {pid}"));
            }
            let outcome = probe(&mut session, &sink).await;
            session.shutdown().await;
            outcome
        }
    };
    match timeout(CALL_TIMEOUT, probe_session).await {
        Ok(outcome) => outcome,
        Err(_) => Err(DriverError::Timeout),
    }
}

/// Handshake, then issue the caller's request with id 2.
async fn drive(
    session: &mut dyn Session,
    client_name: &str,
    method: &str,
    params: Value,
) -> Result<Value, DriverError> {
    session.initialize(client_name).await?;
    let response = session.call(2, method, params).await?;
    if let Some(err) = response.error {
        return Err(DriverError::Call {
            method: method.to_string(),
            message: err.message,
        });
    }
    Ok(response.result.unwrap_or_else(|| json!({})))
}

/// Handshake, then discover tools, treating `tools/list` failure as a
/// warning rather than an error.
async fn probe(session: &mut dyn Session, sink: &LogSink) -> Result<Inspection, DriverError> {
    let handshake = session.initialize(MANAGER_CLIENT_NAME).await?;
    sink(
        LogLevel::Info,
        format!(
            "MCP initialized: {} {} (protocol {})",
            handshake.server_name, handshake.server_version, handshake.protocol_version
        ),
    );

    let (tools, tools_error) = match list_tools(session).await {
        Ok(tools) => {
            sink(LogLevel::Info, format!("Discovered {} tools", tools.len()));
            (tools, None)
        }
        Err(err) => (Vec::new(), Some(err.to_string())),
    };

    Ok(Inspection {
        handshake,
        tools,
        tools_error,
    })
}

async fn list_tools(session: &mut dyn Session) -> Result<Vec<McpTool>, DriverError> {
    let response = session.call(2, "tools/list", json!({})).await?;
    if let Some(err) = response.error {
        return Err(DriverError::Call {
            method: "tools/list".to_string(),
            message: err.message,
        });
    }
    parse_tools(response.result.unwrap_or_else(|| json!({})))
}

/// Extract the `tools` array from a `tools/list` result.
pub(crate) fn parse_tools(result: Value) -> Result<Vec<McpTool>, DriverError> {
    #[derive(serde::Deserialize)]
    struct ToolsListResult {
        #[serde(default)]
        tools: Vec<McpTool>,
    }
    let parsed: ToolsListResult = serde_json::from_value(result).map_err(DriverError::Parse)?;
    Ok(parsed.tools)
}

/// Build a JSON-RPC request value; notifications pass `id = None`.
fn request_value(id: Option<i64>, method: &str, params: Option<Value>) -> Value {
    let mut request = Map::new();
    request.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
    if let Some(id) = id {
        request.insert("id".to_string(), json!(id));
    }
    request.insert("method".to_string(), Value::String(method.to_string()));
    if let Some(params) = params {
        request.insert("params".to_string(), params);
    }
    Value::Object(request)
}

fn initialize_params(client_name: &str) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": client_name,
            "version": CLIENT_VERSION,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_tolerates_missing_fields() {
        let handshake = Handshake::from_initialize_result(&json!({}));
        assert!(handshake.server_name.is_empty());

        let handshake = Handshake::from_initialize_result(&json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {"name": "echo", "version": "0.1"}
        }));
        assert_eq!(handshake.server_name, "echo");
        assert_eq!(handshake.server_version, "0.1");
        assert_eq!(handshake.protocol_version, "2024-11-05");
    }

    #[test]
    fn request_value_omits_absent_parts() {
        let notification = request_value(None, "notifications/initialized", None);
        assert_eq!(
            notification,
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"})
        );

        let call = request_value(Some(2), "tools/list", Some(json!({})));
        assert_eq!(
            call,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": {}})
        );
    }

    #[test]
    fn parse_tools_accepts_missing_list() {
        assert!(parse_tools(json!({})).unwrap().is_empty());
        let tools = parse_tools(json!({"tools": [{"name": "ping"}]})).unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "ping");
    }

    #[tokio::test]
    async fn forward_rejects_empty_stdio_descriptor() {
        let server = McpServer::default();
        let err = forward(&server, "tools/list", json!({})).await.unwrap_err();
        assert!(matches!(err, DriverError::MissingCommand));
    }
}
