//! JSON-RPC 2.0 envelope shared by the upstream and downstream transports.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Request could not be parsed as JSON.
pub const PARSE_ERROR: i64 = -32700;
/// Unknown method, tool, prompt, or resource.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Malformed or missing request parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal encoding failure.
pub const INTERNAL_ERROR: i64 = -32603;
/// Downstream call or session failure.
pub const DOWNSTREAM_ERROR: i64 = -32000;

/// A JSON-RPC request or notification (no `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A JSON-RPC response envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    /// Build a success response.
    pub fn result(id: Option<i64>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn error(id: Option<i64>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    /// A decoded envelope that carries neither a version marker nor a
    /// result/error is noise (e.g. an unrelated SSE frame), not a response.
    pub fn is_meaningful(&self) -> bool {
        !self.jsonrpc.is_empty() || self.result.is_some() || self.error.is_some()
    }
}
