//! Tool metadata discovered from downstream servers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool exposed by a downstream MCP server.
///
/// `input_schema` is carried opaquely so that schema fields the catalog does
/// not know about survive the round trip through the proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}
