//! Data models for the catalog configuration document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The full configuration document.
///
/// Wire-compatible with the `mcpServers` format used by common MCP clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogConfig {
    /// Map of server names to server configurations.
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: IndexMap<String, McpServer>,

    /// Seconds between periodic health checks; zero or negative disables them.
    #[serde(rename = "healthCheckInterval", default, skip_serializing_if = "is_zero")]
    pub health_check_interval: i64,
}

impl CatalogConfig {
    /// Normalize every server entry in place.
    pub fn normalize(&mut self) {
        for server in self.mcp_servers.values_mut() {
            server.normalize();
        }
    }
}

/// Configuration for a single downstream MCP server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct McpServer {
    /// Transport override; inferred from `url`/`command` when absent.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportKind>,

    /// Endpoint for the streamable HTTP transport.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Command to execute for the stdio transport.
    #[serde(default)]
    pub command: String,

    /// Arguments to pass to the command.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Extra environment variables for the child; later entries win over the
    /// inherited process environment.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,

    /// Whether this server participates in health checks and aggregation.
    #[serde(default)]
    pub enabled: bool,
}

impl McpServer {
    /// Trim whitespace and infer the transport when it was left unset.
    pub fn normalize(&mut self) {
        self.url = self.url.trim().to_string();
        self.command = self.command.trim().to_string();
        if !self.url.is_empty() && self.transport.is_none() {
            self.transport = Some(TransportKind::StreamableHttp);
        }
    }

    /// Check if this server uses the streamable HTTP transport.
    pub fn is_streamable_http(&self) -> bool {
        matches!(self.transport, Some(TransportKind::StreamableHttp))
            || (!self.url.trim().is_empty() && self.command.trim().is_empty())
    }

    /// A server needs a command or a URL to be health-checkable at all.
    pub fn is_checkable(&self) -> bool {
        !self.command.trim().is_empty() || !self.url.trim().is_empty()
    }
}

/// Transport used to reach a downstream server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportKind {
    #[serde(rename = "stdio")]
    Stdio,
    #[serde(rename = "streamableHttp", alias = "streamablehttp", alias = "streamableHTTP")]
    StreamableHttp,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Stdio => write!(f, "stdio"),
            TransportKind::StreamableHttp => write!(f, "streamableHttp"),
        }
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}
