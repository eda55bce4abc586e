//! Aggregating proxy: one upstream MCP surface over every enabled
//! downstream server.
//!
//! Tool and prompt names are rewritten to `<server>__<name>`; resource URIs
//! are rewritten through the codec in [`uri`]. Two bindings share this
//! aggregation core: the HTTP transport in [`http`] (session-scoped route
//! maps) and the stdio transport in [`stdio`] (connection-local maps).

pub mod http;
mod session;
pub mod stdio;
mod uri;

pub use session::{RouteTable, SessionStore};
pub use uri::{build_proxy_resource_uri, parse_proxy_resource_uri, RESOURCE_PREFIX, RESOURCE_TEMPLATE_PREFIX};

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::client::{self, DriverError};
use crate::config::{McpServer, Store};
use crate::types::McpTool;

/// Separator between the server name and the original identifier in
/// proxied tool and prompt names; split on the first occurrence.
pub const NAME_SEPARATOR: &str = "__";

/// Resolution record for a proxied tool name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRoute {
    pub server_name: String,
    pub tool_name: String,
}

/// Resolution record for a proxied prompt name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRoute {
    pub server_name: String,
    pub prompt_name: String,
}

/// Resolution record for a proxied resource or resource-template URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRoute {
    pub server_name: String,
    pub original_uri: String,
    pub is_template: bool,
}

/// Errors from forwarding an upstream request downstream.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("server {name:?} not found")]
    ServerNotFound { name: String },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// The `initialize` result advertised to upstream clients.
pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": client::PROTOCOL_VERSION,
        "capabilities": {
            "tools": {"listChanged": true},
            "prompts": {"listChanged": true},
            "resources": {"listChanged": true},
        },
        "serverInfo": {
            "name": client::PROXY_CLIENT_NAME,
            "version": client::CLIENT_VERSION,
        },
    })
}

/// Resolve a proxied tool name by naming convention alone.
pub fn fallback_tool_route(name: &str) -> Option<ToolRoute> {
    let (server_name, tool_name) = name.split_once(NAME_SEPARATOR)?;
    Some(ToolRoute {
        server_name: server_name.to_string(),
        tool_name: tool_name.to_string(),
    })
}

/// Resolve a proxied prompt name by naming convention alone.
pub fn fallback_prompt_route(name: &str) -> Option<PromptRoute> {
    let (server_name, prompt_name) = name.split_once(NAME_SEPARATOR)?;
    Some(PromptRoute {
        server_name: server_name.to_string(),
        prompt_name: prompt_name.to_string(),
    })
}

/// Shared aggregation and forwarding logic behind both proxy bindings.
#[derive(Clone)]
pub struct ProxyCore {
    store: Arc<Store>,
}

impl ProxyCore {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// List tools across all enabled downstreams in parallel.
    ///
    /// A downstream that fails to list is skipped so one broken server does
    /// not poison the aggregate. Output keeps the configuration document's
    /// server order.
    pub async fn aggregate_tools(&self) -> (Vec<McpTool>, HashMap<String, ToolRoute>) {
        let mut tools = Vec::new();
        let mut routes = HashMap::new();
        for (server_name, listing) in self.collect_listings("tools/list").await {
            let Ok(parsed) = client::parse_tools(listing) else {
                continue;
            };
            for tool in parsed {
                let proxied_name = format!("{server_name}{NAME_SEPARATOR}{}", tool.name);
                routes.insert(
                    proxied_name.clone(),
                    ToolRoute {
                        server_name: server_name.clone(),
                        tool_name: tool.name,
                    },
                );
                tools.push(McpTool {
                    name: proxied_name,
                    description: tool.description,
                    input_schema: tool.input_schema,
                });
            }
        }
        (tools, routes)
    }

    /// List prompts across all enabled downstreams, rewriting names.
    pub async fn aggregate_prompts(&self) -> (Vec<Map<String, Value>>, HashMap<String, PromptRoute>) {
        let mut prompts = Vec::new();
        let mut routes = HashMap::new();
        for (server_name, listing) in self.collect_listings("prompts/list").await {
            let Some(items) = object_list(&listing, "prompts") else {
                continue;
            };
            for mut prompt in items {
                let Some(name) = prompt.get("name").and_then(Value::as_str).map(str::to_string) else {
                    continue;
                };
                if name.is_empty() {
                    continue;
                }
                let proxied_name = format!("{server_name}{NAME_SEPARATOR}{name}");
                prompt.insert("name".to_string(), Value::String(proxied_name.clone()));
                prompts.push(prompt);
                routes.insert(
                    proxied_name,
                    PromptRoute {
                        server_name: server_name.clone(),
                        prompt_name: name,
                    },
                );
            }
        }
        (prompts, routes)
    }

    /// List resources across all enabled downstreams, rewriting URIs into
    /// the proxy scheme and decorating names with the server they came from.
    pub async fn aggregate_resources(&self) -> (Vec<Map<String, Value>>, HashMap<String, ResourceRoute>) {
        let mut resources = Vec::new();
        let mut routes = HashMap::new();
        for (server_name, listing) in self.collect_listings("resources/list").await {
            let Some(items) = object_list(&listing, "resources") else {
                continue;
            };
            for mut resource in items {
                let Some(uri) = resource.get("uri").and_then(Value::as_str).map(str::to_string) else {
                    continue;
                };
                if uri.is_empty() {
                    continue;
                }
                let proxy_uri = build_proxy_resource_uri(&server_name, &uri, false);
                resource.insert("uri".to_string(), Value::String(proxy_uri.clone()));
                decorate_name(&mut resource, &server_name);
                resources.push(resource);
                routes.insert(
                    proxy_uri,
                    ResourceRoute {
                        server_name: server_name.clone(),
                        original_uri: uri,
                        is_template: false,
                    },
                );
            }
        }
        (resources, routes)
    }

    /// List resource templates; like resources but keyed on `uriTemplate`.
    pub async fn aggregate_resource_templates(
        &self,
    ) -> (Vec<Map<String, Value>>, HashMap<String, ResourceRoute>) {
        let mut templates = Vec::new();
        let mut routes = HashMap::new();
        for (server_name, listing) in self.collect_listings("resources/templates/list").await {
            let Some(items) = object_list(&listing, "resourceTemplates") else {
                continue;
            };
            for mut template in items {
                let Some(uri) = template
                    .get("uriTemplate")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                else {
                    continue;
                };
                if uri.is_empty() {
                    continue;
                }
                let proxy_uri = build_proxy_resource_uri(&server_name, &uri, true);
                template.insert("uriTemplate".to_string(), Value::String(proxy_uri.clone()));
                decorate_name(&mut template, &server_name);
                templates.push(template);
                routes.insert(
                    proxy_uri,
                    ResourceRoute {
                        server_name: server_name.clone(),
                        original_uri: uri,
                        is_template: true,
                    },
                );
            }
        }
        (templates, routes)
    }

    /// Forward a resolved `tools/call` with the original tool name.
    pub async fn call_tool(&self, route: &ToolRoute, arguments: Option<Value>) -> Result<Value, ProxyError> {
        let server = self.server(&route.server_name)?;
        let params = json!({
            "name": route.tool_name,
            "arguments": arguments.unwrap_or_else(|| json!({})),
        });
        Ok(client::forward(&server, "tools/call", params).await?)
    }

    /// Forward `prompts/get` with its name already restored.
    pub async fn prompt_get(&self, server_name: &str, params: Map<String, Value>) -> Result<Value, ProxyError> {
        let server = self.server(server_name)?;
        Ok(client::forward(&server, "prompts/get", Value::Object(params)).await?)
    }

    /// Forward `resources/read` with its URI already restored.
    pub async fn resource_read(&self, server_name: &str, params: Map<String, Value>) -> Result<Value, ProxyError> {
        let server = self.server(server_name)?;
        Ok(client::forward(&server, "resources/read", Value::Object(params)).await?)
    }

    fn server(&self, name: &str) -> Result<McpServer, ProxyError> {
        self.store
            .get_server(name)
            .ok_or_else(|| ProxyError::ServerNotFound { name: name.to_string() })
    }

    /// Issue one listing request to every enabled downstream in parallel and
    /// return the successful results in configuration order.
    async fn collect_listings(&self, method: &str) -> Vec<(String, Value)> {
        let config = self.store.get();
        let enabled: Vec<(String, McpServer)> = config
            .mcp_servers
            .into_iter()
            .filter(|(_, server)| server.enabled)
            .collect();

        let listings = join_all(enabled.iter().map(|(name, server)| async move {
            match client::forward(server, method, json!({})).await {
                Ok(result) => Some((name.clone(), result)),
                Err(err) => {
                    tracing::debug!("{method} against '{name}' failed: {err}");
                    None
                }
            }
        }))
        .await;

        listings.into_iter().flatten().collect()
    }
}

/// Pull `key` out of a listing result as a list of objects. A missing key is
/// an empty list; any other shape mismatch rejects the whole listing.
fn object_list(listing: &Value, key: &str) -> Option<Vec<Map<String, Value>>> {
    let payload = listing.as_object()?;
    let Some(list) = payload.get(key) else {
        return Some(Vec::new());
    };
    list.as_array()?
        .iter()
        .map(|item| item.as_object().cloned())
        .collect()
}

fn decorate_name(item: &mut Map<String, Value>, server_name: &str) {
    if let Some(name) = item.get("name").and_then(Value::as_str) {
        if !name.is_empty() {
            let decorated = format!("{server_name} :: {name}");
            item.insert("name".to_string(), Value::String(decorated));
        }
    }
}

/// Shared JSON-RPC error messages used by both bindings.
pub(crate) mod messages {
    pub const MISSING_SESSION: &str = "missing or invalid MCP session";
    pub const TOOL_NOT_FOUND: &str = "tool not found";
    pub const PROMPT_NOT_FOUND: &str = "prompt not found";
    pub const RESOURCE_NOT_FOUND: &str = "resource not found";
}
