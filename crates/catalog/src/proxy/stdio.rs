//! Stdio binding of the aggregating proxy: newline-delimited JSON-RPC 2.0 on
//! standard input/output. There are no sessions: the connection itself is
//! the scope, so route maps live in connection-local variables.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::config::Store;
use crate::rpc::{
    RpcRequest, RpcResponse, DOWNSTREAM_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR,
};

use super::messages;
use super::{
    fallback_prompt_route, fallback_tool_route, initialize_result, parse_proxy_resource_uri,
    PromptRoute, ProxyCore, ResourceRoute, ToolRoute,
};

/// Upstream lines larger than this abort the connection.
pub const MAX_LINE_BYTES: usize = 2 * 1024 * 1024;

/// Serve the proxy over this process's standard streams until EOF.
pub async fn run(store: Arc<Store>) -> std::io::Result<()> {
    let proxy = ProxyCore::new(store);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    serve(proxy, stdin, &mut stdout).await
}

/// The connection loop, generic over its streams so alternate hosts and
/// tests can drive it.
pub async fn serve<R, W>(proxy: ProxyCore, mut input: R, output: &mut W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut tool_routes: HashMap<String, ToolRoute> = HashMap::new();
    let mut prompt_routes: HashMap<String, PromptRoute> = HashMap::new();
    let mut resource_routes: HashMap<String, ResourceRoute> = HashMap::new();
    let mut template_routes: HashMap<String, ResourceRoute> = HashMap::new();

    let mut line = Vec::new();
    loop {
        line.clear();
        let read = input.read_until(b'\n', &mut line).await?;
        if read == 0 {
            return Ok(());
        }
        if line.len() > MAX_LINE_BYTES {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "request line exceeds 2 MiB",
            ));
        }

        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        let request: RpcRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(_) => {
                write_response(output, RpcResponse::error(Some(0), PARSE_ERROR, "parse error")).await?;
                continue;
            }
        };

        match request.method.as_str() {
            "initialize" => {
                write_response(output, RpcResponse::result(request.id, initialize_result())).await?;
            }
            // Notifications have no response.
            "notifications/initialized" => {}
            "tools/list" => {
                let (tools, routes) = proxy.aggregate_tools().await;
                tool_routes = routes;
                write_response(output, RpcResponse::result(request.id, json!({"tools": tools}))).await?;
            }
            "tools/call" => {
                let params = request.params.as_ref().and_then(Value::as_object);
                let name = params
                    .and_then(|p| p.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if name.is_empty() {
                    let error = RpcResponse::error(request.id, INVALID_PARAMS, "invalid tools/call params");
                    write_response(output, error).await?;
                    continue;
                }
                let Some(route) = tool_routes
                    .get(name)
                    .cloned()
                    .or_else(|| fallback_tool_route(name))
                else {
                    let error = RpcResponse::error(request.id, METHOD_NOT_FOUND, messages::TOOL_NOT_FOUND);
                    write_response(output, error).await?;
                    continue;
                };
                let arguments = params.and_then(|p| p.get("arguments")).cloned();
                let response = match proxy.call_tool(&route, arguments).await {
                    Ok(result) => RpcResponse::result(request.id, result),
                    Err(err) => RpcResponse::error(request.id, DOWNSTREAM_ERROR, err.to_string()),
                };
                write_response(output, response).await?;
            }
            "prompts/list" => {
                let (prompts, routes) = proxy.aggregate_prompts().await;
                prompt_routes = routes;
                write_response(output, RpcResponse::result(request.id, json!({"prompts": prompts}))).await?;
            }
            "prompts/get" => {
                let Some(mut params) = request.params.as_ref().and_then(Value::as_object).cloned() else {
                    let error = RpcResponse::error(request.id, INVALID_PARAMS, "invalid prompts/get params");
                    write_response(output, error).await?;
                    continue;
                };
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let Some(route) = prompt_routes
                    .get(&name)
                    .cloned()
                    .or_else(|| fallback_prompt_route(&name))
                else {
                    let error = RpcResponse::error(request.id, METHOD_NOT_FOUND, messages::PROMPT_NOT_FOUND);
                    write_response(output, error).await?;
                    continue;
                };
                params.insert("name".to_string(), Value::String(route.prompt_name.clone()));
                let response = match proxy.prompt_get(&route.server_name, params).await {
                    Ok(result) => RpcResponse::result(request.id, result),
                    Err(err) => RpcResponse::error(request.id, DOWNSTREAM_ERROR, err.to_string()),
                };
                write_response(output, response).await?;
            }
            "resources/list" => {
                let (resources, routes) = proxy.aggregate_resources().await;
                resource_routes = routes;
                let result = json!({"resources": resources});
                write_response(output, RpcResponse::result(request.id, result)).await?;
            }
            "resources/templates/list" => {
                let (templates, routes) = proxy.aggregate_resource_templates().await;
                template_routes = routes;
                let result = json!({"resourceTemplates": templates});
                write_response(output, RpcResponse::result(request.id, result)).await?;
            }
            "resources/read" => {
                let Some(mut params) = request.params.as_ref().and_then(Value::as_object).cloned() else {
                    let error = RpcResponse::error(request.id, INVALID_PARAMS, "invalid resources/read params");
                    write_response(output, error).await?;
                    continue;
                };
                let uri = params
                    .get("uri")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let Some(route) = resource_routes
                    .get(&uri)
                    .or_else(|| template_routes.get(&uri))
                    .cloned()
                    .or_else(|| parse_proxy_resource_uri(&uri))
                else {
                    let error = RpcResponse::error(request.id, METHOD_NOT_FOUND, messages::RESOURCE_NOT_FOUND);
                    write_response(output, error).await?;
                    continue;
                };
                params.insert("uri".to_string(), Value::String(route.original_uri.clone()));
                let response = match proxy.resource_read(&route.server_name, params).await {
                    Ok(result) => RpcResponse::result(request.id, result),
                    Err(err) => RpcResponse::error(request.id, DOWNSTREAM_ERROR, err.to_string()),
                };
                write_response(output, response).await?;
            }
            other => {
                let message = format!("method not found: {other}");
                write_response(output, RpcResponse::error(request.id, METHOD_NOT_FOUND, message)).await?;
            }
        }
    }
}

async fn write_response<W: AsyncWrite + Unpin>(output: &mut W, response: RpcResponse) -> std::io::Result<()> {
    let mut buffer = serde_json::to_vec(&response)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
    buffer.push(b'\n');
    output.write_all(&buffer).await?;
    output.flush().await
}
