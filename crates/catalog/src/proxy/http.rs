//! HTTP binding of the aggregating proxy: a single `/mcp` endpoint speaking
//! JSON-RPC 2.0 over POST, with sessions tracked via `MCP-Session-Id` and
//! discarded via DELETE.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};

use crate::rpc::{RpcRequest, RpcResponse, DOWNSTREAM_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND};
use crate::server::AppState;

use super::messages;
use super::{fallback_prompt_route, fallback_tool_route, initialize_result, parse_proxy_resource_uri};

static SESSION_HEADER: HeaderName = HeaderName::from_static("mcp-session-id");

/// `POST /mcp`: dispatch one JSON-RPC request.
pub async fn handle_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let request: RpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };
    let session_id = session_id_from(&headers);

    if request.method == "initialize" {
        let session_id = state.sessions.create();
        return rpc_result(request.id, initialize_result(), &session_id);
    }

    // Every other method requires a live session.
    if session_id.is_empty() || !state.sessions.contains(&session_id) {
        return session_error(request.id);
    }

    match request.method.as_str() {
        "notifications/initialized" => {
            let mut response = StatusCode::NO_CONTENT.into_response();
            set_session_header(&mut response, &session_id);
            response
        }
        "tools/list" => {
            let (tools, routes) = state.proxy.aggregate_tools().await;
            state.sessions.set_tool_routes(&session_id, routes);
            rpc_result(request.id, json!({"tools": tools}), &session_id)
        }
        "tools/call" => {
            let Some(params) = request.params.as_ref().and_then(Value::as_object) else {
                return rpc_error(request.id, INVALID_PARAMS, "invalid tools/call params");
            };
            let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
            if name.is_empty() {
                return rpc_error(request.id, INVALID_PARAMS, "tools/call name is required");
            }
            let Some(route) = state
                .sessions
                .tool_route(&session_id, name)
                .or_else(|| fallback_tool_route(name))
            else {
                return rpc_error(request.id, METHOD_NOT_FOUND, messages::TOOL_NOT_FOUND);
            };
            match state.proxy.call_tool(&route, params.get("arguments").cloned()).await {
                Ok(result) => rpc_result(request.id, result, &session_id),
                Err(err) => rpc_error(request.id, DOWNSTREAM_ERROR, err.to_string()),
            }
        }
        "prompts/list" => {
            let (prompts, routes) = state.proxy.aggregate_prompts().await;
            state.sessions.set_prompt_routes(&session_id, routes);
            rpc_result(request.id, json!({"prompts": prompts}), &session_id)
        }
        "prompts/get" => {
            let Some(mut params) = request.params.as_ref().and_then(Value::as_object).cloned() else {
                return rpc_error(request.id, INVALID_PARAMS, "invalid prompts/get params");
            };
            let name = params.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            if name.is_empty() {
                return rpc_error(request.id, INVALID_PARAMS, "prompts/get name is required");
            }
            let Some(route) = state
                .sessions
                .prompt_route(&session_id, &name)
                .or_else(|| fallback_prompt_route(&name))
            else {
                return rpc_error(request.id, METHOD_NOT_FOUND, messages::PROMPT_NOT_FOUND);
            };
            params.insert("name".to_string(), Value::String(route.prompt_name.clone()));
            match state.proxy.prompt_get(&route.server_name, params).await {
                Ok(result) => rpc_result(request.id, result, &session_id),
                Err(err) => rpc_error(request.id, DOWNSTREAM_ERROR, err.to_string()),
            }
        }
        "resources/list" => {
            let (resources, routes) = state.proxy.aggregate_resources().await;
            state.sessions.set_resource_routes(&session_id, routes);
            rpc_result(request.id, json!({"resources": resources}), &session_id)
        }
        "resources/templates/list" => {
            let (templates, routes) = state.proxy.aggregate_resource_templates().await;
            state.sessions.set_resource_template_routes(&session_id, routes);
            rpc_result(request.id, json!({"resourceTemplates": templates}), &session_id)
        }
        "resources/read" => {
            let Some(mut params) = request.params.as_ref().and_then(Value::as_object).cloned() else {
                return rpc_error(request.id, INVALID_PARAMS, "invalid resources/read params");
            };
            let uri = params.get("uri").and_then(Value::as_str).unwrap_or_default().to_string();
            if uri.is_empty() {
                return rpc_error(request.id, INVALID_PARAMS, "resources/read uri is required");
            }
            let Some(route) = state
                .sessions
                .resource_route(&session_id, &uri)
                .or_else(|| parse_proxy_resource_uri(&uri))
            else {
                return rpc_error(request.id, METHOD_NOT_FOUND, messages::RESOURCE_NOT_FOUND);
            };
            params.insert("uri".to_string(), Value::String(route.original_uri.clone()));
            match state.proxy.resource_read(&route.server_name, params).await {
                Ok(result) => rpc_result(request.id, result, &session_id),
                Err(err) => rpc_error(request.id, DOWNSTREAM_ERROR, err.to_string()),
            }
        }
        _ => rpc_error(request.id, METHOD_NOT_FOUND, "method not found"),
    }
}

/// `DELETE /mcp`: discard the presented session.
pub async fn handle_delete(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session_id = session_id_from(&headers);
    if session_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "missing MCP-Session-Id").into_response();
    }
    state.sessions.remove(&session_id);
    StatusCode::NO_CONTENT.into_response()
}

fn session_id_from(headers: &HeaderMap) -> String {
    headers
        .get(&SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

fn set_session_header(response: &mut Response, session_id: &str) {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert(SESSION_HEADER.clone(), value);
    }
}

fn rpc_result(id: Option<i64>, result: Value, session_id: &str) -> Response {
    let mut response = Json(RpcResponse::result(id, result)).into_response();
    set_session_header(&mut response, session_id);
    response
}

fn rpc_error(id: Option<i64>, code: i64, message: impl Into<String>) -> Response {
    Json(RpcResponse::error(id, code, message)).into_response()
}

/// Missing or stale sessions are a transport-level problem: HTTP 400 with a
/// JSON-RPC error body.
fn session_error(id: Option<i64>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(RpcResponse::error(id, DOWNSTREAM_ERROR, messages::MISSING_SESSION)),
    )
        .into_response()
}
