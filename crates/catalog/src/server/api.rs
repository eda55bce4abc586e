//! REST management API for the catalog.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

use crate::config::{CatalogConfig, McpServer};
use crate::manager::ServerInfo;

use super::AppState;

/// `GET /api/servers`: every server with its runtime state.
pub async fn list_servers(State(state): State<Arc<AppState>>) -> Json<HashMap<String, ServerInfo>> {
    Json(state.manager.get_all_info())
}

/// `GET /api/servers/{name}`.
pub async fn get_server(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    match state.manager.get_info(&name) {
        Some(info) => Json(info).into_response(),
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

/// `PUT /api/servers/{name}`: add or update; enabled servers get an
/// immediate background check.
pub async fn put_server(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(server): Json<McpServer>,
) -> Response {
    let enabled = server.enabled;
    if let Err(err) = state.store.add_server(&name, server) {
        return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
    }
    if enabled {
        spawn_check(&state, name);
    }
    ok()
}

/// `DELETE /api/servers/{name}`.
pub async fn delete_server(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    state.manager.remove_server(&name);
    if let Err(err) = state.store.remove_server(&name) {
        return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
    }
    ok()
}

/// `POST /api/servers/{name}/check`: schedule a health check.
pub async fn check_server(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    spawn_check(&state, name);
    ok()
}

/// `GET /api/config`.
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<CatalogConfig> {
    Json(state.store.get())
}

/// `PUT /api/config`: replace the whole document.
pub async fn put_config(State(state): State<Arc<AppState>>, Json(config): Json<CatalogConfig>) -> Response {
    match state.store.set(config) {
        Ok(()) => ok(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

/// `GET /api/config/export`: download the document.
pub async fn export_config(State(state): State<Arc<AppState>>) -> Response {
    match state.store.export() {
        Ok(content) => (
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::CONTENT_DISPOSITION, "attachment; filename=mcp-servers.json"),
            ],
            content,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

/// `POST /api/config/import`: replace the document from an upload.
pub async fn import_config(State(state): State<Arc<AppState>>, Json(config): Json<CatalogConfig>) -> Response {
    match state.store.set(config) {
        Ok(()) => ok(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(rename = "healthCheckInterval")]
    pub health_check_interval: i64,
}

/// `GET /api/settings`.
pub async fn get_settings(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({"healthCheckInterval": state.store.health_check_interval()})).into_response()
}

/// `PUT /api/settings`: persist the interval and apply it to the running
/// health loop.
pub async fn put_settings(State(state): State<Arc<AppState>>, Json(settings): Json<Settings>) -> Response {
    if let Err(err) = state.store.set_health_check_interval(settings.health_check_interval) {
        return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
    }
    state.manager.set_health_interval(settings.health_check_interval);
    ok()
}

fn spawn_check(state: &Arc<AppState>, name: String) {
    let manager = Arc::clone(&state.manager);
    tokio::spawn(async move {
        if let Err(err) = manager.check(&name).await {
            tracing::debug!("scheduled check for '{name}' failed: {err}");
        }
    });
}

fn ok() -> Response {
    Json(json!({"status": "ok"})).into_response()
}
