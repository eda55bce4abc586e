//! HTTP server host: the `/mcp` proxy endpoint, the REST management API,
//! and the WebSocket notification bridge behind one axum router.

pub mod api;
mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::config::Store;
use crate::manager::{HealthManager, ServerInfo};
use crate::proxy::{self, ProxyCore, SessionStore};

/// A change event fanned out to WebSocket clients.
#[derive(Debug, Clone)]
pub struct ServerEvent {
    pub name: String,
    pub info: ServerInfo,
}

/// Shared state behind every handler.
pub struct AppState {
    pub store: Arc<Store>,
    pub manager: Arc<HealthManager>,
    pub proxy: ProxyCore,
    pub sessions: SessionStore,
    pub events: broadcast::Sender<ServerEvent>,
}

/// Wire the state together and bridge manager change events onto the
/// broadcast channel the WebSocket clients drain.
pub fn build_state(store: Arc<Store>, manager: Arc<HealthManager>) -> Arc<AppState> {
    let (events, _) = broadcast::channel(64);

    let bridge = events.clone();
    manager.on_change(Arc::new(move |name, info| {
        // send fails only when no client is connected
        let _ = bridge.send(ServerEvent { name, info });
    }));

    Arc::new(AppState {
        proxy: ProxyCore::new(Arc::clone(&store)),
        sessions: SessionStore::new(),
        store,
        manager,
        events,
    })
}

/// Assemble the router. Panics in handlers are recovered into 500s by the
/// outermost layer.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/mcp", post(proxy::http::handle_post).delete(proxy::http::handle_delete))
        .route("/api/servers", get(api::list_servers))
        .route(
            "/api/servers/{name}",
            get(api::get_server).put(api::put_server).delete(api::delete_server),
        )
        .route("/api/servers/{name}/check", post(api::check_server))
        .route("/api/config", get(api::get_config).put(api::put_config))
        .route("/api/config/export", get(api::export_config))
        .route("/api/config/import", post(api::import_config))
        .route("/api/settings", get(api::get_settings).put(api::put_settings))
        .route("/ws", get(ws::handle_ws))
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
