//! WebSocket notification bridge.
//!
//! Each connected client gets the full state once, then a `server_update`
//! message per health manager change. Clients drain a broadcast receiver on
//! their own task, so one slow or dead client never blocks the manager or
//! its peers.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use super::AppState;

pub async fn handle_ws(State(state): State<Arc<AppState>>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| client_loop(state, socket))
}

async fn client_loop(state: Arc<AppState>, mut socket: WebSocket) {
    let mut events = state.events.subscribe();

    let initial = json!({
        "type": "initial",
        "servers": state.manager.get_all_info(),
    });
    if send_json(&mut socket, &initial).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let update = json!({
                        "type": "server_update",
                        "name": event.name,
                        "server": event.info,
                    });
                    if send_json(&mut socket, &update).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("websocket client lagged, dropped {skipped} updates");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            // The read side only keeps the connection alive and detects
            // disconnects.
            incoming = socket.recv() => match incoming {
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }
}

async fn send_json(socket: &mut WebSocket, value: &Value) -> Result<(), axum::Error> {
    socket.send(Message::Text(value.to_string().into())).await
}
