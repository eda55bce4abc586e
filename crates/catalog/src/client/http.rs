//! Streamable HTTP sub-driver.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;

use crate::config::McpServer;
use crate::rpc::RpcResponse;

use super::{decode_response, initialize_params, request_value, DriverError, Handshake, Session, CALL_TIMEOUT};

/// Response bodies larger than this are truncated before decoding.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

const SESSION_HEADER: &str = "MCP-Session-Id";

/// One logical session against a streamable HTTP downstream.
///
/// If the server hands back an `MCP-Session-Id` it is echoed on every
/// subsequent request, and a best-effort DELETE discards the session when
/// the driver is done with it.
pub(crate) struct HttpSession {
    client: reqwest::Client,
    url: String,
    session_id: Option<String>,
}

impl HttpSession {
    pub(crate) fn connect(server: &McpServer) -> Result<Self, DriverError> {
        let url = server.url.trim().to_string();
        if url.is_empty() {
            return Err(DriverError::MissingUrl);
        }
        let client = reqwest::Client::builder().timeout(CALL_TIMEOUT).build()?;
        Ok(Self {
            client,
            url,
            session_id: None,
        })
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    /// POST one payload; returns the capped response body.
    async fn post(&mut self, payload: &Value) -> Result<String, DriverError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .json(payload);
        if let Some(session_id) = &self.session_id {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request.send().await?;

        if let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            let session_id = session_id.trim();
            if !session_id.is_empty() {
                self.session_id = Some(session_id.to_string());
            }
        }

        let status = response.status().as_u16();
        let body = read_body_limited(response, MAX_BODY_BYTES).await?;
        if status >= 400 {
            return Err(DriverError::HttpStatus {
                status,
                body: body.trim().to_string(),
            });
        }
        Ok(body)
    }

    async fn notify(&mut self, method: &str) -> Result<(), DriverError> {
        let payload = request_value(None, method, None);
        self.post(&payload).await.map(|_| ())
    }

    /// Discard the downstream session, best-effort.
    pub(crate) async fn close(self) {
        let Some(session_id) = self.session_id else {
            return;
        };
        let _ = self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, session_id)
            .send()
            .await;
    }
}

#[async_trait]
impl Session for HttpSession {
    async fn initialize(&mut self, client_name: &str) -> Result<Handshake, DriverError> {
        let response = self.call(1, "initialize", initialize_params(client_name)).await?;
        if let Some(err) = response.error {
            return Err(DriverError::Initialize(err.message));
        }
        let handshake = response
            .result
            .as_ref()
            .map(Handshake::from_initialize_result)
            .unwrap_or_default();

        // Non-fatal, as with the stdio transport.
        let _ = self.notify("notifications/initialized").await;

        Ok(handshake)
    }

    async fn call(&mut self, id: i64, method: &str, params: Value) -> Result<RpcResponse, DriverError> {
        let payload = request_value(Some(id), method, Some(params));
        let body = self.post(&payload).await?;
        decode_response(&body, Some(id))
    }
}

/// Accumulate a response body up to `limit` bytes, dropping the rest.
async fn read_body_limited(response: reqwest::Response, limit: usize) -> Result<String, DriverError> {
    let mut body: Vec<u8> = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let remaining = limit - body.len();
        if chunk.len() >= remaining {
            body.extend_from_slice(&chunk[..remaining]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}
