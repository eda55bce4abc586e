//! Health manager: owns the authoritative runtime state of every configured
//! downstream server and fans change notifications out to subscribers.

mod log_ring;

pub use log_ring::{LogRing, MAX_LOG_ENTRIES};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::client::{self, DriverError, LogSink};
use crate::config::{McpServer, Store};
use crate::types::{LogEntry, LogLevel, McpTool, ServerStatus};

/// Receives `(name, info)` whenever a server's runtime state changes.
pub type ChangeListener = Arc<dyn Fn(String, ServerInfo) + Send + Sync>;

/// Observed runtime state of one configured server.
///
/// Owned exclusively by the [`HealthManager`]; every copy handed out is deep.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    /// Descriptor snapshot taken at the last check.
    pub config: McpServer,
    pub status: ServerStatus,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub logs: LogRing,
    pub tools: Vec<McpTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
    /// Name the downstream reported during the handshake.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub server_version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol_version: String,
    /// Duration of the last check in milliseconds.
    #[serde(skip_serializing_if = "duration_is_zero")]
    pub check_duration: i64,
}

impl ServerInfo {
    fn new(name: impl Into<String>, config: McpServer) -> Self {
        Self {
            name: name.into(),
            config,
            status: ServerStatus::Unchecked,
            error: String::new(),
            logs: LogRing::default(),
            tools: Vec::new(),
            last_check: None,
            server_name: String::new(),
            server_version: String::new(),
            protocol_version: String::new(),
            check_duration: 0,
        }
    }
}

fn duration_is_zero(value: &i64) -> bool {
    *value == 0
}

/// Errors from health manager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("server {name:?} not found")]
    ServerNotFound { name: String },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Periodic background checker for all configured downstream servers.
///
/// Long-lived singleton, explicitly constructed. All shared state sits
/// behind readers-writer locks with lock scopes confined to single methods;
/// no method holds two locks at once.
pub struct HealthManager {
    store: Arc<Store>,
    servers: Arc<RwLock<HashMap<String, ServerInfo>>>,
    listeners: RwLock<Vec<mpsc::UnboundedSender<(String, ServerInfo)>>>,
    interval: RwLock<i64>,
    stop: CancellationToken,
}

impl HealthManager {
    /// Create a manager seeded with the store's configured interval.
    pub fn new(store: Arc<Store>) -> Self {
        let interval = store.health_check_interval();
        Self {
            store,
            servers: Arc::new(RwLock::new(HashMap::new())),
            listeners: RwLock::new(Vec::new()),
            interval: RwLock::new(interval),
            stop: CancellationToken::new(),
        }
    }

    /// Register an asynchronous change subscriber.
    ///
    /// Deliveries run on a dedicated task fed through an unbounded queue: a
    /// slow subscriber can never stall the manager, and each subscriber sees
    /// the entry and exit notifications of a check in order.
    pub fn on_change(&self, listener: ChangeListener) {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, ServerInfo)>();
        tokio::spawn(async move {
            while let Some((name, info)) = rx.recv().await {
                listener(name, info);
            }
        });
        self.listeners
            .write()
            .expect("listener lock poisoned")
            .push(tx);
    }

    fn notify(&self, name: &str) {
        let Some(info) = self.get_info(name) else {
            return;
        };
        let listeners = self.listeners.read().expect("listener lock poisoned").clone();
        for listener in listeners {
            let _ = listener.send((name.to_string(), info.clone()));
        }
    }

    /// Make sure an info record exists for `name`; false when the store has
    /// no such server.
    fn ensure_info(&self, name: &str) -> bool {
        {
            let servers = self.servers.read().expect("server info lock poisoned");
            if servers.contains_key(name) {
                return true;
            }
        }
        let Some(config) = self.store.get_server(name) else {
            return false;
        };
        let mut servers = self.servers.write().expect("server info lock poisoned");
        servers
            .entry(name.to_string())
            .or_insert_with(|| ServerInfo::new(name, config));
        true
    }

    /// Append a log line to a server's record; timestamps are taken here.
    fn add_log(&self, name: &str, level: LogLevel, message: impl Into<String>) {
        let mut servers = self.servers.write().expect("server info lock poisoned");
        if let Some(info) = servers.get_mut(name) {
            info.logs.push(LogEntry::new(level, message));
        }
    }

    /// Check one server: spawn it (or connect), verify the MCP handshake,
    /// discover its tools, then tear it down again.
    ///
    /// Status walks `checking -> healthy | error`, with subscribers notified
    /// at both transitions. A `tools/list` failure after a successful
    /// handshake leaves the server healthy.
    pub async fn check(&self, name: &str) -> Result<(), ManagerError> {
        let Some(server) = self.store.get_server(name) else {
            return Err(ManagerError::ServerNotFound { name: name.to_string() });
        };
        if !self.ensure_info(name) {
            return Err(ManagerError::ServerNotFound { name: name.to_string() });
        }

        {
            let mut servers = self.servers.write().expect("server info lock poisoned");
            if let Some(info) = servers.get_mut(name) {
                info.status = ServerStatus::Checking;
                info.error.clear();
                info.config = server.clone();
            }
        }
        self.add_log(name, LogLevel::Info, format!("Checking: {}", check_target(&server)));
        self.notify(name);

        let sink: LogSink = {
            let servers = Arc::clone(&self.servers);
            let name = name.to_string();
            Arc::new(move |level, message| {
                let mut servers = servers.write().expect("server info lock poisoned");
                if let Some(info) = servers.get_mut(&name) {
                    info.logs.push(LogEntry::new(level, message));
                }
            })
        };

        let started = Instant::now();
        let outcome = client::inspect(&server, sink).await;
        let duration_ms = started.elapsed().as_millis() as i64;
        let now = Utc::now();

        let result = match outcome {
            Ok(inspection) => {
                if let Some(warning) = &inspection.tools_error {
                    self.add_log(name, LogLevel::Warn, warning.clone());
                }
                self.add_log(name, LogLevel::Info, format!("Check completed in {duration_ms}ms"));
                let mut servers = self.servers.write().expect("server info lock poisoned");
                if let Some(info) = servers.get_mut(name) {
                    info.status = ServerStatus::Healthy;
                    info.error.clear();
                    info.tools = inspection.tools;
                    info.server_name = inspection.handshake.server_name;
                    info.server_version = inspection.handshake.server_version;
                    info.protocol_version = inspection.handshake.protocol_version;
                    info.last_check = Some(now);
                    info.check_duration = duration_ms;
                }
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.add_log(name, LogLevel::Error, message.clone());
                let mut servers = self.servers.write().expect("server info lock poisoned");
                if let Some(info) = servers.get_mut(name) {
                    info.status = ServerStatus::Error;
                    info.error = message;
                    info.last_check = Some(now);
                    info.check_duration = duration_ms;
                }
                Err(err.into())
            }
        };
        self.notify(name);
        result
    }

    /// Check every enabled server, serially; each check bounds itself.
    pub async fn check_all(&self) {
        let config = self.store.get();
        for (name, server) in &config.mcp_servers {
            if server.enabled {
                if let Err(err) = self.check(name).await {
                    tracing::debug!("health check for '{name}' failed: {err}");
                }
            }
        }
    }

    /// Run periodic checks until [`stop_health_loop`](Self::stop_health_loop)
    /// is called.
    ///
    /// A non-positive interval disables checking; the loop then re-reads the
    /// interval every 5 seconds so enabling it at runtime takes effect
    /// without a restart.
    pub async fn run_health_loop(self: Arc<Self>) {
        loop {
            let interval = *self.interval.read().expect("interval lock poisoned");
            if interval <= 0 {
                tokio::select! {
                    _ = self.stop.cancelled() => return,
                    _ = sleep(Duration::from_secs(5)) => continue,
                }
            }
            tokio::select! {
                _ = self.stop.cancelled() => return,
                _ = sleep(Duration::from_secs(interval as u64)) => self.check_all().await,
            }
        }
    }

    /// Signal the health loop to terminate. Safe to call more than once.
    pub fn stop_health_loop(&self) {
        self.stop.cancel();
    }

    /// Update the interval; the loop picks it up on its next iteration.
    pub fn set_health_interval(&self, seconds: i64) {
        *self.interval.write().expect("interval lock poisoned") = seconds;
    }

    pub fn health_interval(&self) -> i64 {
        *self.interval.read().expect("interval lock poisoned")
    }

    /// Deep copy of one server's runtime state.
    ///
    /// A server that exists in the store but was never referenced yields a
    /// fresh `unchecked` record.
    pub fn get_info(&self, name: &str) -> Option<ServerInfo> {
        {
            let servers = self.servers.read().expect("server info lock poisoned");
            if let Some(info) = servers.get(name) {
                return Some(info.clone());
            }
        }
        self.store
            .get_server(name)
            .map(|config| ServerInfo::new(name, config))
    }

    /// Deep copies for every server present in the configuration.
    pub fn get_all_info(&self) -> HashMap<String, ServerInfo> {
        let config = self.store.get();
        let mut result = HashMap::new();
        for name in config.mcp_servers.keys() {
            if let Some(info) = self.get_info(name) {
                result.insert(name.clone(), info);
            }
        }
        result
    }

    /// Drop the cached record for a removed server.
    pub fn remove_server(&self, name: &str) {
        self.servers
            .write()
            .expect("server info lock poisoned")
            .remove(name);
    }
}

/// Human-readable target for the "Checking:" log line.
fn check_target(server: &McpServer) -> String {
    if server.is_streamable_http() {
        return format!("streamableHttp {}", server.url.trim());
    }
    let mut target = server.command.trim().to_string();
    for arg in &server.args {
        if !target.is_empty() {
            target.push(' ');
        }
        target.push_str(arg);
    }
    if target.trim().is_empty() {
        return "(invalid config: no command/url)".to_string();
    }
    target.trim().to_string()
}
