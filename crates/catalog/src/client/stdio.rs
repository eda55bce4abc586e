//! Stdio sub-driver: one spawned child per session.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::config::McpServer;
use crate::rpc::RpcResponse;
use crate::types::LogLevel;

use super::{initialize_params, request_value, DriverError, Handshake, LogSink, Session};

/// What to do with the child's stderr stream.
pub(crate) enum StderrMode {
    /// Read and discard; the proxy has nowhere to put it.
    Drain,
    /// Forward each line to a log sink; used by health checks.
    Capture(LogSink),
}

/// A spawned downstream child speaking NDJSON over its pipes.
///
/// The child is configured with kill-on-drop so a timeout that cancels the
/// session future still reaps the process.
pub(crate) struct StdioSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<()>>,
}

impl StdioSession {
    /// Spawn the configured command with the process environment plus the
    /// descriptor's `env` entries (descriptor entries win).
    pub(crate) fn spawn(server: &McpServer, stderr_mode: StderrMode) -> Result<Self, DriverError> {
        let command = server.command.trim();
        if command.is_empty() {
            return Err(DriverError::MissingCommand);
        }

        let mut child = Command::new(command)
            .args(&server.args)
            .envs(server.env.iter())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(DriverError::Spawn)?;

        let stdin = child.stdin.take().ok_or_else(|| pipe_unavailable("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| pipe_unavailable("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| pipe_unavailable("stderr"))?;

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let StderrMode::Capture(sink) = &stderr_mode {
                    sink(LogLevel::Stderr, line);
                }
            }
        });

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr_task: Some(stderr_task),
        })
    }

    pub(crate) fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Write one request as a single NDJSON line.
    async fn send(&mut self, id: Option<i64>, method: &str, params: Option<Value>) -> Result<(), DriverError> {
        let request = request_value(id, method, params);
        let mut line = serde_json::to_vec(&request).map_err(DriverError::Encode)?;
        line.push(b'\n');
        self.stdin.write_all(&line).await.map_err(DriverError::Write)
    }

    /// Read one NDJSON line and parse it as a response envelope.
    async fn read_response(&mut self) -> Result<RpcResponse, DriverError> {
        let mut line = String::new();
        let read = self.stdout.read_line(&mut line).await.map_err(DriverError::Read)?;
        if read == 0 {
            return Err(DriverError::Read(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "downstream closed stdout",
            )));
        }
        serde_json::from_str(line.trim()).map_err(DriverError::Parse)
    }

    /// Kill the child, wait for it, and let the stderr reader drain to EOF.
    pub(crate) async fn shutdown(mut self) {
        let _ = self.child.kill().await;
        if let Some(task) = self.stderr_task.take() {
            let _ = task.await;
        }
    }
}

#[async_trait]
impl Session for StdioSession {
    async fn initialize(&mut self, client_name: &str) -> Result<Handshake, DriverError> {
        self.send(Some(1), "initialize", Some(initialize_params(client_name)))
            .await?;
        let response = self.read_response().await?;
        if let Some(err) = response.error {
            return Err(DriverError::Initialize(err.message));
        }
        let handshake = response
            .result
            .as_ref()
            .map(Handshake::from_initialize_result)
            .unwrap_or_default();

        // Notifications expect no response; a write failure here surfaces on
        // the next request.
        let _ = self.send(None, "notifications/initialized", None).await;

        Ok(handshake)
    }

    async fn call(&mut self, id: i64, method: &str, params: Value) -> Result<RpcResponse, DriverError> {
        self.send(Some(id), method, Some(params)).await?;
        self.read_response().await
    }
}

fn pipe_unavailable(name: &str) -> DriverError {
    DriverError::Spawn(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("{name} pipe unavailable"),
    ))
}
