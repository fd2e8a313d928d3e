//! Transport layer for MCP communication.
//!
//! Local servers speak newline-delimited JSON-RPC over the child's stdio.
//! Each line on stdout is one message; anything that does not parse as JSON
//! is treated as stray log output and skipped.

use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::{McpError, Result};
use crate::protocol::{
    Incoming, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};

/// Default time to wait for a single response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time a server gets to exit after its stdin is closed.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Stdio transport to a child process.
pub struct StdioTransport {
    command: String,
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
    request_timeout: Duration,
    shutdown_grace: Duration,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("command", &self.command)
            .field("pid", &self.child.id())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl StdioTransport {
    /// Spawn a new stdio transport.
    ///
    /// # Arguments
    /// * `command` - The command to spawn (e.g., "mcp-server-sqlite")
    /// * `args` - Arguments to pass to the command
    /// * `env` - Extra environment variables for the child
    pub fn spawn(command: &str, args: &[String], env: &[(String, String)]) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| McpError::connection(format!("failed to spawn '{}': {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::connection("failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::connection("failed to capture stdout"))?;

        tracing::debug!(command, pid = ?child.id(), "spawned MCP server process");

        Ok(Self {
            command: command.to_string(),
            child,
            stdin: Some(BufWriter::new(stdin)),
            stdout: BufReader::new(stdout),
            next_id: 1,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        })
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set how long the child gets to exit on close before it is killed.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Send a request and wait for the matching response.
    ///
    /// Returns the `result` member. A JSON-RPC error reply becomes
    /// [`McpError::Rpc`].
    pub async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = JsonRpcRequest::new(id, method, params);
        self.write_message(&serde_json::to_string(&request)?).await?;

        let response = tokio::time::timeout(self.request_timeout, self.read_response(id))
            .await
            .map_err(|_| McpError::Timeout {
                method: method.to_string(),
            })??;

        match response.into_result() {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Err(McpError::protocol(format!(
                "response to '{}' carries neither result nor error",
                method
            ))),
            Err(error) => Err(McpError::rpc(error.code, error.message, error.data)),
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);
        self.write_message(&serde_json::to_string(&notification)?)
            .await
    }

    /// Close stdin, give the child a grace period to exit, then kill it.
    pub async fn shutdown(&mut self) -> Result<()> {
        // Dropping stdin signals EOF to the server.
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.flush().await {
                tracing::debug!(command = %self.command, error = %e, "failed to flush MCP server stdin");
            }
        }

        match tokio::time::timeout(self.shutdown_grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(command = %self.command, %status, "MCP server exited");
                Ok(())
            }
            Ok(Err(e)) => Err(McpError::Io(e)),
            Err(_) => {
                tracing::debug!(
                    command = %self.command,
                    grace_ms = self.shutdown_grace.as_millis() as u64,
                    "MCP server did not exit in time, killing"
                );
                self.child.kill().await.map_err(McpError::Io)
            }
        }
    }

    /// Check whether the child is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn write_message(&mut self, json: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(McpError::ConnectionClosed)?;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        tracing::trace!(json = %json, "sent MCP message");
        Ok(())
    }

    async fn read_response(&mut self, id: u64) -> Result<JsonRpcResponse> {
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = self.stdout.read_line(&mut line).await?;
            if bytes_read == 0 {
                return Err(McpError::ConnectionClosed);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let message: IncomingMessage = match serde_json::from_str(trimmed) {
                Ok(message) => message,
                Err(_) => {
                    tracing::debug!(command = %self.command, line = %trimmed, "skipping non-JSON output");
                    continue;
                }
            };
            tracing::trace!(json = %trimmed, "received MCP message");

            match message.classify() {
                Some(Incoming::Response(response)) => {
                    if response.id.as_u64() == Some(id) {
                        return Ok(response);
                    }
                    tracing::warn!(
                        command = %self.command,
                        expected = id,
                        got = %response.id,
                        "discarding response with unexpected id"
                    );
                }
                Some(Incoming::Request {
                    id: request_id,
                    method,
                }) => {
                    self.answer_server_request(request_id, &method).await?;
                }
                Some(Incoming::Notification { method }) => {
                    tracing::debug!(command = %self.command, method = %method, "server notification");
                }
                None => {
                    tracing::warn!(command = %self.command, line = %trimmed, "skipping unrecognized message");
                }
            }
        }
    }

    async fn answer_server_request(&mut self, id: Value, method: &str) -> Result<()> {
        let reply = if method == "ping" {
            JsonRpcResponse::success(id, serde_json::json!({}))
        } else {
            tracing::debug!(command = %self.command, method, "rejecting server request");
            JsonRpcResponse::failure(
                id,
                JsonRpcError::new(
                    JsonRpcError::METHOD_NOT_FOUND,
                    format!("method not supported by client: {}", method),
                ),
            )
        };
        self.write_message(&serde_json::to_string(&reply)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_nonexistent_command() {
        let result = StdioTransport::spawn("nonexistent-mcp-server-12345", &[], &[]);
        match result {
            Ok(_) => panic!("Expected spawn to fail"),
            Err(err) => assert!(matches!(err, McpError::Connection(_))),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_eof_is_connection_closed() {
        // `true` exits immediately without writing anything.
        let mut transport = StdioTransport::spawn("true", &[], &[]).unwrap();
        let err = transport.request("tools/list", None).await.unwrap_err();
        assert!(matches!(
            err,
            McpError::ConnectionClosed | McpError::Io(_)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_after_stdin_closed() {
        // `cat` exits as soon as its stdin reaches EOF.
        let mut transport = StdioTransport::spawn("cat", &[], &[]).unwrap();
        assert!(transport.is_running());
        transport.shutdown().await.unwrap();
        assert!(!transport.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_kills_stubborn_child() {
        let mut transport = StdioTransport::spawn("sleep", &["30".to_string()], &[])
            .unwrap()
            .with_shutdown_grace(Duration::from_millis(50));
        transport.shutdown().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_request_timeout() {
        // `sleep` never writes to stdout.
        let mut transport = StdioTransport::spawn("sleep", &["30".to_string()], &[])
            .unwrap()
            .with_request_timeout(Duration::from_millis(50));
        let err = transport.request("tools/list", None).await.unwrap_err();
        assert!(matches!(err, McpError::Timeout { ref method } if method == "tools/list"));
        transport.shutdown().await.ok();
    }
}
