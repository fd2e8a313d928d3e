//! Sessions with MCP servers.
//!
//! A [`ToolSession`] is one handshaken conversation with one server. A
//! [`Connector`] knows how to open them; [`StdioConnector`] spawns the server
//! as a child process.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{McpError, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, ListToolsParams,
    ListToolsResult, ServerInfo, ToolInfo,
};
use crate::transport::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_SHUTDOWN_GRACE, StdioTransport};

/// Upper bound on `tools/list` pages fetched in one discovery.
const MAX_LIST_PAGES: usize = 100;

/// Configuration for an MCP server connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerConfig {
    /// Unique name for this server.
    pub name: String,
    /// Command to spawn.
    pub command: String,
    /// Arguments to pass to the command.
    pub args: Vec<String>,
    /// Environment variables to set.
    pub env: Vec<(String, String)>,
}

impl McpServerConfig {
    /// Create a new server config.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Replace the arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add an environment variable.
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// An open, initialized session with one server.
#[async_trait]
pub trait ToolSession: Send {
    /// Fetch the server's full operation catalog.
    async fn list_tools(&mut self) -> Result<Vec<ToolInfo>>;

    /// Invoke an operation.
    ///
    /// A result flagged `isError` is returned as-is; the caller decides what
    /// it means.
    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<CallToolResult>;

    /// End the session and release its resources.
    async fn close(&mut self) -> Result<()>;
}

/// Opens sessions from server configurations.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Start the server and complete the handshake.
    async fn open(&self, config: &McpServerConfig) -> Result<Box<dyn ToolSession>>;
}

/// Connector that spawns each server as a child process speaking stdio.
#[derive(Debug, Clone)]
pub struct StdioConnector {
    request_timeout: Duration,
    shutdown_grace: Duration,
}

impl Default for StdioConnector {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl StdioConnector {
    /// Create a connector with default timeouts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-request timeout for every session.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the grace period a server gets to exit on close.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

#[async_trait]
impl Connector for StdioConnector {
    async fn open(&self, config: &McpServerConfig) -> Result<Box<dyn ToolSession>> {
        let transport = StdioTransport::spawn(&config.command, &config.args, &config.env)?
            .with_request_timeout(self.request_timeout)
            .with_shutdown_grace(self.shutdown_grace);

        let session = StdioSession::initialize(&config.name, transport).await?;
        Ok(Box::new(session))
    }
}

/// A session over a [`StdioTransport`].
#[derive(Debug)]
pub struct StdioSession {
    server: String,
    transport: StdioTransport,
    server_info: ServerInfo,
}

impl StdioSession {
    /// Run the MCP handshake on a freshly spawned transport.
    ///
    /// The transport is shut down if the handshake fails.
    pub async fn initialize(server: &str, mut transport: StdioTransport) -> Result<Self> {
        match Self::handshake(server, &mut transport).await {
            Ok(server_info) => Ok(Self {
                server: server.to_string(),
                transport,
                server_info,
            }),
            Err(err) => {
                if let Err(close_err) = transport.shutdown().await {
                    tracing::warn!(server, error = %close_err, "failed to stop server after handshake failure");
                }
                Err(McpError::connection(format!("handshake failed: {}", err)))
            }
        }
    }

    async fn handshake(server: &str, transport: &mut StdioTransport) -> Result<ServerInfo> {
        let params = InitializeParams::for_server(server);
        let result = transport
            .request("initialize", Some(serde_json::to_value(&params)?))
            .await?;
        let init_result: InitializeResult = serde_json::from_value(result)?;

        tracing::info!(
            server,
            remote = %init_result.server_info.name,
            version = %init_result.server_info.version,
            protocol = %init_result.protocol_version,
            "MCP server initialized"
        );

        transport.notify("notifications/initialized", None).await?;
        Ok(init_result.server_info)
    }

    /// Server info reported during the handshake.
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

#[async_trait]
impl ToolSession for StdioSession {
    async fn list_tools(&mut self) -> Result<Vec<ToolInfo>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = ListToolsParams {
                cursor: cursor.take(),
            };
            let result = self
                .transport
                .request("tools/list", Some(serde_json::to_value(&params)?))
                .await?;
            let page: ListToolsResult = serde_json::from_value(result)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if params.cursor.as_deref() == Some(next.as_str()) => {
                    return Err(McpError::protocol(format!(
                        "tools/list returned the same cursor twice: {}",
                        next
                    )));
                }
                Some(next) => cursor = Some(next),
                None => {
                    tracing::debug!(server = %self.server, tool_count = tools.len(), "listed MCP tools");
                    return Ok(tools);
                }
            }
        }

        Err(McpError::protocol(format!(
            "tools/list did not finish within {} pages",
            MAX_LIST_PAGES
        )))
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result = match self
            .transport
            .request("tools/call", Some(serde_json::to_value(&params)?))
            .await
        {
            Ok(result) => result,
            Err(McpError::Rpc { code, message, .. }) => {
                return Err(McpError::remote_tool(format!("{} (code {})", message, code)));
            }
            Err(err) => return Err(err),
        };

        Ok(serde_json::from_value(result)?)
    }

    async fn close(&mut self) -> Result<()> {
        tracing::debug!(server = %self.server, "closing MCP session");
        self.transport.shutdown().await
    }
}
