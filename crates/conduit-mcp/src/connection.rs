//! A single server connection and its lifecycle.

use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{McpError, Result};
use crate::protocol::{CallToolResult, ToolInfo};
use crate::session::{Connector, McpServerConfig, ToolSession};

/// Observable lifecycle of a [`ServerConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The session has been released.
    Closed,
    /// The session is usable.
    Open,
    /// A close is in progress.
    Closing,
}

enum Slot {
    Open(Box<dyn ToolSession>),
    Closing,
    Closed,
}

impl Slot {
    fn state(&self) -> ConnectionState {
        match self {
            Self::Open(_) => ConnectionState::Open,
            Self::Closing => ConnectionState::Closing,
            Self::Closed => ConnectionState::Closed,
        }
    }
}

/// Owns the session to one server and the catalog it advertised.
///
/// Only [`ServerConnection::connect`] produces one, and it either hands back
/// an open, discovered connection or nothing at all.
pub struct ServerConnection {
    name: String,
    slot: Mutex<Slot>,
    catalog: Vec<ToolInfo>,
}

impl std::fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConnection")
            .field("name", &self.name)
            .field("tools", &self.catalog.len())
            .finish()
    }
}

impl ServerConnection {
    /// Open a session and discover the server's operations.
    pub async fn connect(config: &McpServerConfig, connector: &dyn Connector) -> Result<Self> {
        let mut session = connector.open(config).await.map_err(|e| match e {
            McpError::Connection(_) => e,
            other => McpError::connection(other.to_string()),
        })?;

        let catalog = match session.list_tools().await {
            Ok(tools) => tools,
            Err(err) => {
                if let Err(close_err) = session.close().await {
                    tracing::warn!(server = %config.name, error = %close_err, "failed to close session after discovery failure");
                }
                return Err(McpError::connection(format!(
                    "tool discovery failed: {}",
                    err
                )));
            }
        };

        tracing::info!(
            server = %config.name,
            tool_count = catalog.len(),
            "MCP server connected"
        );

        Ok(Self {
            name: config.name.clone(),
            slot: Mutex::new(Slot::Open(session)),
            catalog,
        })
    }

    /// Server key from the configuration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operations discovered at connect time or by the last accepted rediscovery.
    pub fn catalog(&self) -> &[ToolInfo] {
        &self.catalog
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        self.slot.lock().await.state()
    }

    /// Re-run discovery on the open session.
    ///
    /// The local catalog is left alone; [`ServerConnection::replace_catalog`]
    /// commits the result once the caller has accepted it.
    pub async fn rediscover(&self) -> Result<Vec<ToolInfo>> {
        let tools = match &mut *self.slot.lock().await {
            Slot::Open(session) => session.list_tools().await?,
            _ => {
                return Err(McpError::NotOpen {
                    server: self.name.clone(),
                });
            }
        };
        tracing::debug!(server = %self.name, tool_count = tools.len(), "rediscovered tools");
        Ok(tools)
    }

    pub(crate) fn replace_catalog(&mut self, tools: Vec<ToolInfo>) {
        self.catalog = tools;
    }

    /// Invoke one operation on the owning server.
    ///
    /// A result the server flags as an error is surfaced as
    /// [`McpError::RemoteTool`].
    pub(crate) async fn invoke(&self, tool: &str, arguments: Value) -> Result<CallToolResult> {
        let mut slot = self.slot.lock().await;
        let Slot::Open(session) = &mut *slot else {
            return Err(McpError::NotOpen {
                server: self.name.clone(),
            });
        };

        let result = session.call_tool(tool, arguments).await?;
        if result.is_error() {
            let detail = result.rendered_text();
            tracing::warn!(server = %self.name, tool, "tool call returned error");
            return Err(McpError::remote_tool(if detail.is_empty() {
                "tool reported a failure without details".to_string()
            } else {
                detail
            }));
        }

        tracing::debug!(server = %self.name, tool, "tool call succeeded");
        Ok(result)
    }

    /// Close the session. Closing a closed connection does nothing.
    pub async fn close(&self) -> Result<()> {
        let mut session = {
            let mut slot = self.slot.lock().await;
            match std::mem::replace(&mut *slot, Slot::Closing) {
                Slot::Open(session) => session,
                other => {
                    *slot = other;
                    return Ok(());
                }
            }
        };

        tracing::info!(server = %self.name, "closing MCP server connection");
        let result = session.close().await;
        *self.slot.lock().await = Slot::Closed;
        result
    }
}
