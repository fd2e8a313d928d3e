//! In-memory tool servers for tests.
//!
//! [`FakeConnector`] opens sessions against scripted [`FakeServer`]s and
//! records every open, close, and call so tests can assert on routing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{McpError, Result};
use crate::protocol::{CallToolResult, ToolInfo};
use crate::session::{Connector, McpServerConfig, ToolSession};

/// A call observed by a fake session.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeCall {
    /// Server that received the call.
    pub server: String,
    /// Operation name.
    pub tool: String,
    /// Arguments as received.
    pub arguments: Value,
}

/// Scripted behaviour of one fake server.
#[derive(Debug, Clone, Default)]
pub struct FakeServer {
    name: String,
    tools: Vec<ToolInfo>,
    responses: HashMap<String, CallToolResult>,
    fail_open: bool,
    fail_discovery: bool,
    fail_close: bool,
    protocol_error_on: Option<String>,
}

impl FakeServer {
    /// A server with no tools.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Advertise a tool.
    pub fn with_tool(mut self, tool: ToolInfo) -> Self {
        self.tools.push(tool);
        self
    }

    /// Answer calls to `tool` with a fixed result.
    ///
    /// Tools without a scripted result echo `<server>:<tool> <arguments>`.
    pub fn with_response(mut self, tool: impl Into<String>, result: CallToolResult) -> Self {
        self.responses.insert(tool.into(), result);
        self
    }

    /// Refuse to open.
    pub fn fail_on_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Open, but fail `tools/list`.
    pub fn fail_on_discovery(mut self) -> Self {
        self.fail_discovery = true;
        self
    }

    /// Report an error when closed.
    pub fn fail_on_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Answer calls to `tool` with a malformed response.
    pub fn protocol_error_on(mut self, tool: impl Into<String>) -> Self {
        self.protocol_error_on = Some(tool.into());
        self
    }

    fn respond(&self, tool: &str, arguments: &Value) -> Result<CallToolResult> {
        if self.protocol_error_on.as_deref() == Some(tool) {
            return Err(McpError::protocol("result is not an object"));
        }
        Ok(self
            .responses
            .get(tool)
            .cloned()
            .unwrap_or_else(|| CallToolResult::text(format!("{}:{} {}", self.name, tool, arguments))))
    }
}

#[derive(Debug, Default)]
struct FakeLog {
    servers: HashMap<String, FakeServer>,
    opened: Vec<String>,
    closed: Vec<String>,
    calls: Vec<FakeCall>,
}

/// Connector backed by [`FakeServer`]s, keyed by server name.
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<FakeLog>>,
}

impl FakeConnector {
    /// A connector with no servers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a server available under its name.
    pub fn with_server(self, server: FakeServer) -> Self {
        self.state
            .lock()
            .servers
            .insert(server.name.clone(), server);
        self
    }

    /// Replace what a server will report on its next discovery.
    pub fn set_tools(&self, server: &str, tools: Vec<ToolInfo>) {
        if let Some(fake) = self.state.lock().servers.get_mut(server) {
            fake.tools = tools;
        }
    }

    /// Servers opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.state.lock().opened.clone()
    }

    /// Servers closed so far, in order.
    pub fn closed(&self) -> Vec<String> {
        self.state.lock().closed.clone()
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, config: &McpServerConfig) -> Result<Box<dyn ToolSession>> {
        let mut state = self.state.lock();
        let server = state
            .servers
            .get(&config.name)
            .ok_or_else(|| McpError::connection(format!("no fake server named '{}'", config.name)))?;
        if server.fail_open {
            return Err(McpError::connection(format!(
                "fake server '{}' refused to start",
                config.name
            )));
        }
        state.opened.push(config.name.clone());
        Ok(Box::new(FakeSession {
            name: config.name.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    name: String,
    state: Arc<Mutex<FakeLog>>,
}

impl FakeSession {
    fn server(&self, state: &FakeLog) -> Result<FakeServer> {
        state
            .servers
            .get(&self.name)
            .cloned()
            .ok_or(McpError::ConnectionClosed)
    }
}

#[async_trait]
impl ToolSession for FakeSession {
    async fn list_tools(&mut self) -> Result<Vec<ToolInfo>> {
        let state = self.state.lock();
        let server = self.server(&state)?;
        if server.fail_discovery {
            return Err(McpError::Timeout {
                method: "tools/list".to_string(),
            });
        }
        Ok(server.tools)
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let mut state = self.state.lock();
        let server = self.server(&state)?;
        let result = server.respond(name, &arguments);
        state.calls.push(FakeCall {
            server: self.name.clone(),
            tool: name.to_string(),
            arguments,
        });
        result
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.closed.push(self.name.clone());
        if self.server(&state)?.fail_close {
            return Err(McpError::ConnectionClosed);
        }
        Ok(())
    }
}
