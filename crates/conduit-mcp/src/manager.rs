//! Session manager for multi-server lifecycle management.
//!
//! The [`SessionManager`] is the only owner of server connections and the
//! tool registry. Queries borrow it immutably through [`SessionManager::router`];
//! connecting, refreshing and closing need `&mut self`, so the registry cannot
//! change underneath a running query.
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_mcp::{McpServerConfig, SessionManager};
//!
//! let mut manager = SessionManager::stdio();
//! manager
//!     .connect_all(vec![McpServerConfig::new("sqlite", "mcp-server-sqlite")
//!         .with_arg("--db")
//!         .with_arg("/path/to/db.sqlite")])
//!     .await?;
//!
//! let output = manager.router().route("sqlite__query", json!({"sql": "SELECT 1"})).await?;
//! println!("{}", output.text);
//!
//! manager.close_all().await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use crate::connection::{ConnectionState, ServerConnection};
use crate::error::{CleanupErrors, SessionError};
use crate::registry::ToolRegistry;
use crate::router::CallRouter;
use crate::session::{Connector, McpServerConfig, StdioConnector};

/// What to do when a server fails during [`SessionManager::connect_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartupPolicy {
    /// Close everything opened so far and return the error.
    #[default]
    FailFast,
    /// Log the failure, skip the server, and keep going.
    BestEffort,
}

/// Outcome of [`SessionManager::connect_all`].
#[derive(Debug, Default)]
pub struct StartupReport {
    /// Servers connected by this call, in order.
    pub connected: Vec<String>,
    /// Servers skipped under [`StartupPolicy::BestEffort`].
    pub skipped: Vec<SessionError>,
}

/// Owner of every server connection and the registry built from them.
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    policy: StartupPolicy,
    connections: Vec<ServerConnection>,
    registry: Arc<ToolRegistry>,
}

impl SessionManager {
    /// Create a manager that opens sessions through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            policy: StartupPolicy::default(),
            connections: Vec::new(),
            registry: Arc::new(ToolRegistry::new()),
        }
    }

    /// Create a manager that spawns servers as child processes.
    pub fn stdio() -> Self {
        Self::new(Arc::new(StdioConnector::new()))
    }

    /// Set the startup policy.
    pub fn with_policy(mut self, policy: StartupPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The startup policy in effect.
    pub fn policy(&self) -> StartupPolicy {
        self.policy
    }

    /// Connect every server in order and register its tools.
    ///
    /// Under [`StartupPolicy::FailFast`] the first failure closes every
    /// connection this call opened and no further server is attempted.
    pub async fn connect_all(
        &mut self,
        configs: Vec<McpServerConfig>,
    ) -> Result<StartupReport, SessionError> {
        let mut seen = HashSet::new();
        for config in &configs {
            if !seen.insert(config.name.as_str()) || self.is_connected(&config.name) {
                return Err(SessionError::DuplicateServer(config.name.clone()));
            }
        }

        let mut report = StartupReport::default();
        for config in configs {
            match self.connect_server(config).await {
                Ok(_) => {
                    if let Some(last) = self.connections.last() {
                        report.connected.push(last.name().to_string());
                    }
                }
                Err(err) => match self.policy {
                    StartupPolicy::FailFast => {
                        tracing::error!(error = %err, "MCP server failed to start, aborting startup");
                        self.rollback(&report.connected).await;
                        return Err(err);
                    }
                    StartupPolicy::BestEffort => {
                        tracing::warn!(error = %err, "MCP server failed to start, skipping");
                        report.skipped.push(err);
                    }
                },
            }
        }

        tracing::info!(
            connected = report.connected.len(),
            skipped = report.skipped.len(),
            tools = self.registry.len(),
            "MCP server connection complete"
        );
        Ok(report)
    }

    /// Connect one server and register its tools. Returns the tool count.
    ///
    /// If the registry refuses the catalog, the new connection is closed.
    pub async fn connect_server(&mut self, config: McpServerConfig) -> Result<usize, SessionError> {
        if self.is_connected(&config.name) {
            return Err(SessionError::DuplicateServer(config.name));
        }

        let connection = ServerConnection::connect(&config, self.connector.as_ref())
            .await
            .map_err(|source| SessionError::Connection {
                server: config.name.clone(),
                source,
            })?;

        let mut registry = (*self.registry).clone();
        let added = match registry.register(connection.name(), connection.catalog()) {
            Ok(added) => added,
            Err(err) => {
                if let Err(close_err) = connection.close().await {
                    tracing::warn!(server = %config.name, error = %close_err, "failed to close rejected server");
                }
                return Err(err.into());
            }
        };

        self.registry = Arc::new(registry);
        self.connections.push(connection);
        Ok(added)
    }

    /// Close one server and remove its tools.
    pub async fn disconnect(&mut self, name: &str) -> Result<(), SessionError> {
        let position = self
            .position(name)
            .ok_or_else(|| SessionError::NotConnected(name.to_string()))?;
        let connection = self.connections.remove(position);
        Arc::make_mut(&mut self.registry).unregister(name);

        connection.close().await.map_err(|err| {
            let mut errors = CleanupErrors::default();
            errors.push(name, err);
            SessionError::Cleanup(errors)
        })
    }

    /// Re-discover one server's tools and swap its registry entries.
    ///
    /// On any failure the previous entries stay in place.
    pub async fn refresh_tools(&mut self, name: &str) -> Result<usize, SessionError> {
        let position = self
            .position(name)
            .ok_or_else(|| SessionError::NotConnected(name.to_string()))?;
        let tools = self.connections[position]
            .rediscover()
            .await
            .map_err(|source| SessionError::Discovery {
                server: name.to_string(),
                source,
            })?;

        let mut registry = (*self.registry).clone();
        registry.unregister(name);
        let added = registry.register(name, &tools)?;
        self.registry = Arc::new(registry);
        self.connections[position].replace_catalog(tools);

        tracing::info!(server = %name, tool_count = added, "refreshed MCP tools");
        Ok(added)
    }

    /// Close every connection, even when some fail.
    ///
    /// Afterwards no connections or tools remain, so a second call is a
    /// no-op.
    pub async fn close_all(&mut self) -> Result<(), SessionError> {
        if self.connections.is_empty() {
            self.registry = Arc::new(ToolRegistry::new());
            return Ok(());
        }

        tracing::info!(
            server_count = self.connections.len(),
            "shutting down all MCP servers"
        );

        let mut errors = CleanupErrors::default();
        for connection in self.connections.drain(..) {
            if let Err(err) = connection.close().await {
                tracing::warn!(server = %connection.name(), error = %err, "failed to close MCP server");
                errors.push(connection.name(), err);
            }
        }
        self.registry = Arc::new(ToolRegistry::new());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }

    /// Current registry snapshot.
    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }

    /// A router over the current registry and connections.
    pub fn router(&self) -> CallRouter<'_> {
        CallRouter::new(&self.registry, &self.connections)
    }

    /// Names of connected servers, in connection order.
    pub fn connected_servers(&self) -> Vec<&str> {
        self.connections.iter().map(|c| c.name()).collect()
    }

    /// Check if a server is connected.
    pub fn is_connected(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Lifecycle state of a server, if it is managed here.
    pub async fn state_of(&self, name: &str) -> Option<ConnectionState> {
        match self.position(name) {
            Some(i) => Some(self.connections[i].state().await),
            None => None,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.connections.iter().position(|c| c.name() == name)
    }

    async fn rollback(&mut self, opened: &[String]) {
        for name in opened {
            if let Err(err) = self.disconnect(name).await {
                tracing::warn!(server = %name, error = %err, "failed to close server during startup rollback");
            }
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        // Child processes are killed when their transports drop.
        if !self.connections.is_empty() {
            tracing::debug!(
                count = self.connections.len(),
                "dropping SessionManager with open connections"
            );
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("policy", &self.policy)
            .field("connected", &self.connected_servers())
            .field("tools", &self.registry.len())
            .finish()
    }
}
