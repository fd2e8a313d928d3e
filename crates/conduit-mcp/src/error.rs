//! Error types for MCP connections, the tool registry, and call routing.

use thiserror::Error;

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Error type for a single server connection.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server process could not be started or the handshake failed.
    #[error("failed to connect to MCP server: {0}")]
    Connection(String),

    /// An invocation was attempted on a session that is not open.
    #[error("session for server '{server}' is not open")]
    NotOpen {
        /// Server the invocation was addressed to.
        server: String,
    },

    /// The server executed the tool and reported a failure.
    #[error("tool reported an error: {message}")]
    RemoteTool {
        /// Whatever detail the server provided.
        message: String,
    },

    /// The server answered with a JSON-RPC error object.
    #[error("server error {code}: {message}")]
    Rpc {
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        message: String,
        /// Optional additional data.
        data: Option<serde_json::Value>,
    },

    /// The server sent data that does not follow the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error on the underlying transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed its end of the transport.
    #[error("connection closed")]
    ConnectionClosed,

    /// No response arrived within the request timeout.
    #[error("timeout waiting for response to '{method}'")]
    Timeout {
        /// The JSON-RPC method that timed out.
        method: String,
    },
}

impl McpError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a remote tool error.
    pub fn remote_tool(msg: impl Into<String>) -> Self {
        Self::RemoteTool {
            message: msg.into(),
        }
    }

    /// Create an RPC error from an error response.
    pub fn rpc(code: i64, message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
            data,
        }
    }

    /// Whether the peer sent malformed data.
    ///
    /// Protocol violations poison the current query; everything else only
    /// affects the single call that produced it.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Json(_))
    }
}

/// Errors raised while building or querying the tool registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A server with this name already contributed tools.
    #[error("server '{0}' is already registered")]
    ServerAlreadyRegistered(String),

    /// The public name is already taken.
    #[error("tool '{public_name}' from server '{server}' collides with an entry from '{existing_server}'")]
    DuplicateName {
        /// The public name that collided.
        public_name: String,
        /// Server whose registration was rejected.
        server: String,
        /// Server that already owns the name.
        existing_server: String,
    },

    /// No entry matches the requested name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// Uniform error returned by the call router.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The name is not in the registry; no server was contacted.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// The name the model asked for.
        name: String,
    },

    /// The arguments cannot be sent as a `tools/call` request.
    #[error("invalid arguments for tool '{name}': {reason}")]
    InvalidArguments {
        /// Public tool name.
        name: String,
        /// Why the arguments were rejected.
        reason: String,
    },

    /// The owning server failed the invocation.
    #[error("tool '{tool}' on server '{server}' failed: {source}")]
    Invocation {
        /// Owning server.
        server: String,
        /// Operation name as advertised by the server.
        tool: String,
        /// Underlying cause.
        #[source]
        source: McpError,
    },
}

impl RouteError {
    /// Whether the failure only affects this call and can be reported back to the model.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::UnknownTool { .. } => true,
            Self::InvalidArguments { .. } => false,
            Self::Invocation { source, .. } => !source.is_protocol_violation(),
        }
    }
}

/// Failures collected while closing every connection.
#[derive(Debug, Default)]
pub struct CleanupErrors {
    failures: Vec<(String, McpError)>,
}

impl CleanupErrors {
    pub(crate) fn push(&mut self, server: impl Into<String>, error: McpError) {
        self.failures.push((server.into(), error));
    }

    /// Per-server failures in the order the servers were closed.
    pub fn failures(&self) -> &[(String, McpError)] {
        &self.failures
    }

    /// Number of servers that failed to close cleanly.
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Whether every close succeeded.
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl std::fmt::Display for CleanupErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} server(s) failed to close", self.failures.len())?;
        for (server, error) in &self.failures {
            write!(f, "; {}: {}", server, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for CleanupErrors {}

/// Errors raised by the session manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A server could not be connected.
    #[error("server '{server}' is unusable: {source}")]
    Connection {
        /// Server key from the configuration.
        server: String,
        /// Underlying cause.
        #[source]
        source: McpError,
    },

    /// The same server key appeared twice.
    #[error("server '{0}' is configured more than once")]
    DuplicateServer(String),

    /// The server's catalog could not be registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// No connection exists under that name.
    #[error("server '{0}' is not connected")]
    NotConnected(String),

    /// Re-discovery failed on a connected server.
    #[error("failed to refresh tools for '{server}': {source}")]
    Discovery {
        /// Server key.
        server: String,
        /// Underlying cause.
        #[source]
        source: McpError,
    },

    /// One or more connections failed to close.
    #[error(transparent)]
    Cleanup(#[from] CleanupErrors),
}
