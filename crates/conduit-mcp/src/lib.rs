//! MCP (Model Context Protocol) connections, tool registry, and call routing.
//!
//! This crate connects to any number of MCP servers, merges their tool
//! catalogs into one collision-free namespace, and dispatches each call to
//! the server that owns it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  SessionManager                                             │
//! │  - Owns every ServerConnection and the ToolRegistry         │
//! │  - connect_all / refresh_tools / close_all                  │
//! └─────────────────────────────────────────────────────────────┘
//!            │                                  │
//!            ▼                                  ▼
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │  ToolRegistry            │   │  CallRouter                  │
//! │  - server__tool names    │◀──│  - resolve + invoke          │
//! │  - Arc snapshots         │   │  - argument checks           │
//! └──────────────────────────┘   └──────────────────────────────┘
//!                                               │
//!                                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ServerConnection → ToolSession → StdioTransport            │
//! │  - initialize, tools/list, tools/call                       │
//! │  - newline-delimited JSON-RPC 2.0 over child stdio          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use conduit_mcp::{McpServerConfig, SessionManager};
//!
//! let mut manager = SessionManager::stdio();
//! manager
//!     .connect_all(vec![McpServerConfig::new("files", "mcp-server-filesystem").with_arg("/tmp")])
//!     .await?;
//!
//! for entry in manager.registry().catalog() {
//!     println!("{} - {}", entry.name, entry.description);
//! }
//!
//! let output = manager
//!     .router()
//!     .route("files__read_file", json!({"path": "/tmp/notes.txt"}))
//!     .await?;
//! println!("{}", output.text);
//!
//! manager.close_all().await?;
//! ```
//!
//! # MCP Protocol
//!
//! The protocol flow is:
//! 1. Client sends `initialize` with capabilities
//! 2. Server responds with its capabilities
//! 3. Client sends `notifications/initialized`
//! 4. Client can now call `tools/list` (paginated) and `tools/call`

pub mod connection;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

// Re-export main types
pub use connection::{ConnectionState, ServerConnection};
pub use error::{CleanupErrors, McpError, RegistryError, Result, RouteError, SessionError};
pub use manager::{SessionManager, StartupPolicy, StartupReport};
pub use protocol::{
    CallToolParams, CallToolResult, EmbeddedResource, InitializeParams, InitializeResult,
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    ServerInfo, ToolContent, ToolInfo,
};
pub use registry::{
    CatalogEntry, MAX_PUBLIC_NAME_LEN, RegisteredTool, TOOL_NAME_SEPARATOR, ToolRegistry,
    ToolTarget, is_valid_public_name, public_tool_name, qualify, split_public_name,
};
pub use router::{CallRouter, ToolOutput};
pub use session::{Connector, McpServerConfig, StdioConnector, StdioSession, ToolSession};
pub use transport::StdioTransport;
