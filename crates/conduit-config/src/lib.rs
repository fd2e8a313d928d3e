//! Configuration for the Conduit agent.
//!
//! Provides:
//! - The `mcp_config.json` server list (`mcpServers` layout), validated and
//!   with `${VAR}` placeholders expanded
//! - Model settings with defaults
//! - API key lookup from the environment
//! - Platform paths for logs

pub mod error;
pub mod mcp;
pub mod settings;

pub use error::{ConfigError, Result};
pub use mcp::{
    DEFAULT_MCP_CONFIG_FILE, McpServerEntry, McpServersConfig, load_mcp_config,
    validate_server_name,
};
pub use settings::{
    API_KEY_ENV, DEFAULT_MAX_TOKENS, DEFAULT_MAX_TURNS, DEFAULT_MODEL, ModelSettings, data_dir,
    log_dir, resolve_api_key, resolve_api_key_with,
};
