//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading and validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// The file is not valid JSON or has the wrong top-level shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// One server entry has the wrong shape.
    #[error("invalid entry for MCP server '{name}': {source}")]
    InvalidServer {
        name: String,
        source: serde_json::Error,
    },

    /// `mcpServers` is missing or empty.
    #[error("no MCP servers found: add at least one entry under \"mcpServers\"")]
    NoServers,

    /// A server key cannot be used to build public tool names.
    #[error("invalid MCP server name '{name}': {reason}")]
    InvalidServerName { name: String, reason: String },

    /// A server entry has no command to spawn.
    #[error("MCP server '{server}' has an empty command")]
    EmptyCommand { server: String },

    /// A `${VAR}` placeholder names a variable that is not set.
    #[error("MCP server '{server}' references undefined environment variable '{variable}'")]
    UndefinedVariable { server: String, variable: String },

    /// API key not found in the environment.
    #[error("API key not found: set the {env_var} environment variable (a .env file works too)")]
    ApiKeyNotFound { env_var: String },
}
