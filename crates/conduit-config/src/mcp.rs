//! MCP server configuration file.
//!
//! The file uses the `mcpServers` layout shared by most MCP hosts:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "files": {
//!       "command": "npx",
//!       "args": ["-y", "@modelcontextprotocol/server-filesystem", "${HOME}/notes"]
//!     },
//!     "search": {
//!       "command": "mcp-server-brave-search",
//!       "env": { "BRAVE_API_KEY": "${BRAVE_API_KEY}" }
//!     }
//!   }
//! }
//! ```
//!
//! Keys become server names and prefix every public tool name, so they are
//! validated here before anything is spawned. Declaration order is kept.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::{ConfigError, Result};

/// Default config filename, resolved against the working directory.
pub const DEFAULT_MCP_CONFIG_FILE: &str = "mcp_config.json";

/// Separator the tool registry puts between server and tool names.
const NAME_SEPARATOR: &str = "__";

/// One server to spawn, with placeholders already expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerEntry {
    /// Unique server name (the key in `mcpServers`).
    pub name: String,
    /// Program to execute.
    pub command: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Extra environment variables, sorted by key.
    pub env: Vec<(String, String)>,
}

impl McpServerEntry {
    /// Create an entry with no arguments or environment.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// The validated set of servers from one config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct McpServersConfig {
    servers: Vec<McpServerEntry>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "mcpServers", default)]
    mcp_servers: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    disabled: bool,
}

impl McpServersConfig {
    /// Parse and validate config text, expanding `${VAR}` from the process
    /// environment.
    pub fn from_json(contents: &str) -> Result<Self> {
        Self::from_json_with_env(contents, |name| std::env::var(name).ok())
    }

    /// Parse and validate config text with a custom variable lookup.
    pub fn from_json_with_env<F>(contents: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = serde_json::from_str(contents)?;
        let declared = raw.mcp_servers.unwrap_or_default();

        let mut servers = Vec::with_capacity(declared.len());
        for (name, value) in declared {
            let entry: RawServer =
                serde_json::from_value(value).map_err(|source| ConfigError::InvalidServer {
                    name: name.clone(),
                    source,
                })?;

            validate_server_name(&name)?;
            if entry.disabled {
                tracing::debug!(server = %name, "Skipping disabled MCP server");
                continue;
            }
            servers.push(resolve_entry(name, entry, &lookup)?);
        }

        if servers.is_empty() {
            return Err(ConfigError::NoServers);
        }

        Ok(Self { servers })
    }

    /// Servers in declaration order.
    pub fn servers(&self) -> &[McpServerEntry] {
        &self.servers
    }

    /// Consume the config, yielding the servers in declaration order.
    pub fn into_servers(self) -> Vec<McpServerEntry> {
        self.servers
    }

    /// Look up a server by name.
    pub fn get(&self, name: &str) -> Option<&McpServerEntry> {
        self.servers.iter().find(|s| s.name == name)
    }

    /// Server names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name.as_str()).collect()
    }

    /// Number of enabled servers.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether there are no servers (never true for a loaded config).
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// Read and validate an MCP config file.
pub fn load_mcp_config(path: impl AsRef<Path>) -> Result<McpServersConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;

    let config = McpServersConfig::from_json(&contents)?;
    tracing::debug!(
        path = %path.display(),
        servers = config.len(),
        "Loaded MCP config"
    );
    Ok(config)
}

/// Check that a server name can prefix public tool names.
///
/// Names must be non-empty ASCII `[A-Za-z0-9_-]`, must not contain the
/// `__` separator, and must not end in `_` (the qualified name would then
/// contain a misleading `___`).
pub fn validate_server_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Some("only ASCII letters, digits, '_' and '-' are allowed")
    } else if name.contains(NAME_SEPARATOR) {
        Some("name must not contain the '__' separator")
    } else if name.ends_with('_') {
        Some("name must not end with '_'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::InvalidServerName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn resolve_entry<F>(name: String, raw: RawServer, lookup: &F) -> Result<McpServerEntry>
where
    F: Fn(&str) -> Option<String>,
{
    if raw.command.trim().is_empty() {
        return Err(ConfigError::EmptyCommand { server: name });
    }

    let undefined = |variable: String| ConfigError::UndefinedVariable {
        server: name.clone(),
        variable,
    };

    let args = raw
        .args
        .iter()
        .map(|arg| expand_placeholders(arg, lookup).map_err(undefined))
        .collect::<Result<Vec<_>>>()?;

    let env = raw
        .env
        .into_iter()
        .map(|(key, value)| {
            expand_placeholders(&value, lookup)
                .map(|value| (key, value))
                .map_err(undefined)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(McpServerEntry {
        command: raw.command,
        args,
        env,
        name,
    })
}

/// Replace every `${VAR}` in `input`. Returns the name of the first
/// undefined variable on failure. An unterminated `${` is kept verbatim.
fn expand_placeholders<F>(input: &str, lookup: &F) -> std::result::Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };

        let variable = &after[..end];
        match lookup(variable) {
            Some(value) => out.push_str(&value),
            None => return Err(variable.to_string()),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn test_env(name: &str) -> Option<String> {
        match name {
            "HOME" => Some("/home/ada".to_string()),
            "TOKEN" => Some("s3cret".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_parse_preserves_declaration_order() {
        let config = McpServersConfig::from_json_with_env(
            r#"{
                "mcpServers": {
                    "zeta": {"command": "z"},
                    "alpha": {"command": "a", "args": ["--flag"]},
                    "mid": {"command": "m"}
                }
            }"#,
            no_env,
        )
        .unwrap();

        assert_eq!(config.names(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(config.get("alpha").unwrap().args, vec!["--flag"]);
        assert_eq!(config.len(), 3);
    }

    #[test]
    fn test_expands_placeholders_in_args_and_env() {
        let config = McpServersConfig::from_json_with_env(
            r#"{
                "mcpServers": {
                    "files": {
                        "command": "mcp-files",
                        "args": ["${HOME}/notes", "--raw=$HOME"],
                        "env": {"B_TOKEN": "Bearer ${TOKEN}", "A_MODE": "ro"}
                    }
                }
            }"#,
            test_env,
        )
        .unwrap();

        let files = config.get("files").unwrap();
        assert_eq!(files.args, vec!["/home/ada/notes", "--raw=$HOME"]);
        assert_eq!(
            files.env,
            vec![
                ("A_MODE".to_string(), "ro".to_string()),
                ("B_TOKEN".to_string(), "Bearer s3cret".to_string()),
            ]
        );
    }

    #[test]
    fn test_undefined_variable_is_an_error() {
        let err = McpServersConfig::from_json_with_env(
            r#"{"mcpServers": {"web": {"command": "w", "env": {"KEY": "${MISSING_KEY}"}}}}"#,
            test_env,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::UndefinedVariable { ref server, ref variable }
                if server == "web" && variable == "MISSING_KEY"
        ));
    }

    #[test]
    fn test_unterminated_placeholder_is_literal() {
        assert_eq!(expand_placeholders("a${b", &no_env).unwrap(), "a${b");
        assert_eq!(expand_placeholders("plain", &no_env).unwrap(), "plain");
        assert_eq!(expand_placeholders("${}", &no_env).unwrap_err(), "");
    }

    #[test]
    fn test_missing_or_empty_servers() {
        for json in [
            r#"{}"#,
            r#"{"mcpServers": {}}"#,
            r#"{"mcpServers": null}"#,
            r#"{"mcpServers": {"off": {"command": "x", "disabled": true}}}"#,
        ] {
            let err = McpServersConfig::from_json_with_env(json, no_env).unwrap_err();
            assert!(matches!(err, ConfigError::NoServers), "{json}: {err:?}");
        }
    }

    #[test]
    fn test_disabled_servers_are_skipped() {
        let config = McpServersConfig::from_json_with_env(
            r#"{"mcpServers": {"on": {"command": "a"}, "off": {"command": "b", "disabled": true}}}"#,
            no_env,
        )
        .unwrap();
        assert_eq!(config.names(), vec!["on"]);
    }

    #[test]
    fn test_malformed_documents() {
        let err = McpServersConfig::from_json_with_env("not json", no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = McpServersConfig::from_json_with_env(r#"{"mcpServers": []}"#, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = McpServersConfig::from_json_with_env(
            r#"{"mcpServers": {"files": {"args": ["x"]}}}"#,
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidServer { ref name, .. } if name == "files"));
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let err = McpServersConfig::from_json_with_env(
            r#"{"mcpServers": {"files": {"command": "  "}}}"#,
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCommand { ref server } if server == "files"));
    }

    #[test]
    fn test_server_name_rules() {
        for ok in ["files", "web-search", "db_2", "A"] {
            assert!(validate_server_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", "my.server", "two words", "a__b", "trailing_", "ünï"] {
            assert!(
                matches!(
                    validate_server_name(bad),
                    Err(ConfigError::InvalidServerName { .. })
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_invalid_name_in_document() {
        let err = McpServersConfig::from_json_with_env(
            r#"{"mcpServers": {"web.search": {"command": "w"}}}"#,
            no_env,
        )
        .unwrap_err();
        assert!(err.to_string().contains("web.search"));
    }

    #[test]
    fn test_load_mcp_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mcpServers": {{"files": {{"command": "mcp-files"}}}}}}"#).unwrap();

        let config = load_mcp_config(file.path()).unwrap();
        assert_eq!(config.into_servers(), vec![McpServerEntry::new("files", "mcp-files")]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_mcp_config(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
        assert!(err.to_string().contains("failed to read config file"));
    }
}
