//! Bringing the configured MCP servers up and down.

use anyhow::{Context as _, Result};
use conduit_config::{McpServerEntry, load_mcp_config};
use conduit_mcp::{McpServerConfig, SessionManager};
use console::Style;

use super::Context;

/// Translate a config entry into a connection config.
pub fn to_server_config(entry: McpServerEntry) -> McpServerConfig {
    entry
        .env
        .into_iter()
        .fold(
            McpServerConfig::new(entry.name, entry.command).with_args(entry.args),
            |config, (key, value)| config.with_env_var(key, value),
        )
}

/// Load the server list and connect every server.
///
/// Under fail-fast, a failing server closes everything opened before it and
/// the error is returned.
pub async fn connect(ctx: &Context) -> Result<SessionManager> {
    let servers = load_mcp_config(&ctx.config_path)
        .with_context(|| format!("loading {}", ctx.config_path.display()))?;

    tracing::info!(
        path = %ctx.config_path.display(),
        servers = ?servers.names(),
        "Loaded MCP server config"
    );

    let configs = servers
        .into_servers()
        .into_iter()
        .map(to_server_config)
        .collect();

    let mut manager = SessionManager::stdio().with_policy(ctx.policy);
    let report = manager
        .connect_all(configs)
        .await
        .context("connecting to MCP servers")?;

    if !report.skipped.is_empty() {
        let yellow = Style::new().yellow();
        for err in &report.skipped {
            eprintln!("{} {}", yellow.apply_to("Skipped:"), err);
        }
    }
    if report.connected.is_empty() {
        anyhow::bail!("no MCP server could be started");
    }

    Ok(manager)
}

/// Close every connection; failures are logged, never fatal.
pub async fn shutdown(manager: &mut SessionManager) {
    if let Err(e) = manager.close_all().await {
        tracing::warn!(error = %e, "Some MCP servers did not shut down cleanly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_server_config() {
        let entry = McpServerEntry::new("files", "npx")
            .with_arg("-y")
            .with_arg("@modelcontextprotocol/server-filesystem")
            .with_env("ROOT", "/tmp");

        let config = to_server_config(entry);
        assert_eq!(config.name, "files");
        assert_eq!(config.command, "npx");
        assert_eq!(config.args, vec!["-y", "@modelcontextprotocol/server-filesystem"]);
        assert_eq!(config.env, vec![("ROOT".to_string(), "/tmp".to_string())]);
    }
}
