//! CLI command handlers.

pub mod chat;
pub mod repl;
pub mod servers;
pub mod tools;

use std::path::PathBuf;

use conduit_agent::DriverConfig;
use conduit_config::ModelSettings;
use conduit_mcp::StartupPolicy;

use crate::Cli;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Path to `mcp_config.json`.
    pub config_path: PathBuf,
    /// Model settings after CLI overrides.
    pub settings: ModelSettings,
    /// What to do when a server fails to start.
    pub policy: StartupPolicy,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Apply CLI overrides on top of the default model settings.
    pub fn from_cli(cli: &Cli) -> Self {
        let mut settings = ModelSettings::default();
        if let Some(ref model) = cli.model {
            settings = settings.with_model(model);
        }
        if let Some(max_tokens) = cli.max_tokens {
            settings = settings.with_max_tokens(max_tokens);
        }
        if let Some(max_turns) = cli.max_turns {
            settings = settings.with_max_turns(max_turns);
        }
        if let Some(ref system) = cli.system {
            settings = settings.with_system_prompt(system);
        }

        Self {
            config_path: cli.config.clone(),
            settings,
            policy: if cli.best_effort {
                StartupPolicy::BestEffort
            } else {
                StartupPolicy::FailFast
            },
            verbose: cli.verbose,
        }
    }

    /// Driver configuration for these settings.
    pub fn driver_config(&self) -> DriverConfig {
        self.settings.clone().into()
    }
}
