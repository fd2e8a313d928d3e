//! Conduit - chat with a model that can call tools on many MCP servers
//!
//! Main entry point for the Conduit CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::Style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{chat, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Conduit - chat with a model that can call tools on many MCP servers
#[derive(Parser)]
#[command(name = "conduit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the MCP server config file
    #[arg(
        short,
        long,
        global = true,
        env = "CONDUIT_MCP_CONFIG",
        default_value = conduit_config::DEFAULT_MCP_CONFIG_FILE
    )]
    pub config: PathBuf,

    /// Model to chat with
    #[arg(short, long, global = true, env = "CONDUIT_MODEL")]
    pub model: Option<String>,

    /// Maximum tokens per model call
    #[arg(long, global = true)]
    pub max_tokens: Option<u32>,

    /// Maximum model calls per question
    #[arg(long, global = true)]
    pub max_turns: Option<u32>,

    /// System prompt sent with every model call
    #[arg(long, global = true)]
    pub system: Option<String>,

    /// Skip servers that fail to start instead of aborting
    #[arg(long, global = true)]
    pub best_effort: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enter interactive chat mode (REPL)
    Chat(chat::ChatArgs),

    /// Connect to every server and list the tools the model would see
    Tools(tools::ToolsArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

const CONSOLE_FILTER: &str =
    "conduit=info,conduit_agent=info,conduit_llm=info,conduit_mcp=info,conduit_config=info,warn";
const VERBOSE_FILTER: &str = "conduit=debug,conduit_agent=debug,conduit_llm=debug,conduit_mcp=debug,conduit_config=debug,info";
const FILE_FILTER: &str = "conduit=trace,conduit_agent=trace,conduit_llm=trace,conduit_mcp=trace,conduit_config=trace,info";

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose);

    let ctx = commands::Context::from_cli(&cli);

    let result = match cli.command {
        Some(Commands::Chat(args)) => chat::run(args, &ctx).await,
        Some(Commands::Tools(args)) => tools::run(args, &ctx).await,
        None => chat::run(chat::ChatArgs::default(), &ctx).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let red = Style::new().red();
            eprintln!("{} {:#}", red.apply_to("Error:"), e);
            ExitCode::FAILURE
        }
    }
}

/// Console (human-readable, stderr) + daily rolling JSON file.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing(verbose: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::prelude::*;

    let console_filter = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ if verbose => EnvFilter::new(VERBOSE_FILTER),
        _ => EnvFilter::new(CONSOLE_FILTER),
    };

    let log_dir = conduit_config::log_dir().unwrap_or_else(|| PathBuf::from("logs"));
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("conduit.log")
        .build(&log_dir)
        .ok();

    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(FILE_FILTER));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    if guard.is_none() {
        tracing::warn!(dir = %log_dir.display(), "File logging disabled, could not open log directory");
    }

    guard
}
