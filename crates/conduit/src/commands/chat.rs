//! Chat command - interactive REPL mode.

use anyhow::{Context as _, Result};
use clap::Args;
use conduit_agent::ConversationDriver;
use conduit_config::resolve_api_key;
use conduit_llm::{AnthropicConfig, create_shared_backend};

use super::Context;
use super::repl::{NoticePrinter, Repl};
use super::servers;

/// Arguments for the chat command.
#[derive(Args, Debug, Default)]
pub struct ChatArgs {
    /// Ask a single question, print the answer, and exit
    #[arg(short, long)]
    pub prompt: Option<String>,
}

/// Run the chat command.
pub async fn run(args: ChatArgs, ctx: &Context) -> Result<()> {
    let api_key = resolve_api_key().context("the model API key is required for chat")?;
    let backend = create_shared_backend(AnthropicConfig::new(api_key))?;
    let driver = ConversationDriver::new(backend, ctx.driver_config());

    let mut manager = servers::connect(ctx).await?;

    let result = match args.prompt {
        Some(prompt) => {
            let mut notices = NoticePrinter::new(ctx.verbose);
            driver
                .run_observed(manager.router(), &prompt, &mut notices)
                .await
                .map(|outcome| println!("{}", outcome.answer))
                .map_err(anyhow::Error::from)
        }
        None => match Repl::new(driver, ctx.verbose) {
            Ok(mut repl) => repl.run(manager.router()).await,
            Err(e) => Err(e),
        },
    };

    servers::shutdown(&mut manager).await;
    result
}
