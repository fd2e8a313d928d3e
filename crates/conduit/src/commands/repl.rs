//! REPL (Read-Eval-Print Loop) implementation for interactive chat.

use anyhow::Result;
use conduit_agent::{ConversationDriver, QueryObserver, ToolCallRecord};
use conduit_llm::ToolUseBlock;
use conduit_mcp::CallRouter;
use console::{Style, style};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

/// Prints a notice for every tool call as the driver makes it.
#[derive(Debug, Clone, Copy)]
pub struct NoticePrinter {
    verbose: bool,
}

impl NoticePrinter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl QueryObserver for NoticePrinter {
    fn on_tool_call(&mut self, request: &ToolUseBlock) {
        let dim = Style::new().dim();
        println!(
            "{}",
            dim.apply_to(format!(
                "[Calling tool {} with args {}]",
                request.name, request.input
            ))
        );
    }

    fn on_tool_result(&mut self, record: &ToolCallRecord) {
        if record.is_error {
            let yellow = Style::new().yellow();
            println!(
                "{}",
                yellow.apply_to(format!("[Tool {} failed: {}]", record.name, record.output))
            );
        } else if self.verbose {
            let dim = Style::new().dim();
            let server = record.server.as_deref().unwrap_or("?");
            println!(
                "{}",
                dim.apply_to(format!(
                    "[{} answered {} with {} bytes]",
                    server,
                    record.name,
                    record.output.len()
                ))
            );
        }
    }
}

/// REPL state and configuration.
pub struct Repl {
    driver: ConversationDriver,
    editor: Editor<(), DefaultHistory>,
    verbose: bool,
}

impl Repl {
    /// Create a new REPL instance.
    pub fn new(driver: ConversationDriver, verbose: bool) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();

        let editor = Editor::with_config(config)?;

        Ok(Self {
            driver,
            editor,
            verbose,
        })
    }

    /// Run the REPL loop until `:exit`, `:quit`, or end of input.
    pub async fn run(&mut self, router: CallRouter<'_>) -> Result<()> {
        self.print_welcome(router);

        loop {
            let prompt = self.format_prompt();

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    if is_exit_command(line) {
                        break;
                    }

                    self.ask(router, line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!();
                    self.print_dim("(Interrupted - type :exit to quit)");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(e) => {
                    self.print_error(&format!("Input error: {}", e));
                    break;
                }
            }
        }

        self.print_dim("Goodbye!");
        Ok(())
    }

    /// Answer one query. Failures are printed and the loop goes on.
    async fn ask(&self, router: CallRouter<'_>, query: &str) {
        let mut notices = NoticePrinter::new(self.verbose);
        match self.driver.run_observed(router, query, &mut notices).await {
            Ok(outcome) => {
                println!();
                println!("{}", outcome.answer);
                println!();
                if self.verbose {
                    self.print_dim(&format!(
                        "({} model calls, {} tool calls, {} tokens)",
                        outcome.model_calls,
                        outcome.tool_calls.len(),
                        outcome.usage.total()
                    ));
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Query failed");
                self.print_error(&e.to_string());
            }
        }
    }

    fn print_welcome(&self, router: CallRouter<'_>) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Conduit Chat").bold().cyan());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!(
            "{}",
            dim.apply_to(format!(
                "{} tools available. Type your query and press Enter.",
                router.catalog().len()
            ))
        );
        println!("{}", dim.apply_to("Type :exit or press Ctrl+D to quit."));
        println!();
    }

    fn format_prompt(&self) -> String {
        format!("{} ", style(format!("{}>", self.driver.config().model)).cyan().bold())
    }

    fn print_dim(&self, msg: &str) {
        let dim = Style::new().dim();
        println!("{}", dim.apply_to(msg));
    }

    fn print_error(&self, msg: &str) {
        let red = Style::new().red();
        println!("{} {}", red.apply_to("Error:"), msg);
    }
}

fn is_exit_command(line: &str) -> bool {
    matches!(line, ":exit" | ":quit")
}
