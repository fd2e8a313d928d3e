//! The multi-turn exchange between the model and the tool servers.
//!
//! One query runs as an explicit state machine:
//!
//! ```text
//! AwaitingModel ──▶ ModelResponded ──▶ Done
//!       ▲                 │
//!       │                 ▼
//!       └────────── ExecutingTools
//! ```
//!
//! Every tool request in one model response is executed in emission order,
//! then the assistant turn and a single user turn holding all results are
//! appended before the model is asked again.

use conduit_config::ModelSettings;
use conduit_llm::{
    CompletionRequest, CompletionResponse, ContentBlock, SharedBackend, ToolDefinition,
    ToolResultBlock, ToolUseBlock, Usage,
};
use conduit_mcp::{CallRouter, CatalogEntry, RouteError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conversation::Conversation;
use crate::error::{DriverError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// How the driver calls the model.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverConfig {
    /// Model identifier.
    pub model: String,
    /// Maximum tokens per model call.
    pub max_tokens: u32,
    /// Maximum model calls per query (at least 1).
    pub max_turns: u32,
    /// Optional system prompt.
    pub system_prompt: Option<String>,
    /// Optional sampling temperature.
    pub temperature: Option<f32>,
}

impl DriverConfig {
    /// Default settings for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set the per-call token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the per-query model call limit. Values below 1 are raised to 1.
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        ModelSettings::default().into()
    }
}

impl From<ModelSettings> for DriverConfig {
    fn from(settings: ModelSettings) -> Self {
        Self {
            model: settings.model,
            max_tokens: settings.max_tokens,
            max_turns: settings.max_turns.max(1),
            system_prompt: settings.system_prompt,
            temperature: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// One executed tool request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// The model's tool_use id.
    pub id: String,
    /// Public tool name as requested.
    pub name: String,
    /// Arguments as requested.
    pub arguments: Value,
    /// Server that handled the call, when it was resolved.
    pub server: Option<String>,
    /// Text sent back to the model.
    pub output: String,
    /// Whether the model was told the call failed.
    pub is_error: bool,
}

impl ToolCallRecord {
    fn to_result_block(&self) -> ToolResultBlock {
        if self.is_error {
            ToolResultBlock::error(&self.id, &self.output)
        } else {
            ToolResultBlock::success(&self.id, &self.output)
        }
    }
}

/// Result of a completed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    /// Text fragments of every model response, in order, joined by newlines.
    pub answer: String,
    /// Every tool request, in execution order.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of model calls made.
    pub model_calls: u32,
    /// Token usage summed over all model calls.
    pub usage: Usage,
}

// ─────────────────────────────────────────────────────────────────────────────
// Observer
// ─────────────────────────────────────────────────────────────────────────────

/// Hooks for watching a query while it runs.
pub trait QueryObserver: Send {
    /// About to make model call number `call` (1-based).
    fn on_model_call(&mut self, _call: u32) {}

    /// About to route a tool request.
    fn on_tool_call(&mut self, _request: &ToolUseBlock) {}

    /// A tool request finished (successfully or not).
    fn on_tool_result(&mut self, _record: &ToolCallRecord) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl QueryObserver for NoopObserver {}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

enum DriverState {
    AwaitingModel,
    ModelResponded(CompletionResponse),
    ExecutingTools {
        content: Vec<ContentBlock>,
        requests: Vec<ToolUseBlock>,
    },
    Done,
}

/// Runs queries against a model backend, routing tool requests to MCP servers.
pub struct ConversationDriver {
    backend: SharedBackend,
    config: DriverConfig,
}

impl std::fmt::Debug for ConversationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationDriver")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ConversationDriver {
    /// Create a driver over a backend.
    pub fn new(backend: SharedBackend, config: DriverConfig) -> Self {
        Self { backend, config }
    }

    /// The driver's configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Answer one user query.
    pub async fn run(&self, router: CallRouter<'_>, user_text: &str) -> Result<QueryOutcome> {
        self.run_observed(router, user_text, &mut NoopObserver).await
    }

    /// Answer one user query, reporting progress to `observer`.
    pub async fn run_observed(
        &self,
        router: CallRouter<'_>,
        user_text: &str,
        observer: &mut dyn QueryObserver,
    ) -> Result<QueryOutcome> {
        let tools = tool_definitions(router.catalog());
        let mut conversation = Conversation::new(user_text);
        let mut fragments: Vec<String> = Vec::new();
        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
        let mut model_calls = 0u32;
        let mut usage = Usage::default();

        tracing::info!(tools = tools.len(), "Query started");

        let mut state = DriverState::AwaitingModel;
        loop {
            state = match state {
                DriverState::AwaitingModel => {
                    if model_calls >= self.config.max_turns {
                        tracing::warn!(model_calls, "Model call limit reached");
                        return Err(DriverError::TurnLimit(self.config.max_turns));
                    }
                    model_calls += 1;
                    observer.on_model_call(model_calls);

                    let request = self.build_request(&conversation, &tools);
                    tracing::debug!(
                        call = model_calls,
                        messages = conversation.len(),
                        backend = self.backend.name(),
                        "Calling model"
                    );
                    let response = self.backend.complete(request).await?;
                    usage.accumulate(response.usage);
                    DriverState::ModelResponded(response)
                }

                DriverState::ModelResponded(response) => {
                    let response = response.validated()?;
                    let mut requests = Vec::new();
                    for block in &response.content {
                        match block {
                            ContentBlock::Text { text } if !text.trim().is_empty() => {
                                fragments.push(text.clone());
                            }
                            ContentBlock::ToolUse { id, name, input } => {
                                requests.push(ToolUseBlock {
                                    id: id.clone(),
                                    name: name.clone(),
                                    input: input.clone(),
                                });
                            }
                            _ => {}
                        }
                    }

                    tracing::debug!(
                        call = model_calls,
                        stop_reason = ?response.stop_reason,
                        tool_requests = requests.len(),
                        "Model responded"
                    );

                    if requests.is_empty() {
                        DriverState::Done
                    } else {
                        DriverState::ExecutingTools {
                            content: response.content,
                            requests,
                        }
                    }
                }

                DriverState::ExecutingTools { content, requests } => {
                    let mut results = Vec::with_capacity(requests.len());
                    for request in requests {
                        observer.on_tool_call(&request);
                        let record = execute_tool(router, request).await?;
                        observer.on_tool_result(&record);
                        results.push(record.to_result_block());
                        tool_calls.push(record);
                    }

                    conversation.push_assistant(content);
                    conversation.push_tool_results(results);
                    DriverState::AwaitingModel
                }

                DriverState::Done => break,
            };
        }

        let answer = fragments.join("\n").trim().to_string();
        tracing::info!(
            model_calls,
            tool_calls = tool_calls.len(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            answer_len = answer.len(),
            "Query completed"
        );

        Ok(QueryOutcome {
            answer,
            tool_calls,
            model_calls,
            usage,
        })
    }

    fn build_request(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> CompletionRequest {
        let mut request = CompletionRequest::new(
            &self.config.model,
            conversation.messages().to_vec(),
            self.config.max_tokens,
        )
        .with_tools(tools.to_vec());

        if let Some(ref prompt) = self.config.system_prompt {
            request = request.with_system(prompt);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }
}

/// Route one request. Recoverable failures become error results for the
/// model; anything else aborts the query.
async fn execute_tool(router: CallRouter<'_>, request: ToolUseBlock) -> Result<ToolCallRecord> {
    tracing::debug!(tool = %request.name, tool_use_id = %request.id, "Routing tool call");

    match router.route(&request.name, request.input.clone()).await {
        Ok(output) => {
            tracing::info!(
                tool = %request.name,
                server = %output.server,
                output_bytes = output.text.len(),
                "Tool call succeeded"
            );
            Ok(ToolCallRecord {
                id: request.id,
                name: request.name,
                arguments: request.input,
                server: Some(output.server),
                output: output.text,
                is_error: false,
            })
        }
        Err(err) if err.is_recoverable() => {
            tracing::warn!(tool = %request.name, error = %err, "Tool call failed");
            let server = match &err {
                RouteError::Invocation { server, .. } => Some(server.clone()),
                _ => None,
            };
            Ok(ToolCallRecord {
                id: request.id,
                name: request.name,
                arguments: request.input,
                server,
                output: err.to_string(),
                is_error: true,
            })
        }
        Err(err) => {
            tracing::error!(tool = %request.name, error = %err, "Tool call broke the protocol");
            Err(DriverError::ToolContract {
                tool: request.name,
                source: err,
            })
        }
    }
}

/// Convert the registry catalog into model tool definitions.
pub fn tool_definitions(catalog: Vec<CatalogEntry>) -> Vec<ToolDefinition> {
    catalog
        .into_iter()
        .map(|entry| ToolDefinition::new(entry.name, entry.description, entry.input_schema))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
