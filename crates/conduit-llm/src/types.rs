//! Core types for model requests and responses.
//!
//! These mirror the Anthropic Messages API wire shapes closely enough to be
//! serialized directly, and are what the conversation driver works with.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ResponseValidationError;

// ─────────────────────────────────────────────────────────────────────────────
// Completion Request
// ─────────────────────────────────────────────────────────────────────────────

/// A completion request to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use for completion.
    pub model: String,

    /// The messages in the conversation.
    pub messages: Vec<Message>,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// System prompt (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Tools available for the model to use.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Temperature for sampling (0.0 to 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Create a new completion request with the given model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<Message>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens,
            system: None,
            tools: Vec::new(),
            temperature: None,
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Add tools to the request.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message author.
    pub role: Role,

    /// The content of the message.
    pub content: Content,
}

impl Message {
    /// Create a user message with text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(text.into()),
        }
    }

    /// Create an assistant message with text content.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(text.into()),
        }
    }

    /// Create an assistant message with content blocks.
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Blocks(blocks),
        }
    }

    /// Create a user message with tool results.
    pub fn tool_results(results: Vec<ToolResultBlock>) -> Self {
        Self {
            role: Role::User,
            content: Content::Blocks(results.into_iter().map(|r| r.into()).collect()),
        }
    }
}

/// The role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Message content - either a simple string or structured blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Simple text content.
    Text(String),
    /// Structured content blocks.
    Blocks(Vec<ContentBlock>),
}

impl Content {
    /// Get the text content if this is simple text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            Content::Blocks(_) => None,
        }
    }

    /// Get the content blocks.
    pub fn blocks(&self) -> Vec<ContentBlock> {
        match self {
            Content::Text(s) => vec![ContentBlock::text(s.clone())],
            Content::Blocks(blocks) => blocks.clone(),
        }
    }

    /// Extract all text from the content.
    pub fn to_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content Blocks
// ─────────────────────────────────────────────────────────────────────────────

/// A content block in a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Tool use request from the assistant.
    ToolUse {
        /// Unique ID for this tool use.
        id: String,
        /// Name of the tool to use.
        name: String,
        /// Input arguments for the tool.
        input: serde_json::Value,
    },
    /// Tool result from the user.
    ToolResult {
        /// ID of the tool use this is a result for.
        tool_use_id: String,
        /// The result content (optional).
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<ToolResultContent>,
        /// Whether the tool execution resulted in an error.
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    /// Create a text content block.
    pub fn text(content: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: content.into(),
        }
    }

    /// Create a tool use content block.
    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// Tool result content - can be a string or array of content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<serde_json::Value>),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Use/Result Blocks (convenience types)
// ─────────────────────────────────────────────────────────────────────────────

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseBlock {
    /// Unique ID for this tool use.
    pub id: String,
    /// Name of the tool to use.
    pub name: String,
    /// Input arguments for the tool.
    pub input: serde_json::Value,
}

impl From<ToolUseBlock> for ContentBlock {
    fn from(block: ToolUseBlock) -> Self {
        ContentBlock::ToolUse {
            id: block.id,
            name: block.name,
            input: block.input,
        }
    }
}

/// The answer to one tool invocation, sent back in a user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    /// ID of the tool use this is a result for.
    pub tool_use_id: String,
    /// The result content (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ToolResultContent>,
    /// Whether the tool execution resulted in an error.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResultBlock {
    /// Create a successful tool result.
    pub fn success(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: Some(ToolResultContent::Text(content.into())),
            is_error: false,
        }
    }

    /// Create an error tool result.
    pub fn error(tool_use_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: Some(ToolResultContent::Text(error.into())),
            is_error: true,
        }
    }

    /// The plain text of this result, if it carries any.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(ToolResultContent::Text(text)) => Some(text),
            _ => None,
        }
    }
}

impl From<ToolResultBlock> for ContentBlock {
    fn from(block: ToolResultBlock) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: block.tool_use_id,
            content: block.content,
            is_error: block.is_error,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// Definition of a tool available to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Name of the tool.
    pub name: String,

    /// Description of what the tool does.
    pub description: String,

    /// JSON Schema for the tool's input parameters.
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Completion Response
// ─────────────────────────────────────────────────────────────────────────────

/// A completion response from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Unique ID for this response.
    pub id: String,

    /// The content blocks in the response, in emission order.
    pub content: Vec<ContentBlock>,

    /// The model that generated the response.
    pub model: String,

    /// Why the model stopped generating.
    pub stop_reason: Option<StopReason>,

    /// Token usage statistics.
    pub usage: Usage,
}

impl CompletionResponse {
    /// Create a new completion response.
    pub fn new(
        id: impl Into<String>,
        model: impl Into<String>,
        content: Vec<ContentBlock>,
        stop_reason: StopReason,
        usage: Usage,
    ) -> Self {
        Self {
            id: id.into(),
            content,
            model: model.into(),
            stop_reason: Some(stop_reason),
            usage,
        }
    }

    /// Get all tool use blocks from the response, in emission order.
    pub fn tool_uses(&self) -> Vec<ToolUseBlock> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolUseBlock {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Get the text content from the response.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Check if the response contains tool use requests.
    pub fn has_tool_use(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }

    /// Validate the response structure.
    ///
    /// Checks required fields, tool_use block shape (non-empty unique ids,
    /// API-legal names, object or null input) and stop reason consistency.
    /// Every problem found is reported, not just the first.
    ///
    /// # Example
    ///
    /// ```
    /// use conduit_llm::{CompletionResponse, ContentBlock, StopReason, Usage};
    ///
    /// let response = CompletionResponse::new(
    ///     "msg_123",
    ///     "claude-3",
    ///     vec![ContentBlock::text("Hello")],
    ///     StopReason::EndTurn,
    ///     Usage::new(10, 20),
    /// );
    ///
    /// assert!(response.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), ResponseValidationError> {
        let mut errors = Vec::new();

        if self.id.trim().is_empty() {
            errors.push(ResponseValidationError::missing_field("id"));
        }

        if self.model.trim().is_empty() {
            errors.push(ResponseValidationError::missing_field("model"));
        }

        let mut seen_tool_ids: HashSet<&str> = HashSet::new();
        for (index, block) in self.content.iter().enumerate() {
            if let Some(err) = validate_content_block(block, index, &mut seen_tool_ids) {
                errors.push(err);
            }
        }

        if self.stop_reason == Some(StopReason::ToolUse) && !self.has_tool_use() {
            errors.push(ResponseValidationError::invalid_stop_reason(
                "stop_reason is 'tool_use' but no tool_use blocks found",
            ));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ResponseValidationError::Multiple(errors)),
        }
    }

    /// Validate and return the response, or return an error.
    pub fn validated(self) -> Result<Self, ResponseValidationError> {
        self.validate()?;
        Ok(self)
    }
}

fn validate_content_block<'a>(
    block: &'a ContentBlock,
    index: usize,
    seen_tool_ids: &mut HashSet<&'a str>,
) -> Option<ResponseValidationError> {
    match block {
        ContentBlock::Text { .. } => None,
        ContentBlock::ToolUse { id, name, input } => {
            if id.trim().is_empty() {
                return Some(ResponseValidationError::invalid_tool_use(
                    id,
                    "id cannot be empty",
                ));
            }

            if name.trim().is_empty() {
                return Some(ResponseValidationError::invalid_tool_use(
                    id,
                    "name cannot be empty",
                ));
            }

            if !seen_tool_ids.insert(id.as_str()) {
                return Some(ResponseValidationError::invalid_tool_use(
                    id,
                    "duplicate tool_use id",
                ));
            }

            // A tool with no parameters may be called with null input.
            if !input.is_object() && !input.is_null() {
                return Some(ResponseValidationError::invalid_tool_use(
                    id,
                    format!("input must be an object, got {}", json_type_name(input)),
                ));
            }

            None
        }
        ContentBlock::ToolResult { tool_use_id, .. } => {
            if tool_use_id.trim().is_empty() {
                return Some(ResponseValidationError::malformed_content(
                    index,
                    "tool_result has empty tool_use_id",
                ));
            }
            None
        }
    }
}

/// Get a human-readable name for a JSON value type.
fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of response.
    EndTurn,
    /// Model wants to use a tool.
    ToolUse,
    /// Hit max_tokens limit.
    MaxTokens,
    /// Hit a stop sequence.
    StopSequence,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the input.
    pub input_tokens: u32,
    /// Tokens in the output.
    pub output_tokens: u32,
}

impl Usage {
    /// Create new usage statistics.
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Fold another response's usage into this running total.
    pub fn accumulate(&mut self, other: Usage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response_with(content: Vec<ContentBlock>, stop_reason: StopReason) -> CompletionResponse {
        CompletionResponse::new("msg_123", "claude-3", content, stop_reason, Usage::new(10, 5))
    }

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content.as_text(), Some("Hello"));

        let msg = Message::assistant("Hi there");
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content.as_text(), Some("Hi there"));
    }

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new(
            "claude-3-5-sonnet-20241022",
            vec![Message::user("Hello")],
            1000,
        )
        .with_system("You are helpful.")
        .with_temperature(0.2);

        assert_eq!(request.max_tokens, 1000);
        assert_eq!(request.system.as_deref(), Some("You are helpful."));
        assert_eq!(request.temperature, Some(0.2));
    }

    #[test]
    fn test_request_serializes_to_messages_api_shape() {
        let request = CompletionRequest::new("m", vec![Message::user("hi")], 100).with_tools(vec![
            ToolDefinition::new("files__read", "Read a file", json!({"type": "object"})),
        ]);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][0], json!({"role": "user", "content": "hi"}));
        assert_eq!(value["tools"][0]["name"], "files__read");
        assert!(value.get("system").is_none());
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn test_tool_result_message_serialization() {
        let msg = Message::tool_results(vec![
            ToolResultBlock::success("toolu_1", "42"),
            ToolResultBlock::error("toolu_2", "unknown tool"),
        ]);

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(
            value["content"][0],
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "42", "is_error": false})
        );
        assert_eq!(value["content"][1]["is_error"], true);
    }

    #[test]
    fn test_tool_uses_preserve_order() {
        let response = response_with(
            vec![
                ContentBlock::text("Let me look."),
                ContentBlock::tool_use("t1", "files__read", json!({"path": "/a"})),
                ContentBlock::text("And also"),
                ContentBlock::tool_use("t2", "web__fetch", json!({"url": "x"})),
            ],
            StopReason::ToolUse,
        );

        assert!(response.has_tool_use());
        let names: Vec<_> = response.tool_uses().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["files__read", "web__fetch"]);
        assert_eq!(response.text(), "Let me look.And also");
    }

    #[test]
    fn test_content_to_text() {
        let blocks = Content::Blocks(vec![
            ContentBlock::text("one"),
            ContentBlock::tool_use("t1", "x", json!({})),
            ContentBlock::text("two"),
        ]);
        assert_eq!(blocks.to_text(), "onetwo");
        assert_eq!(Content::Text("hello".to_string()).blocks().len(), 1);
    }

    #[test]
    fn test_usage_accumulate() {
        let mut total = Usage::default();
        total.accumulate(Usage::new(100, 50));
        total.accumulate(Usage::new(10, 5));
        assert_eq!(total, Usage::new(110, 55));
        assert_eq!(total.total(), 165);
    }

    #[test]
    fn test_validate_valid_responses() {
        assert!(
            response_with(vec![ContentBlock::text("Hello")], StopReason::EndTurn)
                .validate()
                .is_ok()
        );
        assert!(
            response_with(
                vec![ContentBlock::tool_use("t1", "files__list", serde_json::Value::Null)],
                StopReason::ToolUse,
            )
            .validate()
            .is_ok()
        );
    }

    #[test]
    fn test_validate_missing_fields() {
        let mut response = response_with(vec![ContentBlock::text("Hi")], StopReason::EndTurn);
        response.id = " ".to_string();
        response.model = String::new();

        match response.validate().unwrap_err() {
            ResponseValidationError::Multiple(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_accepts_unregistered_looking_names() {
        // Whether a name exists is the router's call, not a structural error.
        let response = response_with(
            vec![ContentBlock::tool_use("t1", "files.fetch", json!({}))],
            StopReason::ToolUse,
        );
        assert!(response.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_tool_use() {
        let err = response_with(
            vec![ContentBlock::tool_use("t1", " ", json!({}))],
            StopReason::ToolUse,
        )
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("name cannot be empty"));

        let err = response_with(
            vec![ContentBlock::tool_use("t1", "x", json!(["a"]))],
            StopReason::ToolUse,
        )
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("got array"));

        let err = response_with(
            vec![
                ContentBlock::tool_use("t1", "x", json!({})),
                ContentBlock::tool_use("t1", "y", json!({})),
            ],
            StopReason::ToolUse,
        )
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_validate_stop_reason_mismatch() {
        let err = response_with(vec![ContentBlock::text("done")], StopReason::ToolUse)
            .validated()
            .unwrap_err();
        assert!(matches!(err, ResponseValidationError::InvalidStopReason { .. }));
    }
}
