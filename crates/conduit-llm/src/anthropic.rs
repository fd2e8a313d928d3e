//! Anthropic API backend implementation.
//!
//! This module provides the `AnthropicBackend` which connects to Anthropic's
//! Messages API for Claude completions.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, header};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{LlmBackend, SharedBackend, with_retry};
use crate::error::{LlmError, RateLimitInfo, Result};
use crate::types::{CompletionRequest, CompletionResponse, ContentBlock, StopReason, Usage};

/// Default API base URL.
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Default API version.
const DEFAULT_API_VERSION: &str = "2023-06-01";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API.
    pub base_url: String,

    /// API version header.
    pub api_version: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum retries for transient errors.
    pub max_retries: u32,

    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,
}

impl AnthropicConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set max retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Anthropic Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Anthropic API backend.
pub struct AnthropicBackend {
    client: Client,
    config: AnthropicConfig,
}

impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("base_url", &self.config.base_url)
            .field("api_version", &self.config.api_version)
            .field("max_retries", &self.config.max_retries)
            .finish_non_exhaustive()
    }
}

impl AnthropicBackend {
    /// Create a new Anthropic backend with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("Anthropic API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Build the messages endpoint URL.
    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    /// Add authentication and API headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header(header::CONTENT_TYPE, "application/json")
    }

    /// Handle a response, converting it or mapping the failure.
    async fn handle_response(response: Response) -> Result<CompletionResponse> {
        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body, retry_after.as_deref()));
        }

        let body = response.text().await?;
        parse_response_body(&body)
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "anthropic",
            || async {
                let response = self
                    .add_headers(self.client.post(self.messages_url()))
                    .json(&request)
                    .send()
                    .await?;

                Self::handle_response(response).await
            },
        )
        .await?;

        tracing::debug!(
            id = %response.id,
            stop_reason = ?response.stop_reason,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Received completion response"
        );
        Ok(response)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Create a shared Anthropic backend.
pub fn create_shared_backend(config: AnthropicConfig) -> Result<SharedBackend> {
    Ok(Arc::new(AnthropicBackend::new(config)?))
}

/// Map a non-success HTTP status and body to an error.
fn classify_error(status: StatusCode, body: &str, retry_after: Option<&str>) -> LlmError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

    match status.as_u16() {
        401 | 403 => LlmError::Auth(format!("Authentication failed: {}", message)),
        429 => LlmError::RateLimit(RateLimitInfo::from_header(message, retry_after)),
        500..=599 => LlmError::Server(message),
        _ => LlmError::Backend(message),
    }
}

/// Parse a Messages API success body.
fn parse_response_body(body: &str) -> Result<CompletionResponse> {
    let parsed: ApiResponse = serde_json::from_str(body)?;
    Ok(parsed.into())
}

// ─────────────────────────────────────────────────────────────────────────────
// API Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// Internal API response structure.
#[derive(Debug, serde::Deserialize)]
struct ApiResponse {
    id: String,
    content: Vec<ApiContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: ApiUsage,
}

impl From<ApiResponse> for CompletionResponse {
    fn from(api: ApiResponse) -> Self {
        let content = api
            .content
            .into_iter()
            .filter_map(|block| match block {
                ApiContentBlock::Text { text } => Some(ContentBlock::Text { text }),
                ApiContentBlock::ToolUse { id, name, input } => {
                    Some(ContentBlock::ToolUse { id, name, input })
                }
                ApiContentBlock::Unknown => None,
            })
            .collect();

        let stop_reason = api.stop_reason.as_deref().map(|s| match s {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        });

        CompletionResponse {
            id: api.id,
            content,
            model: api.model,
            stop_reason,
            usage: Usage::new(api.usage.input_tokens, api.usage.output_tokens),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    // Block kinds this client does not act on (thinking, server tools, ...).
    #[serde(other)]
    Unknown,
}

#[derive(Debug, serde::Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, serde::Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, serde::Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new() {
        let config = AnthropicConfig::new("test-key");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.base_url, DEFAULT_API_BASE);
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_config_builders() {
        let config = AnthropicConfig::new("key")
            .with_base_url("http://localhost:8080/")
            .with_timeout(Duration::from_secs(60))
            .with_max_retries(0)
            .with_retry_backoff(Duration::from_millis(5));
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.retry_backoff, Duration::from_millis(5));
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        let err = AnthropicBackend::new(AnthropicConfig::new("  ")).unwrap_err();
        assert!(matches!(err, LlmError::Config(_)));
    }

    #[test]
    fn test_messages_url() {
        let backend = AnthropicBackend::new(AnthropicConfig::new("key")).unwrap();
        assert_eq!(
            backend.messages_url(),
            "https://api.anthropic.com/v1/messages"
        );
        assert_eq!(backend.name(), "anthropic");

        let config = AnthropicConfig::new("key").with_base_url("http://localhost:8080");
        let backend = AnthropicBackend::new(config).unwrap();
        assert_eq!(backend.messages_url(), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_parse_response_with_tool_use() {
        let body = r#"{
            "id": "msg_456",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "files__read_file", "input": {"path": "/foo.rs"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 50, "output_tokens": 30, "cache_read_input_tokens": 0}
        }"#;

        let response = parse_response_body(body).unwrap();
        assert_eq!(response.id, "msg_456");
        assert_eq!(response.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(response.usage, Usage::new(50, 30));
        assert_eq!(response.text(), "Let me check.");

        let tool_uses = response.tool_uses();
        assert_eq!(tool_uses.len(), 1);
        assert_eq!(tool_uses[0].name, "files__read_file");
        assert_eq!(tool_uses[0].input["path"], "/foo.rs");
    }

    #[test]
    fn test_parse_response_skips_unknown_blocks() {
        let body = r#"{
            "id": "msg_1",
            "model": "m",
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "abc"},
                {"type": "text", "text": "Hello!"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1, "output_tokens": 2}
        }"#;

        let response = parse_response_body(body).unwrap();
        assert_eq!(response.content, vec![ContentBlock::text("Hello!")]);
        assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
    }

    #[test]
    fn test_parse_malformed_body() {
        let err = parse_response_body("{\"id\": 3}").unwrap_err();
        assert!(matches!(err, LlmError::Serialization(_)));
    }

    #[test]
    fn test_classify_error_statuses() {
        let body = r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#;

        let err = classify_error(StatusCode::UNAUTHORIZED, body, None);
        assert!(matches!(err, LlmError::Auth(_)));
        assert!(!err.is_retryable());

        let err = classify_error(StatusCode::TOO_MANY_REQUESTS, body, Some("12"));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
        assert!(err.is_retryable());

        // 529 is Anthropic's non-standard "overloaded" status.
        let overloaded = StatusCode::from_u16(529).unwrap();
        let err = classify_error(overloaded, body, None);
        assert!(matches!(err, LlmError::Server(ref m) if m == "Overloaded"));
        assert!(err.is_retryable());

        let err = classify_error(StatusCode::BAD_REQUEST, "not json", None);
        assert!(matches!(err, LlmError::Backend(ref m) if m.contains("HTTP 400")));
        assert!(!err.is_retryable());
    }
}
