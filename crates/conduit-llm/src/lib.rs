//! Model client abstraction for Conduit.
//!
//! The conversation driver talks to a chat model only through the
//! [`LlmBackend`] trait. [`AnthropicBackend`] implements it over the Anthropic
//! Messages API; [`MockBackend`] (behind the `testing` feature) replays a
//! scripted list of responses.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  LlmBackend trait                       │
//! │  - complete() -> CompletionResponse     │
//! └─────────────────────────────────────────┘
//!                    │
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//!   ┌─────────────┐     ┌─────────────┐
//!   │  Anthropic  │     │    Mock     │
//!   └─────────────┘     └─────────────┘
//! ```

pub mod anthropic;
pub mod backend;
pub mod error;
pub mod types;

pub use backend::{LlmBackend, SharedBackend, with_retry};
#[cfg(any(test, feature = "testing"))]
pub use backend::MockBackend;
pub use error::{LlmError, RateLimitInfo, ResponseValidationError, Result};
pub use types::{
    CompletionRequest, CompletionResponse, Content, ContentBlock, Message, Role, StopReason,
    ToolDefinition, ToolResultBlock, ToolResultContent, ToolUseBlock, Usage,
};

pub use anthropic::{AnthropicBackend, AnthropicConfig, create_shared_backend};
