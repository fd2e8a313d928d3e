//! Conversation driver for Conduit.
//!
//! Turns one user query into a finished answer by alternating model calls
//! with tool calls routed through the MCP registry.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ConversationDriver                                         │
//! │  - Advertises the tool catalog on every model call          │
//! │  - Executes tool requests in order, one results turn each   │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                             │
//!                 ▼                             ▼
//!         ┌──────────────┐              ┌──────────────┐
//!         │ LlmBackend   │              │ CallRouter   │
//!         │(conduit-llm) │              │(conduit-mcp) │
//!         └──────────────┘              └──────────────┘
//! ```
//!
//! # Core Components
//!
//! - [`ConversationDriver`]: runs a query to completion
//! - [`Conversation`]: ordered turns of one query
//! - [`QueryOutcome`]: answer text, executed tool calls, usage
//! - [`QueryObserver`]: progress hooks for front-ends

pub mod conversation;
pub mod driver;
pub mod error;

pub use conversation::Conversation;
pub use driver::{
    ConversationDriver, DriverConfig, NoopObserver, QueryObserver, QueryOutcome, ToolCallRecord,
    tool_definitions,
};
pub use error::{DriverError, Result};
