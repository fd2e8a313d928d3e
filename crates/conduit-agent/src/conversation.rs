//! Per-query conversation state.

use conduit_llm::{ContentBlock, Message, ToolResultBlock};

/// Ordered turns of one user query.
///
/// Starts with the user's text and only ever grows: each model response
/// that requests tools is followed by exactly one user turn answering them.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Seed a conversation with the user's text.
    pub fn new(user_text: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(user_text)],
        }
    }

    /// Append the assistant turn as the model emitted it.
    pub fn push_assistant(&mut self, blocks: Vec<ContentBlock>) {
        self.messages.push(Message::assistant_blocks(blocks));
    }

    /// Append one user turn carrying tool results, in request order.
    pub fn push_tool_results(&mut self, results: Vec<ToolResultBlock>) {
        self.messages.push(Message::tool_results(results));
    }

    /// Messages to send with the next model call.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of turns.
    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }
}
