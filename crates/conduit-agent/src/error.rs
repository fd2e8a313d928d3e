//! Error types for the agent crate.

use conduit_llm::{LlmError, ResponseValidationError};
use conduit_mcp::RouteError;
use thiserror::Error;

/// Result type alias using the driver error type.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Reasons a query is abandoned.
///
/// Tool failures the model can react to never show up here; they are sent
/// back to the model as error tool results instead.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Model backend error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// The model response is structurally invalid.
    #[error("malformed model response: {0}")]
    Protocol(#[from] ResponseValidationError),

    /// A tool call broke the local contract or the server's reply was malformed.
    #[error("tool call '{tool}' aborted the query: {source}")]
    ToolContract {
        /// Public tool name the model asked for.
        tool: String,
        /// Routing failure.
        #[source]
        source: RouteError,
    },

    /// The model kept requesting tools past the per-query limit.
    #[error("maximum model calls exceeded: {0}")]
    TurnLimit(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DriverError::TurnLimit(10);
        assert_eq!(err.to_string(), "maximum model calls exceeded: 10");

        let err = DriverError::ToolContract {
            tool: "files__read".to_string(),
            source: RouteError::InvalidArguments {
                name: "files__read".to_string(),
                reason: "expected a JSON object, got array".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("files__read"));
        assert!(msg.contains("got array"));
    }

    #[test]
    fn test_from_validation_error() {
        let err: DriverError = ResponseValidationError::missing_field("id").into();
        assert!(matches!(err, DriverError::Protocol(_)));
    }
}
