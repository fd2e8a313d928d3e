//! Error types for the LLM crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

// ─────────────────────────────────────────────────────────────────────────────
// Rate Limit Info
// ─────────────────────────────────────────────────────────────────────────────

/// Information about a rate limit error.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// The error message from the provider.
    pub message: String,
    /// How long to wait before retrying (if the provider specified).
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    /// Create a new rate limit info with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Build from the error body and the `retry-after` header, if any.
    pub fn from_header(message: impl Into<String>, retry_after_header: Option<&str>) -> Self {
        Self {
            message: message.into(),
            retry_after: retry_after_header.and_then(parse_retry_after_header),
        }
    }
}

impl std::fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(retry_after) = self.retry_after {
            write!(f, " (retry after {:.2}s)", retry_after.as_secs_f64())?;
        }
        Ok(())
    }
}

/// Parse a Retry-After header value given in seconds.
fn parse_retry_after_header(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Validation Errors
// ─────────────────────────────────────────────────────────────────────────────

/// A model response that does not have the expected structure.
#[derive(Debug, Clone, Error)]
pub enum ResponseValidationError {
    /// A required field is missing from the response.
    #[error("missing required field '{field}' in response")]
    MissingField {
        /// The name of the missing field.
        field: &'static str,
    },

    /// A tool_use block has invalid structure.
    #[error("invalid tool_use block '{id}': {reason}")]
    InvalidToolUse {
        /// The tool use ID (if available).
        id: String,
        /// Why the tool use is invalid.
        reason: String,
    },

    /// Content block has malformed structure.
    #[error("malformed content block at index {index}: {reason}")]
    MalformedContent {
        /// Index of the malformed content block.
        index: usize,
        /// Why it's malformed.
        reason: String,
    },

    /// Stop reason contradicts the content.
    #[error("invalid stop_reason: {reason}")]
    InvalidStopReason {
        /// Why the stop reason is invalid.
        reason: String,
    },

    /// Multiple validation errors occurred.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ResponseValidationError>),
}

impl ResponseValidationError {
    /// Create a missing field error.
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    /// Create an invalid tool use error.
    pub fn invalid_tool_use(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidToolUse {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed content error.
    pub fn malformed_content(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedContent {
            index,
            reason: reason.into(),
        }
    }

    /// Create an invalid stop reason error.
    pub fn invalid_stop_reason(reason: impl Into<String>) -> Self {
        Self::InvalidStopReason {
            reason: reason.into(),
        }
    }
}

/// Error type for LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Backend/API error from the provider.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The provider failed on its side (retryable).
    #[error("Server error: {0}")]
    Server(String),

    /// Network/connectivity error (retryable).
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error (API key missing, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Rate limit exceeded (retryable with backoff).
    #[error("Rate limit exceeded: {0}")]
    RateLimit(RateLimitInfo),

    /// Authentication failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LlmError {
    /// Create a rate limit error from a message string.
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit(RateLimitInfo::new(message))
    }

    /// Get the retry-after duration if this is a rate limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit(info) => info.retry_after,
            _ => None,
        }
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimit(_) | Self::Server(_)
        )
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("Connection failed: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(LlmError::Network("timeout".to_string()).is_retryable());
        assert!(LlmError::rate_limit("rate limited").is_retryable());
        assert!(LlmError::Server("overloaded".to_string()).is_retryable());
        assert!(!LlmError::Config("bad config".to_string()).is_retryable());
        assert!(!LlmError::Auth("unauthorized".to_string()).is_retryable());
        assert!(!LlmError::Backend("invalid model".to_string()).is_retryable());
    }

    #[test]
    fn test_rate_limit_retry_after_header() {
        let info = RateLimitInfo::from_header("Rate limited", Some(" 7 "));
        assert_eq!(info.retry_after, Some(Duration::from_secs(7)));
        assert!(info.to_string().contains("retry after 7.00s"));

        let info = RateLimitInfo::from_header("Rate limited", Some("soon"));
        assert!(info.retry_after.is_none());
        assert_eq!(info.to_string(), "Rate limited");
    }

    #[test]
    fn test_llm_error_retry_after() {
        let err = LlmError::RateLimit(RateLimitInfo::from_header("limited", Some("5")));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
        assert_eq!(LlmError::rate_limit("limited").retry_after(), None);
        assert_eq!(LlmError::Network("timeout".to_string()).retry_after(), None);
    }

    #[test]
    fn test_validation_error_display() {
        let err = ResponseValidationError::invalid_tool_use("toolu_1", "name cannot be empty");
        assert!(err.to_string().contains("toolu_1"));
        assert!(err.to_string().contains("name cannot be empty"));

        let err = ResponseValidationError::Multiple(vec![
            ResponseValidationError::missing_field("id"),
            ResponseValidationError::malformed_content(2, "empty tool_use_id"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("'id'"));
        assert!(msg.contains("index 2"));
    }
}
