//! Model backend trait, retry helper, and a scripted mock for tests.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::types::{CompletionRequest, CompletionResponse};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Only transient errors (network, rate limit, provider-side failures) are
/// retried; anything else is returned immediately. When a rate limit error
/// carries a `retry-after` hint longer than the current backoff, the hint wins.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        let err = match f().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if !err.is_retryable() || attempt >= max_retries {
            return Err(err);
        }
        attempt += 1;

        let delay = err.retry_after().map_or(backoff, |hint| hint.max(backoff));
        tracing::warn!(
            backend = backend_name,
            attempt,
            max_retries,
            backoff_ms = delay.as_millis() as u64,
            error = %err,
            "Request failed, retrying"
        );
        tokio::time::sleep(delay).await;
        backoff *= 2;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A chat model provider.
///
/// The conversation driver depends only on this trait, so tests can swap in
/// [`MockBackend`] and the binary plugs in [`crate::AnthropicBackend`].
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Execute a completion request and return the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the name of this backend.
    fn name(&self) -> &str;
}

/// A backend that can be shared across threads.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(any(test, feature = "testing"))]
pub use mock::MockBackend;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::LlmBackend;
    use crate::error::{LlmError, Result};
    use crate::types::{CompletionRequest, CompletionResponse, ContentBlock, StopReason, Usage};

    /// A backend that replays scripted results in order.
    ///
    /// Every request is recorded so tests can assert on what the driver sent.
    /// Once the script runs out, further requests fail with a backend error.
    #[derive(Debug)]
    pub struct MockBackend {
        name: String,
        script: Mutex<VecDeque<Result<CompletionResponse>>>,
        request_log: Mutex<Vec<CompletionRequest>>,
    }

    impl MockBackend {
        /// Create a new mock backend with the given responses.
        pub fn new(responses: Vec<CompletionResponse>) -> Self {
            Self::from_results(responses.into_iter().map(Ok).collect())
        }

        /// Create a mock backend whose script may also contain failures.
        pub fn from_results(script: Vec<Result<CompletionResponse>>) -> Self {
            Self {
                name: "mock".to_string(),
                script: Mutex::new(script.into()),
                request_log: Mutex::new(Vec::new()),
            }
        }

        /// Create a mock backend with a single text response.
        pub fn with_text(text: impl Into<String>) -> Self {
            Self::new(vec![CompletionResponse::new(
                "mock_msg_1",
                "mock-model",
                vec![ContentBlock::text(text)],
                StopReason::EndTurn,
                Usage::new(10, 20),
            )])
        }

        /// Get all requests that were made to this backend.
        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.request_log.lock().clone()
        }

        /// Get the number of requests made.
        pub fn request_count(&self) -> usize {
            self.request_log.lock().len()
        }

        /// Number of scripted results not yet consumed.
        pub fn remaining(&self) -> usize {
            self.script.lock().len()
        }
    }

    #[async_trait]
    impl LlmBackend for MockBackend {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            self.request_log.lock().push(request);
            self.script.lock().pop_front().unwrap_or_else(|| {
                Err(LlmError::Backend(
                    "MockBackend: no more responses available".to_string(),
                ))
            })
        }

        fn name(&self) -> &str {
            &self.name
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LlmError, RateLimitInfo};
    use crate::types::{ContentBlock, Message, StopReason, Usage};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest::new("test-model", vec![Message::user(text)], 100)
    }

    #[tokio::test]
    async fn test_mock_backend_replays_in_order() {
        let backend = MockBackend::new(vec![
            CompletionResponse::new(
                "msg_1",
                "model",
                vec![ContentBlock::text("First")],
                StopReason::EndTurn,
                Usage::new(10, 10),
            ),
            CompletionResponse::new(
                "msg_2",
                "model",
                vec![ContentBlock::text("Second")],
                StopReason::EndTurn,
                Usage::new(10, 10),
            ),
        ]);

        let r1 = backend.complete(request("1")).await.unwrap();
        let r2 = backend.complete(request("2")).await.unwrap();

        assert_eq!(r1.text(), "First");
        assert_eq!(r2.text(), "Second");
        assert_eq!(backend.request_count(), 2);
        assert_eq!(backend.remaining(), 0);
        assert_eq!(
            backend.requests()[1].messages[0].content.as_text(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn test_mock_backend_exhausted() {
        let backend = MockBackend::new(vec![]);
        let err = backend.complete(request("Hi")).await.unwrap_err();
        assert!(matches!(err, LlmError::Backend(_)));
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_backend_scripted_error() {
        let backend = MockBackend::from_results(vec![Err(LlmError::Auth("bad key".to_string()))]);
        let err = backend.complete(request("Hi")).await.unwrap_err();
        assert!(matches!(err, LlmError::Auth(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_recovers_from_transient_errors() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry(3, Duration::from_millis(100), "test", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LlmError::Server("overloaded".to_string()))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = with_retry(2, Duration::from_millis(10), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Network("down".to_string()))
        })
        .await;

        assert!(matches!(result, Err(LlmError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_does_not_retry_fatal_errors() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = with_retry(5, Duration::from_secs(60), "test", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Auth("invalid key".to_string()))
        })
        .await;

        assert!(matches!(result, Err(LlmError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_retry_honors_retry_after() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = tokio::time::Instant::now();
        let result = with_retry(1, Duration::from_millis(10), "test", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LlmError::RateLimit(RateLimitInfo::from_header(
                    "slow down",
                    Some("3"),
                )))
            } else {
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
