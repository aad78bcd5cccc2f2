use crate::backends::CapabilityBackend;
use crate::llm::{GenerationRequest, GenerationResponse};
use crate::stream::StreamEvent;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use swarm_core::SwarmResult;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Bounded exponential backoff for rate-limited calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on every further retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound (exclusive) of the uniform jitter added to each delay.
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_jitter_ms() -> u64 {
    1000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after the 0-indexed `attempt`, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(2u64.saturating_pow(attempt)),
        )
    }

    fn jitter(&self) -> Duration {
        if self.max_jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..self.max_jitter_ms))
    }
}

/// Runs `operation` under `policy`, retrying only rate-limit failures.
///
/// Other failures, and the failure of the final attempt, are returned
/// unchanged.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> SwarmResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SwarmResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limited() && attempt + 1 < max_attempts => {
                let delay = policy.backoff(attempt) + policy.jitter();
                warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Rate limit exceeded, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// A `CapabilityBackend` that applies a [`RetryPolicy`] to every call of an
/// inner backend.
///
/// For streams only the opening call is retried; once events flow, failures
/// reach the consumer through the stream.
pub struct RetryingBackend {
    inner: Arc<dyn CapabilityBackend>,
    policy: RetryPolicy,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn CapabilityBackend>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl CapabilityBackend for RetryingBackend {
    async fn generate(&self, request: &GenerationRequest) -> SwarmResult<GenerationResponse> {
        with_retry(&self.policy, || self.inner.generate(request)).await
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> SwarmResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<SwarmResult<GenerationResponse>>,
    )> {
        with_retry(&self.policy, || self.inner.generate_stream(request)).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use swarm_core::SwarmError;

    /// A mock backend that returns a sequence of results.
    struct MockBackend {
        results: tokio::sync::Mutex<Vec<SwarmResult<GenerationResponse>>>,
        call_count: AtomicU32,
    }

    impl MockBackend {
        fn new(results: Vec<SwarmResult<GenerationResponse>>) -> Self {
            Self {
                results: tokio::sync::Mutex::new(results),
                call_count: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.call_count.load(Ordering::SeqCst)
        }

        async fn next(&self) -> SwarmResult<GenerationResponse> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock().await;
            if results.is_empty() {
                Err(SwarmError::Capability("MockBackend: no more results".into()))
            } else {
                results.remove(0)
            }
        }
    }

    #[async_trait]
    impl CapabilityBackend for MockBackend {
        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> SwarmResult<GenerationResponse> {
            self.next().await
        }

        async fn generate_stream(
            &self,
            _request: &GenerationRequest,
        ) -> SwarmResult<(
            mpsc::Receiver<StreamEvent>,
            JoinHandle<SwarmResult<GenerationResponse>>,
        )> {
            let resp = self.next().await?;
            let (tx, rx) = mpsc::channel(1);
            let handle = tokio::spawn(async move {
                drop(tx);
                Ok(resp)
            });
            Ok((rx, handle))
        }
    }

    fn rate_limited() -> SwarmResult<GenerationResponse> {
        Err(SwarmError::Http(
            "Gemini API error 429 Too Many Requests: RESOURCE_EXHAUSTED".into(),
        ))
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("gemini-2.5-flash", "prompt")
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn jitter_stays_below_bound() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            assert!(policy.jitter() < Duration::from_millis(1000));
        }
        let none = RetryPolicy {
            max_jitter_ms: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(none.jitter(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_after_rate_limit() {
        let inner = Arc::new(MockBackend::new(vec![
            rate_limited(),
            rate_limited(),
            Ok(GenerationResponse::text("ok")),
        ]));
        let backend = RetryingBackend::new(inner.clone(), RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let resp = backend.generate(&request()).await.unwrap();
        assert_eq!(resp.text, "ok");
        assert_eq!(inner.calls(), 3);
        // 1s + 2s of backoff plus at most 2s of jitter
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(3));
        assert!(waited < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn five_rate_limits_exhaust_attempts() {
        let inner = Arc::new(MockBackend::new(vec![
            rate_limited(),
            rate_limited(),
            rate_limited(),
            rate_limited(),
            rate_limited(),
            Ok(GenerationResponse::text("never reached")),
        ]));
        let backend = RetryingBackend::new(inner.clone(), RetryPolicy::default());

        let err = backend.generate(&request()).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(inner.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn non_rate_limit_error_is_not_retried() {
        let inner = Arc::new(MockBackend::new(vec![
            Err(SwarmError::Http("Gemini API error 500 Internal Server Error: boom".into())),
            Ok(GenerationResponse::text("never reached")),
        ]));
        let backend = RetryingBackend::new(inner.clone(), RetryPolicy::default());

        let err = backend.generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_opening_is_retried() {
        let inner = Arc::new(MockBackend::new(vec![
            rate_limited(),
            Ok(GenerationResponse::text("stream ok")),
        ]));
        let backend = RetryingBackend::new(inner.clone(), RetryPolicy::default());

        let (_rx, handle) = backend.generate_stream(&request()).await.unwrap();
        let final_resp = handle.await.unwrap().unwrap();
        assert_eq!(final_resp.text, "stream ok");
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn with_retry_wraps_plain_closures() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 0,
            max_jitter_ms: 0,
        };
        let calls = AtomicU32::new(0);
        let result: SwarmResult<u32> = with_retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SwarmError::Capability("429".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn policy_defaults_from_empty_table() {
        let policy: RetryPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, RetryPolicy::default());
    }
}
