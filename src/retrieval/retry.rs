// src/retrieval/retry.rs — Bounded-attempt retry with exponential backoff
//
// Wraps the adapters whose upstreams rate-limit (web search, answer
// generator). Kept outside the aggregator's fan-out so each source's
// timeout budget stays predictable.
// Retries: rate limits, 5xx, timeouts, connection resets.
// Does NOT retry: bad request, auth errors, quota exhaustion.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{RetrievalItem, WebSearchProvider};
use crate::infra::errors::SurveyorError;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_DELAY_MS: u64 = 500;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 8_000;
const JITTER_FRACTION: f64 = 0.2;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

impl BackoffConfig {
    /// Delay before the next attempt (0-indexed). A rate-limit hint from the
    /// server wins over the exponential schedule.
    fn delay_for_attempt(&self, attempt: u32, rate_limit_delay: Option<Duration>) -> Duration {
        if let Some(rl_delay) = rate_limit_delay {
            return rl_delay + Duration::from_millis(100);
        }

        let base_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);
        let final_ms = (capped_ms * deterministic_jitter(attempt, self.jitter_fraction)).max(50.0);

        Duration::from_millis(final_ms as u64)
    }
}

/// Extract the server-suggested wait from a rate-limit error, if any.
fn rate_limit_delay(error: &SurveyorError) -> Option<Duration> {
    match error {
        SurveyorError::RateLimited { retry_after_ms, .. } if *retry_after_ms > 0 => {
            Some(Duration::from_millis(*retry_after_ms))
        }
        _ => None,
    }
}

/// Deterministic jitter for a given attempt to keep retries reproducible in
/// tests. Returns a multiplier in [1 - fraction, 1 + fraction].
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

/// Run `op` up to `config.max_attempts` times, backing off between
/// retriable failures.
pub async fn with_backoff<T, F, Fut>(
    config: &BackoffConfig,
    op_name: &str,
    op: F,
) -> Result<T, SurveyorError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, SurveyorError>>,
{
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !e.is_retriable() || attempt + 1 == config.max_attempts {
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt, rate_limit_delay(&e));
                tracing::warn!(
                    op = op_name,
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after error: {e}"
                );
                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| SurveyorError::SourceUnavailable {
        source: op_name.to_string(),
        message: "All retries exhausted".into(),
        retriable: false,
    }))
}

/// A web search wrapper that adds retry with exponential backoff.
pub struct RetryWebSearch {
    inner: Arc<dyn WebSearchProvider>,
    config: BackoffConfig,
}

impl RetryWebSearch {
    pub fn new(inner: Arc<dyn WebSearchProvider>) -> Self {
        Self {
            inner,
            config: BackoffConfig::default(),
        }
    }

    pub fn with_config(inner: Arc<dyn WebSearchProvider>, config: BackoffConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl WebSearchProvider for RetryWebSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievalItem>, SurveyorError> {
        with_backoff(&self.config, "web_search", || {
            self.inner.search(query, limit)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_for_attempt_exponential() {
        let cfg = BackoffConfig::default();
        let d0 = cfg.delay_for_attempt(0, None);
        let d1 = cfg.delay_for_attempt(1, None);

        // d0 ≈ 500ms, d1 ≈ 1000ms, within jitter bounds
        assert!(d0.as_millis() >= 350 && d0.as_millis() <= 650);
        assert!(d1.as_millis() >= 750 && d1.as_millis() <= 1250);
    }

    #[test]
    fn test_delay_capped_at_max() {
        let cfg = BackoffConfig::default();
        let d = cfg.delay_for_attempt(12, None);
        assert!(d.as_millis() <= 10_000);
    }

    #[test]
    fn test_delay_uses_rate_limit_hint() {
        let cfg = BackoffConfig::default();
        let d = cfg.delay_for_attempt(0, Some(Duration::from_millis(2_000)));
        assert_eq!(d.as_millis(), 2_100);
    }

    #[test]
    fn test_deterministic_jitter_range() {
        for attempt in 0..20 {
            let j = deterministic_jitter(attempt, 0.2);
            assert!((0.8..=1.2).contains(&j), "jitter {j} out of range");
        }
    }

    #[tokio::test]
    async fn test_retriable_error_is_retried_to_success() {
        let calls = AtomicU32::new(0);
        let cfg = BackoffConfig {
            initial_delay: Duration::from_millis(1),
            ..Default::default()
        };

        let result = with_backoff(&cfg, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(SurveyorError::SourceUnavailable {
                        source: "test".into(),
                        message: "HTTP 503".into(),
                        retriable: true,
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retriable_error_fails_immediately() {
        let calls = AtomicU32::new(0);
        let cfg = BackoffConfig::default();

        let result: Result<u32, _> = with_backoff(&cfg, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(SurveyorError::SourceUnavailable {
                    source: "test".into(),
                    message: "HTTP 400".into(),
                    retriable: false,
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let cfg = BackoffConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            ..Default::default()
        };

        let result: Result<u32, _> = with_backoff(&cfg, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(SurveyorError::RateLimited {
                    provider: "test".into(),
                    retry_after_ms: 1,
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
