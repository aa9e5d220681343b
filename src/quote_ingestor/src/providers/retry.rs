//! The one retry policy the collector has: wait out a rate limit, try again.
//!
//! Only [`ProviderError::RateLimited`] is retried, after a fixed cooldown, and
//! at most [`RateLimitRetry::max_retries`] times. Every other error is
//! returned as-is. Once the retries are used up the caller gets
//! [`ProviderError::RateLimitExhausted`].

use std::{future::Future, time::Duration};

use crate::providers::{ProviderError, RateLimitExhaustedSnafu};

/// Cooldown applied after a rate-limit response, unless configured otherwise.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Fixed-delay retry on rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRetry {
    /// How long to wait after a rate-limit response.
    pub cooldown: Duration,
    /// Automatic retries after the first attempt.
    pub max_retries: u32,
}

impl Default for RateLimitRetry {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            max_retries: 1,
        }
    }
}

impl RateLimitRetry {
    pub fn new(cooldown: Duration, max_retries: u32) -> Self {
        Self {
            cooldown,
            max_retries,
        }
    }

    /// Runs `op`, sleeping `cooldown` and re-running it while it reports a rate limit.
    ///
    /// # Arguments
    /// * `operation` - Short label used in log records.
    /// * `op` - Produces a fresh request future on every call.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retries = 0u32;
        loop {
            match op().await {
                Err(ProviderError::RateLimited { retry_after, .. }) => {
                    if retries >= self.max_retries {
                        tracing::warn!(
                            operation,
                            attempts = retries + 1,
                            "rate limit persisted, giving up"
                        );
                        return RateLimitExhaustedSnafu {
                            attempts: retries + 1,
                        }
                        .fail();
                    }
                    retries += 1;
                    tracing::warn!(
                        operation,
                        cooldown_secs = self.cooldown.as_secs(),
                        retry_after_secs = ?retry_after,
                        "rate limited, waiting before retry"
                    );
                    tokio::time::sleep(self.cooldown).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;
    use crate::providers::{ApiSnafu, RateLimitedSnafu};

    #[tokio::test(start_paused = true)]
    async fn retries_once_after_cooldown() {
        let calls = &AtomicU32::new(0);
        let policy = RateLimitRetry::default();
        let started = Instant::now();

        let result = policy
            .run("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    RateLimitedSnafu { retry_after: None::<u64> }.fail()
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= DEFAULT_COOLDOWN);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rate_limit_is_bounded() {
        let calls = &AtomicU32::new(0);
        let policy = RateLimitRetry::new(Duration::from_secs(5), 1);

        let err = policy
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                RateLimitedSnafu { retry_after: Some(5u64) }.fail::<()>()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::RateLimitExhausted { attempts: 2, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let started = Instant::now();

        let err = RateLimitRetry::default()
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                ApiSnafu { status: 502u16, message: "bad gateway" }.fail::<()>()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Api { status: 502, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_fails_on_first_rate_limit() {
        let err = RateLimitRetry::new(DEFAULT_COOLDOWN, 0)
            .run("test", || async { RateLimitedSnafu { retry_after: None::<u64> }.fail::<()>() })
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::RateLimitExhausted { attempts: 1, .. }));
    }
}
