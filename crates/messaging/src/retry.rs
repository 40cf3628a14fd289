//! Fixed-interval retry for message handlers.

use std::future::Future;
use std::time::Duration;

use crate::error::HandlerError;

/// Retry policy for handler invocations.
///
/// # Default Values
///
/// - `max_retries`: 5 (so up to 6 attempts in total)
/// - `interval`: 500ms between attempts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Delay between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            interval: Duration::from_millis(500),
        }
    }
}

/// Final failure after the policy gave up.
#[derive(Debug, Clone)]
pub struct RetryExhausted {
    /// Error from the last attempt.
    pub error: HandlerError,
    /// Number of attempts made, the first one included.
    pub attempts: usize,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// Runs `operation` until it succeeds, fails permanently, or the retry
    /// budget is spent. Returns the number of attempts on success.
    pub async fn run<F, Fut>(&self, mut operation: F) -> Result<usize, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), HandlerError>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;
            let error = match operation().await {
                Ok(()) => {
                    if attempts > 1 {
                        tracing::info!(attempts, "Handler succeeded after retry");
                    }
                    return Ok(attempts);
                }
                Err(error) => error,
            };

            if error.is_permanent() || attempts >= self.max_attempts() {
                return Err(RetryExhausted { error, attempts });
            }

            tracing::warn!(
                attempt = attempts,
                max_retries = self.max_retries,
                error = %error,
                "Handler failed, retrying"
            );
            metrics::counter!("message_handler_retries_total").increment(1);
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(max_retries: usize) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let attempts = fast(5).run(|| async { Ok(()) }).await.unwrap();
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_budget_is_spent() {
        let calls = AtomicUsize::new(0);

        let exhausted = fast(5)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(HandlerError::transient("store down")) }
            })
            .await
            .unwrap_err();

        assert_eq!(exhausted.attempts, 6);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(exhausted.error, HandlerError::transient("store down"));
    }

    #[tokio::test]
    async fn permanent_failure_stops_immediately() {
        let calls = AtomicUsize::new(0);

        let exhausted = fast(5)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(HandlerError::permanent("bad payload")) }
            })
            .await
            .unwrap_err();

        assert_eq!(exhausted.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicUsize::new(0);

        let attempts = fast(5)
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(HandlerError::transient("not yet"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(attempts, 3);
    }

    #[test]
    fn default_matches_delivery_contract() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.interval, Duration::from_millis(500));
    }
}
