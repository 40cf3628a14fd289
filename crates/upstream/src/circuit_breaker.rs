//! Circuit breaker guarding calls to a single upstream service.
//!
//! # States
//!
//! - **Closed**: calls pass through; consecutive failures are counted.
//! - **Open**: the failure threshold was reached; calls are rejected without
//!   being attempted until the reset timeout elapses.
//! - **HalfOpen**: after the timeout, calls are let through to test the
//!   service. Enough successes close the circuit, one failure reopens it.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: usize,
    /// How long the circuit stays open before probing again.
    pub reset_timeout: Duration,
    /// Successes needed in half-open state to close the circuit.
    pub success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failure_count: usize,
    success_count: usize,
    opened_at: Option<Instant>,
}

/// Outcome of [`CircuitBreaker::call`] when the call did not succeed.
#[derive(Debug)]
pub enum Rejected<E> {
    /// The circuit is open; the operation was not run.
    Open,
    /// The operation ran and failed.
    Failed(E),
}

/// Circuit breaker for a named upstream.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: &'static str,
    config: Arc<CircuitBreakerConfig>,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    /// Creates a closed circuit breaker.
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            name,
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                success_count: 0,
                opened_at: None,
            })),
        }
    }

    /// Returns the current state.
    pub async fn state(&self) -> BreakerState {
        self.inner.lock().await.state
    }

    /// Runs `operation` through the breaker.
    ///
    /// Errors for which `counts_as_failure` returns false are passed back to
    /// the caller without affecting the breaker.
    pub async fn call<F, Fut, T, E>(
        &self,
        counts_as_failure: impl Fn(&E) -> bool,
        operation: F,
    ) -> Result<T, Rejected<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.can_attempt().await {
            metrics::counter!("circuit_breaker_rejections_total", "upstream" => self.name)
                .increment(1);
            tracing::warn!(upstream = self.name, "circuit breaker open, rejecting call");
            return Err(Rejected::Open);
        }

        match operation().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                if counts_as_failure(&err) {
                    self.on_failure().await;
                }
                Err(Rejected::Failed(err))
            }
        }
    }

    async fn can_attempt(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let expired = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.reset_timeout);
                if expired {
                    self.transition(&mut inner, BreakerState::HalfOpen);
                    inner.success_count = 0;
                }
                expired
            }
        }
    }

    async fn on_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            BreakerState::Closed => inner.failure_count = 0,
            BreakerState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    self.transition(&mut inner, BreakerState::Closed);
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.opened_at = None;
                }
            }
            BreakerState::Open => {}
        }
    }

    async fn on_failure(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            BreakerState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    self.transition(&mut inner, BreakerState::Open);
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                self.transition(&mut inner, BreakerState::Open);
                inner.opened_at = Some(Instant::now());
                inner.success_count = 0;
            }
            BreakerState::Open => inner.opened_at = Some(Instant::now()),
        }
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState) {
        tracing::info!(
            upstream = self.name,
            from = inner.state.as_str(),
            to = to.as_str(),
            failures = inner.failure_count,
            "circuit breaker state change"
        );
        metrics::counter!(
            "circuit_breaker_transitions_total",
            "upstream" => self.name,
            "to" => to.as_str()
        )
        .increment(1);
        inner.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: usize, reset_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold,
                reset_timeout,
                success_threshold: 1,
            },
        )
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), Rejected<&'static str>> {
        breaker.call(|_| true, || async { Err("boom") }).await
    }

    #[tokio::test]
    async fn opens_after_threshold() {
        let breaker = breaker(2, Duration::from_secs(60));

        assert!(matches!(fail(&breaker).await, Err(Rejected::Failed("boom"))));
        assert_eq!(breaker.state().await, BreakerState::Closed);
        assert!(matches!(fail(&breaker).await, Err(Rejected::Failed("boom"))));
        assert_eq!(breaker.state().await, BreakerState::Open);

        let result = breaker
            .call(|_: &&str| true, || async { Ok::<_, &str>(1) })
            .await;
        assert!(matches!(result, Err(Rejected::Open)));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = breaker(2, Duration::from_secs(60));

        fail(&breaker).await.unwrap_err();
        breaker
            .call(|_: &&str| true, || async { Ok::<_, &str>(()) })
            .await
            .unwrap();
        fail(&breaker).await.unwrap_err();

        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn ignored_errors_do_not_trip() {
        let breaker = breaker(1, Duration::from_secs(60));

        let result = breaker
            .call(|_: &&str| false, || async { Err::<(), _>("not found") })
            .await;
        assert!(matches!(result, Err(Rejected::Failed("not found"))));
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_success_closes_circuit() {
        let breaker = breaker(1, Duration::from_millis(10));

        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state().await, BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;
        breaker
            .call(|_: &&str| true, || async { Ok::<_, &str>(()) })
            .await
            .unwrap();
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn ignored_errors_do_not_close_half_open_circuit() {
        let breaker = breaker(1, Duration::from_millis(10));

        fail(&breaker).await.unwrap_err();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = breaker
            .call(|_: &&str| false, || async { Err::<(), _>("not found") })
            .await;
        assert!(matches!(result, Err(Rejected::Failed("not found"))));
        assert_eq!(breaker.state().await, BreakerState::HalfOpen);

        fail(&breaker).await.unwrap_err();
        assert_eq!(breaker.state().await, BreakerState::Open);
    }

    #[tokio::test]
    async fn ignored_errors_keep_failure_count() {
        let breaker = breaker(2, Duration::from_secs(60));

        fail(&breaker).await.unwrap_err();
        breaker
            .call(|_: &&str| false, || async { Err::<(), _>("not found") })
            .await
            .unwrap_err();
        fail(&breaker).await.unwrap_err();

        assert_eq!(breaker.state().await, BreakerState::Open);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let breaker = breaker(1, Duration::from_millis(10));

        fail(&breaker).await.unwrap_err();
        tokio::time::sleep(Duration::from_millis(20)).await;
        fail(&breaker).await.unwrap_err();

        assert_eq!(breaker.state().await, BreakerState::Open);
    }
}
