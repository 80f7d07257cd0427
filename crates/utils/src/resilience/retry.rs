//! Retry logic with exponential backoff and jitter
//!
//! This is the one place in the engine where an error crosses back to
//! the caller: when every attempt fails, [`retry`] returns
//! `Error::RetryExhausted` wrapping the last failure, so exhausting
//! retries is distinguishable from a single soft failure.

use super::circuit::CircuitBreaker;
use hooksmith_core::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Default maximum number of retry attempts
const DEFAULT_MAX_RETRIES: usize = 3;

/// Default base delay for exponential backoff (100ms)
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Default maximum delay for exponential backoff (10s)
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt
    pub max_retries: usize,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Scale each delay by a uniform factor in [0.5, 1.0]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// No retries at all; the initial attempt is the only one
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry `attempt` (1-based, counted after the
    /// corresponding failure): `min(base * 2^(attempt-1), max)`,
    /// jittered into [0.5, 1.0] of itself when enabled.
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as u32;
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent));
        let capped = exponential.min(self.max_delay);

        if self.jitter {
            let factor = 0.5 + fastrand::f64() * 0.5;
            capped.mul_f64(factor)
        } else {
            capped
        }
    }
}

/// Execute `operation` with up to `max_retries + 1` total attempts.
/// Returns the first success, or `Error::RetryExhausted` wrapping the
/// last error once the budget is spent.
pub async fn retry<F, Fut, T>(config: &RetryConfig, name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let total_attempts = config.max_retries + 1;

    for attempt in 1..=total_attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = name,
                        attempt,
                        "operation succeeded after retries"
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                if attempt < total_attempts {
                    let delay = config.delay_for(attempt);
                    tracing::warn!(
                        operation = name,
                        attempt,
                        total_attempts,
                        ?delay,
                        %error,
                        "operation failed, retrying"
                    );
                    sleep(delay).await;
                } else {
                    return Err(Error::retry_exhausted(name, total_attempts, error));
                }
            }
        }
    }

    unreachable!("retry loop returns on the final attempt")
}

/// Retry with circuit breaker protection around each attempt
pub async fn retry_with_circuit_breaker<F, Fut, T>(
    config: &RetryConfig,
    breaker: &CircuitBreaker,
    name: &str,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry(config, name, || breaker.call(&operation)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config(max_retries: usize) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            jitter: false,
        };

        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(3), Duration::from_millis(300));
        assert_eq!(config.delay_for(4), Duration::from_millis(300));
    }

    #[test]
    fn test_jitter_stays_in_half_to_full_range() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..50 {
            let delay = config.delay_for(2);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(200));
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicUsize::new(0);

        let result = retry(&fast_config(2), "flaky", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::configuration("not yet"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let calls = AtomicUsize::new(0);

        let result: Result<()> = retry(&fast_config(2), "doomed", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::configuration("always fails")) }
        })
        .await;

        // 2 retries + 1 initial attempt
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(Error::RetryExhausted {
                attempts, source, ..
            }) => {
                assert_eq!(attempts, 3);
                assert!(source.to_string().contains("always fails"));
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let calls = AtomicUsize::new(0);

        let result: Result<()> = retry(&fast_config(0), "single", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::configuration("nope")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(Error::RetryExhausted { .. })));
    }

    #[tokio::test]
    async fn test_retry_with_circuit_breaker_records() {
        use crate::resilience::circuit::{CircuitBreakerConfig, CircuitState};

        let breaker = CircuitBreaker::new(
            "dep",
            CircuitBreakerConfig {
                failure_threshold: 2,
                reset_timeout: Duration::from_secs(30),
            },
        );

        let result: Result<()> =
            retry_with_circuit_breaker(&fast_config(3), &breaker, "dep-op", || async {
                Err(Error::configuration("down"))
            })
            .await;

        assert!(result.is_err());
        // Two real failures opened the circuit; remaining attempts were
        // rejected without running
        assert_eq!(breaker.state(), CircuitState::Open);
    }
}
