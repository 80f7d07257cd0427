//! Per-dependency circuit breakers
//!
//! A breaker tracks consecutive failures for one named external
//! dependency and gates whether a call is attempted at all. Callers
//! ask `can_execute()` before the call and report the outcome with
//! `record_success()`/`record_failure()`; the breaker never invokes
//! the operation itself. Rejections are cheap and silent - the caller
//! decides whether to skip, queue, or fall back.

use dashmap::DashMap;
use hooksmith_core::{Error, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass through normally
    Closed,
    /// Requests are rejected immediately
    Open,
    /// One probe request is allowed to test recovery
    HalfOpen,
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before allowing a probe
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub dependency: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Instant>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Failure tracker for one named dependency
#[derive(Debug)]
pub struct CircuitBreaker {
    dependency: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(dependency: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            dependency: dependency.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Name of the dependency this breaker guards
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// Whether a call may be attempted now. An open circuit whose
    /// reset timeout has elapsed transitions to half-open and admits
    /// exactly one probe; further callers are rejected until the probe
    /// outcome is recorded.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|at| at.elapsed() > self.config.reset_timeout)
                    .unwrap_or(true);
                if elapsed {
                    tracing::info!(
                        dependency = %self.dependency,
                        "circuit breaker half-open, allowing probe"
                    );
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    false
                } else {
                    inner.probe_in_flight = true;
                    true
                }
            }
        }
    }

    /// Report a successful call
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!(dependency = %self.dependency, "circuit breaker closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.probe_in_flight = false;
    }

    /// Report a failed call
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;
        inner.last_failure_at = Some(Instant::now());
        inner.probe_in_flight = false;

        match inner.state {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        dependency = %self.dependency,
                        failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                    inner.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(
                    dependency = %self.dependency,
                    "probe failed, circuit breaker reopened"
                );
                inner.state = CircuitState::Open;
            }
            CircuitState::Open => {}
        }
    }

    /// Current state without side effects
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        CircuitBreakerStats {
            dependency: self.dependency.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            last_failure_at: inner.last_failure_at,
        }
    }

    /// Convenience wrapper: gate, invoke, record. Returns
    /// `Error::CircuitOpen` without attempting the call when the
    /// breaker rejects it.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.can_execute() {
            return Err(Error::circuit_open(&self.dependency));
        }

        let result = operation().await;
        match result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }
}

/// Map of breakers keyed by dependency name, created on first use.
/// One breaker guards each named dependency; unnamed callers share the
/// "default" breaker.
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    /// Breaker for `dependency`, created with the registry's config if
    /// it does not exist yet
    pub fn breaker(&self, dependency: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(dependency.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(dependency, self.config.clone()))
            })
            .clone()
    }

    /// The shared breaker for callers without a named dependency
    pub fn default_breaker(&self) -> Arc<CircuitBreaker> {
        self.breaker("default")
    }

    /// Stats for every breaker created so far
    pub fn stats(&self) -> Vec<CircuitBreakerStats> {
        self.breakers.iter().map(|e| e.value().stats()).collect()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
