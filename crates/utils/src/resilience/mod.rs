//! Resilience patterns for external-call protection
//!
//! This module provides the admission and isolation primitives the
//! engine composes around command execution:
//!
//! - [`rate_limit`] - token-bucket admission control
//! - [`circuit`] - per-dependency circuit breakers
//! - [`retry`] - bounded retries with exponential backoff and jitter
//!
//! The circuit breaker never invokes the guarded operation itself when
//! used through `can_execute`/`record_*`; callers report outcomes. The
//! `call` helper exists for callers that prefer a wrapped invocation.

pub mod circuit;
pub mod rate_limit;
pub mod retry;

pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use rate_limit::{RateLimitConfig, TokenBucket};
pub use retry::{retry, retry_with_circuit_breaker, RetryConfig};
