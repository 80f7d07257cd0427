//! Shared utilities for the hooksmith engine
//!
//! Resilience primitives (rate limiting, circuit breaking, retry),
//! load-shedding counters, checkpoint persistence, and small filesystem
//! helpers used by the cache and engine crates.

pub mod atomic_file;
pub mod checkpoint;
pub mod file_times;
pub mod load;
pub mod resilience;
pub mod tracing;

pub use atomic_file::{write_atomic, write_atomic_string};
pub use checkpoint::CheckpointManager;
pub use file_times::FileTimes;
pub use load::{LoadBalancer, LoadSnapshot};
pub use resilience::{
    retry, retry_with_circuit_breaker, CircuitBreaker, CircuitBreakerConfig,
    CircuitBreakerRegistry, CircuitState, RateLimitConfig, RetryConfig, TokenBucket,
};
pub use crate::tracing::init_tracing;
