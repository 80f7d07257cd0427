//! Token-bucket rate limiter for command admission

use hooksmith_core::constants::{
    DEFAULT_REFILL_RATE, DEFAULT_TOKEN_CAPACITY, TOKEN_POLL_INTERVAL,
};
use parking_lot::Mutex;
use std::time::Instant;
use tokio::time::sleep;

/// Configuration for the token bucket
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum tokens the bucket can hold
    pub capacity: f64,
    /// Tokens added per second
    pub refill_rate: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_TOKEN_CAPACITY,
            refill_rate: DEFAULT_REFILL_RATE,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket rate limiter. Tokens accumulate at `refill_rate` per
/// second up to `capacity`; each admitted unit of work spends tokens.
#[derive(Debug)]
pub struct TokenBucket {
    config: RateLimitConfig,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(config: RateLimitConfig) -> Self {
        let tokens = config.capacity;
        Self {
            config,
            state: Mutex::new(BucketState {
                tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Consume `tokens` if available. Refills first, then either spends
    /// and returns true, or leaves the balance untouched and returns
    /// false.
    pub fn try_consume(&self, tokens: f64) -> bool {
        let mut state = self.state.lock();

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.config.refill_rate)
            .min(self.config.capacity);
        state.last_refill = now;

        if state.tokens >= tokens {
            state.tokens -= tokens;
            true
        } else {
            false
        }
    }

    /// Suspend until `tokens` can be consumed. Polls on a short
    /// interval; wait time is unbounded by design.
    pub async fn wait_for_tokens(&self, tokens: f64) {
        while !self.try_consume(tokens) {
            sleep(TOKEN_POLL_INTERVAL).await;
        }
    }

    /// Current balance after a refill. Diagnostic only; the value may
    /// be stale by the time the caller looks at it.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.config.refill_rate)
            .min(self.config.capacity);
        state.last_refill = now;
        state.tokens
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_starts_full_and_never_exceeds_capacity() {
        let bucket = TokenBucket::new(RateLimitConfig {
            capacity: 5.0,
            refill_rate: 1000.0,
        });

        assert!(bucket.available() <= 5.0);
        std::thread::sleep(Duration::from_millis(20));
        assert!(bucket.available() <= 5.0);
    }

    #[test]
    fn test_consume_drains_and_rejects() {
        let bucket = TokenBucket::new(RateLimitConfig {
            capacity: 3.0,
            refill_rate: 0.0,
        });

        assert!(bucket.try_consume(3.0));
        assert!(!bucket.try_consume(1.0));
        // A failed consume must not go negative
        assert!(bucket.available() >= 0.0);
    }

    #[test]
    fn test_refill_restores_tokens() {
        let bucket = TokenBucket::new(RateLimitConfig {
            capacity: 10.0,
            refill_rate: 100.0,
        });

        assert!(bucket.try_consume(10.0));
        assert!(!bucket.try_consume(1.0));

        // 100 tokens/s means 1 token in 10ms; wait a bit longer
        std::thread::sleep(Duration::from_millis(30));
        assert!(bucket.try_consume(1.0));
    }

    #[tokio::test]
    async fn test_wait_for_tokens_eventually_admits() {
        let bucket = TokenBucket::new(RateLimitConfig {
            capacity: 1.0,
            refill_rate: 50.0,
        });

        assert!(bucket.try_consume(1.0));

        let start = Instant::now();
        bucket.wait_for_tokens(1.0).await;
        // 50 tokens/s -> roughly 20ms to earn one back
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
