/// Constants used throughout the hooksmith engine
use std::time::Duration;

// Scheduling
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
pub const CRITICAL_PRIORITY: i32 = 100;

// Adaptive mode classification thresholds
pub const ADAPTIVE_SEQUENTIAL_MAX_BATCH: usize = 2;
pub const ADAPTIVE_PARALLEL_MIN_BATCH: usize = 5;
pub const ADAPTIVE_ELIGIBLE_RATIO: f64 = 0.7;
pub const ADAPTIVE_FAST_TIMEOUT: Duration = Duration::from_secs(30);

// Process lifecycle
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
pub const TERMINATION_GRACE_PERIOD: Duration = Duration::from_millis(500);
pub const FINAL_REAP_TIMEOUT: Duration = Duration::from_secs(2);

// Supervision
pub const DEFAULT_SUPERVISION_INTERVAL: Duration = Duration::from_secs(10);

// Rate limiting
pub const DEFAULT_TOKEN_CAPACITY: f64 = 200.0;
pub const DEFAULT_REFILL_RATE: f64 = 100.0;
pub const TOKEN_POLL_INTERVAL: Duration = Duration::from_millis(1);
