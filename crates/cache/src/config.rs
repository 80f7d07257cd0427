use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the multi-tier cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Capacity of the hot in-memory tier
    pub hot_capacity: usize,
    /// Capacity of the larger LRU tier
    pub warm_capacity: usize,
    /// TTL applied when a put does not specify one
    pub default_ttl: Duration,
    /// Directory for the persistent tier; `None` disables it
    pub persistent_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            hot_capacity: 256,
            warm_capacity: 2048,
            default_ttl: Duration::from_secs(300),
            persistent_dir: None,
        }
    }
}

impl CacheConfig {
    /// Enable the persistent tier under `dir`
    #[must_use]
    pub fn with_persistent_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persistent_dir = Some(dir.into());
        self
    }
}
