use hooksmith_utils::FileTimes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// One cached value plus the metadata needed to decide its validity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub created_at: SystemTime,
    pub ttl: Duration,
    pub last_accessed: SystemTime,
    /// Modification-time snapshot of the files this value was derived
    /// from; any change invalidates the entry regardless of TTL
    pub file_deps: Option<FileTimes>,
}

impl CacheEntry {
    pub fn new(value: serde_json::Value, ttl: Duration, dependent_paths: &[PathBuf]) -> Self {
        let now = SystemTime::now();
        let file_deps = if dependent_paths.is_empty() {
            None
        } else {
            Some(FileTimes::capture(dependent_paths))
        };
        Self {
            value,
            created_at: now,
            ttl,
            last_accessed: now,
            file_deps,
        }
    }

    /// TTL has elapsed since creation
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match self.created_at.elapsed() {
            Ok(age) => age > self.ttl,
            // Clock moved backwards; treat the entry as fresh
            Err(_) => false,
        }
    }

    /// Expired, or derived from files that have since changed
    #[must_use]
    pub fn is_stale(&self) -> bool {
        if self.is_expired() {
            return true;
        }
        self.file_deps
            .as_ref()
            .map(FileTimes::is_stale)
            .unwrap_or(false)
    }

    /// Record a hit
    pub fn touch(&mut self) {
        self.last_accessed = SystemTime::now();
    }
}
