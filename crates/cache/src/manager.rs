//! Tiered cache front
//!
//! `CacheManager` owns the tiers and implements the lookup walk:
//! hot -> warm -> disk, promoting hits into every faster tier. Each
//! tier guards its own state, so unrelated operations never serialize
//! on a shared lock.

use crate::backend::{CacheBackend, DiskTier, MemoryTier};
use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::stats::{CacheStats, CacheStatsSnapshot};
use hooksmith_core::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub struct CacheManager {
    config: CacheConfig,
    hot: MemoryTier,
    warm: MemoryTier,
    disk: Option<DiskTier>,
    stats: CacheStats,
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Result<Self> {
        let disk = match &config.persistent_dir {
            Some(dir) => Some(DiskTier::new(dir)?),
            None => None,
        };
        Ok(Self {
            hot: MemoryTier::new(config.hot_capacity),
            warm: MemoryTier::new(config.warm_capacity),
            disk,
            stats: CacheStats::default(),
            config,
        })
    }

    /// Look up `key`, walking tiers fastest-first. A stale entry is
    /// dropped from every tier and reported as a miss.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        if let Some(mut entry) = self.hot.get(key) {
            if entry.is_stale() {
                self.invalidate(key);
                self.stats.record_miss();
                return None;
            }
            entry.touch();
            let value = entry.value.clone();
            self.hot.put(key, entry);
            self.stats.record_hot_hit();
            return Some(value);
        }

        if let Some(mut entry) = self.warm.get(key) {
            if entry.is_stale() {
                self.invalidate(key);
                self.stats.record_miss();
                return None;
            }
            entry.touch();
            let value = entry.value.clone();
            self.hot.put(key, entry.clone());
            self.warm.put(key, entry);
            self.stats.record_warm_hit();
            return Some(value);
        }

        if let Some(disk) = &self.disk {
            if let Some(mut entry) = disk.get(key) {
                if entry.is_stale() {
                    self.invalidate(key);
                    self.stats.record_miss();
                    return None;
                }
                entry.touch();
                let value = entry.value.clone();
                self.hot.put(key, entry.clone());
                self.warm.put(key, entry);
                self.stats.record_disk_hit();
                tracing::debug!(key, "cache hit promoted from disk");
                return Some(value);
            }
        }

        self.stats.record_miss();
        None
    }

    /// Store `value` in every tier
    pub fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
        dependent_paths: &[PathBuf],
    ) {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let entry = CacheEntry::new(value, ttl, dependent_paths);

        self.hot.put(key, entry.clone());
        self.warm.put(key, entry.clone());
        if let Some(disk) = &self.disk {
            disk.put(key, entry);
        }
        self.stats.record_put();
    }

    /// Typed lookup
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                // Type drift across versions; drop the entry
                tracing::warn!(key, error = %e, "cached value no longer deserializes");
                self.invalidate(key);
                None
            }
        }
    }

    /// Typed store
    pub fn put_as<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
        dependent_paths: &[PathBuf],
    ) -> Result<()> {
        let json = serde_json::to_value(value)?;
        self.put(key, json, ttl, dependent_paths);
        Ok(())
    }

    /// Drop one key from every tier
    pub fn invalidate(&self, key: &str) {
        self.hot.remove(key);
        self.warm.remove(key);
        if let Some(disk) = &self.disk {
            disk.remove(key);
        }
        self.stats.record_invalidation();
    }

    /// Drop every key in a namespace (keys are "namespace:digest")
    pub fn invalidate_namespace(&self, namespace: &str) {
        let prefix = format!("{namespace}:");
        self.hot.remove_prefix(&prefix);
        self.warm.remove_prefix(&prefix);
        if let Some(disk) = &self.disk {
            disk.remove_prefix(&prefix);
        }
        self.stats.record_invalidation();
    }

    /// Flush the persistent tier; call once at shutdown
    pub fn shutdown(&self) -> Result<()> {
        if let Some(disk) = &self.disk {
            disk.flush()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn memory_only() -> CacheManager {
        CacheManager::new(CacheConfig::default()).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let cache = memory_only();
        cache.put("cmd:aa", json!({"stdout": "hi"}), Some(Duration::from_secs(5)), &[]);

        assert_eq!(cache.get("cmd:aa"), Some(json!({"stdout": "hi"})));
        assert_eq!(cache.stats().hot_hits, 1);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = memory_only();
        cache.put("cmd:aa", json!(1), Some(Duration::from_millis(10)), &[]);

        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("cmd:aa").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hot_hits, 0);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_file_dependency_invalidates_within_ttl() {
        let temp_dir = TempDir::new().unwrap();
        let dep = temp_dir.path().join("source.txt");
        std::fs::write(&dep, "v1").unwrap();

        let cache = memory_only();
        cache.put(
            "cmd:aa",
            json!("derived"),
            Some(Duration::from_secs(600)),
            &[dep.clone()],
        );
        assert!(cache.get("cmd:aa").is_some());

        std::thread::sleep(Duration::from_millis(20));
        std::fs::write(&dep, "v2").unwrap();

        assert!(cache.get("cmd:aa").is_none());
    }

    #[test]
    fn test_warm_hit_promotes_to_hot() {
        let cache = CacheManager::new(CacheConfig {
            hot_capacity: 1,
            ..Default::default()
        })
        .unwrap();

        cache.put("cmd:aa", json!(1), None, &[]);
        // Second put evicts aa from the single-slot hot tier
        cache.put("cmd:bb", json!(2), None, &[]);

        assert_eq!(cache.get("cmd:aa"), Some(json!(1)));
        assert_eq!(cache.stats().warm_hits, 1);
        // Promoted: the next lookup hits the hot tier
        assert_eq!(cache.get("cmd:aa"), Some(json!(1)));
        assert_eq!(cache.stats().hot_hits, 1);
    }

    #[test]
    fn test_disk_tier_survives_memory_eviction() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CacheManager::new(
            CacheConfig {
                hot_capacity: 1,
                warm_capacity: 1,
                ..Default::default()
            }
            .with_persistent_dir(temp_dir.path()),
        )
        .unwrap();

        cache.put("cmd:aa", json!("kept"), None, &[]);
        // Evict aa from both memory tiers
        cache.put("cmd:bb", json!("new"), None, &[]);

        assert_eq!(cache.get("cmd:aa"), Some(json!("kept")));
        assert_eq!(cache.stats().disk_hits, 1);
    }

    #[test]
    fn test_invalidate_namespace() {
        let cache = memory_only();
        cache.put("cmd:aa", json!(1), None, &[]);
        cache.put("cmd:bb", json!(2), None, &[]);
        cache.put("lint:cc", json!(3), None, &[]);

        cache.invalidate_namespace("cmd");
        assert!(cache.get("cmd:aa").is_none());
        assert!(cache.get("cmd:bb").is_none());
        assert!(cache.get("lint:cc").is_some());
    }

    #[test]
    fn test_typed_round_trip() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Summary {
            lines: u32,
        }

        let cache = memory_only();
        cache
            .put_as("cmd:aa", &Summary { lines: 42 }, None, &[])
            .unwrap();
        let back: Summary = cache.get_as("cmd:aa").unwrap();
        assert_eq!(back, Summary { lines: 42 });
    }
}
