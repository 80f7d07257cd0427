//! Cache tier backends
//!
//! Each tier implements [`CacheBackend`]. The in-memory tier is always
//! available; the disk tier is a capability selected by configuration
//! at engine startup, never probed per call.

use crate::entry::CacheEntry;
use hooksmith_core::{Error, Result};
use hooksmith_utils::write_atomic_string;
use lru::LruCache;
use parking_lot::Mutex;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// One storage tier. Implementations never surface read corruption to
/// the caller; a bad entry is evicted and reported as a miss.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn put(&self, key: &str, entry: CacheEntry);
    fn remove(&self, key: &str);
    /// Remove every entry whose key starts with `prefix`
    fn remove_prefix(&self, prefix: &str);
    fn clear(&self);
    /// Persist any buffered state; meaningful only for durable tiers
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Bounded in-memory tier with strict LRU eviction
pub struct MemoryTier {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CacheBackend for MemoryTier {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        // LruCache::get refreshes recency, which is exactly the
        // promotion-within-tier we want
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: &str, entry: CacheEntry) {
        self.entries.lock().put(key.to_string(), entry);
    }

    fn remove(&self, key: &str) {
        self.entries.lock().pop(key);
    }

    fn remove_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            entries.pop(&key);
        }
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Persistent tier: one JSON file per key under a configured directory
pub struct DiskTier {
    dir: PathBuf,
}

impl DiskTier {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::file_system(&dir, "create cache directory", e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are "namespace:hexdigest"; ':' is the only unsafe char
        self.dir.join(format!("{}.json", key.replace(':', "-")))
    }
}

impl CacheBackend for DiskTier {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let path = self.path_for(key);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "persistent cache read failed");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&json) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(
                    key,
                    path = %path.display(),
                    error = %e,
                    "corrupt cache entry evicted"
                );
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    fn put(&self, key: &str, entry: CacheEntry) {
        let path = self.path_for(key);
        match serde_json::to_string(&entry) {
            Ok(json) => {
                if let Err(e) = write_atomic_string(&path, &json) {
                    tracing::warn!(key, error = %e, "persistent cache write failed");
                }
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache entry serialization failed");
            }
        }
    }

    fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.path_for(key));
    }

    fn remove_prefix(&self, prefix: &str) {
        let file_prefix = prefix.replace(':', "-");
        let Ok(dir) = fs::read_dir(&self.dir) else {
            return;
        };
        for dir_entry in dir.filter_map(|e| e.ok()) {
            let name = dir_entry.file_name();
            if name.to_string_lossy().starts_with(&file_prefix) {
                let _ = fs::remove_file(dir_entry.path());
            }
        }
    }

    fn clear(&self) {
        let Ok(dir) = fs::read_dir(&self.dir) else {
            return;
        };
        for dir_entry in dir.filter_map(|e| e.ok()) {
            if dir_entry.path().extension().is_some_and(|e| e == "json") {
                let _ = fs::remove_file(dir_entry.path());
            }
        }
    }

    fn flush(&self) -> Result<()> {
        // Every write is already synced and renamed into place
        Ok(())
    }
}
