//! Multi-tier result cache for the hooksmith engine
//!
//! Two in-memory tiers (a small hot TTL tier in front of a larger LRU
//! tier) with an optional persistent disk tier behind them. Lookups
//! walk the tiers fastest-first and promote hits into every faster
//! tier. Entries expire by TTL or, for file-derived entries, when any
//! recorded dependent file's modification time changes. A corrupt
//! persistent entry is evicted and reported as a miss, never as an
//! error.

pub mod backend;
pub mod config;
pub mod entry;
pub mod keys;
pub mod manager;
pub mod stats;

pub use backend::{CacheBackend, DiskTier, MemoryTier};
pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use keys::cache_key;
pub use manager::CacheManager;
pub use stats::CacheStatsSnapshot;
