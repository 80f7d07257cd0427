//! Aggregated engine observability snapshot

use hooksmith_cache::CacheStatsSnapshot;
use hooksmith_utils::LoadSnapshot;
use serde::Serialize;

use crate::scheduler::SchedulerSnapshot;

/// Point-in-time view of everything the engine tracks. Serializes to
/// JSON for status endpoints and diagnostics dumps.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub scheduler: SchedulerSnapshot,
    pub load: LoadSnapshot,
    pub cache: Option<CacheStatsSnapshot>,
}
