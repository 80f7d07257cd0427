//! Engine construction and lifecycle
//!
//! [`ExecutionEngine`] is the single entry point: it owns the
//! executor, rate limiter, circuit breakers, cache, load shedder,
//! checkpoint store, and supervisor, and threads them into the
//! scheduler. Callers that need several engines (tests, isolated
//! pipelines) just build several; nothing here is process-global.

use hooksmith_cache::{CacheConfig, CacheManager};
use hooksmith_core::constants::DEFAULT_SUPERVISION_INTERVAL;
use hooksmith_core::{CommandSpec, ExecutionMode, ExecutionResult, Result};
use hooksmith_utils::{
    CheckpointManager, CircuitBreakerConfig, CircuitBreakerRegistry, LoadBalancer,
    RateLimitConfig, TokenBucket,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::executor::SystemCommandExecutor;
use crate::scheduler::{BatchScheduler, SchedulerConfig};
use crate::stats::EngineStats;
use crate::supervisor::ProcessSupervisor;

/// Default queue depth before commands are shed
const DEFAULT_QUEUE_LIMIT: usize = 64;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub rate_limit: RateLimitConfig,
    pub circuit: CircuitBreakerConfig,
    /// Result cache; `None` disables caching entirely
    pub cache: Option<CacheConfig>,
    /// Directory for task checkpoints; `None` disables checkpointing
    pub checkpoint_dir: Option<PathBuf>,
    pub supervision_interval: Duration,
    /// Commands waiting beyond this depth are shed
    pub queue_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            circuit: CircuitBreakerConfig::default(),
            cache: Some(CacheConfig::default()),
            checkpoint_dir: None,
            supervision_interval: DEFAULT_SUPERVISION_INTERVAL,
            queue_limit: DEFAULT_QUEUE_LIMIT,
        }
    }
}

pub struct ExecutionEngine {
    scheduler: BatchScheduler,
    executor: Arc<SystemCommandExecutor>,
    rate_limiter: Arc<TokenBucket>,
    breakers: Arc<CircuitBreakerRegistry>,
    cache: Option<Arc<CacheManager>>,
    load: Arc<LoadBalancer>,
    checkpoints: Option<CheckpointManager>,
    supervisor: Arc<ProcessSupervisor>,
    supervision_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ExecutionEngine {
    /// Build an engine and start its supervision loop. Must be called
    /// from within a tokio runtime.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let executor = Arc::new(SystemCommandExecutor::new());
        let rate_limiter = Arc::new(TokenBucket::new(config.rate_limit.clone()));
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.circuit.clone()));
        let load = Arc::new(LoadBalancer::new(
            config.scheduler.max_concurrency,
            config.queue_limit,
        ));

        let cache = match config.cache.clone() {
            Some(cache_config) => Some(Arc::new(CacheManager::new(cache_config)?)),
            None => None,
        };
        let checkpoints = match config.checkpoint_dir.clone() {
            Some(dir) => Some(CheckpointManager::new(dir)?),
            None => None,
        };

        let scheduler = BatchScheduler::new(
            executor.clone(),
            rate_limiter.clone(),
            breakers.clone(),
            cache.clone(),
            load.clone(),
            config.scheduler.clone(),
        );

        let supervisor = Arc::new(ProcessSupervisor::new(config.supervision_interval));
        let supervision_handle = supervisor.clone().spawn();

        tracing::debug!(
            max_concurrency = config.scheduler.max_concurrency,
            cache = cache.is_some(),
            checkpoints = checkpoints.is_some(),
            "execution engine started"
        );

        Ok(Self {
            scheduler,
            executor,
            rate_limiter,
            breakers,
            cache,
            load,
            checkpoints,
            supervisor,
            supervision_handle: Mutex::new(Some(supervision_handle)),
        })
    }

    /// Run one command through the full pipeline
    pub async fn execute(&self, spec: CommandSpec) -> ExecutionResult {
        self.scheduler.execute(spec).await
    }

    /// Run a batch; see [`BatchScheduler::execute_batch`]
    pub async fn execute_batch(
        &self,
        batch: Vec<CommandSpec>,
        mode: ExecutionMode,
    ) -> Vec<ExecutionResult> {
        self.scheduler.execute_batch(batch, mode).await
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    /// Checkpoint store, when a checkpoint directory was configured
    pub fn checkpoints(&self) -> Option<&CheckpointManager> {
        self.checkpoints.as_ref()
    }

    pub fn cache(&self) -> Option<&Arc<CacheManager>> {
        self.cache.as_ref()
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn rate_limiter(&self) -> &Arc<TokenBucket> {
        &self.rate_limiter
    }

    pub fn load(&self) -> &Arc<LoadBalancer> {
        &self.load
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            scheduler: self.scheduler.snapshot(),
            load: self.load.snapshot(),
            cache: self.cache.as_ref().map(|c| c.stats()),
        }
    }

    /// Stop the supervision loop, terminate any in-flight processes,
    /// and flush the persistent cache tier. Safe to call more than
    /// once.
    pub async fn shutdown(&self) {
        self.supervisor.stop();
        let handle = self.supervision_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        self.executor.terminate_all().await;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.shutdown() {
                tracing::warn!(error = %e, "cache flush failed at shutdown");
            }
        }
        tracing::debug!("execution engine stopped");
    }
}
