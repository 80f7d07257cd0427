//! Batch scheduling: classification, admission, retries, caching
//!
//! The scheduler turns a batch of [`CommandSpec`]s into results. It
//! decides sequential vs parallel execution, gates every command
//! through the load shedder, the concurrency semaphore, the rate
//! limiter, and the per-program circuit breaker, consults the result
//! cache for idempotent commands, and retries soft failures within the
//! command's own budget. Individual failures stay encoded in their
//! [`ExecutionResult`]; a batch always runs to its natural end unless
//! a critical command fails and aborting is enabled.

use hooksmith_cache::{cache_key, CacheManager};
use hooksmith_core::constants::{
    ADAPTIVE_ELIGIBLE_RATIO, ADAPTIVE_FAST_TIMEOUT, ADAPTIVE_PARALLEL_MIN_BATCH,
    ADAPTIVE_SEQUENTIAL_MAX_BATCH, CRITICAL_PRIORITY, DEFAULT_MAX_CONCURRENCY,
};
use hooksmith_core::{CommandSpec, ExecutionMode, ExecutionResult};
use hooksmith_utils::{CircuitBreakerRegistry, LoadBalancer, RetryConfig, TokenBucket};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;

use crate::executor::CommandExecutor;

/// Namespace for cached command results
const COMMAND_CACHE_NAMESPACE: &str = "cmd";

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound on concurrently executing commands
    pub max_concurrency: usize,
    /// Abort the rest of a sequential batch when a command at or above
    /// critical priority fails
    pub abort_on_critical_failure: bool,
    /// Backoff schedule shared by every command's retry budget
    pub retry: RetryConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            abort_on_critical_failure: false,
            retry: RetryConfig::default(),
        }
    }
}

/// Cumulative scheduler counters
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    pub completed: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub average_wall_time: Duration,
}

#[derive(Debug, Default)]
struct SchedulerCounters {
    completed: AtomicU64,
    failed: AtomicU64,
    wall_millis: AtomicU64,
}

pub struct BatchScheduler {
    executor: Arc<dyn CommandExecutor>,
    rate_limiter: Arc<TokenBucket>,
    breakers: Arc<CircuitBreakerRegistry>,
    cache: Option<Arc<CacheManager>>,
    load: Arc<LoadBalancer>,
    semaphore: Arc<Semaphore>,
    config: SchedulerConfig,
    counters: SchedulerCounters,
}

impl BatchScheduler {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        rate_limiter: Arc<TokenBucket>,
        breakers: Arc<CircuitBreakerRegistry>,
        cache: Option<Arc<CacheManager>>,
        load: Arc<LoadBalancer>,
        config: SchedulerConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            executor,
            rate_limiter,
            breakers,
            cache,
            load,
            semaphore,
            config,
            counters: SchedulerCounters::default(),
        }
    }

    /// Pick sequential or parallel execution for a batch.
    ///
    /// Tiny batches are not worth coordinating. Larger ones go
    /// parallel when most commands opted in and the batch looks fast,
    /// or unconditionally once the batch is big enough that sequential
    /// latency dominates either way.
    pub fn classify(batch: &[CommandSpec]) -> ExecutionMode {
        if batch.len() <= ADAPTIVE_SEQUENTIAL_MAX_BATCH {
            return ExecutionMode::Sequential;
        }

        let eligible = batch.iter().filter(|c| c.parallel_eligible).count();
        let eligible_ratio = eligible as f64 / batch.len() as f64;
        let total_timeout: Duration = batch.iter().map(|c| c.timeout).sum();
        let average_timeout = total_timeout / batch.len() as u32;

        let looks_fast =
            eligible_ratio > ADAPTIVE_ELIGIBLE_RATIO && average_timeout < ADAPTIVE_FAST_TIMEOUT;
        if looks_fast || batch.len() > ADAPTIVE_PARALLEL_MIN_BATCH {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        }
    }

    /// Run one command through the full admission pipeline
    pub async fn execute(&self, spec: CommandSpec) -> ExecutionResult {
        self.run_gated(spec).await
    }

    /// Run a batch. `Adaptive` resolves to a concrete mode via
    /// [`classify`](Self::classify). Results carry the spec that
    /// produced them; in parallel mode their order follows scheduling
    /// priority, not submission order.
    pub async fn execute_batch(
        &self,
        batch: Vec<CommandSpec>,
        mode: ExecutionMode,
    ) -> Vec<ExecutionResult> {
        if batch.is_empty() {
            return Vec::new();
        }

        let mode = if mode == ExecutionMode::Adaptive {
            Self::classify(&batch)
        } else {
            mode
        };
        tracing::info!(commands = batch.len(), %mode, "executing batch");

        if mode == ExecutionMode::Parallel {
            self.run_parallel(batch).await
        } else {
            self.run_sequential(batch).await
        }
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let completed = self.counters.completed.load(Ordering::Relaxed);
        let failed = self.counters.failed.load(Ordering::Relaxed);
        let total = completed + failed;
        let wall_millis = self.counters.wall_millis.load(Ordering::Relaxed);
        SchedulerSnapshot {
            completed,
            failed,
            success_rate: if total == 0 {
                1.0
            } else {
                completed as f64 / total as f64
            },
            average_wall_time: if total == 0 {
                Duration::ZERO
            } else {
                Duration::from_millis(wall_millis / total)
            },
        }
    }

    async fn run_sequential(&self, batch: Vec<CommandSpec>) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(batch.len());
        for spec in batch {
            let critical = spec.priority >= CRITICAL_PRIORITY;
            let result = self.run_gated(spec).await;
            let abort =
                self.config.abort_on_critical_failure && critical && !result.succeeded;
            results.push(result);
            if abort {
                tracing::warn!("critical command failed, aborting remainder of batch");
                break;
            }
        }
        results
    }

    async fn run_parallel(&self, mut batch: Vec<CommandSpec>) -> Vec<ExecutionResult> {
        // Stable sort: equal priorities keep submission order
        batch.sort_by_key(|c| Reverse(c.priority));
        let futures = batch.into_iter().map(|spec| self.run_gated(spec));
        futures::future::join_all(futures).await
    }

    /// Load shedding, concurrency bound, and bookkeeping around one
    /// command
    async fn run_gated(&self, spec: CommandSpec) -> ExecutionResult {
        if !self.load.can_execute_now() && !self.load.should_queue() {
            tracing::warn!(command = %spec, "shedding command, queue is full");
            return ExecutionResult::failed(
                spec,
                "shed under load: execution queue is full",
                String::new(),
                String::new(),
                Duration::ZERO,
            );
        }

        let waiting = !self.load.can_execute_now();
        if waiting {
            self.load.enqueue();
        }
        let permit = self.semaphore.acquire().await;
        if waiting {
            self.load.dequeue();
        }
        if permit.is_err() {
            // Semaphore closed only happens at teardown
            return ExecutionResult::failed(
                spec,
                "scheduler is shutting down",
                String::new(),
                String::new(),
                Duration::ZERO,
            );
        }

        self.load.start_operation();
        let result = self.run_admitted(spec).await;
        self.load.end_operation(result.wall_time);

        if result.succeeded {
            self.counters.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.counters
            .wall_millis
            .fetch_add(result.wall_time.as_millis() as u64, Ordering::Relaxed);
        result
    }

    /// Rate limit, circuit breaker, cache, and retry for one command
    async fn run_admitted(&self, spec: CommandSpec) -> ExecutionResult {
        self.rate_limiter.wait_for_tokens(1.0).await;

        if let Some(result) = self.cached_result(&spec) {
            tracing::debug!(command = %spec, "serving result from cache");
            return result;
        }

        let breaker = self.breakers.breaker(&spec.program);
        let total_attempts = spec.retry_budget as usize + 1;

        let mut last = None;
        for attempt in 1..=total_attempts {
            if !breaker.can_execute() {
                return ExecutionResult::failed(
                    spec,
                    format!("circuit breaker for '{}' is open", breaker.dependency()),
                    String::new(),
                    String::new(),
                    Duration::ZERO,
                );
            }

            let result = self.executor.execute(&spec).await;
            if result.succeeded {
                breaker.record_success();
                self.store_result(&spec, &result);
                return result;
            }

            breaker.record_failure();
            if attempt < total_attempts {
                let delay = self.config.retry.delay_for(attempt);
                tracing::warn!(
                    command = %spec,
                    attempt,
                    total_attempts,
                    ?delay,
                    exit_code = result.exit_code,
                    "command failed, retrying"
                );
                sleep(delay).await;
            }
            last = Some(result);
        }

        // The loop always stores the final attempt before falling out
        match last {
            Some(result) => result,
            None => ExecutionResult::failed(
                spec,
                "no execution attempt was made",
                String::new(),
                String::new(),
                Duration::ZERO,
            ),
        }
    }

    fn cached_result(&self, spec: &CommandSpec) -> Option<ExecutionResult> {
        if !spec.cacheable {
            return None;
        }
        let cache = self.cache.as_ref()?;
        let key = command_cache_key(spec)?;
        let mut result: ExecutionResult = cache.get_as(&key)?;
        // The cached copy carries the spec of the run that produced it;
        // pair the result with the spec the caller submitted now
        result.command = spec.clone();
        Some(result)
    }

    fn store_result(&self, spec: &CommandSpec, result: &ExecutionResult) {
        if !spec.cacheable {
            return;
        }
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let Some(key) = command_cache_key(spec) else {
            return;
        };
        if let Err(e) = cache.put_as(&key, result, spec.cache_ttl, &spec.dependent_paths) {
            tracing::warn!(command = %spec, error = %e, "failed to cache result");
        }
    }
}

/// Key identifying a command's observable inputs. Environment
/// overrides are sorted so the key is independent of map iteration
/// order.
fn command_cache_key(spec: &CommandSpec) -> Option<String> {
    let env: BTreeMap<&String, &String> = spec.env.iter().collect();
    let inputs = (
        &spec.program,
        spec.args.as_slice(),
        env,
        &spec.working_dir,
    );
    match cache_key(COMMAND_CACHE_NAMESPACE, &inputs) {
        Ok(key) => Some(key),
        Err(e) => {
            tracing::warn!(command = %spec, error = %e, "failed to derive cache key");
            None
        }
    }
}
