//! Concurrent command execution engine for hooksmith
//!
//! The engine spawns, bounds, times out, retries, caches, and
//! fault-isolates external process invocations. Entry point is
//! [`ExecutionEngine`], which owns every piece of shared state
//! (rate limiter, circuit breakers, cache, supervisor) and hands it to
//! the scheduler; nothing in this crate lives in a global.
//!
//! Failure modes of a command (spawn failure, timeout, circuit
//! rejection) are encoded in its [`ExecutionResult`], never raised, so
//! a batch survives individual failures. The one exception is the
//! retry wrapper in `hooksmith-utils`, which surfaces
//! `RetryExhausted` by design.

pub mod context;
pub mod executor;
pub mod process;
pub mod scheduler;
pub mod stats;
pub mod supervisor;

pub use context::{EngineConfig, ExecutionEngine};
pub use executor::{CommandExecutor, SystemCommandExecutor};
pub use hooksmith_core::{CommandSpec, ExecutionMode, ExecutionResult};
pub use scheduler::{BatchScheduler, SchedulerConfig};
pub use stats::EngineStats;
pub use supervisor::{ProcessSupervisor, SupervisedProcess};
