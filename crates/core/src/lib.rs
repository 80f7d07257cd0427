//! Core types and errors for the hooksmith execution engine
//!
//! This crate defines the value objects that cross every component
//! boundary in the engine: command specifications, execution results,
//! and the shared error type. It deliberately has no async or I/O
//! dependencies of its own.

pub mod constants;
pub mod errors;
pub mod types;

pub use errors::{Error, Result};
pub use types::{
    CommandArguments, CommandSpec, EnvironmentVariables, ExecutionMode, ExecutionResult,
    ProcessStatus,
};
