use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::constants::DEFAULT_COMMAND_TIMEOUT;

/// Wrapper type for environment variables with domain-specific operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariables(HashMap<String, String>);

impl EnvironmentVariables {
    /// Create a new empty environment
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Create from an existing HashMap
    #[must_use]
    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self(map)
    }

    /// Insert a variable, returning the previous value if any
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Get a variable by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&String> {
        self.0.get(key)
    }

    /// Merge another set of environment variables into this one.
    /// Variables in `other` overwrite existing ones.
    pub fn merge(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Get the number of variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no variables
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get an iterator over the variables
    #[must_use]
    pub fn iter(&self) -> std::collections::hash_map::Iter<'_, String, String> {
        self.0.iter()
    }

    /// Convert to the inner HashMap
    #[must_use]
    pub fn into_inner(self) -> HashMap<String, String> {
        self.0
    }
}

impl From<HashMap<String, String>> for EnvironmentVariables {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl IntoIterator for EnvironmentVariables {
    type Item = (String, String);
    type IntoIter = std::collections::hash_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Wrapper type for command arguments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandArguments(Vec<String>);

impl CommandArguments {
    /// Create an empty argument list
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create from an existing Vec
    #[must_use]
    pub fn from_vec(args: Vec<String>) -> Self {
        Self(args)
    }

    /// Append a single argument
    pub fn push(&mut self, arg: impl Into<String>) {
        self.0.push(arg.into());
    }

    /// View the arguments as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to the inner Vec
    #[must_use]
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl Deref for CommandArguments {
    type Target = Vec<String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for CommandArguments {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<String>> for CommandArguments {
    fn from(args: Vec<String>) -> Self {
        Self(args)
    }
}

/// One external command request, immutable once submitted.
///
/// Each spec carries a unique id so results can always be associated
/// with the command that produced them, regardless of the order a
/// batch completes in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Identity used to pair results back to their command
    pub id: Uuid,
    /// Executable name or path
    pub program: String,
    /// Arguments passed to the program
    pub args: CommandArguments,
    /// Wall-clock budget for the whole process tree
    pub timeout: Duration,
    /// Overrides merged onto the inherited environment
    pub env: EnvironmentVariables,
    /// Working directory; inherits the caller's when `None`
    pub working_dir: Option<PathBuf>,
    /// Higher priority commands are scheduled first
    pub priority: i32,
    /// Whether this command may run concurrently with others
    pub parallel_eligible: bool,
    /// Number of additional attempts after a failure
    pub retry_budget: u32,
    /// Whether a successful result may be cached and reused
    pub cacheable: bool,
    /// TTL for a cached result; the cache default applies when `None`
    pub cache_ttl: Option<Duration>,
    /// Files whose modification invalidates a cached result
    pub dependent_paths: Vec<PathBuf>,
}

impl CommandSpec {
    /// Create a spec for `program` with engine defaults
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            program: program.into(),
            args: CommandArguments::new(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            env: EnvironmentVariables::new(),
            working_dir: None,
            priority: 0,
            parallel_eligible: true,
            retry_budget: 0,
            cacheable: false,
            cache_ttl: None,
            dependent_paths: Vec::new(),
        }
    }

    /// Create a spec from a full argv vector. Returns `None` for an
    /// empty vector, which has no program to run.
    #[must_use]
    pub fn from_argv(argv: Vec<String>) -> Option<Self> {
        let mut iter = argv.into_iter();
        let program = iter.next()?;
        Some(Self::new(program).args(iter))
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg);
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self.args.push(arg);
        }
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key, value);
        self
    }

    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn parallel_eligible(mut self, eligible: bool) -> Self {
        self.parallel_eligible = eligible;
        self
    }

    #[must_use]
    pub fn retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Mark the command as idempotent/read-only so its successful
    /// result may be served from cache
    #[must_use]
    pub fn cacheable(mut self, ttl: Option<Duration>) -> Self {
        self.cacheable = true;
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn dependent_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dependent_paths.push(path.into());
        self
    }

    /// One-line rendering for logs
    #[must_use]
    pub fn display_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_line())
    }
}

/// The outcome of one command attempt. Failure modes are encoded here
/// rather than raised; `error_detail` carries the human-readable cause
/// for spawn failures, timeouts, and circuit rejections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub command: CommandSpec,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub wall_time: Duration,
    pub succeeded: bool,
    pub error_detail: Option<String>,
}

impl ExecutionResult {
    /// Result for a process that ran to completion
    #[must_use]
    pub fn completed(
        command: CommandSpec,
        exit_code: i32,
        stdout: String,
        stderr: String,
        wall_time: Duration,
    ) -> Self {
        Self {
            command,
            exit_code,
            stdout,
            stderr,
            wall_time,
            succeeded: exit_code == 0,
            error_detail: None,
        }
    }

    /// Result for a command that never produced an exit status
    /// (spawn failure, timeout, circuit rejection)
    #[must_use]
    pub fn failed(
        command: CommandSpec,
        detail: impl Into<String>,
        stdout: String,
        stderr: String,
        wall_time: Duration,
    ) -> Self {
        Self {
            command,
            exit_code: -1,
            stdout,
            stderr,
            wall_time,
            succeeded: false,
            error_detail: Some(detail.into()),
        }
    }
}

/// How a batch of commands should be executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Strictly in submission order, one at a time
    Sequential,
    /// Concurrently, bounded by the configured admission gate
    Parallel,
    /// Let the scheduler classify the batch itself
    Adaptive,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sequential => write!(f, "sequential"),
            ExecutionMode::Parallel => write!(f, "parallel"),
            ExecutionMode::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// Observed state of a supervised long-running process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessStatus {
    Running,
    Unhealthy,
    Dead,
    Missing,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Running => write!(f, "running"),
            ProcessStatus::Unhealthy => write!(f, "unhealthy"),
            ProcessStatus::Dead => write!(f, "dead"),
            ProcessStatus::Missing => write!(f, "missing"),
        }
    }
}
