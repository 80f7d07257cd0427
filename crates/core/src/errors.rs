use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for hooksmith operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for hooksmith operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Command execution errors
    #[error("{}", format_command_error(.command, .args, .message, .exit_code))]
    CommandExecution {
        command: String,
        args: Vec<String>,
        message: String,
        exit_code: Option<i32>,
    },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Operation timeout errors
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// A circuit breaker rejected the call without attempting it
    #[error("circuit breaker for '{dependency}' is open - call rejected")]
    CircuitOpen { dependency: String },

    /// All retry attempts were exhausted; wraps the last error observed
    #[error("operation '{operation}' failed after {attempts} attempts: {source}")]
    RetryExhausted {
        operation: String,
        attempts: usize,
        #[source]
        source: Box<Error>,
    },
}

fn format_command_error(
    command: &str,
    args: &[String],
    message: &str,
    exit_code: &Option<i32>,
) -> String {
    let args_str = args.join(" ");
    match exit_code {
        Some(code) => {
            if args_str.is_empty() {
                format!("command '{command}' failed with exit code {code}: {message}")
            } else {
                format!("command '{command} {args_str}' failed with exit code {code}: {message}")
            }
        }
        None => {
            if args_str.is_empty() {
                format!("command '{command}' failed: {message}")
            } else {
                format!("command '{command} {args_str}' failed: {message}")
            }
        }
    }
}

// Conversion implementations
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Error::Configuration {
            message: format!("An internal error occurred: {error}"),
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create a command execution error
    #[must_use]
    pub fn command_execution(
        command: impl Into<String>,
        args: Vec<String>,
        message: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Error::CommandExecution {
            command: command.into(),
            args,
            message: message.into(),
            exit_code,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a file system error with path and operation context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a circuit-open rejection
    #[must_use]
    pub fn circuit_open(dependency: impl Into<String>) -> Self {
        Error::CircuitOpen {
            dependency: dependency.into(),
        }
    }

    /// Create a retry-exhausted error wrapping the last failure
    #[must_use]
    pub fn retry_exhausted(operation: impl Into<String>, attempts: usize, last: Error) -> Self {
        Error::RetryExhausted {
            operation: operation.into(),
            attempts,
            source: Box::new(last),
        }
    }

    /// True for failures that never leave the result-object world
    /// (timeouts and spawn/exit failures are recorded, not raised)
    #[must_use]
    pub fn is_recorded_failure(&self) -> bool {
        matches!(
            self,
            Error::CommandExecution { .. } | Error::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display_with_exit_code() {
        let err = Error::command_execution(
            "git",
            vec!["status".to_string()],
            "not a repository",
            Some(128),
        );
        assert_eq!(
            err.to_string(),
            "command 'git status' failed with exit code 128: not a repository"
        );
    }

    #[test]
    fn test_command_error_display_without_args() {
        let err = Error::command_execution("true", vec![], "spawn failed", None);
        assert_eq!(err.to_string(), "command 'true' failed: spawn failed");
    }

    #[test]
    fn test_circuit_open_display() {
        let err = Error::circuit_open("orchestrator");
        assert!(err.to_string().contains("'orchestrator' is open"));
    }

    #[test]
    fn test_retry_exhausted_wraps_source() {
        let last = Error::timeout("probe", Duration::from_secs(1));
        let err = Error::retry_exhausted("probe", 3, last);
        assert!(err.to_string().contains("after 3 attempts"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
