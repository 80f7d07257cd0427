//! Single-command execution with zombie-safe termination
//!
//! The executor spawns one external process as the leader of a fresh
//! process group, captures its output, and enforces the command's
//! timeout. Every failure mode is encoded in the returned
//! [`ExecutionResult`]; `execute` never returns an error. On the
//! timeout path the whole process tree is terminated (graceful signal,
//! short grace period, forceful kill) and the child is always reaped,
//! so no zombie outlives the call.

use async_trait::async_trait;
use dashmap::DashMap;
use hooksmith_core::constants::{FINAL_REAP_TIMEOUT, TERMINATION_GRACE_PERIOD};
use hooksmith_core::{CommandSpec, ExecutionResult};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::time::{sleep, timeout};

use crate::process::terminate_process_tree;

/// Trait for executing external commands.
///
/// The abstraction exists for the same reason the scheduler takes it
/// by trait object: tests substitute a scripted implementation instead
/// of mocking the operating system.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run one command to completion or timeout. All failures are
    /// encoded in the result.
    async fn execute(&self, spec: &CommandSpec) -> ExecutionResult;
}

/// Production executor backed by real OS processes
pub struct SystemCommandExecutor {
    /// PIDs of commands currently mid-execution, for shutdown cleanup
    active: DashMap<u32, String>,
    grace_period: Duration,
}

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
            grace_period: TERMINATION_GRACE_PERIOD,
        }
    }

    /// PIDs of commands currently executing
    pub fn active_pids(&self) -> Vec<u32> {
        self.active.iter().map(|e| *e.key()).collect()
    }

    /// Terminate every in-flight process group. Used at engine
    /// shutdown; in-flight `execute` calls observe the death as a
    /// normal (failed) completion and reap their own children.
    pub async fn terminate_all(&self) {
        let pids = self.active_pids();
        for pid in pids {
            tracing::warn!(pid, "terminating in-flight process at shutdown");
            terminate_process_tree(pid, self.grace_period).await;
        }
    }

    fn build_command(spec: &CommandSpec) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(spec.args.as_slice())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Overrides merge onto the inherited environment
        for (key, value) in spec.env.iter() {
            cmd.env(key, value);
        }
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        // New process group so the whole subtree is one terminable unit
        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for SystemCommandExecutor {
    async fn execute(&self, spec: &CommandSpec) -> ExecutionResult {
        let start = Instant::now();
        let mut cmd = Self::build_command(spec);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(command = %spec, error = %e, "failed to spawn command");
                return ExecutionResult::failed(
                    spec.clone(),
                    format!("failed to spawn '{}': {e}", spec.program),
                    String::new(),
                    String::new(),
                    start.elapsed(),
                );
            }
        };

        let pid = child.id().unwrap_or(0);
        if pid != 0 {
            self.active.insert(pid, spec.display_line());
        }

        // Stream-capture both pipes off the child so a timeout can
        // still collect partial output
        let stdout_task = child.stdout.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                buf
            })
        });
        let stderr_task = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                buf
            })
        });

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            () = sleep(spec.timeout) => None,
        };

        let result = match waited {
            Some(Ok(status)) => {
                let (stdout, stderr) = drain_output(stdout_task, stderr_task).await;
                match status.code() {
                    Some(code) => ExecutionResult::completed(
                        spec.clone(),
                        code,
                        stdout,
                        stderr,
                        start.elapsed(),
                    ),
                    // Killed by an external signal before exiting
                    None => ExecutionResult::failed(
                        spec.clone(),
                        "process terminated by signal".to_string(),
                        stdout,
                        stderr,
                        start.elapsed(),
                    ),
                }
            }
            Some(Err(e)) => {
                let (stdout, stderr) = drain_output(stdout_task, stderr_task).await;
                ExecutionResult::failed(
                    spec.clone(),
                    format!("failed to wait for process: {e}"),
                    stdout,
                    stderr,
                    start.elapsed(),
                )
            }
            None => {
                tracing::warn!(
                    command = %spec,
                    timeout = ?spec.timeout,
                    pid,
                    "command timed out, terminating process tree"
                );
                terminate_process_tree(pid, self.grace_period).await;

                // Always reap, even here; the wait itself is bounded
                // so a pathological child cannot wedge the engine
                let _ = timeout(FINAL_REAP_TIMEOUT, child.wait()).await;

                let (stdout, stderr) = drain_output(stdout_task, stderr_task).await;
                let mut detail = format!("timed out after {:?}", spec.timeout);
                if !stderr.is_empty() {
                    detail.push_str(&format!("; partial stderr: {}", stderr.trim_end()));
                }
                ExecutionResult::failed(spec.clone(), detail, stdout, stderr, start.elapsed())
            }
        };

        if pid != 0 {
            self.active.remove(&pid);
        }

        tracing::debug!(
            command = %spec,
            exit_code = result.exit_code,
            succeeded = result.succeeded,
            wall_time = ?result.wall_time,
            "command finished"
        );
        result
    }
}

/// Collect whatever the capture tasks managed to read. Bounded so a
/// pipe held open by an unkillable grandchild cannot wedge us.
async fn drain_output(
    stdout_task: Option<tokio::task::JoinHandle<Vec<u8>>>,
    stderr_task: Option<tokio::task::JoinHandle<Vec<u8>>>,
) -> (String, String) {
    let mut stdout = String::new();
    let mut stderr = String::new();

    if let Some(task) = stdout_task {
        if let Ok(Ok(buf)) = timeout(FINAL_REAP_TIMEOUT, task).await {
            stdout = String::from_utf8_lossy(&buf).into_owned();
        }
    }
    if let Some(task) = stderr_task {
        if let Ok(Ok(buf)) = timeout(FINAL_REAP_TIMEOUT, task).await {
            stderr = String::from_utf8_lossy(&buf).into_owned();
        }
    }

    (stdout, stderr)
}

/// Scripted executor for deterministic tests: responses are keyed by
/// the command's display line, and the executor records dispatch order
/// and peak concurrency.
#[cfg(test)]
pub struct TestCommandExecutor {
    responses: parking_lot::Mutex<std::collections::HashMap<String, TestResponse>>,
    dispatched: parking_lot::Mutex<Vec<String>>,
    in_flight: std::sync::atomic::AtomicUsize,
    peak_in_flight: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
#[derive(Clone)]
pub struct TestResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub delay: Duration,
}

#[cfg(test)]
impl Default for TestResponse {
    fn default() -> Self {
        Self {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            delay: Duration::from_millis(5),
        }
    }
}

#[cfg(test)]
impl TestCommandExecutor {
    pub fn new() -> Self {
        Self {
            responses: parking_lot::Mutex::new(std::collections::HashMap::new()),
            dispatched: parking_lot::Mutex::new(Vec::new()),
            in_flight: std::sync::atomic::AtomicUsize::new(0),
            peak_in_flight: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn add_response(&self, display_line: &str, response: TestResponse) {
        self.responses
            .lock()
            .insert(display_line.to_string(), response);
    }

    pub fn add_failure(&self, display_line: &str, exit_code: i32, stderr: &str) {
        self.add_response(
            display_line,
            TestResponse {
                exit_code,
                stderr: stderr.to_string(),
                ..Default::default()
            },
        );
    }

    pub fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl CommandExecutor for TestCommandExecutor {
    async fn execute(&self, spec: &CommandSpec) -> ExecutionResult {
        use std::sync::atomic::Ordering;

        let line = spec.display_line();
        self.dispatched.lock().push(line.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let response = self
            .responses
            .lock()
            .get(&line)
            .cloned()
            .unwrap_or_default();
        sleep(response.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        ExecutionResult::completed(
            spec.clone(),
            response.exit_code,
            response.stdout,
            response.stderr,
            response.delay,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_round_trip() {
        let executor = SystemCommandExecutor::new();
        let spec = CommandSpec::new("echo")
            .arg("hello")
            .timeout(Duration::from_secs(5));

        let result = executor.execute(&spec).await;
        assert_eq!(result.exit_code, 0);
        assert!(result.succeeded);
        assert_eq!(result.stdout, "hello\n");
        assert!(result.error_detail.is_none());
        assert_eq!(result.command.id, spec.id);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_recorded_not_raised() {
        let executor = SystemCommandExecutor::new();
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo oops >&2; exit 3"])
            .timeout(Duration::from_secs(5));

        let result = executor.execute(&spec).await;
        assert_eq!(result.exit_code, 3);
        assert!(!result.succeeded);
        assert_eq!(result.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_encoded_in_result() {
        let executor = SystemCommandExecutor::new();
        let spec = CommandSpec::new("definitely-not-a-real-binary-4242")
            .timeout(Duration::from_secs(1));

        let result = executor.execute(&spec).await;
        assert_eq!(result.exit_code, -1);
        assert!(!result.succeeded);
        let detail = result.error_detail.unwrap();
        assert!(detail.contains("failed to spawn"));
    }

    #[tokio::test]
    async fn test_timeout_kills_within_grace_budget() {
        let executor = SystemCommandExecutor::new();
        let spec = CommandSpec::new("sleep")
            .arg("5")
            .timeout(Duration::from_secs(1));

        let start = Instant::now();
        let result = executor.execute(&spec).await;
        let elapsed = start.elapsed();

        assert_eq!(result.exit_code, -1);
        assert!(!result.succeeded);
        assert!(result.error_detail.unwrap().contains("timed out"));
        // 1s timeout + 0.5s grace, with slack for slow machines
        assert!(elapsed < Duration::from_millis(2500), "took {elapsed:?}");
        // Nothing left mid-execution after the call returns
        assert!(executor.active_pids().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_grandchildren_too() {
        let executor = SystemCommandExecutor::new();
        // The shell parent spawns a sleeping grandchild that would
        // survive a naive single-process kill
        let spec = CommandSpec::new("sh")
            .args(["-c", "sleep 30 & wait"])
            .timeout(Duration::from_millis(300));

        let result = executor.execute(&spec).await;
        assert!(!result.succeeded);
        assert!(executor.active_pids().is_empty());
    }

    #[tokio::test]
    async fn test_env_override_reaches_child() {
        let executor = SystemCommandExecutor::new();
        let spec = CommandSpec::new("sh")
            .args(["-c", "printf '%s' \"$HOOKSMITH_PROBE\""])
            .env_var("HOOKSMITH_PROBE", "present")
            .timeout(Duration::from_secs(5));

        let result = executor.execute(&spec).await;
        assert!(result.succeeded);
        assert_eq!(result.stdout, "present");
    }

    #[tokio::test]
    async fn test_working_dir_is_honored() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let executor = SystemCommandExecutor::new();
        let spec = CommandSpec::new("pwd")
            .working_dir(temp_dir.path())
            .timeout(Duration::from_secs(5));

        let result = executor.execute(&spec).await;
        assert!(result.succeeded);
        let reported = result.stdout.trim_end();
        let expected = temp_dir.path().canonicalize().unwrap();
        assert_eq!(
            std::path::Path::new(reported).canonicalize().unwrap(),
            expected
        );
    }
}
