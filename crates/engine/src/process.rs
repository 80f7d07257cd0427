//! Platform process-tree control
//!
//! Every process the engine spawns is the leader of its own process
//! group (or the root of a job tree on Windows), so the whole subtree
//! can be terminated as one unit. This module is the only place that
//! branches on platform; executor and scheduler code call
//! [`terminate_process_tree`] and never look at `cfg` themselves.

use std::time::Duration;
use tokio::time::sleep;

/// Check if a process with the given PID is running
pub fn is_process_running(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    if pid == std::process::id() {
        return true;
    }

    #[cfg(unix)]
    {
        // Signal 0 probes existence without delivering anything
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    #[cfg(not(unix))]
    {
        // Conservatively assume it is running so callers never treat a
        // live process as reapable
        true
    }
}

/// Terminate a process and all of its descendants: graceful signal
/// first, then a forceful kill for any survivors after `grace`.
///
/// The caller must still reap the direct child (a final `wait`) after
/// this returns; termination alone does not collect the exit status.
pub async fn terminate_process_tree(pid: u32, grace: Duration) {
    if pid == 0 {
        return;
    }

    #[cfg(unix)]
    {
        let pgid = pid as libc::pid_t;
        unsafe {
            libc::killpg(pgid, libc::SIGTERM);
        }

        sleep(grace).await;

        let any_survivor = unsafe { libc::killpg(pgid, 0) == 0 };
        if any_survivor {
            tracing::debug!(pid, "process group survived SIGTERM, sending SIGKILL");
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }

    #[cfg(not(unix))]
    {
        // taskkill /T walks the child tree for us
        let _ = tokio::process::Command::new("taskkill")
            .args(["/T", "/F", "/PID", &pid.to_string()])
            .output()
            .await;
        let _ = grace;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_is_running() {
        assert!(is_process_running(std::process::id()));
    }

    #[test]
    fn test_pid_zero_is_not_running() {
        assert!(!is_process_running(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_kills_the_whole_group() {
        use std::os::unix::process::CommandExt;
        use std::process::{Command, Stdio};

        // A shell that spawns a grandchild; both live in one group
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 30 & wait"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd.process_group(0);
        let mut child = cmd.spawn().expect("spawn sh");
        let pid = child.id();

        assert!(is_process_running(pid));
        terminate_process_tree(pid, Duration::from_millis(100)).await;

        // Reap the direct child, then verify nothing is left
        let _ = child.wait();
        assert!(!is_process_running(pid));
    }
}
