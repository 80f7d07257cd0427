//! Health monitoring for long-running helper processes
//!
//! The supervisor observes; it never restarts. Each scan marks every
//! registered process `Running`, `Unhealthy`, or `Dead`, and a process
//! seen dead on two consecutive scans is dropped from the registry.
//! Callers that want a replacement watch the status themselves and
//! report the restart with [`ProcessSupervisor::record_restart`].

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hooksmith_core::ProcessStatus;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::process::is_process_running;

/// Consecutive dead scans before a process is dropped from the registry
const DEAD_SCANS_BEFORE_REAP: u32 = 2;

/// Optional liveness probe beyond "the PID exists". Returning `false`
/// marks the process `Unhealthy` without unregistering it.
pub type HealthCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// One monitored process as seen at the last scan
#[derive(Debug, Clone, Serialize)]
pub struct SupervisedProcess {
    pub name: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub status: ProcessStatus,
    pub restart_count: u32,
}

struct Entry {
    process: SupervisedProcess,
    health_check: Option<HealthCheck>,
    dead_scans: u32,
}

pub struct ProcessSupervisor {
    entries: DashMap<String, Entry>,
    interval: Duration,
    shutdown: Notify,
}

impl ProcessSupervisor {
    pub fn new(interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            interval,
            shutdown: Notify::new(),
        }
    }

    /// Start watching `pid` under `name`. Re-registering a name
    /// replaces the previous entry.
    pub fn register(&self, name: impl Into<String>, pid: u32, health_check: Option<HealthCheck>) {
        let name = name.into();
        tracing::debug!(name = %name, pid, "supervising process");
        self.entries.insert(
            name.clone(),
            Entry {
                process: SupervisedProcess {
                    name,
                    pid,
                    started_at: Utc::now(),
                    status: ProcessStatus::Running,
                    restart_count: 0,
                },
                health_check,
                dead_scans: 0,
            },
        );
    }

    /// Stop watching `name`, returning its last observed state
    pub fn unregister(&self, name: &str) -> Option<SupervisedProcess> {
        self.entries.remove(name).map(|(_, entry)| entry.process)
    }

    /// Last observed status; `Missing` for names never registered or
    /// already reaped
    pub fn status(&self, name: &str) -> ProcessStatus {
        self.entries
            .get(name)
            .map(|entry| entry.process.status)
            .unwrap_or(ProcessStatus::Missing)
    }

    /// Snapshot of every supervised process
    pub fn processes(&self) -> Vec<SupervisedProcess> {
        self.entries.iter().map(|e| e.process.clone()).collect()
    }

    /// The caller restarted a process under an existing name; reset its
    /// tracking to the new PID
    pub fn record_restart(&self, name: &str, new_pid: u32) {
        if let Some(mut entry) = self.entries.get_mut(name) {
            entry.process.pid = new_pid;
            entry.process.started_at = Utc::now();
            entry.process.status = ProcessStatus::Running;
            entry.process.restart_count += 1;
            entry.dead_scans = 0;
            tracing::info!(
                name,
                pid = new_pid,
                restarts = entry.process.restart_count,
                "supervised process restarted by owner"
            );
        }
    }

    /// Scan every registered process once and update its status.
    /// Processes dead for `DEAD_SCANS_BEFORE_REAP` consecutive scans
    /// are removed.
    pub fn check_all(&self) {
        let mut reap = Vec::new();

        for mut entry in self.entries.iter_mut() {
            let alive = is_process_running(entry.process.pid);
            if !alive {
                entry.dead_scans += 1;
                if entry.process.status != ProcessStatus::Dead {
                    tracing::warn!(
                        name = %entry.process.name,
                        pid = entry.process.pid,
                        "supervised process is dead"
                    );
                }
                entry.process.status = ProcessStatus::Dead;
                if entry.dead_scans >= DEAD_SCANS_BEFORE_REAP {
                    reap.push(entry.process.name.clone());
                }
                continue;
            }

            entry.dead_scans = 0;
            let healthy = entry.health_check.as_ref().map(|hc| hc()).unwrap_or(true);
            if healthy {
                entry.process.status = ProcessStatus::Running;
            } else {
                if entry.process.status != ProcessStatus::Unhealthy {
                    tracing::warn!(
                        name = %entry.process.name,
                        pid = entry.process.pid,
                        "supervised process failed its health check"
                    );
                }
                entry.process.status = ProcessStatus::Unhealthy;
            }
        }

        for name in reap {
            tracing::info!(name = %name, "dropping dead process from supervision");
            self.entries.remove(&name);
        }
    }

    /// Run the periodic scan loop until [`stop`](Self::stop) is called
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = self.shutdown.notified() => break,
                    () = sleep(self.interval) => self.check_all(),
                }
            }
            tracing::debug!("supervision loop stopped");
        })
    }

    /// Stop the scan loop started by [`spawn`](Self::spawn)
    pub fn stop(&self) {
        self.shutdown.notify_waiters();
    }
}
