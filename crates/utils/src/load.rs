//! Load-shedding counters for caller-side admission decisions
//!
//! The balancer does not gate anything itself; it tracks active and
//! queued operation counts plus a rolling window of recent durations,
//! and callers consult `can_execute_now`/`should_queue` to decide
//! whether to start, queue, or shed a unit of work.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// How many recent operation durations to keep for averaging
const DURATION_WINDOW: usize = 64;

#[derive(Debug, Default)]
struct LoadState {
    active: usize,
    queued: usize,
    recent_durations: VecDeque<Duration>,
}

/// Point-in-time load snapshot
#[derive(Debug, Clone, Serialize)]
pub struct LoadSnapshot {
    pub active: usize,
    pub queued: usize,
    pub load_factor: f64,
    pub average_operation_time: Duration,
}

#[derive(Debug)]
pub struct LoadBalancer {
    max_concurrent: usize,
    queue_limit: usize,
    state: Mutex<LoadState>,
}

impl LoadBalancer {
    pub fn new(max_concurrent: usize, queue_limit: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            queue_limit,
            state: Mutex::new(LoadState::default()),
        }
    }

    /// True when another operation may start immediately
    pub fn can_execute_now(&self) -> bool {
        self.state.lock().active < self.max_concurrent
    }

    /// True when there is still room in the queue
    pub fn should_queue(&self) -> bool {
        self.state.lock().queued < self.queue_limit
    }

    /// An operation entered the queue
    pub fn enqueue(&self) {
        self.state.lock().queued += 1;
    }

    /// An operation left the queue (started or was shed)
    pub fn dequeue(&self) {
        let mut state = self.state.lock();
        state.queued = state.queued.saturating_sub(1);
    }

    /// An operation started executing
    pub fn start_operation(&self) {
        self.state.lock().active += 1;
    }

    /// An operation finished; its duration enters the rolling window
    pub fn end_operation(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.active = state.active.saturating_sub(1);
        if state.recent_durations.len() == DURATION_WINDOW {
            state.recent_durations.pop_front();
        }
        state.recent_durations.push_back(duration);
    }

    /// Mean of the rolling duration window; zero when empty
    pub fn average_operation_time(&self) -> Duration {
        let state = self.state.lock();
        if state.recent_durations.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = state.recent_durations.iter().sum();
        total / state.recent_durations.len() as u32
    }

    /// Active operations as a fraction of the concurrency bound, in [0, 1]
    pub fn load_factor(&self) -> f64 {
        let state = self.state.lock();
        (state.active as f64 / self.max_concurrent as f64).clamp(0.0, 1.0)
    }

    pub fn snapshot(&self) -> LoadSnapshot {
        let (active, queued) = {
            let state = self.state.lock();
            (state.active, state.queued)
        };
        LoadSnapshot {
            active,
            queued,
            load_factor: self.load_factor(),
            average_operation_time: self.average_operation_time(),
        }
    }
}
