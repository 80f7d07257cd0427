//! Best-effort checkpoint persistence for resumable multi-step operations
//!
//! One JSON file per task id under a configurable directory, written
//! atomically. Last write wins; there is no locking beyond filesystem
//! rename atomicity. A checkpoint that fails to parse is treated as
//! absent and removed.

use crate::atomic_file::write_atomic_string;
use chrono::{DateTime, Utc};
use hooksmith_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointEnvelope<T> {
    task_id: String,
    saved_at: DateTime<Utc>,
    state: T,
}

/// Saves, loads, and clears per-task checkpoint files
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a manager rooted at `dir`, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::file_system(&dir, "create checkpoint directory", e))?;
        Ok(Self { dir })
    }

    /// Persist `state` for `task_id`, replacing any previous checkpoint
    pub fn save<T: Serialize>(&self, task_id: &str, state: &T) -> Result<()> {
        let envelope = CheckpointEnvelope {
            task_id: task_id.to_string(),
            saved_at: Utc::now(),
            state,
        };
        let json = serde_json::to_string_pretty(&envelope)?;
        let path = self.path_for(task_id);
        write_atomic_string(&path, &json)?;
        tracing::debug!(task_id, path = %path.display(), "checkpoint saved");
        Ok(())
    }

    /// Load the checkpoint for `task_id`, or `None` when absent or
    /// unreadable. A corrupt file is evicted so the next load is a
    /// clean miss.
    pub fn load<T: DeserializeOwned>(&self, task_id: &str) -> Result<Option<T>> {
        let path = self.path_for(task_id);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::file_system(&path, "read checkpoint", e)),
        };

        match serde_json::from_str::<CheckpointEnvelope<T>>(&json) {
            Ok(envelope) => Ok(Some(envelope.state)),
            Err(e) => {
                tracing::warn!(
                    task_id,
                    path = %path.display(),
                    error = %e,
                    "corrupt checkpoint discarded"
                );
                let _ = fs::remove_file(&path);
                Ok(None)
            }
        }
    }

    /// Remove the checkpoint for `task_id`, if any
    pub fn clear(&self, task_id: &str) -> Result<()> {
        let path = self.path_for(task_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::file_system(&path, "remove checkpoint", e)),
        }
    }

    /// The file backing `task_id`'s checkpoint
    pub fn path_for(&self, task_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_task_id(task_id)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Map a task id onto a safe file stem. Distinct ids that sanitize to
/// the same text are disambiguated with a content hash suffix.
fn sanitize_task_id(task_id: &str) -> String {
    let safe: String = task_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe == task_id {
        safe
    } else {
        // Cheap stable hash; collisions only matter within one engine's
        // checkpoint directory
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in task_id.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        format!("{safe}-{hash:08x}")
    }
}
