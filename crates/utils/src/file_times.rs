//! Modification-time snapshots for file-derived cache entries
//!
//! A cache entry that was computed from files on disk records a
//! [`FileTimes`] snapshot at store time; at lookup time the snapshot is
//! compared against the current filesystem state and any mismatch
//! invalidates the entry regardless of remaining TTL.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Observation {
    mtime: Option<SystemTime>,
    exists: bool,
}

/// Snapshot of last-seen modification times for a set of paths
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileTimes {
    files: HashMap<PathBuf, Observation>,
}

impl FileTimes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current state of every path in `paths`
    pub fn capture<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut times = Self::new();
        for path in paths {
            times.watch(path);
        }
        times
    }

    /// Add a path to the snapshot, recording its current state
    pub fn watch(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let observed = Self::observe(&path);
        self.files.insert(path, observed);
    }

    /// True if any tracked path has changed mtime or existence since capture
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.files
            .iter()
            .any(|(path, seen)| Self::observe(path) != *seen)
    }

    /// Paths that have changed since capture
    #[must_use]
    pub fn stale_paths(&self) -> Vec<&Path> {
        self.files
            .iter()
            .filter(|(path, seen)| Self::observe(path) != **seen)
            .map(|(path, _)| path.as_path())
            .collect()
    }

    /// Re-snapshot every tracked path
    pub fn refresh(&mut self) {
        let paths: Vec<_> = self.files.keys().cloned().collect();
        for path in paths {
            let observed = Self::observe(&path);
            self.files.insert(path, observed);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn observe(path: &Path) -> Observation {
        match fs::metadata(path) {
            Ok(metadata) => Observation {
                mtime: metadata.modified().ok(),
                exists: true,
            },
            Err(_) => Observation {
                mtime: None,
                exists: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_detects_modification() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("watched.txt");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "one").unwrap();
        drop(file);

        let times = FileTimes::capture([&file_path]);
        assert!(!times.is_stale());

        // mtime granularity can be coarse; give it room to differ
        std::thread::sleep(std::time::Duration::from_millis(20));
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "two").unwrap();
        drop(file);

        assert!(times.is_stale());
        assert_eq!(times.stale_paths(), vec![file_path.as_path()]);
    }

    #[test]
    fn test_detects_deletion() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("watched.txt");
        fs::write(&file_path, "content").unwrap();

        let times = FileTimes::capture([&file_path]);
        assert!(!times.is_stale());

        fs::remove_file(&file_path).unwrap();
        assert!(times.is_stale());
    }

    #[test]
    fn test_missing_file_is_stable_until_created() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("not-yet.txt");

        let times = FileTimes::capture([&file_path]);
        assert!(!times.is_stale());

        fs::write(&file_path, "now it exists").unwrap();
        assert!(times.is_stale());
    }

    #[test]
    fn test_refresh_clears_staleness() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("watched.txt");
        fs::write(&file_path, "one").unwrap();

        let mut times = FileTimes::capture([&file_path]);
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(&file_path, "two").unwrap();
        assert!(times.is_stale());

        times.refresh();
        assert!(!times.is_stale());
    }
}
