//! Atomic file replacement for checkpoint and cache writes
//!
//! Readers of a checkpoint or persistent cache entry must never see a
//! half-written file. Writes go to a uniquely named temp file in the
//! target's directory, are synced, and are renamed into place; the
//! parent directory is then synced so the rename itself survives a
//! crash.

use hooksmith_core::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Replace the file at `path` with `content`, creating parent
/// directories as needed. On any error the target is left untouched
/// and the temp file is removed.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::configuration("invalid file path: no parent directory"))?;
    fs::create_dir_all(parent)
        .map_err(|e| Error::file_system(parent.to_path_buf(), "create parent directory", e))?;

    // Same directory as the target so the rename stays on one filesystem
    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));

    if let Err(e) = write_synced(&temp_path, content) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::file_system(path.to_path_buf(), "atomic rename", e)
    })?;

    // Sync the directory entry too; the file data alone does not make
    // the rename durable
    #[cfg(unix)]
    {
        let dir = fs::File::open(parent)
            .map_err(|e| Error::file_system(parent.to_path_buf(), "open parent directory", e))?;
        dir.sync_all()
            .map_err(|e| Error::file_system(parent.to_path_buf(), "sync parent directory", e))?;
    }

    Ok(())
}

/// String-content variant of [`write_atomic`]
pub fn write_atomic_string(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

fn write_synced(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| Error::file_system(path.to_path_buf(), "create temporary file", e))?;
    file.write_all(content)
        .map_err(|e| Error::file_system(path.to_path_buf(), "write temporary file", e))?;
    file.sync_all()
        .map_err(|e| Error::file_system(path.to_path_buf(), "sync temporary file", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("state.json");

        write_atomic_string(&file_path, "{\"step\": 1}").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{\"step\": 1}");
    }

    #[test]
    fn test_creates_missing_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("a").join("b").join("state.json");

        write_atomic_string(&file_path, "nested").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "nested");
    }

    #[test]
    fn test_replaces_existing_content() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("state.json");

        fs::write(&file_path, "old").unwrap();
        write_atomic_string(&file_path, "new").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new");
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("state.json");

        write_atomic_string(&file_path, "content").unwrap();

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_file_blocking_parent_path_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "a plain file").unwrap();

        // The parent "directory" is a file; nothing can be written below it
        let target = blocker.join("state.json");
        assert!(write_atomic_string(&target, "x").is_err());
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "a plain file");
    }
}
