//! Storage directory management.
//!
//! A directory-backed engine lays its files out as:
//!
//! ```text
//! <db_directory>/
//! ├─ LOCK           # Advisory lock, held while the engine is open
//! └─ journal.dsj    # Checksummed commit frames for every tree
//! ```

use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "journal.dsj";

/// An open storage directory holding the exclusive lock.
///
/// Dropping the value releases the lock.
#[derive(Debug)]
pub struct StorageDir {
    path: PathBuf,
    _lock_file: File,
}

impl StorageDir {
    /// Opens a storage directory and takes its lock.
    ///
    /// # Errors
    ///
    /// - the directory is missing and `create_if_missing` is false
    /// - the path exists but is not a directory
    /// - another process holds the lock ([`StorageError::Locked`])
    pub fn open(path: &Path, create_if_missing: bool) -> StorageResult<Self> {
        if !path.exists() {
            if !create_if_missing {
                return Err(StorageError::invalid_operation(format!(
                    "storage directory does not exist: {}",
                    path.display()
                )));
            }
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(StorageError::invalid_operation(format!(
                "storage path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the journal file.
    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        Self::journal_path_in(&self.path)
    }

    /// Returns the journal path inside `dir` without opening it.
    #[must_use]
    pub fn journal_path_in(dir: &Path) -> PathBuf {
        dir.join(JOURNAL_FILE)
    }

    /// Removes every file the engine owns under `dir`.
    ///
    /// The directory itself is kept so that its permissions survive an
    /// import. Missing files are ignored.
    pub fn remove_files(dir: &Path) -> StorageResult<()> {
        for name in [JOURNAL_FILE, LOCK_FILE] {
            match fs::remove_file(dir.join(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_directory_and_lock() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("userRoot");

        let dir = StorageDir::open(&path, true).unwrap();
        assert!(path.is_dir());
        assert!(path.join(LOCK_FILE).exists());
        assert_eq!(dir.journal_path(), path.join("journal.dsj"));
    }

    #[test]
    fn missing_directory_without_create_fails() {
        let temp = tempdir().unwrap();
        let result = StorageDir::open(&temp.path().join("absent"), false);
        assert!(matches!(result, Err(StorageError::InvalidOperation { .. })));
    }

    #[test]
    fn second_open_is_locked_out() {
        let temp = tempdir().unwrap();
        let _first = StorageDir::open(temp.path(), true).unwrap();
        assert!(matches!(
            StorageDir::open(temp.path(), true),
            Err(StorageError::Locked)
        ));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        drop(StorageDir::open(temp.path(), true).unwrap());
        assert!(StorageDir::open(temp.path(), true).is_ok());
    }

    #[test]
    fn remove_files_keeps_directory() {
        let temp = tempdir().unwrap();
        let journal = StorageDir::journal_path_in(temp.path());
        fs::write(&journal, b"frames").unwrap();

        StorageDir::remove_files(temp.path()).unwrap();
        assert!(!journal.exists());
        assert!(temp.path().is_dir());
        StorageDir::remove_files(temp.path()).unwrap();
    }
}
