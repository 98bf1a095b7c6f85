//! Storage engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Where the engine keeps its journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// Keep everything in memory. Survives close/reopen of the same engine
    /// instance, but not the process.
    Memory,
    /// Keep the journal inside this directory.
    Directory(PathBuf),
}

/// Configuration for opening a [`crate::JournalStorage`].
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Where the journal lives.
    pub location: StorageLocation,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the journal after every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Maximum attempts per operation under conflicts (`None` = unbounded).
    pub max_attempts: Option<u32>,

    /// Linear backoff unit between conflicting attempts.
    ///
    /// Attempt `n` sleeps `n * retry_backoff`; a zero backoff yields the
    /// thread instead.
    pub retry_backoff: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            location: StorageLocation::Memory,
            create_if_missing: true,
            sync_on_commit: true,
            max_attempts: None,
            retry_backoff: Duration::ZERO,
        }
    }
}

impl StorageConfig {
    /// Creates an in-memory configuration with default values.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Creates a configuration storing the journal under `path`.
    #[must_use]
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StorageLocation::Directory(path.into()),
            ..Self::default()
        }
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the journal on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Caps the number of attempts per operation.
    #[must_use]
    pub const fn max_attempts(mut self, value: Option<u32>) -> Self {
        self.max_attempts = value;
        self
    }

    /// Sets the linear backoff unit between conflicting attempts.
    #[must_use]
    pub const fn retry_backoff(mut self, value: Duration) -> Self {
        self.retry_backoff = value;
        self
    }
}
