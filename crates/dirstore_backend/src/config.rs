//! Backend configuration.

use crate::dn::Dn;
use crate::error::{BackendError, BackendResult};
use dirstore_core::StorageConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration of one directory backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend identifier, recorded as the owner of cached entries.
    pub backend_id: String,
    /// Directory holding the backend volume; `None` keeps it in memory.
    pub db_directory: Option<PathBuf>,
    /// Unix mode applied to `db_directory`.
    pub db_directory_permissions: u32,
    /// The suffixes served by the backend.
    pub base_dns: Vec<Dn>,
    /// Sync the journal after every commit.
    pub sync_on_commit: bool,
    /// Cap on transaction attempts, `None` for unbounded retry.
    pub max_attempts: Option<u32>,
    /// Linear backoff between conflicting attempts.
    pub retry_backoff: Duration,
}

impl BackendConfig {
    /// Default permissions of the backend directory (owner only).
    pub const DEFAULT_PERMISSIONS: u32 = 0o700;

    /// Creates an in-memory backend configuration.
    #[must_use]
    pub fn new(backend_id: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
            db_directory: None,
            db_directory_permissions: Self::DEFAULT_PERMISSIONS,
            base_dns: Vec::new(),
            sync_on_commit: true,
            max_attempts: None,
            retry_backoff: Duration::ZERO,
        }
    }

    /// Stores the backend volume in `path`.
    #[must_use]
    pub fn db_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_directory = Some(path.into());
        self
    }

    /// Sets the directory permissions.
    #[must_use]
    pub const fn db_directory_permissions(mut self, mode: u32) -> Self {
        self.db_directory_permissions = mode;
        self
    }

    /// Adds a suffix.
    #[must_use]
    pub fn base_dn(mut self, dn: Dn) -> Self {
        self.base_dns.push(dn);
        self
    }

    /// Sets whether commits are synced.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the attempt cap.
    #[must_use]
    pub const fn max_attempts(mut self, value: Option<u32>) -> Self {
        self.max_attempts = value;
        self
    }

    /// Sets the retry backoff.
    #[must_use]
    pub const fn retry_backoff(mut self, value: Duration) -> Self {
        self.retry_backoff = value;
        self
    }

    /// Checks the settings that can be checked without touching the disk.
    pub fn validate(&self) -> BackendResult<()> {
        if self.backend_id.trim().is_empty() {
            return Err(BackendError::config("backend id must not be empty"));
        }
        if self.db_directory_permissions & !0o777 != 0 {
            return Err(BackendError::config(format!(
                "invalid directory permissions {:o}",
                self.db_directory_permissions
            )));
        }
        if self.db_directory_permissions & 0o700 != 0o700 {
            return Err(BackendError::config(format!(
                "directory permissions {:o} must grant the owner read, write and execute",
                self.db_directory_permissions
            )));
        }
        Ok(())
    }

    /// Derives the storage engine configuration.
    #[must_use]
    pub fn storage_config(&self) -> StorageConfig {
        let base = match &self.db_directory {
            Some(path) => StorageConfig::directory(path),
            None => StorageConfig::in_memory(),
        };
        base.sync_on_commit(self.sync_on_commit)
            .max_attempts(self.max_attempts)
            .retry_backoff(self.retry_backoff)
    }
}

/// Parses an octal mode such as `700`.
pub fn parse_permissions(text: &str) -> BackendResult<u32> {
    u32::from_str_radix(text.trim(), 8)
        .map_err(|_| BackendError::config(format!("invalid octal permissions {text:?}")))
}
