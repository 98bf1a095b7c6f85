//! Test fixtures for storage engines and backends.

use dirstore_backend::{BackendConfig, DefaultEntryCache, Dn, Entry, EntryId, RootContainer};
use dirstore_core::{JournalStorage, Storage, StorageConfig};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Opens an in-memory engine.
pub fn memory_storage() -> JournalStorage {
    let storage = JournalStorage::in_memory();
    storage.open().expect("Failed to open in-memory storage");
    storage
}

/// An open engine in a temporary directory.
pub struct TestStorage {
    /// The engine.
    pub storage: JournalStorage,
    temp_dir: TempDir,
}

impl TestStorage {
    /// Creates and opens an engine in a fresh temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage = JournalStorage::new(StorageConfig::directory(temp_dir.path()));
        storage.open().expect("Failed to open file storage");
        Self { storage, temp_dir }
    }

    /// The storage directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Closes the engine and opens a new one on the same directory.
    pub fn reopen(&mut self) {
        self.storage.close();
        self.storage = JournalStorage::new(StorageConfig::directory(self.temp_dir.path()));
        self.storage.open().expect("Failed to reopen file storage");
    }
}

impl std::ops::Deref for TestStorage {
    type Target = JournalStorage;

    fn deref(&self) -> &Self::Target {
        &self.storage
    }
}

/// An open backend with a shared [`DefaultEntryCache`].
pub struct TestBackend {
    /// The root container.
    pub root: RootContainer<JournalStorage>,
    /// The entry cache used by every suffix.
    pub cache: Arc<DefaultEntryCache>,
    _temp_dir: Option<TempDir>,
}

impl TestBackend {
    /// Creates an in-memory backend serving `base_dns`.
    pub fn memory(base_dns: &[&str]) -> Self {
        Self::build(config(base_dns), None)
    }

    /// Creates a backend in a temporary directory serving `base_dns`.
    pub fn file(base_dns: &[&str]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = config(base_dns).db_directory(temp_dir.path().join("userRoot"));
        Self::build(config, Some(temp_dir))
    }

    fn build(config: BackendConfig, temp_dir: Option<TempDir>) -> Self {
        let cache = Arc::new(DefaultEntryCache::default());
        let root = RootContainer::with_journal_storage(config, cache.clone())
            .expect("Failed to create root container");
        root.open().expect("Failed to open root container");
        Self {
            root,
            cache,
            _temp_dir: temp_dir,
        }
    }

    /// Adds an entry with no attributes to the suffix holding `dn`.
    pub fn add(&self, dn: &str, id: u64) -> Entry {
        let entry = Entry::new(dn_of(dn)).with_attribute("description", [format!("entry {id}")]);
        self.root
            .get_suffix_container(entry.dn())
            .expect("No suffix holds the entry")
            .add_entry(&entry, EntryId::new(id))
            .expect("Failed to add entry");
        entry
    }
}

impl std::ops::Deref for TestBackend {
    type Target = RootContainer<JournalStorage>;

    fn deref(&self) -> &Self::Target {
        &self.root
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.root.close();
    }
}

fn config(base_dns: &[&str]) -> BackendConfig {
    base_dns
        .iter()
        .fold(BackendConfig::new("userRoot"), |config, dn| config.base_dn(dn_of(dn)))
}

/// Parses a DN, panicking on invalid input.
pub fn dn_of(text: &str) -> Dn {
    text.parse().expect("Invalid DN")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_adds_entries() {
        let backend = TestBackend::memory(&["dc=example,dc=com"]);
        backend.add("dc=example,dc=com", 1);
        assert_eq!(backend.get_entry_count(), Some(1));
    }

    #[test]
    fn file_storage_reopens() {
        let mut storage = TestStorage::file();
        assert!(storage.path().join("journal.dsj").exists());
        storage.reopen();
        assert!(storage.is_open());
    }
}
