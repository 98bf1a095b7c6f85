//! The root container of a backend.

use crate::cache::EntryCache;
use crate::config::BackendConfig;
use crate::dn::Dn;
use crate::entry::{Entry, EntryId};
use crate::error::{BackendError, BackendResult};
use crate::suffix::SuffixContainer;
use dirstore_core::{Importer, JournalStorage, Storage, StorageError};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Owns every suffix of a backend and the storage engine they share.
pub struct RootContainer<S> {
    config: BackendConfig,
    storage: Arc<S>,
    suffixes: Vec<SuffixContainer<S>>,
    by_base_dn: HashMap<Dn, usize>,
    open: AtomicBool,
}

impl RootContainer<JournalStorage> {
    /// Creates a root container over a [`JournalStorage`] configured from
    /// `config`.
    pub fn with_journal_storage(
        config: BackendConfig,
        cache: Arc<dyn EntryCache>,
    ) -> BackendResult<Self> {
        let storage = Arc::new(JournalStorage::new(config.storage_config()));
        Self::new(config, storage, cache)
    }
}

impl<S: Storage> RootContainer<S> {
    /// Registers one suffix container per configured base DN.
    ///
    /// Fails if a base DN is configured twice or two base DNs map to the
    /// same tree prefix.
    pub fn new(
        config: BackendConfig,
        storage: Arc<S>,
        cache: Arc<dyn EntryCache>,
    ) -> BackendResult<Self> {
        config.validate()?;
        let mut suffixes = Vec::with_capacity(config.base_dns.len());
        let mut by_base_dn = HashMap::new();
        let mut prefixes = HashSet::new();

        for base_dn in &config.base_dns {
            if by_base_dn.contains_key(base_dn) {
                return Err(BackendError::config(format!(
                    "base DN {base_dn} is configured more than once"
                )));
            }
            let suffix = SuffixContainer::new(
                config.backend_id.clone(),
                base_dn.clone(),
                Arc::clone(&storage),
                Arc::clone(&cache),
            );
            if suffix.prefix().is_empty() {
                return Err(BackendError::config(format!(
                    "base DN {base_dn:?} yields an empty tree prefix"
                )));
            }
            if !prefixes.insert(suffix.prefix().to_string()) {
                return Err(BackendError::config(format!(
                    "base DN {base_dn} maps to tree prefix {} which is already in use",
                    suffix.prefix()
                )));
            }
            info!(backend = %config.backend_id, %base_dn, prefix = suffix.prefix(), "registered suffix");
            by_base_dn.insert(base_dn.clone(), suffixes.len());
            suffixes.push(suffix);
        }

        Ok(Self {
            config,
            storage,
            suffixes,
            by_base_dn,
            open: AtomicBool::new(false),
        })
    }

    /// The backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// The shared storage engine.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Registered base DNs, in configuration order.
    pub fn base_dns(&self) -> impl Iterator<Item = &Dn> {
        self.suffixes.iter().map(SuffixContainer::base_dn)
    }

    /// Registered suffix containers, in configuration order.
    pub fn suffix_containers(&self) -> &[SuffixContainer<S>] {
        &self.suffixes
    }

    /// Returns true while the container is open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Returns the suffix holding `dn`: the one whose base DN is the
    /// nearest ancestor of `dn` (or `dn` itself).
    pub fn get_suffix_container(&self, dn: &Dn) -> Option<&SuffixContainer<S>> {
        dn.ancestors()
            .find_map(|ancestor| self.by_base_dn.get(&ancestor))
            .map(|index| &self.suffixes[*index])
    }

    /// Prepares the backend directory, opens the storage engine and then
    /// every suffix.
    pub fn open(&self) -> BackendResult<()> {
        if self.is_open() {
            return Ok(());
        }
        self.prepare_directory()?;
        self.storage.open()?;
        for suffix in &self.suffixes {
            if let Err(e) = suffix.open() {
                self.close_all();
                return Err(e);
            }
        }
        self.mark_open("root container opened");
        Ok(())
    }

    /// Opens the storage engine and every suffix without writing anything.
    ///
    /// The backend directory is left as it is, and suffixes whose trees do
    /// not exist read as empty.
    pub fn open_read_only(&self) -> BackendResult<()> {
        if self.is_open() {
            return Ok(());
        }
        self.storage.open()?;
        for suffix in &self.suffixes {
            suffix.open_read_only();
        }
        self.mark_open("root container opened read-only");
        Ok(())
    }

    fn mark_open(&self, message: &str) {
        self.open.store(true, Ordering::Release);
        info!(
            backend = %self.config.backend_id,
            suffixes = self.suffixes.len(),
            "{message}"
        );
    }

    /// Closes every suffix, then the storage engine.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.close_all();
            info!(backend = %self.config.backend_id, "root container closed");
        }
    }

    fn close_all(&self) {
        for suffix in &self.suffixes {
            suffix.close();
        }
        self.storage.close();
    }

    /// Total number of entries, or `None` if any suffix cannot tell.
    pub fn get_entry_count(&self) -> Option<u64> {
        sum_entry_counts(self.suffixes.iter().map(SuffixContainer::entry_count))
    }

    /// Replaces the backend contents with `entries`.
    ///
    /// The container must be closed. The storage engine is closed again
    /// when the import finishes, whether or not it succeeded.
    pub fn import<I>(&self, entries: I) -> BackendResult<u64>
    where
        I: IntoIterator<Item = (EntryId, Entry)>,
    {
        if self.is_open() {
            return Err(StorageError::invalid_operation("import requires a closed backend").into());
        }
        self.prepare_directory()?;

        let mut importer = self.storage.start_import()?;
        match self.load(&mut importer, entries) {
            Ok(count) => {
                importer.close()?;
                info!(backend = %self.config.backend_id, entries = count, "backend import complete");
                Ok(count)
            }
            Err(e) => {
                drop(importer);
                self.storage.close();
                Err(e)
            }
        }
    }

    fn load<I>(&self, importer: &mut S::Importer<'_>, entries: I) -> BackendResult<u64>
    where
        I: IntoIterator<Item = (EntryId, Entry)>,
    {
        for suffix in &self.suffixes {
            importer.create_tree(suffix.dn2id().tree())?;
            importer.create_tree(suffix.id2entry().tree())?;
        }
        let mut count = 0;
        for (entry_id, entry) in entries {
            let suffix = self
                .get_suffix_container(entry.dn())
                .ok_or_else(|| BackendError::NoSuchSuffix {
                    dn: entry.dn().clone(),
                })?;
            let key = suffix.dn2id().key_for(entry.dn())?;
            importer.put(suffix.dn2id().tree(), &key, &entry_id.to_key())?;
            importer.put(suffix.id2entry().tree(), &entry_id.to_key(), &entry.encode()?)?;
            count += 1;
        }
        Ok(count)
    }

    fn prepare_directory(&self) -> BackendResult<()> {
        match &self.config.db_directory {
            Some(path) => prepare_directory(path, self.config.db_directory_permissions),
            None => Ok(()),
        }
    }
}

impl<S> Drop for RootContainer<S> {
    fn drop(&mut self) {
        if self.open.load(Ordering::Acquire) {
            warn!(backend = %self.config.backend_id, "root container dropped while open");
        }
    }
}

impl<S> std::fmt::Debug for RootContainer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootContainer")
            .field("backend_id", &self.config.backend_id)
            .field("suffixes", &self.suffixes)
            .field("open", &self.open.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Adds up per-suffix entry counts. Any unknown count makes the total
/// unknown.
pub fn sum_entry_counts<I>(counts: I) -> Option<u64>
where
    I: IntoIterator<Item = Option<u64>>,
{
    counts
        .into_iter()
        .try_fold(0u64, |total, count| count.map(|count| total.saturating_add(count)))
}

/// Creates the backend directory if needed and applies `permissions`.
fn prepare_directory(path: &Path, permissions: u32) -> BackendResult<()> {
    if path.exists() && !path.is_dir() {
        return Err(BackendError::config(format!(
            "backend path {} is not a directory",
            path.display()
        )));
    }
    fs::create_dir_all(path).map_err(|e| {
        BackendError::config(format!("cannot create backend directory {}: {e}", path.display()))
    })?;
    apply_permissions(path, permissions)
}

#[cfg(unix)]
fn apply_permissions(path: &Path, permissions: u32) -> BackendResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(permissions)).map_err(|e| {
        BackendError::config(format!(
            "cannot set permissions {permissions:o} on {}: {e}",
            path.display()
        ))
    })
}

#[cfg(not(unix))]
fn apply_permissions(_path: &Path, _permissions: u32) -> BackendResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DefaultEntryCache;

    fn dn(text: &str) -> Dn {
        text.parse().unwrap()
    }

    fn config() -> BackendConfig {
        BackendConfig::new("userRoot")
            .base_dn(dn("dc=example,dc=com"))
            .base_dn(dn("ou=special,dc=example,dc=com"))
            .base_dn(dn("dc=example,dc=org"))
    }

    fn root(config: BackendConfig) -> RootContainer<JournalStorage> {
        RootContainer::with_journal_storage(config, Arc::new(DefaultEntryCache::default())).unwrap()
    }

    #[test]
    fn counts_are_unknown_if_any_suffix_is_unknown() {
        assert_eq!(sum_entry_counts([Some(10), None]), None);
        assert_eq!(sum_entry_counts([None, Some(10)]), None);
        assert_eq!(sum_entry_counts([Some(10), Some(5)]), Some(15));
        assert_eq!(sum_entry_counts(std::iter::empty()), Some(0));
    }

    #[test]
    fn duplicate_base_dn_is_rejected() {
        let config = BackendConfig::new("userRoot")
            .base_dn(dn("dc=example,dc=com"))
            .base_dn(dn("DC=Example, DC=Com"));
        let result =
            RootContainer::with_journal_storage(config, Arc::new(DefaultEntryCache::default()));
        assert!(matches!(result, Err(BackendError::Config { .. })));
    }

    #[test]
    fn colliding_prefixes_are_rejected() {
        let config = BackendConfig::new("userRoot")
            .base_dn(dn("dc=example,dc=com"))
            .base_dn(dn("dc=example-dc=com"));
        let result =
            RootContainer::with_journal_storage(config, Arc::new(DefaultEntryCache::default()));
        assert!(matches!(result, Err(BackendError::Config { .. })));
    }

    #[test]
    fn suffix_lookup_picks_nearest_base() {
        let root = root(config());
        let find = |text: &str| {
            root.get_suffix_container(&dn(text))
                .map(|suffix| suffix.base_dn().to_string())
        };
        assert_eq!(find("uid=a,ou=people,dc=example,dc=com").as_deref(), Some("dc=example,dc=com"));
        assert_eq!(find("uid=b,ou=special,dc=example,dc=com").as_deref(), Some("ou=special,dc=example,dc=com"));
        assert_eq!(find("dc=example,dc=org").as_deref(), Some("dc=example,dc=org"));
        assert_eq!(find("dc=example,dc=net"), None);
        assert_eq!(find("dc=com"), None);
        assert_eq!(root.base_dns().count(), 3);
    }

    #[test]
    fn open_count_and_close() {
        let root = root(config());
        assert_eq!(root.get_entry_count(), None);

        root.open().unwrap();
        root.open().unwrap();
        let suffix = root.get_suffix_container(&dn("dc=example,dc=com")).unwrap();
        suffix
            .add_entry(&Entry::new(dn("dc=example,dc=com")), EntryId::new(1))
            .unwrap();
        suffix
            .add_entry(&Entry::new(dn("ou=people,dc=example,dc=com")), EntryId::new(2))
            .unwrap();
        assert_eq!(root.get_entry_count(), Some(2));
        assert_eq!(root.storage().list_trees().unwrap().len(), 6);

        root.close();
        root.close();
        assert!(!root.storage().is_open());
        assert!(root.suffix_containers().iter().all(|suffix| !suffix.is_open()));
    }

    #[test]
    fn read_only_open_leaves_the_volume_untouched() {
        let storage = Arc::new(JournalStorage::in_memory());
        let cache: Arc<dyn EntryCache> = Arc::new(DefaultEntryCache::default());
        let writer = RootContainer::new(
            BackendConfig::new("userRoot").base_dn(dn("dc=example,dc=com")),
            Arc::clone(&storage),
            Arc::clone(&cache),
        )
        .unwrap();
        writer.open().unwrap();
        writer
            .get_suffix_container(&dn("dc=example,dc=com"))
            .unwrap()
            .add_entry(&Entry::new(dn("dc=example,dc=com")), EntryId::new(1))
            .unwrap();
        let trees = storage.list_trees().unwrap();
        writer.close();

        let reader = RootContainer::new(
            BackendConfig::new("userRoot")
                .base_dn(dn("dc=example,dc=com"))
                .base_dn(dn("dc=typo,dc=com")),
            Arc::clone(&storage),
            cache,
        )
        .unwrap();
        reader.open_read_only().unwrap();
        let typo = reader.get_suffix_container(&dn("dc=typo,dc=com")).unwrap();
        assert!(typo.is_open());
        assert_eq!(typo.entry_count(), Some(0));
        assert!(!typo.entry_exists(&dn("dc=typo,dc=com")).unwrap());
        assert_eq!(reader.get_entry_count(), Some(1));
        assert_eq!(storage.list_trees().unwrap(), trees);
        assert_eq!(storage.committed_sequence(), Some(dirstore_core::SequenceNumber::new(2)));
        reader.close();
    }

    #[test]
    fn import_loads_every_suffix() {
        let root = root(config());
        let imported = root
            .import(vec![
                (EntryId::new(1), Entry::new(dn("dc=example,dc=com"))),
                (EntryId::new(2), Entry::new(dn("ou=people,dc=example,dc=com"))),
                (EntryId::new(1), Entry::new(dn("dc=example,dc=org"))),
            ])
            .unwrap();
        assert_eq!(imported, 3);
        assert!(!root.storage().is_open());

        root.open().unwrap();
        let people = root
            .get_suffix_container(&dn("ou=people,dc=example,dc=com"))
            .unwrap()
            .get_entry(&dn("ou=people,dc=example,dc=com"))
            .unwrap();
        assert!(people.is_some());
        assert_eq!(root.get_entry_count(), Some(3));
        root.close();
    }

    #[test]
    fn import_rejects_entries_without_suffix() {
        let root = root(config());
        let result = root.import(vec![(EntryId::new(1), Entry::new(dn("dc=elsewhere")))]);
        assert!(matches!(result, Err(BackendError::NoSuchSuffix { .. })));
        assert!(!root.storage().is_open());
    }

    #[test]
    fn import_requires_closed_container() {
        let root = root(config());
        root.open().unwrap();
        assert!(matches!(
            root.import(Vec::new()),
            Err(BackendError::Storage(StorageError::InvalidOperation { .. }))
        ));
        root.close();
    }

    #[cfg(unix)]
    #[test]
    fn open_creates_directory_with_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("db").join("userRoot");
        let root = root(config().db_directory(&path).db_directory_permissions(0o750));
        root.open().unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
        root.close();
    }

    #[test]
    fn file_in_place_of_directory_is_a_config_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("not-a-dir");
        fs::write(&path, b"x").unwrap();
        let root = root(config().db_directory(&path));
        assert!(matches!(root.open(), Err(BackendError::Config { .. })));
    }
}
