//! Suffix containers.

use crate::cache::EntryCache;
use crate::dn::Dn;
use crate::dn2id::Dn2Id;
use crate::dn_key;
use crate::entry::{Entry, EntryId};
use crate::error::{BackendError, BackendResult};
use crate::id2entry::Id2Entry;
use dirstore_core::{Storage, StorageError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// The indexes of one base DN.
///
/// A suffix container owns a DN2ID and an ID2Entry index. Their trees are
/// named with a prefix derived from the base DN, so any number of suffixes
/// can share one storage engine.
pub struct SuffixContainer<S> {
    backend_id: String,
    base_dn: Dn,
    prefix: String,
    storage: Arc<S>,
    cache: Arc<dyn EntryCache>,
    dn2id: Dn2Id,
    id2entry: Id2Entry,
    open: AtomicBool,
}

impl<S: Storage> SuffixContainer<S> {
    /// Creates a closed container for `base_dn`.
    pub fn new(
        backend_id: impl Into<String>,
        base_dn: Dn,
        storage: Arc<S>,
        cache: Arc<dyn EntryCache>,
    ) -> Self {
        let prefix = Self::tree_prefix(&base_dn);
        Self {
            backend_id: backend_id.into(),
            dn2id: Dn2Id::new(&prefix, base_dn.clone()),
            id2entry: Id2Entry::new(&prefix),
            base_dn,
            prefix,
            storage,
            cache,
            open: AtomicBool::new(false),
        }
    }

    /// Tree name prefix for `base_dn`: the ASCII letters and digits of its
    /// normalised form, e.g. `dcexampledccom` for `dc=example,dc=com`.
    pub fn tree_prefix(base_dn: &Dn) -> String {
        base_dn
            .to_string()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect()
    }

    /// The base DN.
    pub fn base_dn(&self) -> &Dn {
        &self.base_dn
    }

    /// The tree name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The DN2ID index.
    pub fn dn2id(&self) -> &Dn2Id {
        &self.dn2id
    }

    /// The ID2Entry index.
    pub fn id2entry(&self) -> &Id2Entry {
        &self.id2entry
    }

    /// Returns true while the container is open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Opens both indexes, creating their trees if needed.
    pub fn open(&self) -> BackendResult<()> {
        self.storage.write(|txn| -> BackendResult<()> {
            self.dn2id.open(txn)?;
            self.id2entry.open(txn)
        })?;
        self.open.store(true, Ordering::Release);
        debug!(base_dn = %self.base_dn, prefix = %self.prefix, "suffix opened");
        Ok(())
    }

    /// Opens the container without touching the storage. Indexes whose
    /// trees are missing read as empty.
    pub fn open_read_only(&self) {
        self.open.store(true, Ordering::Release);
        debug!(base_dn = %self.base_dn, prefix = %self.prefix, "suffix opened read-only");
    }

    /// Closes the container. Never fails.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!(base_dn = %self.base_dn, "suffix closed");
        }
    }

    fn ensure_open(&self) -> BackendResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(StorageError::Closed.into())
        }
    }

    /// Returns true if an entry named `dn` exists.
    pub fn entry_exists(&self, dn: &Dn) -> BackendResult<bool> {
        if !dn.is_descendant_of(&self.base_dn) {
            return Ok(false);
        }
        if self.cache.contains_entry(dn) {
            return Ok(true);
        }
        self.ensure_open()?;
        let id = self
            .storage
            .read(|txn| -> BackendResult<_> { self.dn2id.get(txn, dn) })?;
        Ok(id.is_some())
    }

    /// Fetches the entry named `dn`.
    ///
    /// An entry found in the indexes is added to the cache, unless the
    /// cache picked up an entry for the same DN in the meantime.
    pub fn get_entry(&self, dn: &Dn) -> BackendResult<Option<Arc<Entry>>> {
        if !dn.is_descendant_of(&self.base_dn) {
            return Ok(None);
        }
        if let Some(entry) = self.cache.get_entry(dn) {
            return Ok(Some(entry));
        }
        self.ensure_open()?;

        let found = self.storage.read(|txn| -> BackendResult<_> {
            let Some(entry_id) = self.dn2id.get(txn, dn)? else {
                return Ok(None);
            };
            match self.id2entry.get(txn, entry_id)? {
                Some(entry) => Ok(Some((entry_id, entry))),
                None => Err(BackendError::MissingEntryRecord {
                    dn: dn.clone(),
                    entry_id,
                }),
            }
        })?;

        let Some((entry_id, entry)) = found else {
            return Ok(None);
        };
        let entry = Arc::new(entry);
        self.cache
            .put_entry_if_absent(Arc::clone(&entry), &self.backend_id, entry_id);
        Ok(Some(entry))
    }

    /// Stores `entry` under `entry_id` in both indexes, then replaces
    /// whatever the cache holds for its DN.
    pub fn add_entry(&self, entry: &Entry, entry_id: EntryId) -> BackendResult<()> {
        self.ensure_open()?;
        if !entry.dn().is_descendant_of(&self.base_dn) {
            return Err(BackendError::NoSuchSuffix {
                dn: entry.dn().clone(),
            });
        }
        self.storage.write(|txn| -> BackendResult<()> {
            self.dn2id.insert(txn, entry.dn(), entry_id)?;
            self.id2entry.put(txn, entry_id, entry)
        })?;
        self.cache
            .put_entry(Arc::new(entry.clone()), &self.backend_id, entry_id);
        Ok(())
    }

    /// Number of entries in the suffix, or `None` if it cannot be
    /// determined.
    pub fn entry_count(&self) -> Option<u64> {
        if !self.is_open() {
            return None;
        }
        match self
            .storage
            .read(|txn| -> BackendResult<_> { self.id2entry.record_count(txn) })
        {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(base_dn = %self.base_dn, error = %e, "unable to count suffix entries");
                None
            }
        }
    }

    /// Immediate children of `dn`, in key order.
    pub fn children(&self, dn: &Dn) -> BackendResult<Vec<(Dn, EntryId)>> {
        self.ensure_open()?;
        let children = self
            .storage
            .read(|txn| -> BackendResult<_> { self.dn2id.children(txn, dn) })?;
        children
            .into_iter()
            .map(|(key, id)| Ok((dn_key::decode(&key, &self.base_dn)?, id)))
            .collect()
    }
}

impl<S> std::fmt::Debug for SuffixContainer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuffixContainer")
            .field("base_dn", &self.base_dn)
            .field("prefix", &self.prefix)
            .field("open", &self.open.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
