//! The entry cache contract and a default implementation.

use crate::dn::Dn;
use crate::entry::{Entry, EntryId};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A cache of recently read entries, shared by every suffix of a backend.
///
/// Lookups never change what is cached. Reads add entries only after a
/// real index read and never replace an entry that is already present;
/// writes replace whatever is cached for the DN.
pub trait EntryCache: Send + Sync {
    /// Returns true if an entry for `dn` is cached.
    fn contains_entry(&self, dn: &Dn) -> bool;

    /// Returns the cached entry for `dn`.
    fn get_entry(&self, dn: &Dn) -> Option<Arc<Entry>>;

    /// Caches `entry` unless its DN is already cached. Returns whether it
    /// was added.
    fn put_entry_if_absent(&self, entry: Arc<Entry>, backend_id: &str, entry_id: EntryId) -> bool;

    /// Caches `entry`, replacing any entry cached for its DN.
    fn put_entry(&self, entry: Arc<Entry>, backend_id: &str, entry_id: EntryId);
}

#[derive(Debug)]
struct CachedEntry {
    entry: Arc<Entry>,
    backend_id: String,
    entry_id: EntryId,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<Dn, CachedEntry>,
    order: VecDeque<Dn>,
}

/// Bounded in-memory [`EntryCache`] with first-in first-out eviction.
#[derive(Debug)]
pub struct DefaultEntryCache {
    capacity: usize,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DefaultEntryCache {
    /// Default number of cached entries.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// Creates a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the owning backend and ID recorded for `dn`.
    pub fn entry_id(&self, dn: &Dn) -> Option<(String, EntryId)> {
        self.state
            .lock()
            .entries
            .get(dn)
            .map(|cached| (cached.backend_id.clone(), cached.entry_id))
    }

    /// Drops the entry for `dn`.
    pub fn remove(&self, dn: &Dn) -> bool {
        let mut state = self.state.lock();
        if state.entries.remove(dn).is_none() {
            return false;
        }
        state.order.retain(|cached| cached != dn);
        true
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Lookups that found an entry.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that found nothing.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn insert(&self, entry: Arc<Entry>, backend_id: &str, entry_id: EntryId, replace: bool) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let mut state = self.state.lock();
        let dn = entry.dn().clone();
        let cached = CachedEntry {
            entry,
            backend_id: backend_id.to_string(),
            entry_id,
        };
        if let Some(existing) = state.entries.get_mut(&dn) {
            if replace {
                *existing = cached;
            }
            return replace;
        }
        while state.entries.len() >= self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
        }
        state.order.push_back(dn.clone());
        state.entries.insert(dn, cached);
        true
    }
}

impl Default for DefaultEntryCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl EntryCache for DefaultEntryCache {
    fn contains_entry(&self, dn: &Dn) -> bool {
        self.state.lock().entries.contains_key(dn)
    }

    fn get_entry(&self, dn: &Dn) -> Option<Arc<Entry>> {
        let found = self
            .state
            .lock()
            .entries
            .get(dn)
            .map(|cached| Arc::clone(&cached.entry));
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn put_entry_if_absent(&self, entry: Arc<Entry>, backend_id: &str, entry_id: EntryId) -> bool {
        self.insert(entry, backend_id, entry_id, false)
    }

    fn put_entry(&self, entry: Arc<Entry>, backend_id: &str, entry_id: EntryId) {
        self.insert(entry, backend_id, entry_id, true);
    }
}
