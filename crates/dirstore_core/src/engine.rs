//! The journaled storage engine.

use crate::config::{StorageConfig, StorageLocation};
use crate::dir::StorageDir;
use crate::error::{StorageError, StorageResult, TransactionError};
use crate::import::JournalImporter;
use crate::state::EngineState;
use crate::stats::StorageStats;
use crate::storage::{ReadableTransaction, Storage, WriteableTransaction};
use crate::transaction::WriteableStorage;
use crate::types::{SequenceNumber, TreeName};
use dirstore_volume::MemoryVolume;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Attempts between "still retrying" warnings.
const RETRY_WARN_INTERVAL: u32 = 100;

/// Ordered key-value storage backed by an append-only commit journal.
///
/// Committed trees live in memory. Every commit is appended to the journal
/// as one checksummed frame before it becomes visible, and opening the
/// engine replays the journal. An in-memory engine keeps its journal in a
/// [`MemoryVolume`] that survives close and reopen.
///
/// # Example
///
/// ```rust
/// use dirstore_core::{JournalStorage, Storage, StorageError, TreeName};
///
/// let storage = JournalStorage::in_memory();
/// storage.open().unwrap();
/// let tree = TreeName::new("dccom", "id2entry");
///
/// storage
///     .write(|txn| -> Result<(), StorageError> { txn.create(&tree, b"key", b"value") })
///     .unwrap();
/// let value = storage
///     .read(|txn| -> Result<_, StorageError> { txn.read(&tree, b"key") })
///     .unwrap();
/// assert_eq!(value.as_deref(), Some(&b"value"[..]));
/// ```
#[derive(Debug)]
pub struct JournalStorage {
    config: StorageConfig,
    memory: MemoryVolume,
    state: RwLock<Option<Arc<EngineState>>>,
    importing: AtomicBool,
    fatal: Arc<AtomicBool>,
    stats: Arc<StorageStats>,
}

impl JournalStorage {
    /// Creates a closed engine for `config`.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            memory: MemoryVolume::new(),
            state: RwLock::new(None),
            importing: AtomicBool::new(false),
            fatal: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(StorageStats::new()),
        }
    }

    /// Creates a closed in-memory engine with default settings.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(StorageConfig::in_memory())
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the last committed sequence, or `None` while closed.
    #[must_use]
    pub fn committed_sequence(&self) -> Option<SequenceNumber> {
        self.state.read().as_ref().map(|state| state.committed_sequence())
    }

    /// Returns the open engine state, ignoring the import flag.
    fn open_state(&self) -> StorageResult<Arc<EngineState>> {
        if self.fatal.load(Ordering::Acquire) {
            return Err(StorageError::fatal("storage engine is no longer valid"));
        }
        self.state.read().clone().ok_or(StorageError::Closed)
    }

    fn transaction_state(&self) -> StorageResult<Arc<EngineState>> {
        if self.importing.load(Ordering::Acquire) {
            return Err(StorageError::ImportInProgress);
        }
        self.open_state()
    }

    pub(crate) fn finish_import(&self) {
        self.importing.store(false, Ordering::Release);
    }

    fn backoff(&self, attempt: u32) {
        let backoff = self.config.retry_backoff;
        if backoff.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(backoff.saturating_mul(attempt));
        }
    }

    /// Runs `op` in transaction attempts until one commits or fails with
    /// something other than a conflict.
    fn run<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(&mut WriteableStorage<'_>) -> Result<T, E>,
        E: TransactionError,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let state = self.transaction_state()?;
            let mut handle = WriteableStorage::begin(&state);

            let outcome = match op(&mut handle) {
                Ok(value) => handle.commit().map(|()| value).map_err(E::from),
                Err(e) => {
                    if e.is_conflict() {
                        drop(handle);
                    } else {
                        handle.rollback();
                    }
                    Err(e)
                }
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_conflict() => {
                    self.stats.record_conflict();
                    debug!(attempt, "transaction conflicted, retrying");
                    if attempt % RETRY_WARN_INTERVAL == 0 {
                        warn!(attempt, "transaction still conflicting after many attempts");
                    }
                    if let Some(max) = self.config.max_attempts {
                        if attempt >= max {
                            return Err(E::from(StorageError::RetriesExhausted {
                                attempts: attempt,
                            }));
                        }
                    }
                    self.backoff(attempt);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for JournalStorage {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Storage for JournalStorage {
    type Importer<'a> = JournalImporter<'a>;

    fn open(&self) -> StorageResult<()> {
        if self.fatal.load(Ordering::Acquire) {
            return Err(StorageError::fatal("storage engine is no longer valid"));
        }
        let mut slot = self.state.write();
        if slot.is_some() {
            return Ok(());
        }
        let state = EngineState::open(
            &self.config,
            &self.memory,
            Arc::clone(&self.stats),
            Arc::clone(&self.fatal),
        )?;
        info!(
            location = ?self.config.location,
            trees = state.trees.read().names().count(),
            sequence = %state.committed_sequence(),
            "storage opened"
        );
        *slot = Some(Arc::new(state));
        Ok(())
    }

    fn close(&self) {
        let Some(state) = self.state.write().take() else {
            return;
        };
        if !self.fatal.load(Ordering::Acquire) {
            if let Err(e) = state.sync() {
                warn!(error = %e, "failed to sync journal on close");
            }
        }
        info!(location = ?self.config.location, "storage closed");
    }

    fn is_open(&self) -> bool {
        self.state.read().is_some()
    }

    fn is_valid(&self) -> bool {
        !self.fatal.load(Ordering::Acquire)
    }

    fn read<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn ReadableTransaction) -> Result<T, E>,
        E: TransactionError,
    {
        self.run(|handle| op(handle))
    }

    fn write<E, F>(&self, mut op: F) -> Result<(), E>
    where
        F: FnMut(&mut dyn WriteableTransaction) -> Result<(), E>,
        E: TransactionError,
    {
        self.run(|handle| op(handle))
    }

    fn start_import(&self) -> StorageResult<JournalImporter<'_>> {
        if self.importing.swap(true, Ordering::AcqRel) {
            return Err(StorageError::ImportInProgress);
        }
        let prepared = (|| {
            self.close();
            self.remove_storage_files()?;
            self.open()?;
            self.open_state()
        })();
        match prepared {
            Ok(state) => {
                info!(location = ?self.config.location, "import started");
                Ok(JournalImporter::new(self, state))
            }
            Err(e) => {
                self.importing.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    fn list_trees(&self) -> StorageResult<Vec<TreeName>> {
        let state = self.open_state()?;
        let trees = state.trees.read();
        Ok(trees.names().cloned().collect())
    }

    fn remove_storage_files(&self) -> StorageResult<()> {
        if self.is_open() {
            return Err(StorageError::invalid_operation(
                "storage files can only be removed while closed",
            ));
        }
        match &self.config.location {
            StorageLocation::Memory => self.memory.wipe(),
            StorageLocation::Directory(path) => {
                if path.exists() {
                    StorageDir::remove_files(path)?;
                }
            }
        }
        Ok(())
    }

    fn stats(&self) -> &StorageStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::IMPORT_BATCH;
    use crate::storage::Importer;
    use std::sync::atomic::AtomicU32;
    use std::sync::Barrier;
    use std::time::Duration;

    fn tree() -> TreeName {
        TreeName::new("dccom", "id2entry")
    }

    fn open_memory() -> JournalStorage {
        let storage = JournalStorage::in_memory();
        storage.open().unwrap();
        storage
    }

    fn put(storage: &JournalStorage, key: &[u8], value: &[u8]) {
        storage
            .write(|txn| -> StorageResult<()> { txn.create(&tree(), key, value) })
            .unwrap();
    }

    fn get(storage: &JournalStorage, key: &[u8]) -> Option<Vec<u8>> {
        storage
            .read(|txn| -> StorageResult<_> { txn.read(&tree(), key) })
            .unwrap()
            .map(|value| value.to_vec())
    }

    #[test]
    fn write_then_read() {
        let storage = open_memory();
        put(&storage, b"k", b"v");
        assert_eq!(get(&storage, b"k"), Some(b"v".to_vec()));
        assert_eq!(get(&storage, b"other"), None);
        assert_eq!(storage.list_trees().unwrap(), vec![tree()]);
    }

    #[test]
    fn missing_tree_reads_as_empty() {
        let storage = open_memory();
        let (value, count, any) = storage
            .read(|txn| -> StorageResult<_> {
                let value = txn.read(&tree(), b"k")?;
                let count = txn.record_count(&tree())?;
                let any = txn.open_cursor(&tree())?.next()?;
                Ok((value, count, any))
            })
            .unwrap();
        assert!(value.is_none());
        assert_eq!(count, 0);
        assert!(!any);
        assert!(storage.list_trees().unwrap().is_empty());
    }

    #[test]
    fn handle_sees_its_own_writes() {
        let storage = open_memory();
        put(&storage, b"a", b"1");
        storage
            .write(|txn| -> StorageResult<()> {
                txn.create(&tree(), b"b", b"2")?;
                assert_eq!(txn.read(&tree(), b"b")?.as_deref(), Some(&b"2"[..]));
                assert!(txn.remove(&tree(), b"a")?);
                assert!(!txn.remove(&tree(), b"a")?);
                assert_eq!(txn.record_count(&tree())?, 1);
                Ok(())
            })
            .unwrap();
        assert_eq!(get(&storage, b"a"), None);
        assert_eq!(get(&storage, b"b"), Some(b"2".to_vec()));
    }

    #[test]
    fn put_if_absent_keeps_existing_value() {
        let storage = open_memory();
        let stored = storage
            .write(|txn| -> StorageResult<()> {
                assert!(txn.put_if_absent(&tree(), b"k", b"first")?);
                assert!(!txn.put_if_absent(&tree(), b"k", b"second")?);
                Ok(())
            });
        assert!(stored.is_ok());
        assert_eq!(get(&storage, b"k"), Some(b"first".to_vec()));
    }

    fn clear(_: Option<&[u8]>) -> Option<Vec<u8>> {
        None
    }

    #[test]
    fn update_reports_changes_and_can_remove() {
        let storage = open_memory();
        put(&storage, b"n", b"1");
        storage
            .write(|txn| -> StorageResult<()> {
                let mut same = |old: Option<&[u8]>| old.map(<[u8]>::to_vec);
                assert!(!txn.update(&tree(), b"n", &mut same)?);
                let mut bump = |_: Option<&[u8]>| Some(b"2".to_vec());
                assert!(txn.update(&tree(), b"n", &mut bump)?);
                let mut insert = |old: Option<&[u8]>| {
                    assert!(old.is_none());
                    Some(b"x".to_vec())
                };
                assert!(txn.update(&tree(), b"fresh", &mut insert)?);
                Ok(())
            })
            .unwrap();
        assert_eq!(get(&storage, b"n"), Some(b"2".to_vec()));

        storage
            .write(|txn| -> StorageResult<()> {
                assert!(txn.update(&tree(), b"n", &mut clear)?);
                assert!(!txn.update(&tree(), b"missing", &mut clear)?);
                Ok(())
            })
            .unwrap();
        assert_eq!(get(&storage, b"n"), None);
    }

    #[test]
    fn rename_tree_is_unsupported() {
        let storage = open_memory();
        let result = storage.write(|txn| -> StorageResult<()> {
            txn.rename_tree(&tree(), &TreeName::new("dccom", "renamed"))
        });
        assert!(matches!(result, Err(StorageError::Unsupported { .. })));
    }

    #[test]
    fn truncate_and_delete_trees() {
        let storage = open_memory();
        put(&storage, b"a", b"1");
        put(&storage, b"b", b"2");

        storage
            .write(|txn| -> StorageResult<()> {
                txn.truncate_tree(&tree())?;
                assert_eq!(txn.record_count(&tree())?, 0);
                txn.create(&tree(), b"c", b"3")
            })
            .unwrap();
        assert_eq!(get(&storage, b"a"), None);
        assert_eq!(get(&storage, b"c"), Some(b"3".to_vec()));

        storage
            .write(|txn| -> StorageResult<()> { txn.delete_tree(&tree()) })
            .unwrap();
        assert!(storage.list_trees().unwrap().is_empty());
    }

    #[test]
    fn open_tree_creates_empty_tree() {
        let storage = open_memory();
        storage
            .write(|txn| -> StorageResult<()> { txn.open_tree(&tree()) })
            .unwrap();
        assert_eq!(storage.list_trees().unwrap(), vec![tree()]);
    }

    #[test]
    fn failed_operation_rolls_back_without_retry() {
        let storage = open_memory();
        let mut attempts = 0;
        let result = storage.write(|txn| -> StorageResult<()> {
            attempts += 1;
            txn.create(&tree(), b"k", b"v")?;
            Err(StorageError::invalid_operation("refused"))
        });

        assert!(matches!(result, Err(StorageError::InvalidOperation { .. })));
        assert_eq!(attempts, 1);
        assert_eq!(get(&storage, b"k"), None);
        assert_eq!(storage.stats().transactions_rolled_back(), 1);
    }

    #[test]
    fn conflict_raised_by_operation_is_retried() {
        let storage = open_memory();
        let mut attempts = 0;
        storage
            .write(|txn| -> StorageResult<()> {
                attempts += 1;
                txn.create(&tree(), b"k", b"v")?;
                if attempts < 3 {
                    return Err(StorageError::conflict(&tree()));
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(storage.stats().conflicts(), 2);
        assert_eq!(get(&storage, b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn commits_before_first_touch_are_observed_not_conflicts() {
        let storage = open_memory();
        let mut attempts = 0;
        storage
            .write(|txn| -> StorageResult<()> {
                attempts += 1;
                if attempts == 1 {
                    put(&storage, b"k", b"1");
                }
                let seen = txn.read(&tree(), b"k")?.unwrap_or_default();
                txn.create(&tree(), b"copy", &seen)
            })
            .unwrap();

        assert_eq!(attempts, 1);
        assert_eq!(storage.stats().conflicts(), 0);
        assert_eq!(get(&storage, b"copy"), Some(b"1".to_vec()));
    }

    #[test]
    fn commits_after_first_touch_force_a_retry() {
        let storage = open_memory();
        put(&storage, b"k", b"0");
        let mut attempts = 0;
        storage
            .write(|txn| -> StorageResult<()> {
                attempts += 1;
                let seen = txn.read(&tree(), b"k")?.unwrap_or_default();
                if attempts == 1 {
                    put(&storage, b"k", b"1");
                }
                txn.create(&tree(), b"copy", &seen)
            })
            .unwrap();

        assert_eq!(attempts, 2);
        assert_eq!(storage.stats().conflicts(), 1);
        assert_eq!(get(&storage, b"copy"), Some(b"1".to_vec()));
    }

    #[test]
    fn retries_stop_at_configured_cap() {
        let storage = JournalStorage::new(StorageConfig::in_memory().max_attempts(Some(4)));
        storage.open().unwrap();
        let mut attempts = 0;
        let result = storage.read(|_| -> StorageResult<()> {
            attempts += 1;
            Err(StorageError::conflict(&tree()))
        });

        assert!(matches!(
            result,
            Err(StorageError::RetriesExhausted { attempts: 4 })
        ));
        assert_eq!(attempts, 4);
    }

    #[test]
    fn exchanges_are_always_released() {
        let storage = open_memory();
        let other = TreeName::new("dccom", "dn2id");
        put(&storage, b"a", b"1");
        let _ = storage.write(|txn| -> StorageResult<()> {
            txn.read(&tree(), b"a")?;
            txn.create(&other, b"b", b"2")?;
            Err(StorageError::invalid_operation("abandon"))
        });
        storage
            .read(|txn| -> StorageResult<()> {
                let mut cursor = txn.open_cursor(&tree())?;
                while cursor.next()? {}
                Ok(())
            })
            .unwrap();

        let stats = storage.stats().snapshot();
        assert!(stats.exchanges_acquired >= 4);
        assert_eq!(stats.exchanges_acquired, stats.exchanges_released);
    }

    #[test]
    fn concurrent_increments_conflict_exactly_once() {
        let storage = JournalStorage::new(
            StorageConfig::in_memory().retry_backoff(Duration::from_millis(1)),
        );
        storage.open().unwrap();
        put(&storage, b"counter", &0u64.to_be_bytes());

        let barrier = Barrier::new(2);
        let attempts = AtomicU32::new(0);
        std::thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| {
                    let mut first = true;
                    storage
                        .write(|txn| -> StorageResult<()> {
                            attempts.fetch_add(1, Ordering::SeqCst);
                            let current = txn.read(&tree(), b"counter")?.unwrap_or_default();
                            let mut raw = [0u8; 8];
                            raw.copy_from_slice(&current);
                            if first {
                                first = false;
                                barrier.wait();
                            }
                            let next = u64::from_be_bytes(raw) + 1;
                            txn.create(&tree(), b"counter", &next.to_be_bytes())
                        })
                        .unwrap();
                });
            }
        });

        assert_eq!(get(&storage, b"counter"), Some(2u64.to_be_bytes().to_vec()));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(storage.stats().conflicts(), 1);
    }

    #[test]
    fn closed_engine_refuses_transactions() {
        let storage = JournalStorage::in_memory();
        let result = storage.read(|_| -> StorageResult<()> { Ok(()) });
        assert!(matches!(result, Err(StorageError::Closed)));
        assert!(!storage.is_open());
        assert!(storage.is_valid());
    }

    #[test]
    fn open_and_close_are_idempotent() {
        let storage = open_memory();
        storage.open().unwrap();
        put(&storage, b"k", b"v");
        storage.close();
        storage.close();
        assert!(!storage.is_open());

        storage.open().unwrap();
        assert_eq!(get(&storage, b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn import_replaces_contents_and_closes() {
        let storage = open_memory();
        put(&storage, b"old", b"1");

        let mut importer = storage.start_import().unwrap();
        assert!(matches!(
            storage.read(|_| -> StorageResult<()> { Ok(()) }),
            Err(StorageError::ImportInProgress)
        ));
        assert!(matches!(
            storage.start_import(),
            Err(StorageError::ImportInProgress)
        ));
        importer.create_tree(&TreeName::new("dccom", "empty")).unwrap();
        importer.put(&tree(), b"new", b"2").unwrap();
        importer.put(&tree(), b"new", b"3").unwrap();
        importer.close().unwrap();
        assert!(!storage.is_open());

        storage.open().unwrap();
        assert_eq!(get(&storage, b"old"), None);
        assert_eq!(get(&storage, b"new"), Some(b"3".to_vec()));
        assert_eq!(storage.list_trees().unwrap().len(), 2);
    }

    #[test]
    fn dropped_importer_discards_records() {
        let storage = open_memory();
        {
            let mut importer = storage.start_import().unwrap();
            importer.put(&tree(), b"k", b"v").unwrap();
        }
        assert_eq!(get(&storage, b"k"), None);
        put(&storage, b"after", b"1");
        assert_eq!(get(&storage, b"after"), Some(b"1".to_vec()));
    }

    #[test]
    fn large_import_spans_batches() {
        let storage = open_memory();
        let mut importer = storage.start_import().unwrap();
        for i in 0..(IMPORT_BATCH as u32 * 2 + 7) {
            importer.put(&tree(), &i.to_be_bytes(), b"x").unwrap();
        }
        importer.close().unwrap();

        storage.open().unwrap();
        let count = storage
            .read(|txn| -> StorageResult<_> { txn.record_count(&tree()) })
            .unwrap();
        assert_eq!(count, IMPORT_BATCH as u64 * 2 + 7);
    }

    #[test]
    fn remove_storage_files_requires_closed_engine() {
        let storage = open_memory();
        put(&storage, b"k", b"v");
        assert!(matches!(
            storage.remove_storage_files(),
            Err(StorageError::InvalidOperation { .. })
        ));
        storage.close();
        storage.remove_storage_files().unwrap();
        storage.open().unwrap();
        assert_eq!(get(&storage, b"k"), None);
    }
}


#[cfg(test)]
mod model_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone)]
    enum Op {
        Put(u8, u8),
        Remove(u8),
        Truncate,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            6 => (0u8..16, any::<u8>()).prop_map(|(k, v)| Op::Put(k, v)),
            3 => (0u8..16).prop_map(Op::Remove),
            1 => Just(Op::Truncate),
        ]
    }

    proptest! {
        #[test]
        fn committed_contents_match_model(
            batches in prop::collection::vec(prop::collection::vec(op(), 1..8), 1..12)
        ) {
            let tree = TreeName::new("dccom", "id2entry");
            let storage = JournalStorage::in_memory();
            storage.open().unwrap();
            let mut model: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

            for batch in &batches {
                storage
                    .write(|txn| -> StorageResult<()> {
                        for op in batch {
                            match op {
                                Op::Put(k, v) => txn.create(&tree, &[*k], &[*v])?,
                                Op::Remove(k) => txn.delete(&tree, &[*k])?,
                                Op::Truncate => txn.truncate_tree(&tree)?,
                            }
                        }
                        Ok(())
                    })
                    .unwrap();
                for op in batch {
                    match op {
                        Op::Put(k, v) => {
                            model.insert(vec![*k], vec![*v]);
                        }
                        Op::Remove(k) => {
                            model.remove(&[*k][..]);
                        }
                        Op::Truncate => model.clear(),
                    }
                }
            }

            // Reopen to replay the journal as well.
            storage.close();
            storage.open().unwrap();
            let (contents, count) = storage
                .read(|txn| -> StorageResult<_> {
                    let mut cursor = txn.open_cursor(&tree)?;
                    let mut contents = BTreeMap::new();
                    while cursor.next()? {
                        contents.insert(
                            cursor.key().unwrap().to_vec(),
                            cursor.value().unwrap().to_vec(),
                        );
                    }
                    drop(cursor);
                    Ok((contents, txn.record_count(&tree)?))
                })
                .unwrap();
            prop_assert_eq!(count, model.len() as u64);
            prop_assert_eq!(contents, model);
        }
    }
}
