//! Shared state of an open engine.

use crate::config::{StorageConfig, StorageLocation};
use crate::dir::StorageDir;
use crate::error::{StorageError, StorageResult};
use crate::record::{CommitRecord, TreeOp};
use crate::stats::StorageStats;
use crate::tree::TreeSet;
use crate::types::{SequenceNumber, TransactionId};
use dirstore_volume::{FileVolume, FrameLog, MemoryVolume, VolumeBackend};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

/// Everything an open engine shares between concurrent transactions.
///
/// Lock order is `trees` before `journal`.
pub(crate) struct EngineState {
    pub trees: RwLock<TreeSet>,
    journal: Mutex<FrameLog>,
    committed: AtomicU64,
    active: AtomicUsize,
    next_txid: AtomicU64,
    pub stats: Arc<StorageStats>,
    fatal: Arc<AtomicBool>,
    sync_on_commit: bool,
    _dir: Option<StorageDir>,
}

impl EngineState {
    /// Opens the volume described by `config` and replays its journal.
    pub fn open(
        config: &StorageConfig,
        memory: &MemoryVolume,
        stats: Arc<StorageStats>,
        fatal: Arc<AtomicBool>,
    ) -> StorageResult<Self> {
        let (dir, backend): (Option<StorageDir>, Box<dyn VolumeBackend>) = match &config.location
        {
            StorageLocation::Memory => (None, Box::new(memory.clone())),
            StorageLocation::Directory(path) => {
                let dir = StorageDir::open(path, config.create_if_missing)?;
                let volume = FileVolume::open(&dir.journal_path())?;
                (Some(dir), Box::new(volume))
            }
        };

        let mut journal = FrameLog::new(backend);
        let scan = journal.recover()?;
        if scan.torn_bytes > 0 {
            warn!(
                torn_bytes = scan.torn_bytes,
                valid_len = scan.valid_len,
                "discarded torn journal tail"
            );
        }

        let mut trees = TreeSet::default();
        let mut committed = SequenceNumber::default();
        for frame in &scan.frames {
            let record = CommitRecord::decode(frame)?;
            if record.sequence <= committed {
                return Err(StorageError::corrupted(format!(
                    "journal commit {} follows {}",
                    record.sequence, committed
                )));
            }
            trees.apply(&record.ops, record.sequence);
            committed = record.sequence;
        }
        trees.purge_tombstones();

        Ok(Self {
            trees: RwLock::new(trees),
            journal: Mutex::new(journal),
            committed: AtomicU64::new(committed.as_u64()),
            active: AtomicUsize::new(0),
            next_txid: AtomicU64::new(1),
            stats,
            fatal,
            sync_on_commit: config.sync_on_commit,
            _dir: dir,
        })
    }

    /// Registers a new transaction attempt.
    ///
    /// Holding the read lock here keeps tombstone purging from racing a
    /// transaction that is just starting.
    pub fn begin(&self) -> (TransactionId, SequenceNumber) {
        let _trees = self.trees.read();
        self.active.fetch_add(1, Ordering::SeqCst);
        self.stats.record_transaction_start();
        let id = TransactionId::new(self.next_txid.fetch_add(1, Ordering::Relaxed));
        (id, self.committed_sequence())
    }

    /// Unregisters a transaction attempt and purges tombstones when idle.
    pub fn end(&self) {
        let previous = self.active.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 && self.trees.read().has_tombstones() {
            let mut trees = self.trees.write();
            if self.active.load(Ordering::SeqCst) == 0 {
                trees.purge_tombstones();
            }
        }
    }

    pub fn committed_sequence(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed.load(Ordering::SeqCst))
    }

    pub fn check_fatal(&self) -> StorageResult<()> {
        if self.fatal.load(Ordering::Acquire) {
            Err(StorageError::fatal("a previous journal write failed"))
        } else {
            Ok(())
        }
    }

    /// Journals `ops` as the next commit and applies them.
    ///
    /// The caller holds the tree write lock, which is what serializes
    /// commits. A journal failure leaves the volume in an unknown state, so
    /// it switches the engine to fatal.
    pub fn append_commit(&self, trees: &mut TreeSet, ops: Vec<TreeOp>) -> StorageResult<SequenceNumber> {
        self.check_fatal()?;
        let sequence = self.committed_sequence().next();
        let record = CommitRecord { sequence, ops };
        let payload = record.encode()?;

        {
            let mut journal = self.journal.lock();
            let written = journal.append_frame(&payload).and_then(|_| {
                if self.sync_on_commit {
                    journal.sync()
                } else {
                    Ok(())
                }
            });
            if let Err(e) = written {
                self.fatal.store(true, Ordering::Release);
                error!(%sequence, error = %e, "journal write failed; storage is now unusable");
                return Err(e.into());
            }
        }

        trees.apply(&record.ops, sequence);
        self.committed.store(sequence.as_u64(), Ordering::SeqCst);
        Ok(sequence)
    }

    /// Syncs the journal.
    pub fn sync(&self) -> StorageResult<()> {
        self.journal.lock().sync()?;
        Ok(())
    }
}

impl std::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineState")
            .field("committed", &self.committed_sequence())
            .field("active", &self.active.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
