//! The storage contract.
//!
//! The directory layer never talks to an engine directly; it goes through
//! [`Storage`] and the scoped transaction handles it hands to operation
//! closures. [`crate::JournalStorage`] is the one implementation shipped
//! here, but anything providing named ordered trees, cursors and
//! transactions with a distinct conflict signal can stand in.

use crate::cursor::Cursor;
use crate::error::{StorageResult, TransactionError};
use crate::stats::StorageStats;
use crate::types::{ByteString, TreeName};

/// Read access to the trees of one transaction attempt.
///
/// A handle is only valid inside the closure it was passed to. Handles
/// cache one exchange per tree for the rest of the attempt.
pub trait ReadableTransaction {
    /// Reads the value stored under `key`, or `None` if absent.
    ///
    /// Reading from a tree that does not exist returns `None`.
    fn read(&mut self, tree: &TreeName, key: &[u8]) -> StorageResult<Option<ByteString>>;

    /// Reads `key` with the intent to update it.
    ///
    /// Behaves exactly like [`ReadableTransaction::read`]: commit-time
    /// validation already covers every key the attempt has read.
    fn get_rmw(&mut self, tree: &TreeName, key: &[u8]) -> StorageResult<Option<ByteString>> {
        self.read(tree, key)
    }

    /// Opens a cursor over `tree`, scoped to this attempt.
    fn open_cursor(&mut self, tree: &TreeName) -> StorageResult<Box<dyn Cursor + '_>>;

    /// Returns the number of records visible in `tree`.
    fn record_count(&mut self, tree: &TreeName) -> StorageResult<u64>;
}

/// Read-write access to the trees of one transaction attempt.
pub trait WriteableTransaction: ReadableTransaction {
    /// Creates `tree` if it does not exist.
    fn open_tree(&mut self, tree: &TreeName) -> StorageResult<()>;

    /// Removes every record of `tree`.
    fn truncate_tree(&mut self, tree: &TreeName) -> StorageResult<()>;

    /// Removes `tree` together with its records.
    fn delete_tree(&mut self, tree: &TreeName) -> StorageResult<()>;

    /// Renaming trees is not supported and always fails.
    fn rename_tree(&mut self, from: &TreeName, to: &TreeName) -> StorageResult<()>;

    /// Stores `value` under `key`, replacing any previous value.
    fn create(&mut self, tree: &TreeName, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Stores `value` only if `key` is absent. Returns whether it stored.
    ///
    /// This is a read followed by a conditional write; two attempts racing
    /// on the same key are serialized by commit-time validation, not by a
    /// lock.
    fn put_if_absent(&mut self, tree: &TreeName, key: &[u8], value: &[u8])
        -> StorageResult<bool>;

    /// Replaces the value under `key` with `f(old)`.
    ///
    /// `f` receives `None` if the key is absent and may return `None` to
    /// remove the key. Returns true if the stored value changed.
    fn update(
        &mut self,
        tree: &TreeName,
        key: &[u8],
        f: &mut dyn FnMut(Option<&[u8]>) -> Option<Vec<u8>>,
    ) -> StorageResult<bool>;

    /// Removes `key`. Returns true if a record was removed.
    fn remove(&mut self, tree: &TreeName, key: &[u8]) -> StorageResult<bool>;

    /// Removes `key`, ignoring whether it existed.
    fn delete(&mut self, tree: &TreeName, key: &[u8]) -> StorageResult<()> {
        self.remove(tree, key).map(|_| ())
    }
}

/// Bulk loader used while the engine is in import mode.
///
/// Stores are unconditional and bypass transactions. Nothing is visible
/// until [`Importer::close`] merges the accumulated data, after which the
/// engine is closed.
pub trait Importer {
    /// Creates `tree` in the import.
    fn create_tree(&mut self, tree: &TreeName) -> StorageResult<()>;

    /// Stores `value` under `key`, replacing any previously imported value.
    fn put(&mut self, tree: &TreeName, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Merges everything imported and closes the engine.
    fn close(self) -> StorageResult<()>;
}

/// A transactional ordered key-value engine.
///
/// `read` and `write` run their closure inside a fresh transaction attempt
/// and commit it. If the commit (or anything inside the closure) reports
/// the optimistic-conflict signal the whole closure runs again, so it must
/// not have side effects outside the handle it is given. Any other error
/// rolls the attempt back and is returned unchanged.
pub trait Storage: Send + Sync {
    /// Importer returned by [`Storage::start_import`].
    type Importer<'a>: Importer
    where
        Self: 'a;

    /// Opens the engine. Opening an open engine does nothing.
    fn open(&self) -> StorageResult<()>;

    /// Closes the engine. Closing a closed engine does nothing.
    fn close(&self);

    /// Returns true while the engine is open.
    fn is_open(&self) -> bool;

    /// Returns false once the engine has hit an unrecoverable failure.
    fn is_valid(&self) -> bool;

    /// Runs `op` in a read transaction and returns its result.
    fn read<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn ReadableTransaction) -> Result<T, E>,
        E: TransactionError;

    /// Runs `op` in a write transaction.
    fn write<E, F>(&self, op: F) -> Result<(), E>
    where
        F: FnMut(&mut dyn WriteableTransaction) -> Result<(), E>,
        E: TransactionError;

    /// Wipes the storage, reopens it and returns a bulk importer.
    fn start_import(&self) -> StorageResult<Self::Importer<'_>>;

    /// Lists every tree in the volume.
    fn list_trees(&self) -> StorageResult<Vec<TreeName>>;

    /// Deletes the persisted state. The engine must be closed.
    fn remove_storage_files(&self) -> StorageResult<()>;

    /// Returns the engine counters.
    fn stats(&self) -> &StorageStats;
}
