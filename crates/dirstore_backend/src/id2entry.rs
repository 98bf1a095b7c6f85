//! The entry ID to entry index of one suffix.

use crate::entry::{Entry, EntryId};
use crate::error::BackendResult;
use dirstore_core::{ReadableTransaction, TreeName, WriteableTransaction};

/// Maps entry IDs to CBOR-encoded entries.
#[derive(Debug, Clone)]
pub struct Id2Entry {
    tree: TreeName,
}

impl Id2Entry {
    /// Index identifier used in the tree name.
    pub const INDEX_ID: &'static str = "id2entry";

    /// Creates the index for a suffix whose trees use `prefix`.
    pub fn new(prefix: &str) -> Self {
        Self {
            tree: TreeName::new(prefix, Self::INDEX_ID),
        }
    }

    /// The backing tree.
    pub fn tree(&self) -> &TreeName {
        &self.tree
    }

    /// Creates the backing tree if needed.
    pub fn open<T>(&self, txn: &mut T) -> BackendResult<()>
    where
        T: WriteableTransaction + ?Sized,
    {
        txn.open_tree(&self.tree)?;
        Ok(())
    }

    /// Stores `entry` under `id`, replacing any previous record.
    pub fn put<T>(&self, txn: &mut T, id: EntryId, entry: &Entry) -> BackendResult<()>
    where
        T: WriteableTransaction + ?Sized,
    {
        txn.create(&self.tree, &id.to_key(), &entry.encode()?)?;
        Ok(())
    }

    /// Fetches the entry stored under `id`.
    pub fn get<T>(&self, txn: &mut T, id: EntryId) -> BackendResult<Option<Entry>>
    where
        T: ReadableTransaction + ?Sized,
    {
        txn.read(&self.tree, &id.to_key())?
            .map(|bytes| Entry::decode(&bytes))
            .transpose()
    }

    /// Removes the record for `id`. Returns true if one existed.
    pub fn remove<T>(&self, txn: &mut T, id: EntryId) -> BackendResult<bool>
    where
        T: WriteableTransaction + ?Sized,
    {
        Ok(txn.remove(&self.tree, &id.to_key())?)
    }

    /// Number of stored entries.
    pub fn record_count<T>(&self, txn: &mut T) -> BackendResult<u64>
    where
        T: ReadableTransaction + ?Sized,
    {
        Ok(txn.record_count(&self.tree)?)
    }
}
