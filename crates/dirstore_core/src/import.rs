//! Bulk import.

use crate::engine::JournalStorage;
use crate::error::StorageResult;
use crate::record::TreeOp;
use crate::state::EngineState;
use crate::storage::{Importer, Storage};
use crate::types::{ByteString, TreeName};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Records journaled per commit frame when an import is merged.
pub(crate) const IMPORT_BATCH: usize = 4096;

/// Importer for [`JournalStorage`].
///
/// Records accumulate in memory, keyed per tree, and are written to the
/// journal in batches when the importer is closed. Dropping an importer
/// without closing it discards everything imported.
#[derive(Debug)]
pub struct JournalImporter<'s> {
    storage: &'s JournalStorage,
    state: Arc<EngineState>,
    trees: BTreeMap<TreeName, BTreeMap<ByteString, ByteString>>,
    closed: bool,
}

impl<'s> JournalImporter<'s> {
    pub(crate) fn new(storage: &'s JournalStorage, state: Arc<EngineState>) -> Self {
        Self {
            storage,
            state,
            trees: BTreeMap::new(),
            closed: false,
        }
    }

    /// Returns the number of records imported so far.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.trees.values().map(BTreeMap::len).sum()
    }

    fn merge(&mut self) -> StorageResult<()> {
        let trees = std::mem::take(&mut self.trees);
        let mut batch = Vec::with_capacity(IMPORT_BATCH);
        for (tree, records) in trees {
            batch.push(TreeOp::CreateTree(tree.clone()));
            for (key, value) in records {
                batch.push(TreeOp::Put {
                    tree: tree.clone(),
                    key,
                    value,
                });
                if batch.len() >= IMPORT_BATCH {
                    self.flush(&mut batch)?;
                }
            }
        }
        self.flush(&mut batch)?;
        self.state.sync()
    }

    fn flush(&self, batch: &mut Vec<TreeOp>) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = std::mem::replace(batch, Vec::with_capacity(IMPORT_BATCH));
        let mut trees = self.state.trees.write();
        self.state.append_commit(&mut trees, ops)?;
        Ok(())
    }
}

impl Importer for JournalImporter<'_> {
    fn create_tree(&mut self, tree: &TreeName) -> StorageResult<()> {
        self.trees.entry(tree.clone()).or_default();
        Ok(())
    }

    fn put(&mut self, tree: &TreeName, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.trees.entry(tree.clone()).or_default().insert(
            ByteString::copy_from_slice(key),
            ByteString::copy_from_slice(value),
        );
        Ok(())
    }

    fn close(mut self) -> StorageResult<()> {
        let records = self.record_count();
        let tree_count = self.trees.len();
        self.closed = true;
        let merged = self.merge();
        self.storage.finish_import();
        self.storage.close();
        merged?;
        info!(trees = tree_count, records, "import finished");
        Ok(())
    }
}

impl Drop for JournalImporter<'_> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                records = self.record_count(),
                "importer dropped without close; imported records discarded"
            );
            self.storage.finish_import();
        }
    }
}
