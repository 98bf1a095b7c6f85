use super::exchange::Exchange;
use crate::cursor::{Cursor, TreeCursor};
use crate::error::{StorageError, StorageResult};
use crate::state::EngineState;
use crate::storage::{ReadableTransaction, WriteableTransaction};
use crate::tree::TreeState;
use crate::types::{ByteString, SequenceNumber, TransactionId, TreeName};
use std::collections::HashMap;
use tracing::debug;

/// The handle an operation closure receives for one transaction attempt.
///
/// Exchanges are acquired lazily, at most one per tree, and all of them
/// are released when the handle is dropped, whether the attempt committed,
/// rolled back or failed.
#[derive(Debug)]
pub struct WriteableStorage<'a> {
    state: &'a EngineState,
    id: TransactionId,
    start: SequenceNumber,
    exchanges: HashMap<TreeName, Exchange>,
}

impl<'a> WriteableStorage<'a> {
    pub(crate) fn begin(state: &'a EngineState) -> Self {
        let (id, start) = state.begin();
        Self {
            state,
            id,
            start,
            exchanges: HashMap::new(),
        }
    }

    /// Returns the attempt's identifier.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the last commit visible when the attempt began.
    #[must_use]
    pub fn start_sequence(&self) -> SequenceNumber {
        self.start
    }

    fn exchange_for<'x>(
        exchanges: &'x mut HashMap<TreeName, Exchange>,
        state: &EngineState,
        tree: &TreeName,
        committed: Option<&TreeState>,
    ) -> &'x mut Exchange {
        exchanges.entry(tree.clone()).or_insert_with(|| {
            state.stats.record_exchange_acquired();
            Exchange::new(tree.clone(), committed)
        })
    }

    /// Runs `f` against the exchange for `tree` and the committed tree,
    /// under the shared tree lock.
    fn with_exchange<R>(
        &mut self,
        tree: &TreeName,
        f: impl FnOnce(&mut Exchange, Option<&TreeState>) -> R,
    ) -> StorageResult<R> {
        let state = self.state;
        state.check_fatal()?;
        let trees = state.trees.read();
        let committed = trees.get(tree);
        let exchange = Self::exchange_for(&mut self.exchanges, state, tree, committed);
        Ok(f(exchange, committed))
    }

    /// Validates and commits the attempt.
    ///
    /// Every key and scanned tree must still carry the committed version
    /// it had when the attempt first touched it. Commits that landed
    /// between begin and that first touch were observed, not missed.
    pub(crate) fn commit(self) -> StorageResult<()> {
        let state = self.state;
        state.check_fatal()?;
        if !self.exchanges.values().any(Exchange::is_dirty) {
            let trees = state.trees.read();
            if let Some(stale) = self
                .exchanges
                .values()
                .find(|exchange| !exchange.validate(trees.get(&exchange.tree)))
            {
                debug!(txn = %self.id, start = %self.start, tree = %stale.tree, "read validation failed");
                return Err(StorageError::conflict(&stale.tree));
            }
            drop(trees);
            state.stats.record_commit();
            return Ok(());
        }

        let mut trees = state.trees.write();
        let mut ops = Vec::new();
        for exchange in self.exchanges.values() {
            if !exchange.validate(trees.get(&exchange.tree)) {
                debug!(txn = %self.id, start = %self.start, tree = %exchange.tree, "commit validation failed");
                return Err(StorageError::conflict(&exchange.tree));
            }
            exchange.collect_ops(&mut ops);
        }
        let sequence = state.append_commit(&mut trees, ops)?;
        drop(trees);

        state.stats.record_commit();
        debug!(txn = %self.id, start = %self.start, %sequence, "transaction committed");
        Ok(())
    }

    /// Discards the attempt's buffered writes.
    pub(crate) fn rollback(self) {
        self.state.stats.record_rollback();
    }
}

impl Drop for WriteableStorage<'_> {
    fn drop(&mut self) {
        self.state
            .stats
            .record_exchanges_released(self.exchanges.len() as u64);
        self.exchanges.clear();
        self.state.end();
    }
}

impl ReadableTransaction for WriteableStorage<'_> {
    fn read(&mut self, tree: &TreeName, key: &[u8]) -> StorageResult<Option<ByteString>> {
        self.with_exchange(tree, |exchange, committed| exchange.get(committed, key))
    }

    fn open_cursor(&mut self, tree: &TreeName) -> StorageResult<Box<dyn Cursor + '_>> {
        let state = self.state;
        state.check_fatal()?;
        let exchange: &Exchange = {
            let trees = state.trees.read();
            let committed = trees.get(tree);
            let exchange = Self::exchange_for(&mut self.exchanges, state, tree, committed);
            exchange.mark_scanned(committed);
            exchange
        };
        Ok(Box::new(TreeCursor::new(state, exchange)))
    }

    fn record_count(&mut self, tree: &TreeName) -> StorageResult<u64> {
        self.with_exchange(tree, |exchange, committed| {
            exchange.mark_scanned(committed);
            exchange.count(committed)
        })
    }
}

impl WriteableTransaction for WriteableStorage<'_> {
    fn open_tree(&mut self, tree: &TreeName) -> StorageResult<()> {
        self.with_exchange(tree, |exchange, _| exchange.open_tree())
    }

    fn truncate_tree(&mut self, tree: &TreeName) -> StorageResult<()> {
        debug!(txn = %self.id, %tree, "truncating tree");
        self.with_exchange(tree, |exchange, _| exchange.truncate())
    }

    fn delete_tree(&mut self, tree: &TreeName) -> StorageResult<()> {
        debug!(txn = %self.id, %tree, "deleting tree");
        self.with_exchange(tree, |exchange, _| exchange.delete_tree())
    }

    fn rename_tree(&mut self, _from: &TreeName, _to: &TreeName) -> StorageResult<()> {
        Err(StorageError::unsupported("rename_tree"))
    }

    fn create(&mut self, tree: &TreeName, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.with_exchange(tree, |exchange, committed| {
            exchange.put(committed, key, value);
        })
    }

    fn put_if_absent(
        &mut self,
        tree: &TreeName,
        key: &[u8],
        value: &[u8],
    ) -> StorageResult<bool> {
        self.with_exchange(tree, |exchange, committed| {
            if exchange.get(committed, key).is_some() {
                return false;
            }
            exchange.put(committed, key, value);
            true
        })
    }

    fn update(
        &mut self,
        tree: &TreeName,
        key: &[u8],
        f: &mut dyn FnMut(Option<&[u8]>) -> Option<Vec<u8>>,
    ) -> StorageResult<bool> {
        self.with_exchange(tree, |exchange, committed| {
            let old = exchange.get(committed, key);
            let new = f(old.as_deref());
            if old.as_deref() == new.as_deref() {
                return false;
            }
            match new {
                Some(value) => exchange.put(committed, key, &value),
                None => exchange.remove(committed, key),
            }
            true
        })
    }

    fn remove(&mut self, tree: &TreeName, key: &[u8]) -> StorageResult<bool> {
        self.with_exchange(tree, |exchange, committed| {
            let existed = exchange.get(committed, key).is_some();
            if existed {
                exchange.remove(committed, key);
            }
            existed
        })
    }
}
