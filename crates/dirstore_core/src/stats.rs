//! Engine statistics.
//!
//! All counters are atomic and may be read while transactions run. They
//! are monotonically increasing.

use std::sync::atomic::{AtomicU64, Ordering};

/// Transaction and exchange counters for one engine.
#[derive(Debug, Default)]
pub struct StorageStats {
    /// Transaction attempts begun (one per retry).
    transactions_started: AtomicU64,
    /// Attempts that committed.
    transactions_committed: AtomicU64,
    /// Attempts rolled back because the operation failed.
    transactions_rolled_back: AtomicU64,
    /// Attempts discarded because of an optimistic conflict.
    conflicts: AtomicU64,
    /// Per-tree exchanges created.
    exchanges_acquired: AtomicU64,
    /// Per-tree exchanges released at the end of an attempt.
    exchanges_released: AtomicU64,
}

impl StorageStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.transactions_rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exchange_acquired(&self) {
        self.exchanges_acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exchanges_released(&self, count: u64) {
        self.exchanges_released.fetch_add(count, Ordering::Relaxed);
    }

    /// Returns the number of transaction attempts begun.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Returns the number of committed attempts.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Returns the number of rolled back attempts.
    pub fn transactions_rolled_back(&self) -> u64 {
        self.transactions_rolled_back.load(Ordering::Relaxed)
    }

    /// Returns the number of conflicting attempts that were retried.
    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Returns the number of exchanges created.
    pub fn exchanges_acquired(&self) -> u64 {
        self.exchanges_acquired.load(Ordering::Relaxed)
    }

    /// Returns the number of exchanges released.
    pub fn exchanges_released(&self) -> u64 {
        self.exchanges_released.load(Ordering::Relaxed)
    }

    /// Takes a plain copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            transactions_started: self.transactions_started(),
            transactions_committed: self.transactions_committed(),
            transactions_rolled_back: self.transactions_rolled_back(),
            conflicts: self.conflicts(),
            exchanges_acquired: self.exchanges_acquired(),
            exchanges_released: self.exchanges_released(),
        }
    }
}

/// A point-in-time copy of [`StorageStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Transaction attempts begun.
    pub transactions_started: u64,
    /// Attempts that committed.
    pub transactions_committed: u64,
    /// Attempts rolled back.
    pub transactions_rolled_back: u64,
    /// Attempts retried after a conflict.
    pub conflicts: u64,
    /// Exchanges created.
    pub exchanges_acquired: u64,
    /// Exchanges released.
    pub exchanges_released: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = StorageStats::new();
        stats.record_transaction_start();
        stats.record_transaction_start();
        stats.record_conflict();
        stats.record_commit();
        stats.record_exchange_acquired();
        stats.record_exchanges_released(1);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.transactions_started, 2);
        assert_eq!(snapshot.conflicts, 1);
        assert_eq!(snapshot.transactions_committed, 1);
        assert_eq!(snapshot.exchanges_acquired, snapshot.exchanges_released);
    }
}
