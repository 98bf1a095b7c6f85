//! Concurrency stress helpers.
//!
//! These drive many threads through the retry wrapper against a small set
//! of contended keys.

use dirstore_core::{Storage, StorageError, TreeName};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a contention run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Operations that committed.
    pub committed: u64,
    /// Closure executions, retries included.
    pub attempts: u64,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Closure executions per committed operation.
    pub fn attempts_per_commit(&self) -> f64 {
        if self.committed == 0 {
            0.0
        } else {
            self.attempts as f64 / self.committed as f64
        }
    }
}

/// Configuration for contention runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of threads.
    pub threads: usize,
    /// Increments performed by each thread.
    pub increments_per_thread: usize,
    /// Number of distinct counters the threads spread over.
    pub counters: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            increments_per_thread: 250,
            counters: 4,
        }
    }
}

/// Key of counter `index`.
pub fn counter_key(index: usize) -> Vec<u8> {
    format!("counter-{index:04}").into_bytes()
}

/// Reads counter `index`, treating a missing key as zero.
pub fn read_counter(storage: &impl Storage, tree: &TreeName, index: usize) -> u64 {
    storage
        .read(|txn| -> Result<_, StorageError> { txn.read(tree, &counter_key(index)) })
        .expect("Failed to read counter")
        .map_or(0, |value| decode_counter(&value))
}

fn decode_counter(value: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(value);
    u64::from_be_bytes(raw)
}

/// Runs read-increment-write operations from many threads.
///
/// Every increment is a separate `write` call, so lost updates would show
/// up as a counter total below `threads * increments_per_thread`.
pub fn run_concurrent_increments<S: Storage>(
    storage: &S,
    tree: &TreeName,
    config: &StressConfig,
) -> StressTestResult {
    let attempts = AtomicU64::new(0);
    let committed = AtomicU64::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for thread_index in 0..config.threads {
            let attempts = &attempts;
            let committed = &committed;
            scope.spawn(move || {
                for i in 0..config.increments_per_thread {
                    let key = counter_key((thread_index + i) % config.counters.max(1));
                    storage
                        .write(|txn| -> Result<(), StorageError> {
                            attempts.fetch_add(1, Ordering::Relaxed);
                            let current = txn.read(tree, &key)?.map_or(0, |value| decode_counter(&value));
                            txn.create(tree, &key, &(current + 1).to_be_bytes())
                        })
                        .expect("Increment failed");
                    committed.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });

    StressTestResult {
        committed: committed.load(Ordering::Relaxed),
        attempts: attempts.load(Ordering::Relaxed),
        duration: start.elapsed(),
    }
}
