//! # dirstore core
//!
//! Transactional ordered key-value storage for directory backends.
//!
//! This crate provides:
//! - [`Storage`], the engine contract the directory layer is written against
//! - Scoped transaction handles ([`ReadableTransaction`],
//!   [`WriteableTransaction`]) and ordered [`Cursor`]s
//! - Transparent retry of operations that lose an optimistic-concurrency race
//! - [`JournalStorage`], an engine that journals every commit to a volume
//! - Bulk import through [`Importer`]
//!
//! ## Example
//!
//! ```rust
//! use dirstore_core::{JournalStorage, Storage, StorageError, TreeName};
//!
//! let storage = JournalStorage::in_memory();
//! storage.open().unwrap();
//! let tree = TreeName::new("dccom", "dn2id");
//!
//! storage
//!     .write(|txn| -> Result<(), StorageError> {
//!         txn.create(&tree, b"a", b"1")?;
//!         txn.create(&tree, b"b", b"2")
//!     })
//!     .unwrap();
//!
//! let keys = storage
//!     .read(|txn| -> Result<Vec<Vec<u8>>, StorageError> {
//!         let mut cursor = txn.open_cursor(&tree)?;
//!         let mut keys = Vec::new();
//!         while cursor.next()? {
//!             keys.extend(cursor.key().map(|key| key.to_vec()));
//!         }
//!         Ok(keys)
//!     })
//!     .unwrap();
//! assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod cursor;
mod dir;
mod engine;
mod error;
mod import;
mod record;
mod state;
mod stats;
mod storage;
mod transaction;
mod tree;
mod types;

pub use config::{StorageConfig, StorageLocation};
pub use cursor::Cursor;
pub use dir::StorageDir;
pub use engine::JournalStorage;
pub use error::{StorageError, StorageResult, TransactionError};
pub use import::JournalImporter;
pub use record::{CommitRecord, TreeOp};
pub use stats::{StatsSnapshot, StorageStats};
pub use storage::{Importer, ReadableTransaction, Storage, WriteableTransaction};
pub use transaction::WriteableStorage;
pub use types::{ByteString, SequenceNumber, TransactionId, TreeName};
