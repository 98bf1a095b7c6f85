//! Error types for the storage engine.

use crate::types::TreeName;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the storage engine.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The physical volume failed.
    #[error("volume error: {0}")]
    Volume(#[from] dirstore_volume::VolumeError),

    /// I/O error outside the volume (directory handling, lock file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A concurrent transaction committed a change this attempt depended on.
    ///
    /// The retry wrapper re-runs the whole operation when it sees this.
    #[error("optimistic conflict on tree {tree}")]
    Conflict {
        /// The tree where validation failed.
        tree: TreeName,
    },

    /// The engine is closed.
    #[error("storage is closed")]
    Closed,

    /// The engine hit an unrecoverable failure and must not be reused.
    #[error("storage is in a fatal state: {message}")]
    Fatal {
        /// What pushed the engine into the fatal state.
        message: String,
    },

    /// Another process holds the storage directory.
    #[error("storage directory locked: another process has exclusive access")]
    Locked,

    /// Transactions are refused while an import is running.
    #[error("an import is in progress")]
    ImportInProgress,

    /// Persisted data failed validation.
    #[error("storage corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// The operation is deliberately not provided.
    #[error("operation not supported: {operation}")]
    Unsupported {
        /// Name of the refused operation.
        operation: &'static str,
    },

    /// The retry cap was reached while conflicts kept occurring.
    #[error("transaction still conflicting after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Why the operation is invalid.
        message: String,
    },

    /// A failure raised by caller code inside an operation closure.
    #[error("operation failed: {0}")]
    Operation(#[source] Box<dyn StdError + Send + Sync>),
}

impl StorageError {
    /// Returns true for the optimistic-conflict signal.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Creates a conflict error.
    pub fn conflict(tree: &TreeName) -> Self {
        Self::Conflict { tree: tree.clone() }
    }

    /// Creates a fatal-state error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates an unsupported-operation error.
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Wraps a foreign error raised inside an operation closure.
    pub fn operation(cause: impl StdError + Send + Sync + 'static) -> Self {
        Self::Operation(Box::new(cause))
    }
}

/// Error types that can flow out of a retried operation closure.
///
/// The retry wrapper needs to turn its own failures into the caller's error
/// type and to recognise the conflict signal inside it. Everything that is
/// not a conflict is handed back to the caller unchanged.
pub trait TransactionError: From<StorageError> {
    /// Returns true if this error is the optimistic-conflict signal.
    fn is_conflict(&self) -> bool;
}

impl TransactionError for StorageError {
    fn is_conflict(&self) -> bool {
        StorageError::is_conflict(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retryable() {
        let tree = TreeName::new("dccom", "dn2id");
        assert!(StorageError::conflict(&tree).is_conflict());
        assert!(!StorageError::Closed.is_conflict());
        assert!(!StorageError::fatal("disk gone").is_conflict());
    }

    #[test]
    fn operation_keeps_its_source() {
        let err = StorageError::operation(io::Error::other("boom"));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "operation failed: boom");
    }
}
