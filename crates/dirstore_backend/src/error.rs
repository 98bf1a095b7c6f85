//! Error types for the directory layer.

use crate::dn::Dn;
use crate::entry::EntryId;
use dirstore_core::{StorageError, TransactionError};
use thiserror::Error;

/// Result type for directory-layer operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised by the directory layer.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The storage engine failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The backend configuration or its directory is unusable.
    #[error("configuration error: {message}")]
    Config {
        /// What is wrong with the configuration.
        message: String,
    },

    /// DN2ID resolved the DN but ID2Entry has no record for the ID.
    #[error("entry {entry_id} for {dn} is indexed but has no stored record")]
    MissingEntryRecord {
        /// The DN that resolved.
        dn: Dn,
        /// The identifier with no record.
        entry_id: EntryId,
    },

    /// The operation is deliberately not provided.
    #[error("operation not supported: {operation}")]
    Unsupported {
        /// Name of the refused operation.
        operation: &'static str,
    },

    /// A DN could not be parsed or does not belong where it was used.
    #[error("invalid DN {dn:?}: {message}")]
    InvalidDn {
        /// The offending DN text.
        dn: String,
        /// Why it was rejected.
        message: String,
    },

    /// An entry record could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// No registered suffix contains the DN.
    #[error("no suffix contains {dn}")]
    NoSuchSuffix {
        /// The DN that matched no suffix.
        dn: Dn,
    },
}

impl BackendError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid DN error.
    pub fn invalid_dn(dn: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDn {
            dn: dn.into(),
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an unsupported-operation error.
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }
}

impl TransactionError for BackendError {
    fn is_conflict(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_conflict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirstore_core::TreeName;

    #[test]
    fn conflicts_pass_through_storage_variant() {
        let conflict: BackendError = StorageError::conflict(&TreeName::new("dccom", "dn2id")).into();
        assert!(TransactionError::is_conflict(&conflict));
        assert!(!TransactionError::is_conflict(&BackendError::config("bad")));
        assert!(!TransactionError::is_conflict(&BackendError::from(StorageError::Closed)));
    }

    #[test]
    fn missing_record_mentions_dn_and_id() {
        let err = BackendError::MissingEntryRecord {
            dn: "ou=people,dc=example,dc=com".parse().unwrap(),
            entry_id: EntryId::new(5),
        };
        let message = err.to_string();
        assert!(message.contains("ou=people,dc=example,dc=com"));
        assert!(message.contains('5'));
    }
}
