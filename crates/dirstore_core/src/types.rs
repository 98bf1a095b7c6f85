//! Core type definitions for the storage engine.

use std::fmt;

/// An immutable key or value. Ordering and equality are byte-lexicographic.
pub type ByteString = bytes::Bytes;

/// Name of one ordered key-value tree.
///
/// A tree name is scoped by a prefix (one per suffix) so that many suffixes
/// can share a volume. It renders as `<prefix>_<index_id>`, e.g.
/// `dccom_dn2id`. The journal stores the two parts separately; the
/// rendered form only parses back when the prefix has no `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreeName {
    prefix: String,
    index_id: String,
}

impl TreeName {
    /// Creates a tree name.
    #[must_use]
    pub fn new(prefix: impl Into<String>, index_id: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            index_id: index_id.into(),
        }
    }

    /// Parses the `<prefix>_<index_id>` form.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let (prefix, index_id) = name.split_once('_')?;
        if prefix.is_empty() || index_id.is_empty() {
            return None;
        }
        Some(Self::new(prefix, index_id))
    }

    /// Returns the suffix-specific prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the index identifier within the prefix.
    #[must_use]
    pub fn index_id(&self) -> &str {
        &self.index_id
    }
}

impl fmt::Display for TreeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.prefix, self.index_id)
    }
}

/// Unique identifier for a transaction attempt.
///
/// Every retry of an operation gets a fresh identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Commit sequence number.
///
/// Each successful commit gets the next sequence number. Every stored key
/// remembers the sequence of the commit that last changed it, which is
/// what optimistic validation compares against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}
