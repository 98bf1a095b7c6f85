//! Entry identifiers and stored entries.

use crate::dn::Dn;
use crate::error::{BackendError, BackendResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of one stored entry within a suffix.
///
/// Identifiers are assigned by the caller and are expected to be unique
/// and ascending per suffix. The key form is big-endian so that key order
/// matches numeric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(u64);

impl EntryId {
    /// Length of the key form.
    pub const KEY_LEN: usize = 8;

    /// Creates an entry ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the key form.
    #[must_use]
    pub const fn to_key(self) -> [u8; Self::KEY_LEN] {
        self.0.to_be_bytes()
    }

    /// Decodes the key form.
    pub fn from_key(key: &[u8]) -> BackendResult<Self> {
        let raw: [u8; Self::KEY_LEN] = key.try_into().map_err(|_| {
            BackendError::codec(format!("entry ID must be {} bytes, got {}", Self::KEY_LEN, key.len()))
        })?;
        Ok(Self(u64::from_be_bytes(raw)))
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directory entry as stored in ID2Entry.
///
/// Attribute names are case-insensitive and kept in lower case; values are
/// kept as given, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    dn: Dn,
    attributes: BTreeMap<String, Vec<String>>,
}

impl Entry {
    /// Creates an entry with no attributes.
    #[must_use]
    pub fn new(dn: Dn) -> Self {
        Self {
            dn,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds `values` to `attribute`, builder style.
    #[must_use]
    pub fn with_attribute<I, V>(mut self, attribute: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        for value in values {
            self.add_value(attribute, value);
        }
        self
    }

    /// Adds one value to `attribute`.
    pub fn add_value(&mut self, attribute: &str, value: impl Into<String>) {
        self.attributes
            .entry(attribute.trim().to_lowercase())
            .or_default()
            .push(value.into());
    }

    /// The entry's DN.
    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    /// Values of `attribute`, if present.
    pub fn attribute(&self, attribute: &str) -> Option<&[String]> {
        self.attributes
            .get(&attribute.trim().to_lowercase())
            .map(Vec::as_slice)
    }

    /// All attributes.
    pub fn attributes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.attributes
    }

    /// Encodes the entry as CBOR.
    pub fn encode(&self) -> BackendResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| BackendError::codec(format!("failed to encode {}: {e}", self.dn)))?;
        Ok(bytes)
    }

    /// Decodes an entry encoded by [`Entry::encode`].
    pub fn decode(bytes: &[u8]) -> BackendResult<Self> {
        ciborium::from_reader(bytes)
            .map_err(|e| BackendError::codec(format!("failed to decode entry: {e}")))
    }
}
