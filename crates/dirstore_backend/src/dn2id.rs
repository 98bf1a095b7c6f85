//! The DN to entry ID index of one suffix.

use crate::dn::Dn;
use crate::dn_key;
use crate::entry::EntryId;
use crate::error::{BackendError, BackendResult};
use dirstore_core::{ByteString, ReadableTransaction, TreeName, WriteableTransaction};

/// Maps the DNs of one suffix to their entry IDs.
///
/// Keys are suffix-relative (see [`crate::dn_key`]); values are
/// [`EntryId::to_key`] bytes.
#[derive(Debug, Clone)]
pub struct Dn2Id {
    tree: TreeName,
    base_dn: Dn,
}

impl Dn2Id {
    /// Index identifier used in the tree name.
    pub const INDEX_ID: &'static str = "dn2id";

    /// Creates the index for the suffix `base_dn`, whose trees use `prefix`.
    pub fn new(prefix: &str, base_dn: Dn) -> Self {
        Self {
            tree: TreeName::new(prefix, Self::INDEX_ID),
            base_dn,
        }
    }

    /// The backing tree.
    pub fn tree(&self) -> &TreeName {
        &self.tree
    }

    /// The suffix base DN.
    pub fn base_dn(&self) -> &Dn {
        &self.base_dn
    }

    /// Returns the key `dn` is stored under.
    pub fn key_for(&self, dn: &Dn) -> BackendResult<Vec<u8>> {
        dn_key::encode(dn, &self.base_dn)
    }

    /// Creates the backing tree if needed.
    pub fn open<T>(&self, txn: &mut T) -> BackendResult<()>
    where
        T: WriteableTransaction + ?Sized,
    {
        txn.open_tree(&self.tree)?;
        Ok(())
    }

    /// Stores `id` for `dn`, replacing any ID already stored for it.
    pub fn insert<T>(&self, txn: &mut T, dn: &Dn, id: EntryId) -> BackendResult<()>
    where
        T: WriteableTransaction + ?Sized,
    {
        let key = self.key_for(dn)?;
        txn.create(&self.tree, &key, &id.to_key())?;
        Ok(())
    }

    /// Looks up the ID stored for `dn`. DNs outside the suffix are absent.
    pub fn get<T>(&self, txn: &mut T, dn: &Dn) -> BackendResult<Option<EntryId>>
    where
        T: ReadableTransaction + ?Sized,
    {
        if !dn.is_descendant_of(&self.base_dn) {
            return Ok(None);
        }
        let key = self.key_for(dn)?;
        txn.read(&self.tree, &key)?
            .map(|value| EntryId::from_key(&value))
            .transpose()
    }

    /// Not supported; use [`Dn2Id::insert`].
    pub fn put<T>(&self, _txn: &mut T, _dn: &Dn, _id: EntryId) -> BackendResult<()>
    where
        T: WriteableTransaction + ?Sized,
    {
        Err(BackendError::unsupported("dn2id put"))
    }

    /// Not supported.
    pub fn remove<T>(&self, _txn: &mut T, _dn: &Dn) -> BackendResult<bool>
    where
        T: WriteableTransaction + ?Sized,
    {
        Err(BackendError::unsupported("dn2id remove"))
    }

    /// Lists the immediate children of `dn` as `(key, id)` pairs in key
    /// order.
    pub fn children<T>(&self, txn: &mut T, dn: &Dn) -> BackendResult<Vec<(ByteString, EntryId)>>
    where
        T: ReadableTransaction + ?Sized,
    {
        let parent_key = self.key_for(dn)?;
        let prefix = dn_key::subtree_prefix(&parent_key);
        let mut children = Vec::new();

        let mut cursor = txn.open_cursor(&self.tree)?;
        if !cursor.position_to_key_or_next(prefix)? {
            return Ok(children);
        }
        while cursor.next()? {
            let (Some(key), Some(value)) = (cursor.key(), cursor.value()) else {
                break;
            };
            if !key.starts_with(prefix) {
                break;
            }
            if dn_key::is_child_key(prefix, key) {
                children.push((key.clone(), EntryId::from_key(value)?));
            }
        }
        Ok(children)
    }
}
