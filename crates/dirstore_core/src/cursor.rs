//! Ordered cursors over one tree.

use crate::error::StorageResult;
use crate::state::EngineState;
use crate::transaction::exchange::Exchange;
use crate::types::ByteString;
use std::ops::Bound;

/// A positioned iterator over one tree, scoped to a transaction attempt.
///
/// After [`Cursor::position_to_key`] or [`Cursor::position_to_key_or_next`]
/// the cursor already sits on a record, so the first [`Cursor::next`] that
/// follows reports that record instead of advancing. This lets callers
/// write "position, then loop on `next`" without skipping the first match.
pub trait Cursor {
    /// Positions on exactly `key`. Returns false, leaving the cursor
    /// unpositioned, if `key` is absent.
    fn position_to_key(&mut self, key: &[u8]) -> StorageResult<bool>;

    /// Positions on the smallest key not less than `key`.
    fn position_to_key_or_next(&mut self, key: &[u8]) -> StorageResult<bool>;

    /// Positions on the largest key.
    fn position_to_last_key(&mut self) -> StorageResult<bool>;

    /// Moves to the next record. From an unpositioned cursor this moves to
    /// the first record.
    fn next(&mut self) -> StorageResult<bool>;

    /// Moves to the previous record. From an unpositioned cursor this moves
    /// to the last record.
    fn previous(&mut self) -> StorageResult<bool>;

    /// Returns true if the cursor sits on a record.
    fn is_defined(&self) -> bool;

    /// Key of the current record.
    fn key(&self) -> Option<&ByteString>;

    /// Value of the current record.
    fn value(&self) -> Option<&ByteString>;

    /// Releases the cursor's position. Further moves report no record.
    fn close(&mut self);
}

#[derive(Debug)]
enum Position {
    Unpositioned,
    At { key: ByteString, value: ByteString },
    Exhausted,
}

/// Cursor over an exchange's merged view of a tree.
#[derive(Debug)]
pub(crate) struct TreeCursor<'t> {
    state: &'t EngineState,
    exchange: &'t Exchange,
    position: Position,
    just_positioned: bool,
    closed: bool,
}

impl<'t> TreeCursor<'t> {
    pub fn new(state: &'t EngineState, exchange: &'t Exchange) -> Self {
        Self {
            state,
            exchange,
            position: Position::Unpositioned,
            just_positioned: false,
            closed: false,
        }
    }

    fn seek(&self, from: Bound<&[u8]>, forward: bool) -> Option<(ByteString, ByteString)> {
        let trees = self.state.trees.read();
        self.exchange
            .seek(trees.get(&self.exchange.tree), from, forward)
    }

    fn land(&mut self, found: Option<(ByteString, ByteString)>, miss: Position) -> bool {
        match found {
            Some((key, value)) => {
                self.position = Position::At { key, value };
                true
            }
            None => {
                self.position = miss;
                false
            }
        }
    }

    fn step(&mut self, forward: bool) -> bool {
        let found = match &self.position {
            Position::Exhausted => return false,
            Position::Unpositioned => self.seek(Bound::Unbounded, forward),
            Position::At { key, .. } => self.seek(Bound::Excluded(key.as_ref()), forward),
        };
        self.land(found, Position::Exhausted)
    }
}

impl Cursor for TreeCursor<'_> {
    fn position_to_key(&mut self, key: &[u8]) -> StorageResult<bool> {
        if self.closed {
            return Ok(false);
        }
        let found = self
            .seek(Bound::Included(key), true)
            .filter(|(found, _)| found.as_ref() == key);
        let hit = self.land(found, Position::Unpositioned);
        self.just_positioned = hit;
        Ok(hit)
    }

    fn position_to_key_or_next(&mut self, key: &[u8]) -> StorageResult<bool> {
        if self.closed {
            return Ok(false);
        }
        let found = self.seek(Bound::Included(key), true);
        let hit = self.land(found, Position::Exhausted);
        self.just_positioned = hit;
        Ok(hit)
    }

    fn position_to_last_key(&mut self) -> StorageResult<bool> {
        if self.closed {
            return Ok(false);
        }
        self.just_positioned = false;
        let found = self.seek(Bound::Unbounded, false);
        Ok(self.land(found, Position::Exhausted))
    }

    fn next(&mut self) -> StorageResult<bool> {
        if self.closed {
            return Ok(false);
        }
        if self.just_positioned {
            self.just_positioned = false;
            return Ok(self.is_defined());
        }
        Ok(self.step(true))
    }

    fn previous(&mut self) -> StorageResult<bool> {
        if self.closed {
            return Ok(false);
        }
        self.just_positioned = false;
        Ok(self.step(false))
    }

    fn is_defined(&self) -> bool {
        matches!(self.position, Position::At { .. })
    }

    fn key(&self) -> Option<&ByteString> {
        match &self.position {
            Position::At { key, .. } => Some(key),
            _ => None,
        }
    }

    fn value(&self) -> Option<&ByteString> {
        match &self.position {
            Position::At { value, .. } => Some(value),
            _ => None,
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.just_positioned = false;
        self.position = Position::Unpositioned;
    }
}

#[cfg(test)]
mod tests {
    use crate::{JournalStorage, Storage, StorageResult, TreeName};

    fn tree() -> TreeName {
        TreeName::new("dccom", "dn2id")
    }

    fn storage_with(keys: &[&[u8]]) -> JournalStorage {
        let storage = JournalStorage::in_memory();
        storage.open().unwrap();
        storage
            .write(|txn| -> StorageResult<()> {
                for key in keys {
                    txn.create(&tree(), key, &[key[0]])?;
                }
                Ok(())
            })
            .unwrap();
        storage
    }

    #[test]
    fn next_from_unpositioned_walks_in_order() {
        let storage = storage_with(&[b"c", b"a", b"b"]);
        let keys = storage
            .read(|txn| -> StorageResult<Vec<Vec<u8>>> {
                let mut cursor = txn.open_cursor(&tree())?;
                let mut keys = Vec::new();
                while cursor.next()? {
                    keys.push(cursor.key().unwrap().to_vec());
                    assert_eq!(cursor.value().unwrap()[0], cursor.key().unwrap()[0]);
                }
                assert!(!cursor.is_defined());
                assert!(!cursor.next()?);
                Ok(keys)
            })
            .unwrap();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn first_next_after_positioning_stays_put() {
        let storage = storage_with(&[b"a", b"c", b"e"]);
        storage
            .read(|txn| -> StorageResult<()> {
                let mut cursor = txn.open_cursor(&tree())?;
                assert!(cursor.position_to_key(b"c")?);
                assert!(cursor.next()?);
                assert_eq!(cursor.key().unwrap().as_ref(), b"c");
                assert!(cursor.next()?);
                assert_eq!(cursor.key().unwrap().as_ref(), b"e");

                assert!(cursor.position_to_key_or_next(b"b")?);
                assert_eq!(cursor.key().unwrap().as_ref(), b"c");
                assert!(cursor.next()?);
                assert_eq!(cursor.key().unwrap().as_ref(), b"c");
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn previous_after_positioning_moves_immediately() {
        let storage = storage_with(&[b"a", b"c", b"e"]);
        storage
            .read(|txn| -> StorageResult<()> {
                let mut cursor = txn.open_cursor(&tree())?;
                assert!(cursor.position_to_key(b"c")?);
                assert!(cursor.previous()?);
                assert_eq!(cursor.key().unwrap().as_ref(), b"a");
                assert!(!cursor.previous()?);
                assert!(!cursor.previous()?);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn positioning_misses() {
        let storage = storage_with(&[b"a", b"c"]);
        storage
            .read(|txn| -> StorageResult<()> {
                let mut cursor = txn.open_cursor(&tree())?;
                assert!(!cursor.position_to_key(b"b")?);
                assert!(!cursor.is_defined());
                assert!(cursor.key().is_none());
                assert!(!cursor.position_to_key_or_next(b"d")?);
                assert!(!cursor.next()?);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn last_key_and_backward_walk() {
        let storage = storage_with(&[b"a", b"b", b"c"]);
        let keys = storage
            .read(|txn| -> StorageResult<Vec<Vec<u8>>> {
                let mut cursor = txn.open_cursor(&tree())?;
                assert!(cursor.position_to_last_key()?);
                let mut keys = vec![cursor.key().unwrap().to_vec()];
                while cursor.previous()? {
                    keys.push(cursor.key().unwrap().to_vec());
                }
                Ok(keys)
            })
            .unwrap();
        assert_eq!(keys, vec![b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn previous_from_unpositioned_starts_at_last_key() {
        let storage = storage_with(&[b"a", b"b"]);
        storage
            .read(|txn| -> StorageResult<()> {
                let mut cursor = txn.open_cursor(&tree())?;
                assert!(cursor.previous()?);
                assert_eq!(cursor.key().unwrap().as_ref(), b"b");
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn cursor_sees_uncommitted_writes_of_its_transaction() {
        let storage = storage_with(&[b"a", b"c"]);
        storage
            .write(|txn| -> StorageResult<()> {
                txn.create(&tree(), b"b", b"b")?;
                txn.remove(&tree(), b"c")?;
                let mut cursor = txn.open_cursor(&tree())?;
                let mut keys = Vec::new();
                while cursor.next()? {
                    keys.push(cursor.key().unwrap().to_vec());
                }
                assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn closed_cursor_reports_nothing() {
        let storage = storage_with(&[b"a"]);
        storage
            .read(|txn| -> StorageResult<()> {
                let mut cursor = txn.open_cursor(&tree())?;
                assert!(cursor.next()?);
                cursor.close();
                assert!(cursor.key().is_none());
                assert!(!cursor.next()?);
                assert!(!cursor.position_to_key(b"a")?);
                Ok(())
            })
            .unwrap();
    }
}
