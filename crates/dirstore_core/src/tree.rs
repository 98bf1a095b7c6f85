//! Committed tree contents.
//!
//! Every key keeps the sequence of the commit that last changed it. Removed
//! keys stay behind as tombstones so that validation can still see that
//! they changed; tombstones are purged once no transaction is running.

use crate::record::TreeOp;
use crate::types::{ByteString, SequenceNumber, TreeName};
use std::collections::BTreeMap;

/// One committed key.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    /// Current value, `None` for a tombstone.
    pub value: Option<ByteString>,
    /// Commit that last changed the key.
    pub version: SequenceNumber,
}

/// One committed tree.
#[derive(Debug, Clone)]
pub(crate) struct TreeState {
    pub entries: BTreeMap<ByteString, Slot>,
    /// Commit that created or last truncated the tree.
    pub generation: SequenceNumber,
    /// Commit that last changed any record.
    pub modified: SequenceNumber,
    live: u64,
    tombstones: usize,
}

impl TreeState {
    fn new(sequence: SequenceNumber) -> Self {
        Self {
            entries: BTreeMap::new(),
            generation: sequence,
            modified: sequence,
            live: 0,
            tombstones: 0,
        }
    }

    /// Returns the number of live (non-tombstone) records.
    pub fn live_count(&self) -> u64 {
        self.live
    }

    /// Returns the live value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Option<&ByteString> {
        self.entries.get(key).and_then(|slot| slot.value.as_ref())
    }

    /// Returns the version of `key`, tombstones included.
    pub fn version_of(&self, key: &[u8]) -> SequenceNumber {
        self.entries
            .get(key)
            .map_or(SequenceNumber::default(), |slot| slot.version)
    }

    fn put(&mut self, key: ByteString, value: ByteString, sequence: SequenceNumber) {
        let previous = self.entries.insert(
            key,
            Slot {
                value: Some(value),
                version: sequence,
            },
        );
        match previous {
            Some(Slot { value: Some(_), .. }) => {}
            Some(Slot { value: None, .. }) => {
                self.live += 1;
                self.tombstones -= 1;
            }
            None => self.live += 1,
        }
        self.modified = sequence;
    }

    fn remove(&mut self, key: &[u8], sequence: SequenceNumber) {
        if let Some(slot) = self.entries.get_mut(key).filter(|slot| slot.value.is_some()) {
            slot.value = None;
            slot.version = sequence;
            self.live -= 1;
            self.tombstones += 1;
            self.modified = sequence;
        }
    }

    fn purge(&mut self) {
        if self.tombstones > 0 {
            self.entries.retain(|_, slot| slot.value.is_some());
            self.tombstones = 0;
        }
    }

    fn clear(&mut self, sequence: SequenceNumber) {
        self.entries.clear();
        self.live = 0;
        self.tombstones = 0;
        self.generation = sequence;
        self.modified = sequence;
    }
}

/// Every committed tree of a volume.
#[derive(Debug, Default)]
pub(crate) struct TreeSet {
    trees: BTreeMap<TreeName, TreeState>,
}

impl TreeSet {
    pub fn get(&self, name: &TreeName) -> Option<&TreeState> {
        self.trees.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &TreeName> {
        self.trees.keys()
    }

    /// Applies the ops of one commit in order.
    pub fn apply(&mut self, ops: &[TreeOp], sequence: SequenceNumber) {
        for op in ops {
            match op {
                TreeOp::CreateTree(name) => {
                    self.trees
                        .entry(name.clone())
                        .or_insert_with(|| TreeState::new(sequence));
                }
                TreeOp::TruncateTree(name) => match self.trees.get_mut(name) {
                    Some(tree) => tree.clear(sequence),
                    None => {
                        self.trees.insert(name.clone(), TreeState::new(sequence));
                    }
                },
                TreeOp::DeleteTree(name) => {
                    self.trees.remove(name);
                }
                TreeOp::Put { tree, key, value } => {
                    self.trees
                        .entry(tree.clone())
                        .or_insert_with(|| TreeState::new(sequence))
                        .put(key.clone(), value.clone(), sequence);
                }
                TreeOp::Remove { tree, key } => {
                    if let Some(state) = self.trees.get_mut(tree) {
                        state.remove(key, sequence);
                    }
                }
            }
        }
    }

    /// Returns true if tombstones are waiting to be purged.
    pub fn has_tombstones(&self) -> bool {
        self.trees.values().any(|tree| tree.tombstones > 0)
    }

    /// Drops every tombstone. Only safe while no transaction is running.
    pub fn purge_tombstones(&mut self) {
        self.trees.values_mut().for_each(TreeState::purge);
    }
}
