//! Per-tree state of one transaction attempt.

use crate::record::TreeOp;
use crate::tree::{Slot, TreeState};
use crate::types::{ByteString, SequenceNumber, TreeName};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

/// A transaction's view of a single tree.
///
/// It buffers the attempt's writes and remembers what the attempt has
/// observed of the committed tree, so that commit can tell whether another
/// transaction changed any of it in the meantime.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub tree: TreeName,
    /// Generation of the committed tree at first touch, `None` if absent.
    seen_generation: Option<SequenceNumber>,
    /// Versions of every key read or written, captured at first touch.
    observed: HashMap<ByteString, SequenceNumber>,
    /// Tree modification stamp at the first scan or count.
    scanned_at: Option<SequenceNumber>,
    /// Buffered writes; `None` removes the key.
    pending: BTreeMap<ByteString, Option<ByteString>>,
    /// Truncate, create and delete ops, in the order they were issued.
    schema: Vec<TreeOp>,
    /// The committed contents are hidden by a truncate or delete.
    cleared: bool,
    /// Whether the tree exists from this attempt's point of view.
    exists: bool,
}

impl Exchange {
    pub fn new(tree: TreeName, committed: Option<&TreeState>) -> Self {
        Self {
            tree,
            seen_generation: committed.map(|state| state.generation),
            observed: HashMap::new(),
            scanned_at: None,
            pending: BTreeMap::new(),
            schema: Vec::new(),
            cleared: false,
            exists: committed.is_some(),
        }
    }

    fn observe(&mut self, committed: Option<&TreeState>, key: &[u8]) {
        if !self.observed.contains_key(key) {
            let version = committed.map_or(SequenceNumber::default(), |state| state.version_of(key));
            self.observed.insert(ByteString::copy_from_slice(key), version);
        }
    }

    fn visible_committed<'t>(&self, committed: Option<&'t TreeState>) -> Option<&'t TreeState> {
        if self.cleared {
            None
        } else {
            committed
        }
    }

    /// Returns the value of `key` as this attempt sees it.
    pub fn get(&mut self, committed: Option<&TreeState>, key: &[u8]) -> Option<ByteString> {
        if let Some(value) = self.pending.get(key) {
            return value.clone();
        }
        self.observe(committed, key);
        self.visible_committed(committed)
            .and_then(|state| state.get(key))
            .cloned()
    }

    pub fn put(&mut self, committed: Option<&TreeState>, key: &[u8], value: &[u8]) {
        self.observe(committed, key);
        self.pending.insert(
            ByteString::copy_from_slice(key),
            Some(ByteString::copy_from_slice(value)),
        );
        self.exists = true;
    }

    pub fn remove(&mut self, committed: Option<&TreeState>, key: &[u8]) {
        self.observe(committed, key);
        self.pending.insert(ByteString::copy_from_slice(key), None);
    }

    pub fn open_tree(&mut self) {
        if !self.exists {
            self.schema.push(TreeOp::CreateTree(self.tree.clone()));
            self.exists = true;
        }
    }

    pub fn truncate(&mut self) {
        self.pending.clear();
        self.cleared = true;
        self.exists = true;
        self.schema.push(TreeOp::TruncateTree(self.tree.clone()));
    }

    pub fn delete_tree(&mut self) {
        self.pending.clear();
        self.cleared = true;
        self.exists = false;
        self.schema.push(TreeOp::DeleteTree(self.tree.clone()));
    }

    /// Records that the attempt depends on the whole tree.
    pub fn mark_scanned(&mut self, committed: Option<&TreeState>) {
        if self.scanned_at.is_none() {
            self.scanned_at = Some(committed.map_or(SequenceNumber::default(), |state| state.modified));
        }
    }

    /// Counts the records visible to this attempt.
    pub fn count(&self, committed: Option<&TreeState>) -> u64 {
        let visible = self.visible_committed(committed);
        let mut count = visible.map_or(0, TreeState::live_count);
        for (key, value) in &self.pending {
            let stored = visible.is_some_and(|state| state.get(key).is_some());
            match (value.is_some(), stored) {
                (true, false) => count += 1,
                (false, true) => count -= 1,
                _ => {}
            }
        }
        count
    }

    /// Finds the first visible record at or after `from` (or at or before
    /// it when `forward` is false), merging committed and buffered data.
    pub fn seek(
        &self,
        committed: Option<&TreeState>,
        from: Bound<&[u8]>,
        forward: bool,
    ) -> Option<(ByteString, ByteString)> {
        let range = if forward {
            (from, Bound::Unbounded)
        } else {
            (Bound::Unbounded, from)
        };

        let stored = self.visible_committed(committed).and_then(|state| {
            let pick = |(key, slot): (&ByteString, &Slot)| {
                if self.pending.contains_key(key) {
                    return None;
                }
                slot.value.as_ref().map(|value| (key.clone(), value.clone()))
            };
            let mut entries = state.entries.range::<[u8], _>(range);
            if forward {
                entries.find_map(pick)
            } else {
                entries.rev().find_map(pick)
            }
        });

        let mut buffered = self
            .pending
            .range::<[u8], _>(range)
            .filter_map(|(key, value)| value.as_ref().map(|value| (key.clone(), value.clone())));
        let buffered = if forward {
            buffered.next()
        } else {
            buffered.next_back()
        };

        match (stored, buffered) {
            (Some(a), Some(b)) => {
                if (a.0 < b.0) == forward {
                    Some(a)
                } else {
                    Some(b)
                }
            }
            (a, b) => a.or(b),
        }
    }

    /// Returns true if committing would change anything.
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty() || !self.schema.is_empty()
    }

    /// Checks that nothing this attempt observed has been changed by
    /// another commit.
    pub fn validate(&self, current: Option<&TreeState>) -> bool {
        if current.map(|state| state.generation) != self.seen_generation {
            return false;
        }
        if let Some(scanned_at) = self.scanned_at {
            let modified = current.map_or(SequenceNumber::default(), |state| state.modified);
            if modified != scanned_at {
                return false;
            }
        }
        self.observed.iter().all(|(key, version)| {
            current.map_or(SequenceNumber::default(), |state| state.version_of(key)) == *version
        })
    }

    /// Appends the ops this attempt commits for the tree.
    pub fn collect_ops(&self, ops: &mut Vec<TreeOp>) {
        ops.extend(self.schema.iter().cloned());
        for (key, value) in &self.pending {
            ops.push(match value {
                Some(value) => TreeOp::Put {
                    tree: self.tree.clone(),
                    key: key.clone(),
                    value: value.clone(),
                },
                None => TreeOp::Remove {
                    tree: self.tree.clone(),
                    key: key.clone(),
                },
            });
        }
    }
}
