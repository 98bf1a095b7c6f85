//! Commit records stored in the journal.
//!
//! One frame of the journal holds one [`CommitRecord`]:
//!
//! ```text
//! sequence u64 | op count u32 | op*
//! op = kind u8 | prefix (u16 len + utf8) | index id (u16 len + utf8) | [key (u32 len + bytes)] | [value (u32 len + bytes)]
//! ```
//!
//! All integers are little-endian. Keys are present for `Put` and
//! `Remove`; values only for `Put`.

use crate::error::{StorageError, StorageResult};
use crate::types::{ByteString, SequenceNumber, TreeName};

/// One change applied by a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeOp {
    /// Create a tree if it does not exist.
    CreateTree(TreeName),
    /// Remove every record of a tree, keeping the tree.
    TruncateTree(TreeName),
    /// Remove a tree and its records.
    DeleteTree(TreeName),
    /// Insert or replace one record.
    Put {
        /// Target tree.
        tree: TreeName,
        /// Record key.
        key: ByteString,
        /// Record value.
        value: ByteString,
    },
    /// Remove one record.
    Remove {
        /// Target tree.
        tree: TreeName,
        /// Record key.
        key: ByteString,
    },
}

impl TreeOp {
    const CREATE: u8 = 1;
    const TRUNCATE: u8 = 2;
    const DELETE: u8 = 3;
    const PUT: u8 = 4;
    const REMOVE: u8 = 5;

    /// Returns the tree this op touches.
    #[must_use]
    pub fn tree(&self) -> &TreeName {
        match self {
            Self::CreateTree(tree) | Self::TruncateTree(tree) | Self::DeleteTree(tree) => tree,
            Self::Put { tree, .. } | Self::Remove { tree, .. } => tree,
        }
    }
}

/// All changes of one committed transaction, tagged with its sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Commit sequence number.
    pub sequence: SequenceNumber,
    /// Changes in application order.
    pub ops: Vec<TreeOp>,
}

impl CommitRecord {
    /// Serializes the record into a frame payload.
    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.sequence.as_u64().to_le_bytes());
        let count = u32::try_from(self.ops.len())
            .map_err(|_| StorageError::invalid_operation("too many operations in one commit"))?;
        buf.extend_from_slice(&count.to_le_bytes());

        for op in &self.ops {
            match op {
                TreeOp::CreateTree(tree) => {
                    buf.push(TreeOp::CREATE);
                    put_tree(&mut buf, tree)?;
                }
                TreeOp::TruncateTree(tree) => {
                    buf.push(TreeOp::TRUNCATE);
                    put_tree(&mut buf, tree)?;
                }
                TreeOp::DeleteTree(tree) => {
                    buf.push(TreeOp::DELETE);
                    put_tree(&mut buf, tree)?;
                }
                TreeOp::Put { tree, key, value } => {
                    buf.push(TreeOp::PUT);
                    put_tree(&mut buf, tree)?;
                    put_bytes(&mut buf, key)?;
                    put_bytes(&mut buf, value)?;
                }
                TreeOp::Remove { tree, key } => {
                    buf.push(TreeOp::REMOVE);
                    put_tree(&mut buf, tree)?;
                    put_bytes(&mut buf, key)?;
                }
            }
        }
        Ok(buf)
    }

    /// Deserializes a frame payload.
    pub fn decode(payload: &[u8]) -> StorageResult<Self> {
        let mut reader = Reader { payload, pos: 0 };
        let sequence = SequenceNumber::new(reader.u64()?);
        let count = reader.u32()?;

        let mut ops = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let kind = reader.u8()?;
            let tree = reader.tree()?;
            let op = match kind {
                TreeOp::CREATE => TreeOp::CreateTree(tree),
                TreeOp::TRUNCATE => TreeOp::TruncateTree(tree),
                TreeOp::DELETE => TreeOp::DeleteTree(tree),
                TreeOp::PUT => {
                    let key = reader.bytes()?;
                    let value = reader.bytes()?;
                    TreeOp::Put { tree, key, value }
                }
                TreeOp::REMOVE => {
                    let key = reader.bytes()?;
                    TreeOp::Remove { tree, key }
                }
                other => {
                    return Err(StorageError::corrupted(format!(
                        "unknown tree op kind {other} in commit {sequence}"
                    )))
                }
            };
            ops.push(op);
        }

        if reader.pos != payload.len() {
            return Err(StorageError::corrupted(format!(
                "trailing bytes in commit {sequence}: used {}, got {}",
                reader.pos,
                payload.len()
            )));
        }
        Ok(Self { sequence, ops })
    }
}

/// Writes the prefix and index id as separate fields, so any characters
/// survive the round trip.
fn put_tree(buf: &mut Vec<u8>, tree: &TreeName) -> StorageResult<()> {
    put_name_part(buf, tree, tree.prefix())?;
    put_name_part(buf, tree, tree.index_id())
}

fn put_name_part(buf: &mut Vec<u8>, tree: &TreeName, part: &str) -> StorageResult<()> {
    let len = u16::try_from(part.len())
        .map_err(|_| StorageError::invalid_operation(format!("tree name too long: {tree}")))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(part.as_bytes());
    Ok(())
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> StorageResult<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| StorageError::invalid_operation("record larger than 4 GiB"))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

struct Reader<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> StorageResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.payload.len())
            .ok_or_else(|| StorageError::corrupted("unexpected end of commit record"))?;
        let slice = &self.payload[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> StorageResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> StorageResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> StorageResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> StorageResult<u64> {
        let b = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    fn bytes(&mut self) -> StorageResult<ByteString> {
        let len = self.u32()? as usize;
        Ok(ByteString::copy_from_slice(self.take(len)?))
    }

    fn name_part(&mut self) -> StorageResult<&'a str> {
        let len = self.u16()? as usize;
        std::str::from_utf8(self.take(len)?)
            .map_err(|_| StorageError::corrupted("tree name is not UTF-8"))
    }

    fn tree(&mut self) -> StorageResult<TreeName> {
        let prefix = self.name_part()?;
        let index_id = self.name_part()?;
        Ok(TreeName::new(prefix, index_id))
    }
}
