//! In-memory volume.

use crate::backend::VolumeBackend;
use crate::error::{VolumeError, VolumeResult};
use parking_lot::RwLock;
use std::io;
use std::sync::Arc;

/// A volume held entirely in memory.
///
/// Clones share the same buffer, so an engine can close and reopen an
/// in-memory backend without losing its journal: the engine keeps one
/// handle and gives a clone to each frame log it opens.
///
/// # Example
///
/// ```rust
/// use dirstore_volume::{MemoryVolume, VolumeBackend};
///
/// let mut volume = MemoryVolume::new();
/// let reopened = volume.clone();
/// volume.append(b"abc").unwrap();
/// assert_eq!(reopened.size().unwrap(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryVolume {
    data: Arc<RwLock<Vec<u8>>>,
}

impl MemoryVolume {
    /// Creates an empty in-memory volume.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a volume preloaded with `data`, for recovery tests.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns a copy of the volume contents.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Drops every byte held by this volume and all of its clones.
    pub fn wipe(&self) {
        self.data.write().clear();
    }
}

impl VolumeBackend for MemoryVolume {
    fn read_at(&self, offset: u64, len: usize) -> VolumeResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        match start.checked_add(len) {
            Some(end) if end <= data.len() => Ok(data[start..end].to_vec()),
            _ => Err(VolumeError::ReadPastEnd { offset, len, size }),
        }
    }

    fn append(&mut self, bytes: &[u8]) -> VolumeResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn sync(&mut self) -> VolumeResult<()> {
        Ok(())
    }

    fn size(&self) -> VolumeResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> VolumeResult<()> {
        let mut data = self.data.write();
        if new_size > data.len() as u64 {
            return Err(VolumeError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot grow volume from {} to {new_size} bytes", data.len()),
            )));
        }
        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_offsets() {
        let mut volume = MemoryVolume::new();
        assert_eq!(volume.append(b"dn2id").unwrap(), 0);
        assert_eq!(volume.append(b"id2entry").unwrap(), 5);
        assert_eq!(volume.size().unwrap(), 13);
        assert_eq!(volume.read_at(5, 8).unwrap(), b"id2entry");
    }

    #[test]
    fn read_past_end_fails() {
        let mut volume = MemoryVolume::new();
        volume.append(b"abc").unwrap();
        assert!(matches!(
            volume.read_at(2, 5),
            Err(VolumeError::ReadPastEnd { size: 3, .. })
        ));
    }

    #[test]
    fn clones_share_contents() {
        let mut volume = MemoryVolume::new();
        let other = volume.clone();
        volume.append(b"shared").unwrap();
        assert_eq!(other.read_all().unwrap(), b"shared");

        other.wipe();
        assert_eq!(volume.size().unwrap(), 0);
    }

    #[test]
    fn truncate_cannot_grow() {
        let mut volume = MemoryVolume::with_data(b"abcdef".to_vec());
        volume.truncate(2).unwrap();
        assert_eq!(volume.snapshot(), b"ab");
        assert!(volume.truncate(10).is_err());
    }
}
