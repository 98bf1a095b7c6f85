//! Volume backend trait.

use crate::error::VolumeResult;

/// An append-only byte store holding one backend's journal.
///
/// Backends never interpret the bytes they hold. The only mutation besides
/// `append` is `truncate`, used to drop a torn trailing frame after a crash
/// or to wipe the volume before an import.
///
/// # Invariants
///
/// - `append` returns the offset at which the data starts
/// - `read_at` returns exactly the bytes previously appended there
/// - after `sync` returns, every appended byte survives process termination
pub trait VolumeBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::VolumeError::ReadPastEnd`] if the range is not fully
    /// inside the volume.
    fn read_at(&self, offset: u64, len: usize) -> VolumeResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> VolumeResult<u64>;

    /// Makes every appended byte durable.
    fn sync(&mut self) -> VolumeResult<()>;

    /// Returns the current size in bytes.
    fn size(&self) -> VolumeResult<u64>;

    /// Shrinks the volume to `new_size` bytes.
    ///
    /// Growing through `truncate` is rejected.
    fn truncate(&mut self, new_size: u64) -> VolumeResult<()>;

    /// Reads the entire volume.
    fn read_all(&self) -> VolumeResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size).map_err(|_| {
            crate::VolumeError::corrupted(0, format!("volume of {size} bytes exceeds address space"))
        })?;
        self.read_at(0, len)
    }
}
