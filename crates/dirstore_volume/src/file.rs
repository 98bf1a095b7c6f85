//! File-backed volume.

use crate::backend::VolumeBackend;
use crate::error::{VolumeError, VolumeResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A volume stored in a single file.
///
/// Appends go straight to the OS; `sync` calls `File::sync_data` so that a
/// committed frame survives power loss.
#[derive(Debug)]
pub struct FileVolume {
    path: PathBuf,
    inner: Mutex<FileState>,
}

#[derive(Debug)]
struct FileState {
    file: File,
    size: u64,
}

impl FileVolume {
    /// Opens or creates the volume file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> VolumeResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(FileState { file, size }),
        })
    }

    /// Returns the path of the volume file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VolumeBackend for FileVolume {
    fn read_at(&self, offset: u64, len: usize) -> VolumeResult<Vec<u8>> {
        let mut state = self.inner.lock();
        let size = state.size;
        if offset.saturating_add(len as u64) > size {
            return Err(VolumeError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        state.file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        state.file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn append(&mut self, data: &[u8]) -> VolumeResult<u64> {
        let state = self.inner.get_mut();
        let offset = state.size;
        if data.is_empty() {
            return Ok(offset);
        }

        state.file.seek(SeekFrom::End(0))?;
        state.file.write_all(data)?;
        state.size += data.len() as u64;
        Ok(offset)
    }

    fn sync(&mut self) -> VolumeResult<()> {
        let state = self.inner.get_mut();
        state.file.flush()?;
        state.file.sync_data()?;
        Ok(())
    }

    fn size(&self) -> VolumeResult<u64> {
        Ok(self.inner.lock().size)
    }

    fn truncate(&mut self, new_size: u64) -> VolumeResult<()> {
        let state = self.inner.get_mut();
        if new_size > state.size {
            return Err(VolumeError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot grow volume from {} to {new_size} bytes", state.size),
            )));
        }

        state.file.set_len(new_size)?;
        state.file.sync_all()?;
        state.size = new_size;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.dsj");

        let volume = FileVolume::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(volume.size().unwrap(), 0);
        assert_eq!(volume.path(), path);
    }

    #[test]
    fn contents_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal.dsj");

        {
            let mut volume = FileVolume::open(&path).unwrap();
            volume.append(b"dccom_dn2id").unwrap();
            volume.sync().unwrap();
        }

        let volume = FileVolume::open(&path).unwrap();
        assert_eq!(volume.size().unwrap(), 11);
        assert_eq!(volume.read_at(6, 5).unwrap(), b"dn2id");
    }

    #[test]
    fn truncate_drops_tail() {
        let dir = tempdir().unwrap();
        let mut volume = FileVolume::open(&dir.path().join("journal.dsj")).unwrap();
        volume.append(b"keep-torn").unwrap();

        volume.truncate(4).unwrap();
        assert_eq!(volume.read_all().unwrap(), b"keep");
        assert!(matches!(
            volume.read_at(0, 5),
            Err(VolumeError::ReadPastEnd { .. })
        ));
    }
}
