//! Error types for volume operations.

use std::io;
use thiserror::Error;

/// Result type for volume operations.
pub type VolumeResult<T> = Result<T, VolumeError>;

/// Errors raised by a volume backend or the frame log.
#[derive(Debug, Error)]
pub enum VolumeError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of the volume.
    #[error("read beyond end of volume: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current volume size.
        size: u64,
    },

    /// A frame failed validation somewhere other than the tail.
    #[error("volume corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Offset of the offending frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// The volume has been closed.
    #[error("volume is closed")]
    Closed,
}

impl VolumeError {
    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }
}
