//! # dirstore volume
//!
//! The physical volume underneath a dirstore backend.
//!
//! A volume is an **opaque, append-only byte store**. It has no notion of
//! trees, keys or transactions; the engine in `dirstore_core` owns all of
//! that. This crate provides:
//!
//! - [`VolumeBackend`], the byte-store contract
//! - [`MemoryVolume`] for tests and ephemeral backends
//! - [`FileVolume`] for persistent backends
//! - [`FrameLog`], a checksummed record framing on top of any backend
//!
//! ## Example
//!
//! ```rust
//! use dirstore_volume::{FrameLog, MemoryVolume};
//!
//! let mut log = FrameLog::new(Box::new(MemoryVolume::new()));
//! log.append_frame(b"first commit").unwrap();
//! let scan = log.scan().unwrap();
//! assert_eq!(scan.frames, vec![b"first commit".to_vec()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod frame;
mod memory;

pub use backend::VolumeBackend;
pub use error::{VolumeError, VolumeResult};
pub use file::FileVolume;
pub use frame::{compute_crc32, FrameLog, FrameScan, FRAME_MAGIC, FRAME_OVERHEAD};
pub use memory::MemoryVolume;
