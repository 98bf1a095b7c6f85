//! Checksummed frame log.
//!
//! Every frame is laid out as:
//!
//! ```text
//! magic (4) | payload length u32 LE (4) | payload | crc32 LE (4)
//! ```
//!
//! The CRC covers the length field and the payload. A crash can only damage
//! the last frame, so an incomplete or mismatching trailing frame is treated
//! as torn and cut off by [`FrameLog::recover`]. Damage anywhere else is
//! reported as [`VolumeError::Corrupted`].

use crate::backend::VolumeBackend;
use crate::error::{VolumeError, VolumeResult};

/// Magic bytes opening every frame.
pub const FRAME_MAGIC: [u8; 4] = *b"DSJ1";

/// Bytes added around each payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + CRC_SIZE;

const HEADER_SIZE: usize = 8;
const CRC_SIZE: usize = 4;

/// Result of scanning a frame log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameScan {
    /// Payloads of every intact frame, in append order.
    pub frames: Vec<Vec<u8>>,
    /// Length of the intact prefix of the volume.
    pub valid_len: u64,
    /// Bytes after `valid_len` belonging to a torn trailing frame.
    pub torn_bytes: u64,
}

/// Appends and scans checksummed frames on a [`VolumeBackend`].
pub struct FrameLog {
    backend: Box<dyn VolumeBackend>,
}

impl FrameLog {
    /// Wraps a backend.
    pub fn new(backend: Box<dyn VolumeBackend>) -> Self {
        Self { backend }
    }

    /// Appends one frame and returns its offset.
    ///
    /// The frame is not durable until [`FrameLog::sync`] returns.
    pub fn append_frame(&mut self, payload: &[u8]) -> VolumeResult<u64> {
        let len = u32::try_from(payload.len()).map_err(|_| {
            VolumeError::corrupted(0, format!("frame payload of {} bytes too large", payload.len()))
        })?;

        let mut frame = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
        frame.extend_from_slice(&FRAME_MAGIC);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(payload);
        let crc = compute_crc32(&frame[FRAME_MAGIC.len()..]);
        frame.extend_from_slice(&crc.to_le_bytes());

        self.backend.append(&frame)
    }

    /// Makes all appended frames durable.
    pub fn sync(&mut self) -> VolumeResult<()> {
        self.backend.sync()
    }

    /// Returns the size of the underlying volume.
    pub fn size(&self) -> VolumeResult<u64> {
        self.backend.size()
    }

    /// Drops every frame.
    pub fn reset(&mut self) -> VolumeResult<()> {
        self.backend.truncate(0)?;
        self.backend.sync()
    }

    /// Reads every intact frame without modifying the volume.
    pub fn scan(&self) -> VolumeResult<FrameScan> {
        let data = self.backend.read_all()?;
        scan_frames(&data)
    }

    /// Scans the volume and cuts off a torn trailing frame, if any.
    pub fn recover(&mut self) -> VolumeResult<FrameScan> {
        let scan = self.scan()?;
        if scan.torn_bytes > 0 {
            self.backend.truncate(scan.valid_len)?;
        }
        Ok(scan)
    }
}

impl std::fmt::Debug for FrameLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLog")
            .field("size", &self.backend.size().ok())
            .finish_non_exhaustive()
    }
}

fn scan_frames(data: &[u8]) -> VolumeResult<FrameScan> {
    let mut scan = FrameScan::default();
    let mut offset = 0usize;

    while offset < data.len() {
        let remaining = data.len() - offset;
        if remaining < HEADER_SIZE {
            break;
        }
        if data[offset..offset + 4] != FRAME_MAGIC {
            return Err(VolumeError::corrupted(offset as u64, "bad frame magic"));
        }

        let len_bytes = [
            data[offset + 4],
            data[offset + 5],
            data[offset + 6],
            data[offset + 7],
        ];
        let len = u32::from_le_bytes(len_bytes) as usize;
        let end = offset + HEADER_SIZE + len + CRC_SIZE;
        if end > data.len() {
            break;
        }

        let payload = &data[offset + HEADER_SIZE..offset + HEADER_SIZE + len];
        let crc_start = end - CRC_SIZE;
        let stored = u32::from_le_bytes([
            data[crc_start],
            data[crc_start + 1],
            data[crc_start + 2],
            data[crc_start + 3],
        ]);
        let computed = compute_crc32(&data[offset + 4..crc_start]);
        if stored != computed {
            if end == data.len() {
                break;
            }
            return Err(VolumeError::corrupted(
                offset as u64,
                format!("checksum mismatch: stored {stored:08x}, computed {computed:08x}"),
            ));
        }

        scan.frames.push(payload.to_vec());
        offset = end;
    }

    scan.valid_len = offset as u64;
    scan.torn_bytes = (data.len() - offset) as u64;
    Ok(scan)
}

/// Computes the IEEE CRC32 of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        crc = (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryVolume;
    use proptest::prelude::*;

    fn log_over(volume: &MemoryVolume) -> FrameLog {
        FrameLog::new(Box::new(volume.clone()))
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn frames_come_back_in_order() {
        let volume = MemoryVolume::new();
        let mut log = log_over(&volume);
        log.append_frame(b"one").unwrap();
        log.append_frame(b"").unwrap();
        log.append_frame(b"three").unwrap();

        let scan = log.scan().unwrap();
        assert_eq!(scan.frames, vec![b"one".to_vec(), Vec::new(), b"three".to_vec()]);
        assert_eq!(scan.torn_bytes, 0);
        assert_eq!(scan.valid_len, volume.size().unwrap());
    }

    #[test]
    fn torn_tail_is_recovered() {
        let volume = MemoryVolume::new();
        let mut log = log_over(&volume);
        log.append_frame(b"committed").unwrap();
        let intact = volume.size().unwrap();
        log.append_frame(b"half written").unwrap();

        let mut raw = volume.clone();
        let full = raw.size().unwrap();
        raw.truncate(full - 5).unwrap();

        let scan = log.recover().unwrap();
        assert_eq!(scan.frames, vec![b"committed".to_vec()]);
        assert_eq!(scan.valid_len, intact);
        assert!(scan.torn_bytes > 0);
        assert_eq!(volume.size().unwrap(), intact);
    }

    #[test]
    fn damaged_middle_frame_is_corruption() {
        let volume = MemoryVolume::new();
        let mut log = log_over(&volume);
        log.append_frame(b"first").unwrap();
        log.append_frame(b"second").unwrap();

        let mut bytes = volume.snapshot();
        bytes[HEADER_SIZE] ^= 0xFF;
        let damaged = FrameLog::new(Box::new(MemoryVolume::with_data(bytes)));

        assert!(matches!(
            damaged.scan(),
            Err(VolumeError::Corrupted { offset: 0, .. })
        ));
    }

    #[test]
    fn reset_empties_the_log() {
        let volume = MemoryVolume::new();
        let mut log = log_over(&volume);
        log.append_frame(b"gone").unwrap();
        log.reset().unwrap();
        assert!(log.scan().unwrap().frames.is_empty());
    }

    proptest! {
        #[test]
        fn any_prefix_cut_keeps_whole_frames(
            payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 1..8),
            cut in 0usize..32,
        ) {
            let volume = MemoryVolume::new();
            let mut log = log_over(&volume);
            for payload in &payloads {
                log.append_frame(payload).unwrap();
            }
            let bytes = volume.snapshot();
            let keep = bytes.len().saturating_sub(cut);
            let scan = scan_frames(&bytes[..keep]).unwrap();

            prop_assert!(scan.frames.len() <= payloads.len());
            prop_assert_eq!(&scan.frames[..], &payloads[..scan.frames.len()]);
            prop_assert_eq!(scan.valid_len + scan.torn_bytes, keep as u64);
        }
    }
}
