//! Checksummed frames over a [`StorageBackend`].
//!
//! Layout of one frame:
//!
//! ```text
//! | body_len: u32 LE | crc32(body): u32 LE | body ... |
//! ```
//!
//! A crash can leave the last frame half written. [`scan_frames`] reports
//! such a torn tail separately from corruption in the middle of the log, and
//! [`recover_frames`] cuts the tail off so new appends start on a clean
//! boundary.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Largest accepted frame body.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Result of scanning a backend for frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameScan {
    /// Bodies of every valid frame, in log order.
    pub frames: Vec<Vec<u8>>,
    /// Byte length covered by the valid frames.
    pub valid_len: u64,
    /// Whether incomplete or unverifiable bytes follow the last valid frame.
    pub torn_tail: bool,
}

/// Encodes a body into a frame.
#[must_use]
pub fn encode_frame(body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
    buf.extend_from_slice(&crc32(body).to_le_bytes());
    buf.extend_from_slice(body);
    buf
}

/// Appends one frame and returns its offset.
///
/// The caller decides when to [`StorageBackend::sync`].
///
/// # Errors
///
/// Fails if the body exceeds [`MAX_FRAME_SIZE`] or the backend fails.
pub fn append_frame<B: StorageBackend + ?Sized>(backend: &mut B, body: &[u8]) -> StorageResult<u64> {
    if body.len() > MAX_FRAME_SIZE {
        let offset = backend.size()?;
        return Err(StorageError::corrupted(
            offset,
            format!("frame of {} bytes exceeds limit", body.len()),
        ));
    }
    backend.append(&encode_frame(body))
}

/// Reads every frame from the backend without modifying it.
///
/// # Errors
///
/// Returns [`StorageError::Corrupted`] when a frame that is followed by more
/// data fails its checksum or declares an impossible length.
pub fn scan_frames<B: StorageBackend + ?Sized>(backend: &B) -> StorageResult<FrameScan> {
    let size = backend.size()?;
    let mut frames = Vec::new();
    let mut offset = 0u64;

    while offset < size {
        let remaining = size - offset;
        if remaining < HEADER_SIZE as u64 {
            return Ok(torn(frames, offset));
        }

        let header = backend.read_at(offset, HEADER_SIZE)?;
        let body_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let stored_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let frame_end = offset + (HEADER_SIZE + body_len) as u64;

        if frame_end > size {
            return Ok(torn(frames, offset));
        }
        if body_len > MAX_FRAME_SIZE {
            return Err(StorageError::corrupted(
                offset,
                format!("declared frame length {body_len} exceeds limit"),
            ));
        }

        let body = backend.read_at(offset + HEADER_SIZE as u64, body_len)?;
        if crc32(&body) != stored_crc {
            if frame_end == size {
                return Ok(torn(frames, offset));
            }
            return Err(StorageError::corrupted(offset, "checksum mismatch"));
        }

        frames.push(body);
        offset = frame_end;
    }

    Ok(FrameScan {
        frames,
        valid_len: offset,
        torn_tail: false,
    })
}

/// Scans the backend and truncates a torn tail if there is one.
///
/// # Errors
///
/// Propagates corruption and I/O errors from [`scan_frames`] and truncation.
pub fn recover_frames<B: StorageBackend + ?Sized>(backend: &mut B) -> StorageResult<Vec<Vec<u8>>> {
    let scan = scan_frames(backend)?;
    if scan.torn_tail {
        let size = backend.size()?;
        tracing::warn!(
            valid_len = scan.valid_len,
            dropped = size - scan.valid_len,
            "truncating torn frame at end of log"
        );
        backend.truncate(scan.valid_len)?;
    }
    Ok(scan.frames)
}

fn torn(frames: Vec<Vec<u8>>, valid_len: u64) -> FrameScan {
    FrameScan {
        frames,
        valid_len,
        torn_tail: true,
    }
}

/// CRC-32 (IEEE, reflected polynomial 0xEDB88320).
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut n = 0;
        while n < 256 {
            let mut c = n as u32;
            let mut k = 0;
            while k < 8 {
                c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
                k += 1;
            }
            table[n] = c;
            n += 1;
        }
        table
    };

    !data.iter().fold(!0u32, |crc, &byte| {
        TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8)
    })
}
