//! Record framing for event log segments.
//!
//! Wire layout, all little-endian:
//! `[length: u64][length_crc: u32][payload: length bytes][payload_crc: u32]`
//! where both checksums are masked CRC32C.

use std::ops::Range;

use thiserror::Error;

use crate::checksum::{masked_crc32c, verify_masked_crc32c};

/// Length field plus its checksum.
pub const HEADER_LEN: usize = 8 + 4;
/// Trailing payload checksum.
pub const FOOTER_LEN: usize = 4;

/// Integrity failures found while parsing a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("length checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    LengthChecksum { stored: u32, computed: u32 },

    #[error("payload checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    PayloadChecksum { stored: u32, computed: u32 },

    #[error("frame length {len} exceeds limit {max}")]
    TooLarge { len: u64, max: u64 },
}

/// Outcome of parsing the front of a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameParse {
    /// Not enough bytes yet; the writer has not finished this frame.
    Incomplete,
    /// A verified frame. `payload` indexes into the parsed buffer and
    /// `consumed` is the full frame size.
    Complete { payload: Range<usize>, consumed: usize },
}

/// Parse one frame from the start of `buf`.
///
/// Never consumes anything on its own; callers drop `consumed` bytes once
/// they have used the payload.
pub fn parse_frame(buf: &[u8], max_len: u64) -> Result<FrameParse, FrameError> {
    if buf.len() < HEADER_LEN {
        return Ok(FrameParse::Incomplete);
    }

    let len_bytes = &buf[..8];
    let stored = read_u32_le(&buf[8..12]);
    if !verify_masked_crc32c(len_bytes, stored) {
        return Err(FrameError::LengthChecksum {
            stored,
            computed: masked_crc32c(len_bytes),
        });
    }

    let len = read_u64_le(len_bytes);
    let too_large = FrameError::TooLarge { len, max: max_len };
    if len > max_len {
        return Err(too_large);
    }
    let Some((len, total)) = usize::try_from(len)
        .ok()
        .and_then(|len| Some((len, len.checked_add(HEADER_LEN + FOOTER_LEN)?)))
    else {
        return Err(too_large);
    };

    if buf.len() < total {
        return Ok(FrameParse::Incomplete);
    }

    let payload = HEADER_LEN..HEADER_LEN + len;
    let stored = read_u32_le(&buf[payload.end..total]);
    if !verify_masked_crc32c(&buf[payload.clone()], stored) {
        return Err(FrameError::PayloadChecksum {
            stored,
            computed: masked_crc32c(&buf[payload]),
        });
    }

    Ok(FrameParse::Complete { payload, consumed: total })
}

/// Encode `payload` as a single frame.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + FOOTER_LEN);
    let len = (payload.len() as u64).to_le_bytes();
    out.extend_from_slice(&len);
    out.extend_from_slice(&masked_crc32c(&len).to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&masked_crc32c(payload).to_le_bytes());
    out
}

fn read_u64_le(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
