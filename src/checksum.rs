//! Masked CRC32C, the integrity check shared with the external event writer.
//!
//! The mask is the one used by TensorBoard/LevelDB record logs: a 15-bit
//! right rotation followed by a fixed offset. Any deviation breaks
//! interoperability with files written by other processes.

/// Offset added after rotation.
pub const MASK_DELTA: u32 = 0xA282_EAD8;

/// CRC32C (Castagnoli) of `bytes`, rotated right by 15 bits plus `MASK_DELTA`.
pub fn masked_crc32c(bytes: &[u8]) -> u32 {
    mask(crc32c::crc32c(bytes))
}

/// Check `bytes` against a stored masked checksum.
pub fn verify_masked_crc32c(bytes: &[u8], expected: u32) -> bool {
    masked_crc32c(bytes) == expected
}

#[inline]
fn mask(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}
