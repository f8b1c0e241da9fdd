//! Content checksum: low 32 bits of XXH64 with seed 0.

use xxhash_rust::xxh64::xxh64;

/// Checksum value stored after the last block of a frame.
#[inline]
pub fn content_checksum(data: &[u8]) -> u32 {
    xxh64(data, 0) as u32
}
