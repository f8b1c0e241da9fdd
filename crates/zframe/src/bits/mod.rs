//! Bit-level I/O shared by the entropy coders.
//!
//! Zstd bitstreams are written least-significant-bit first into
//! little-endian bytes. Entropy-coded streams (Huffman literals, FSE
//! sequences) are closed with a single `1` marker bit and read backward
//! from that marker; FSE table headers are read forward.
//!
//! ```text
//!  writer:  byte 0        byte 1        byte n-1
//!           [b7 .. b0]    [b15 .. b8]   [0 0 1 x x x x x]
//!                                             ^ end marker
//!  backward reader starts here and walks toward bit 0
//! ```

mod reader;
mod writer;

pub use reader::{BackwardBitReader, ForwardBitReader};
pub use writer::BitWriter;

/// Mask with the low `n` bits set.
#[inline]
pub(crate) fn low_mask(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

/// Index of the highest set bit. `v` must be non-zero.
#[inline]
pub(crate) fn highbit32(v: u32) -> u32 {
    debug_assert!(v != 0);
    31 - v.leading_zeros()
}

/// Read `n <= 57` bits starting at absolute bit `start`; bits past the end
/// of `data` read as zero.
#[inline]
pub(crate) fn load_bits(data: &[u8], start: usize, n: u32) -> u64 {
    if n == 0 {
        return 0;
    }
    let first = start / 8;
    let shift = (start % 8) as u32;
    let word = if first + 8 <= data.len() {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&data[first..first + 8]);
        u64::from_le_bytes(bytes)
    } else {
        let mut word = 0u64;
        for (i, &byte) in data.iter().skip(first).take(8).enumerate() {
            word |= (byte as u64) << (8 * i);
        }
        word
    };
    (word >> shift) & low_mask(n)
}
