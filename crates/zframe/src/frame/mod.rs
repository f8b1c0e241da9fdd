//! Zstandard frame format.
//!
//! ## Frame Structure
//!
//! ```text
//! +-------------------+
//! | Magic_Number      | 4 bytes (0xFD2FB528, LE)
//! +-------------------+
//! | Frame_Header      | 2-14 bytes
//! +-------------------+
//! | Data_Block(s)     | variable
//! +-------------------+
//! | Content_Checksum  | 0-4 bytes
//! +-------------------+
//! ```
//!
//! Skippable frames (`0x184D2A50..=0x184D2A5F`) carry a 4-byte size and
//! opaque user data.
//!
//! ## References
//!
//! - [RFC 8878 Section 3.1](https://datatracker.ietf.org/doc/html/rfc8878#section-3.1)

mod block;
mod checksum;
mod header;

pub use block::{BlockHeader, BlockType};
pub use checksum::content_checksum;
pub use header::{decode_window_descriptor, encode_window_descriptor, FrameDescriptor, FrameHeader};

/// Zstd magic number, stored little-endian as `28 B5 2F FD`.
pub const ZSTD_MAGIC: u32 = 0xFD2F_B528;

pub const SKIPPABLE_MAGIC_LOW: u32 = 0x184D_2A50;
pub const SKIPPABLE_MAGIC_HIGH: u32 = 0x184D_2A5F;

pub const MAGIC_SIZE: usize = 4;
pub const CHECKSUM_SIZE: usize = 4;

/// Default ceiling on window sizes accepted by the decoder (128 MiB).
pub const MAX_WINDOW_SIZE: usize = 1 << 27;

pub const MIN_WINDOW_SIZE: usize = 1 << 10;

/// Largest block content (128 KiB).
pub const BLOCK_SIZE_MAX: usize = 1 << 17;

/// Whether `magic` starts a skippable frame.
#[inline]
pub fn is_skippable_magic(magic: u32) -> bool {
    (SKIPPABLE_MAGIC_LOW..=SKIPPABLE_MAGIC_HIGH).contains(&magic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_bytes() {
        assert_eq!(ZSTD_MAGIC.to_le_bytes(), [0x28, 0xB5, 0x2F, 0xFD]);
    }

    #[test]
    fn test_skippable_range() {
        assert!(is_skippable_magic(0x184D_2A50));
        assert!(is_skippable_magic(0x184D_2A5F));
        assert!(!is_skippable_magic(0x184D_2A60));
        assert!(!is_skippable_magic(ZSTD_MAGIC));
    }

    #[test]
    fn test_size_constants() {
        assert_eq!(BLOCK_SIZE_MAX, 128 * 1024);
        assert_eq!(MAX_WINDOW_SIZE, 128 * 1024 * 1024);
        assert_eq!(MIN_WINDOW_SIZE, 1024);
    }
}
