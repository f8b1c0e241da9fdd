//! Statistics for compression operations.

use serde::{Deserialize, Serialize};

use crate::types::CompressionRatio;

/// Per-type block counts for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCounts {
    pub raw: usize,
    pub rle: usize,
    pub compressed: usize,
}

impl BlockCounts {
    /// Total blocks written.
    pub fn total(&self) -> usize {
        self.raw + self.rle + self.compressed
    }
}

/// Statistics from a compression operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionStats {
    /// Numeric level used.
    pub level: i32,

    /// Original (uncompressed) size in bytes.
    pub original_size: usize,

    /// Compressed size in bytes, frame overhead included.
    pub compressed_size: usize,

    /// Blocks emitted, by representation.
    pub blocks: BlockCounts,

    /// Sequences emitted across all compressed blocks.
    pub sequences: usize,

    /// Dictionary id written to the frame header, if any.
    pub dictionary_id: Option<u32>,

    /// Content checksum (if written).
    pub checksum: Option<u32>,
}

impl CompressionStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get compression ratio.
    pub fn ratio(&self) -> CompressionRatio {
        CompressionRatio::new(self.original_size, self.compressed_size)
    }

    /// Whether a dictionary was used.
    pub fn dictionary_used(&self) -> bool {
        self.dictionary_id.is_some()
    }
}
