//! Frame compression pipeline.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Input Data (+ dictionary content)
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Frame Header                       │
//! │  - Single segment or windowed       │
//! │  - Content size, dictionary id      │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Match Finding (LZ77)               │
//! │  - Hash chains over the history     │
//! │  - Repeat offsets first             │
//! │  - Greedy / lazy parsing by level   │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Block Encoding                     │
//! │  - Literals (Raw/RLE/Huffman)       │
//! │  - Sequences (cost-chosen modes)    │
//! │  - Raw fallback with state rollback │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Frame Assembly                     │
//! │  - Block headers                    │
//! │  - XXH64 content checksum           │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! Compressed Output
//! ```
//!
//! ## Window Choice
//!
//! Without a dictionary, an input that fits the level's window is written
//! as a single segment: the window is the content itself and no window
//! descriptor is needed. Otherwise the window is `2^window_log`, shrunk to
//! what the dictionary plus input can actually use.

mod block;
mod literals;
mod match_finder;
mod params;
mod sequences;

pub use block::{encode_block, EncodedBlock, EntropyState};
pub use literals::encode_literals;
pub use match_finder::{common_prefix, Match, MatchFinder};
pub use params::{LevelParams, Strategy};
pub use sequences::{encode_sequences, write_sequence_count, SequenceEncoderTables, SequenceTable};

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use crate::config::{CompressorConfig, MIN_WINDOW_LOG};
use crate::dictionary::Dictionary;
use crate::frame::{
    content_checksum, BlockHeader, BlockType, FrameHeader, BLOCK_SIZE_MAX, CHECKSUM_SIZE, MAGIC_SIZE,
    ZSTD_MAGIC,
};
use params::ceil_log2;
use zframe_core::{CompressionLevel, CompressionStats, Error, Result};

/// Largest frame header: descriptor, window, 4-byte id, 8-byte size.
const MAX_FRAME_HEADER_SIZE: usize = 14;

/// Worst-case frame size for `len` input bytes.
pub fn compress_bound(len: usize) -> usize {
    let margin = if len < BLOCK_SIZE_MAX {
        (BLOCK_SIZE_MAX - len) >> 11
    } else {
        0
    };
    len + (len >> 8) + margin + MAGIC_SIZE + MAX_FRAME_HEADER_SIZE + CHECKSUM_SIZE
}

/// Compression settings plus an optional dictionary.
///
/// Each call builds its own window and entropy state, so one context may
/// compress many inputs, from several threads if shared by reference.
#[derive(Debug, Clone)]
pub struct CompressContext<'d> {
    config: CompressorConfig,
    params: LevelParams,
    dictionary: Option<&'d Dictionary>,
}

impl<'d> CompressContext<'d> {
    /// Context for `level` with default settings. Rejects invalid levels.
    pub fn new(level: impl Into<CompressionLevel>) -> Result<Self> {
        Self::with_config(CompressorConfig::with_level(level))
    }

    pub fn with_config(config: CompressorConfig) -> Result<Self> {
        config.validate()?;
        let params = LevelParams::for_level(config.level)?;
        Ok(Self {
            config,
            params,
            dictionary: None,
        })
    }

    /// Compress against `dictionary`.
    pub fn with_dictionary(mut self, dictionary: &'d Dictionary) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn level(&self) -> i32 {
        self.params.level
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// Compress `input` into one frame.
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.compress_frame(input, None).map(|(frame, _)| frame)
    }

    /// Compress and report what was written.
    pub fn compress_with_stats(&self, input: &[u8]) -> Result<(Vec<u8>, CompressionStats)> {
        self.compress_frame(input, None)
    }

    /// Compress, stopping with [`Error::Cancelled`] if `cancel` is set
    /// before a block starts.
    pub fn compress_cancellable(&self, input: &[u8], cancel: &AtomicBool) -> Result<Vec<u8>> {
        self.compress_frame(input, Some(cancel)).map(|(frame, _)| frame)
    }

    fn frame_header(&self, input_len: usize, dictionary_len: usize) -> FrameHeader {
        let window_log = self.config.window_log.unwrap_or(self.params.window_log);
        let dictionary_id = self.dictionary.map_or(0, Dictionary::id);

        if self.dictionary.is_none() && self.config.content_size && input_len as u64 <= 1u64 << window_log {
            return FrameHeader::single_segment(input_len as u64, 0, self.config.checksum);
        }
        let needed = (ceil_log2(dictionary_len + input_len) as u8).max(MIN_WINDOW_LOG);
        FrameHeader::windowed(
            window_log.min(needed),
            self.config.content_size.then_some(input_len as u64),
            dictionary_id,
            self.config.checksum,
        )
    }

    fn compress_frame(&self, input: &[u8], cancel: Option<&AtomicBool>) -> Result<(Vec<u8>, CompressionStats)> {
        let dictionary_content = self.dictionary.map_or(&[][..], Dictionary::content);
        let dictionary_len = dictionary_content.len();
        let header = self.frame_header(input.len(), dictionary_len);
        let window_size = header.window_size as usize;
        let block_size = self.config.effective_block_size().min(window_size.max(1));

        debug!(
            level = self.params.level,
            input = input.len(),
            window = window_size,
            block_size,
            dictionary_id = header.dictionary_id,
            single_segment = header.single_segment,
            "compressing frame"
        );

        let mut stats = CompressionStats {
            level: self.params.level,
            original_size: input.len(),
            dictionary_id: self.dictionary.map(Dictionary::id),
            ..CompressionStats::new()
        };

        let mut output = Vec::with_capacity(compress_bound(input.len()));
        output.extend_from_slice(&ZSTD_MAGIC.to_le_bytes());
        header.write(&mut output);

        if input.is_empty() {
            BlockHeader::new(true, BlockType::Raw, 0).write(&mut output);
            stats.blocks.raw += 1;
        }

        let history: Cow<'_, [u8]> = if dictionary_len == 0 {
            Cow::Borrowed(input)
        } else {
            let mut joined = Vec::with_capacity(dictionary_len + input.len());
            joined.extend_from_slice(dictionary_content);
            joined.extend_from_slice(input);
            Cow::Owned(joined)
        };
        let mut finder = MatchFinder::new(&history, self.params, window_size);
        finder.prime(dictionary_len);
        let mut state = match self.dictionary {
            Some(dictionary) => dictionary.entropy_state()?,
            None => EntropyState::default(),
        };

        let mut start = 0;
        while start < input.len() {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                debug!(blocks = stats.blocks.total(), "compression cancelled");
                return Err(Error::Cancelled {
                    blocks_completed: stats.blocks.total(),
                });
            }

            let end = (start + block_size).min(input.len());
            let last = end == input.len();
            let block = encode_block(&mut finder, &history, dictionary_len + start, dictionary_len + end, &mut state)?;
            match block {
                EncodedBlock::Raw => {
                    BlockHeader::new(last, BlockType::Raw, end - start).write(&mut output);
                    output.extend_from_slice(&input[start..end]);
                    stats.blocks.raw += 1;
                    trace!(start, size = end - start, "raw block");
                }
                EncodedBlock::Rle(byte) => {
                    BlockHeader::new(last, BlockType::Rle, end - start).write(&mut output);
                    output.push(byte);
                    stats.blocks.rle += 1;
                    trace!(start, size = end - start, byte, "rle block");
                }
                EncodedBlock::Compressed { payload, sequences } => {
                    BlockHeader::new(last, BlockType::Compressed, payload.len()).write(&mut output);
                    output.extend_from_slice(&payload);
                    stats.blocks.compressed += 1;
                    stats.sequences += sequences;
                    trace!(start, size = end - start, compressed = payload.len(), sequences, "compressed block");
                }
            }
            start = end;
        }

        if self.config.checksum {
            let checksum = content_checksum(input);
            output.extend_from_slice(&checksum.to_le_bytes());
            stats.checksum = Some(checksum);
        }

        stats.compressed_size = output.len();
        debug!(
            input = input.len(),
            output = output.len(),
            blocks = stats.blocks.total(),
            "frame complete"
        );
        Ok((output, stats))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_rejected_up_front() {
        assert!(matches!(CompressContext::new(0), Err(Error::InvalidLevel { level: 0, .. })));
        assert!(matches!(CompressContext::new(23), Err(Error::InvalidLevel { level: 23, .. })));
    }

    #[test]
    fn test_empty_input_frame() {
        let frame = CompressContext::new(3).unwrap().compress(&[]).unwrap();
        // magic, descriptor (single segment + checksum), size 0, empty last raw block, checksum
        assert_eq!(&frame[..4], &ZSTD_MAGIC.to_le_bytes());
        assert_eq!(frame[4], 0x24);
        assert_eq!(frame[5], 0);
        assert_eq!(&frame[6..9], &[0x01, 0x00, 0x00]);
        assert_eq!(frame.len(), 13);
    }

    #[test]
    fn test_stats_count_blocks() {
        let mut data = vec![0u8; 300_000];
        for (i, byte) in data.iter_mut().enumerate().skip(200_000) {
            *byte = (i % 251) as u8;
        }
        let (frame, stats) = CompressContext::new(1).unwrap().compress_with_stats(&data).unwrap();
        assert_eq!(stats.original_size, data.len());
        assert_eq!(stats.compressed_size, frame.len());
        assert_eq!(stats.blocks.total(), 3);
        assert!(stats.blocks.rle >= 1);
        assert!(stats.checksum.is_some());
        assert!(!stats.dictionary_used());
    }

    #[test]
    fn test_window_header_choice() {
        let context = CompressContext::new(1).unwrap();
        let small = context.frame_header(1000, 0);
        assert!(small.single_segment);

        let big = context.frame_header(1 << 20, 0);
        assert!(!big.single_segment);
        assert_eq!(big.window_size, 1 << 19);

        let dictionary = Dictionary::load(b"dictionary content for header test").unwrap();
        let context = context.with_dictionary(&dictionary);
        let header = context.frame_header(100, dictionary.size());
        assert!(!header.single_segment);
        assert_eq!(header.window_size, 1 << 10);
        assert_eq!(header.dictionary_id, dictionary.id());
    }

    #[test]
    fn test_cancelled_before_first_block() {
        let cancel = AtomicBool::new(true);
        let err = CompressContext::new(3)
            .unwrap()
            .compress_cancellable(&[1u8; 10_000], &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled { blocks_completed: 0 }));
    }

    #[test]
    fn test_compress_bound() {
        assert_eq!(compress_bound(0), 64 + 22);
        assert_eq!(compress_bound(BLOCK_SIZE_MAX), BLOCK_SIZE_MAX + 512 + 22);
        for len in [0, 1, 100, 5000] {
            let input: Vec<u8> = (0..len).map(|i| (i * 7919 % 256) as u8).collect();
            let frame = CompressContext::new(3).unwrap().compress(&input).unwrap();
            assert!(frame.len() <= compress_bound(len));
        }
    }
}
