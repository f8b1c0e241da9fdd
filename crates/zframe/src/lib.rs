//! # zframe
//!
//! Native Rust Zstandard (RFC 8878) frame codec with dictionary support.
//!
//! ## Features
//!
//! - Levels 1-22 (default 1), from greedy hashing to deep lazy search
//! - Raw, RLE and Huffman literals; predefined, RLE, repeat and custom FSE
//!   sequence tables, chosen per block by estimated cost
//! - XXH64 content checksum, content size and dictionary id in every frame
//! - Raw and structured dictionaries, plus a simple trainer
//! - Concatenated and skippable frames on decode
//! - Bounded decoding: window limit, output limit, no panics on bad input
//!
//! ## Quick Start
//!
//! ```rust
//! use zframe::{compress, decompress};
//!
//! let data = b"The quick brown fox jumps over the lazy dog";
//! let frame = compress(data, 3).unwrap();
//! assert_eq!(&frame[..4], &[0x28, 0xB5, 0x2F, 0xFD]);
//! assert_eq!(decompress(&frame).unwrap(), data);
//! ```
//!
//! With a dictionary shared between many calls:
//!
//! ```rust
//! use std::sync::Arc;
//! use zframe::{Compressor, Decompressor, Dictionary, ZstdCodec};
//!
//! let dictionary = Arc::new(Dictionary::load(b"GET /api/v1/users HTTP/1.1").unwrap());
//! let codec = ZstdCodec::default().with_dictionary(dictionary);
//! let frame = codec.compress(b"GET /api/v1/users/42 HTTP/1.1").unwrap();
//! assert_eq!(codec.decompress(&frame).unwrap(), b"GET /api/v1/users/42 HTTP/1.1");
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ lib.rs: free functions, ZstdCompressor/Decompressor/Codec│
//! ├──────────────────────────┬───────────────────────────────┤
//! │ compress                 │ decompress                    │
//! │  match_finder → block    │  stage machine → block        │
//! ├──────────────────────────┴───────────────────────────────┤
//! │ block: literals + sequences sections, repeat offsets     │
//! ├──────────────────────────┬───────────────────────────────┤
//! │ huffman                  │ fse                           │
//! ├──────────────────────────┴───────────────────────────────┤
//! │ bits: forward / reverse bit streams                      │
//! ├──────────────────────────────────────────────────────────┤
//! │ frame: magic, header, block header, checksum             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## References
//!
//! - [RFC 8878](https://datatracker.ietf.org/doc/html/rfc8878) - Zstandard Compression
//! - [Zstd Format](https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md)

pub mod bits;
pub mod block;
pub mod compress;
pub mod config;
pub mod decompress;
pub mod dictionary;
pub mod frame;
pub mod fse;
pub mod huffman;

use std::sync::Arc;

pub use compress::{compress_bound, CompressContext};
pub use config::{CompressorConfig, DecompressorConfig};
pub use decompress::{frame_content_size, DecompressContext};
pub use dictionary::Dictionary;
pub use frame::{BLOCK_SIZE_MAX, ZSTD_MAGIC};
pub use zframe_core::{
    BlockCounts, Codec, CompressionLevel, CompressionRatio, CompressionStats, Compressor, Decompressor, Error,
    Result, DEFAULT_LEVEL, MAX_LEVEL, MIN_LEVEL,
};

/// Compress `input` into a single frame at `level`.
pub fn compress(input: &[u8], level: impl Into<CompressionLevel>) -> Result<Vec<u8>> {
    CompressContext::new(level)?.compress(input)
}

/// Compress `input` against `dictionary`.
///
/// The frame records the dictionary id; decoding requires the same dictionary.
pub fn compress_with_dict(input: &[u8], level: impl Into<CompressionLevel>, dictionary: &Dictionary) -> Result<Vec<u8>> {
    CompressContext::new(level)?.with_dictionary(dictionary).compress(input)
}

/// Decompress every frame in `input`.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    DecompressContext::new().decompress(input)
}

pub fn decompress_with_dict(input: &[u8], dictionary: &Dictionary) -> Result<Vec<u8>> {
    DecompressContext::new().with_dictionary(dictionary).decompress(input)
}

/// Zstandard compressor.
///
/// ## Example
///
/// ```rust
/// use zframe::{CompressionLevel, Compressor, ZstdCompressor};
///
/// let compressor = ZstdCompressor::with_level(CompressionLevel::Best);
/// let frame = compressor.compress(b"Hello, World!").unwrap();
/// assert!(frame.len() <= compressor.max_compressed_size(13));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ZstdCompressor {
    config: CompressorConfig,
    dictionary: Option<Arc<Dictionary>>,
}

impl ZstdCompressor {
    /// Create a new Zstd compressor with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with compression level.
    pub fn with_level(level: CompressionLevel) -> Self {
        Self::with_config(CompressorConfig::with_level(level))
    }

    /// Create from a full configuration. Invalid settings surface on
    /// the first `compress` call.
    pub fn with_config(config: CompressorConfig) -> Self {
        Self {
            config,
            dictionary: None,
        }
    }

    /// Compress against a shared dictionary.
    pub fn with_dictionary(mut self, dictionary: Arc<Dictionary>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    pub fn dictionary(&self) -> Option<&Dictionary> {
        self.dictionary.as_deref()
    }

    /// Compress and return per-frame statistics.
    pub fn compress_with_stats(&self, input: &[u8]) -> Result<(Vec<u8>, CompressionStats)> {
        self.context()?.compress_with_stats(input)
    }

    fn context(&self) -> Result<CompressContext<'_>> {
        let context = CompressContext::with_config(self.config.clone())?;
        Ok(match self.dictionary.as_deref() {
            Some(dictionary) => context.with_dictionary(dictionary),
            None => context,
        })
    }
}

impl Compressor for ZstdCompressor {
    fn level(&self) -> CompressionLevel {
        CompressionLevel::from_level(self.config.level)
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.context()?.compress(input)
    }

    fn max_compressed_size(&self, input_len: usize) -> usize {
        compress_bound(input_len)
    }
}

/// Zstandard decompressor.
#[derive(Debug, Clone, Default)]
pub struct ZstdDecompressor {
    config: DecompressorConfig,
    dictionary: Option<Arc<Dictionary>>,
}

impl ZstdDecompressor {
    /// Create a new Zstd decompressor.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DecompressorConfig) -> Self {
        Self {
            config,
            dictionary: None,
        }
    }

    /// Decode frames that reference `dictionary`.
    pub fn with_dictionary(mut self, dictionary: Arc<Dictionary>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn config(&self) -> &DecompressorConfig {
        &self.config
    }

    fn context(&self) -> DecompressContext<'_> {
        let context = DecompressContext::with_config(self.config.clone());
        match self.dictionary.as_deref() {
            Some(dictionary) => context.with_dictionary(dictionary),
            None => context,
        }
    }
}

impl Decompressor for ZstdDecompressor {
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.context().decompress(input)
    }
}

/// Zstandard codec combining compression and decompression.
#[derive(Debug, Clone, Default)]
pub struct ZstdCodec {
    compressor: ZstdCompressor,
    decompressor: ZstdDecompressor,
}

impl ZstdCodec {
    /// Create a new Zstd codec with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with compression level.
    pub fn with_level(level: CompressionLevel) -> Self {
        Self {
            compressor: ZstdCompressor::with_level(level),
            decompressor: ZstdDecompressor::new(),
        }
    }

    /// Use `dictionary` in both directions.
    pub fn with_dictionary(self, dictionary: Arc<Dictionary>) -> Self {
        Self {
            compressor: self.compressor.with_dictionary(Arc::clone(&dictionary)),
            decompressor: self.decompressor.with_dictionary(dictionary),
        }
    }

    pub fn with_decompressor_config(mut self, config: DecompressorConfig) -> Self {
        let dictionary = self.decompressor.dictionary.take();
        self.decompressor = ZstdDecompressor { config, dictionary };
        self
    }
}

impl Compressor for ZstdCodec {
    fn level(&self) -> CompressionLevel {
        self.compressor.level()
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.compressor.compress(input)
    }

    fn max_compressed_size(&self, input_len: usize) -> usize {
        self.compressor.max_compressed_size(input_len)
    }
}

impl Decompressor for ZstdCodec {
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.decompressor.decompress(input)
    }
}

impl Codec for ZstdCodec {
    fn new() -> Self {
        ZstdCodec::new()
    }

    fn with_level(level: CompressionLevel) -> Self {
        ZstdCodec::with_level(level)
    }
}

// =============================================================================
// Tests
// =============================================================================
