//! Core traits for compression and decompression.
//!
//! ## Trait Hierarchy
//!
//! ```text
//! Compressor / Decompressor  (one-shot operations)
//!       ↓
//! Codec  (combined compress + decompress)
//! ```

use crate::error::{Error, Result};
use crate::types::{CompressionLevel, CompressionRatio};

/// One-shot compression operations.
pub trait Compressor {
    /// Get the configured compression level.
    fn level(&self) -> CompressionLevel;

    /// Compress data in one shot.
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Compress data into existing buffer.
    ///
    /// # Returns
    /// Number of bytes written to output.
    fn compress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let compressed = self.compress(input)?;
        if compressed.len() > output.len() {
            return Err(Error::buffer_too_small(compressed.len(), output.len()));
        }
        output[..compressed.len()].copy_from_slice(&compressed);
        Ok(compressed.len())
    }

    /// Calculate maximum compressed size for input length.
    /// Useful for pre-allocating output buffers.
    fn max_compressed_size(&self, input_len: usize) -> usize;
}

/// One-shot decompression operations.
pub trait Decompressor {
    /// Decompress data in one shot.
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data into existing buffer.
    ///
    /// # Returns
    /// Number of bytes written to output.
    fn decompress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let decompressed = self.decompress(input)?;
        if decompressed.len() > output.len() {
            return Err(Error::buffer_too_small(decompressed.len(), output.len()));
        }
        output[..decompressed.len()].copy_from_slice(&decompressed);
        Ok(decompressed.len())
    }
}

/// Combined codec for both compression and decompression.
pub trait Codec: Compressor + Decompressor {
    /// Create a new codec with default settings.
    fn new() -> Self
    where
        Self: Sized;

    /// Create a new codec with specified level.
    fn with_level(level: CompressionLevel) -> Self
    where
        Self: Sized;

    /// Round-trip test: compress then decompress.
    /// Returns true if data matches.
    fn verify_roundtrip(&self, data: &[u8]) -> Result<bool> {
        let compressed = self.compress(data)?;
        let decompressed = self.decompress(&compressed)?;
        Ok(data == decompressed.as_slice())
    }

    /// Get compression ratio for given data.
    fn measure_ratio(&self, data: &[u8]) -> Result<CompressionRatio> {
        let compressed = self.compress(data)?;
        Ok(CompressionRatio::new(data.len(), compressed.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stores input verbatim behind a one-byte length tag.
    struct Identity;

    impl Compressor for Identity {
        fn level(&self) -> CompressionLevel {
            CompressionLevel::Fast
        }

        fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
            let mut out = vec![input.len() as u8];
            out.extend_from_slice(input);
            Ok(out)
        }

        fn max_compressed_size(&self, input_len: usize) -> usize {
            input_len + 1
        }
    }

    impl Decompressor for Identity {
        fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
            match input.split_first() {
                Some((_, rest)) => Ok(rest.to_vec()),
                None => Err(Error::truncated(0, 1)),
            }
        }
    }

    impl Codec for Identity {
        fn new() -> Self {
            Identity
        }

        fn with_level(_level: CompressionLevel) -> Self {
            Identity
        }
    }

    #[test]
    fn test_default_compress_to_checks_capacity() {
        let codec = Identity::new();
        let mut small = [0u8; 2];
        match codec.compress_to(b"abcd", &mut small) {
            Err(Error::BufferTooSmall { required, provided }) => {
                assert_eq!((required, provided), (5, 2));
            }
            other => panic!("expected BufferTooSmall, got {:?}", other),
        }

        let mut big = [0u8; 8];
        assert_eq!(codec.compress_to(b"abcd", &mut big).unwrap(), 5);
        assert_eq!(&big[..5], &[4, b'a', b'b', b'c', b'd']);
    }

    #[test]
    fn test_codec_helpers() {
        let codec = Identity::with_level(CompressionLevel::Best);
        assert!(codec.verify_roundtrip(b"hello").unwrap());
        let ratio = codec.measure_ratio(b"hello").unwrap();
        assert_eq!(ratio.compressed_size, 6);

        let mut out = [0u8; 5];
        assert_eq!(codec.decompress_to(&[5, 1, 2, 3, 4, 5], &mut out).unwrap(), 5);
    }
}
