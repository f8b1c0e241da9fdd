//! Error types for compression operations.

use thiserror::Error;

/// Result type alias for compression operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Compression error types.
///
/// Malformed input is always reported, never repaired. None of these
/// errors are transient: retrying the same call with the same input
/// yields the same error.
#[derive(Debug, Error)]
pub enum Error {
    /// Compression level outside the supported range. Raised before any work.
    #[error("invalid compression level {level}: must be in range [{min}, {max}]")]
    InvalidLevel { level: i32, min: i32, max: i32 },

    /// The frame is structurally invalid.
    #[error("corrupt frame: {message}")]
    CorruptFrame { message: String },

    /// The input ended before a structure it declares.
    #[error("truncated input: {needed} more bytes needed at offset {offset}")]
    TruncatedInput { offset: usize, needed: usize },

    /// Content checksum disagrees with the reconstructed bytes.
    ///
    /// The reconstructed bytes are carried along so callers may inspect
    /// them. They must be treated as untrusted.
    #[error("checksum mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    ChecksumMismatch {
        expected: u32,
        actual: u32,
        output: Vec<u8>,
    },

    /// A reserved bit, reserved block type or out-of-range parameter was set.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Frame requires a dictionary other than the one supplied.
    #[error("dictionary mismatch: frame requires id {expected}, provided {provided:?}")]
    DictionaryMismatch { expected: u32, provided: Option<u32> },

    /// Dictionary bytes could not be loaded.
    #[error("invalid dictionary: {0}")]
    InvalidDictionary(String),

    /// Buffer too small for output.
    #[error("buffer too small: need {required} bytes, got {provided}")]
    BufferTooSmall { required: usize, provided: usize },

    /// Decoding would produce more bytes than the configured limit.
    #[error("output limit exceeded: limit is {limit} bytes")]
    OutputLimitExceeded { limit: usize },

    /// Caller requested cancellation between blocks.
    #[error("cancelled after {blocks_completed} blocks")]
    Cancelled { blocks_completed: usize },
}

impl Error {
    /// Create a corrupt frame error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Error::CorruptFrame {
            message: message.into(),
        }
    }

    /// Create a corrupt frame error with offset context.
    pub fn corrupt_at(message: impl Into<String>, offset: usize) -> Self {
        Error::CorruptFrame {
            message: format!("{} at offset {}", message.into(), offset),
        }
    }

    /// Create a truncated input error.
    pub fn truncated(offset: usize, needed: usize) -> Self {
        Error::TruncatedInput { offset, needed }
    }

    /// Create an unsupported feature error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::UnsupportedFeature(message.into())
    }

    /// Create a buffer too small error.
    pub fn buffer_too_small(required: usize, provided: usize) -> Self {
        Error::BufferTooSmall { required, provided }
    }

    /// Create a checksum mismatch error carrying the decoded bytes.
    pub fn checksum_mismatch(expected: u32, actual: u32, output: Vec<u8>) -> Self {
        Error::ChecksumMismatch {
            expected,
            actual,
            output,
        }
    }

    /// Bytes reconstructed before a checksum failure, if any.
    pub fn untrusted_output(&self) -> Option<&[u8]> {
        match self {
            Error::ChecksumMismatch { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Whether the error was caused by malformed compressed input.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Error::CorruptFrame { .. }
                | Error::TruncatedInput { .. }
                | Error::ChecksumMismatch { .. }
                | Error::UnsupportedFeature(_)
        )
    }

    /// Get error category for metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidLevel { .. } => "invalid_level",
            Error::CorruptFrame { .. } => "corrupt_frame",
            Error::TruncatedInput { .. } => "truncated_input",
            Error::ChecksumMismatch { .. } => "checksum_mismatch",
            Error::UnsupportedFeature(_) => "unsupported_feature",
            Error::DictionaryMismatch { .. } => "dictionary_mismatch",
            Error::InvalidDictionary(_) => "invalid_dictionary",
            Error::BufferTooSmall { .. } => "buffer_too_small",
            Error::OutputLimitExceeded { .. } => "output_limit_exceeded",
            Error::Cancelled { .. } => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_carries_output() {
        let err = Error::checksum_mismatch(0xDEADBEEF, 0x12345678, b"abc".to_vec());
        assert_eq!(err.untrusted_output(), Some(&b"abc"[..]));
        assert_eq!(err.category(), "checksum_mismatch");
        assert!(err.is_malformed_input());
        assert_eq!(
            err.to_string(),
            "checksum mismatch: expected 0xdeadbeef, got 0x12345678"
        );
    }

    #[test]
    fn test_corrupt_at_formats_offset() {
        let err = Error::corrupt_at("bad literal header", 17);
        assert_eq!(err.to_string(), "corrupt frame: bad literal header at offset 17");
        assert!(err.untrusted_output().is_none());
    }

    #[test]
    fn test_caller_errors_are_not_malformed_input() {
        let level = Error::InvalidLevel {
            level: 99,
            min: 1,
            max: 22,
        };
        let dict = Error::DictionaryMismatch {
            expected: 7,
            provided: None,
        };
        assert!(!level.is_malformed_input());
        assert!(!dict.is_malformed_input());
        assert_eq!(dict.category(), "dictionary_mismatch");
    }
}
