//! Core type definitions for compression operations.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lowest supported numeric level.
pub const MIN_LEVEL: i32 = 1;

/// Highest supported numeric level.
pub const MAX_LEVEL: i32 = 22;

/// Level used when callers do not pick one.
pub const DEFAULT_LEVEL: i32 = 1;

/// Compression level presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    /// Optimized for speed over ratio (level 1). Same level as `Default`.
    Fast,

    /// Level used when none is given (level 1).
    #[default]
    Default,

    /// Optimized for ratio over speed (level 9).
    Best,

    /// Deep search, large window (level 19).
    Ultra,

    /// Maximum compression (level 22).
    Max,

    /// Explicit numeric level.
    Custom(i32),
}

impl CompressionLevel {
    /// Convert to numeric level.
    pub fn to_level(self) -> i32 {
        match self {
            CompressionLevel::Fast => 1,
            CompressionLevel::Default => DEFAULT_LEVEL,
            CompressionLevel::Best => 9,
            CompressionLevel::Ultra => 19,
            CompressionLevel::Max => MAX_LEVEL,
            CompressionLevel::Custom(level) => level,
        }
    }

    /// Create from numeric level, mapping preset values onto their names.
    ///
    /// Level 1 is both `Fast` and `Default`; it maps to `Default`.
    pub fn from_level(level: i32) -> Self {
        match level {
            DEFAULT_LEVEL => CompressionLevel::Default,
            9 => CompressionLevel::Best,
            19 => CompressionLevel::Ultra,
            MAX_LEVEL => CompressionLevel::Max,
            _ => CompressionLevel::Custom(level),
        }
    }

    /// Numeric level after range validation.
    pub fn validate(self) -> Result<i32> {
        let level = self.to_level();
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
            return Err(Error::InvalidLevel {
                level,
                min: MIN_LEVEL,
                max: MAX_LEVEL,
            });
        }
        Ok(level)
    }
}

impl From<i32> for CompressionLevel {
    fn from(level: i32) -> Self {
        CompressionLevel::from_level(level)
    }
}

/// Compression ratio metrics.
#[derive(Debug, Clone, Copy)]
pub struct CompressionRatio {
    /// Original uncompressed size in bytes.
    pub original_size: usize,
    /// Compressed size in bytes.
    pub compressed_size: usize,
}

impl CompressionRatio {
    /// Create new ratio from sizes.
    pub fn new(original: usize, compressed: usize) -> Self {
        CompressionRatio {
            original_size: original,
            compressed_size: compressed,
        }
    }

    /// Calculate ratio (original / compressed).
    /// Higher is better (more compression).
    pub fn ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            return 0.0;
        }
        self.original_size as f64 / self.compressed_size as f64
    }

    /// Calculate space savings as percentage (0-100).
    pub fn savings_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - (self.compressed_size as f64 / self.original_size as f64)) * 100.0
    }

    /// Check if compression was effective (saved space).
    pub fn is_effective(&self) -> bool {
        self.compressed_size < self.original_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_presets_roundtrip() {
        for preset in [
            CompressionLevel::Default,
            CompressionLevel::Best,
            CompressionLevel::Ultra,
            CompressionLevel::Max,
        ] {
            assert_eq!(CompressionLevel::from_level(preset.to_level()), preset);
        }
        assert_eq!(CompressionLevel::from(5), CompressionLevel::Custom(5));
        assert_eq!(CompressionLevel::from(3), CompressionLevel::Custom(3));
    }

    #[test]
    fn test_fast_and_default_share_level_one() {
        assert_eq!(DEFAULT_LEVEL, 1);
        assert_eq!(CompressionLevel::Fast.to_level(), CompressionLevel::Default.to_level());
        assert_eq!(CompressionLevel::from_level(1), CompressionLevel::Default);
        assert_eq!(CompressionLevel::default().to_level(), 1);
    }

    #[test]
    fn test_level_validation() {
        assert_eq!(CompressionLevel::Default.validate().unwrap(), 1);
        assert_eq!(CompressionLevel::Custom(22).validate().unwrap(), 22);

        for bad in [0, -1, 23, i32::MAX] {
            match CompressionLevel::Custom(bad).validate() {
                Err(Error::InvalidLevel { level, min, max }) => {
                    assert_eq!(level, bad);
                    assert_eq!((min, max), (MIN_LEVEL, MAX_LEVEL));
                }
                other => panic!("expected InvalidLevel, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_level_serde() {
        let json = serde_json::to_string(&CompressionLevel::Custom(7)).unwrap();
        assert_eq!(json, r#"{"custom":7}"#);
        let back: CompressionLevel = serde_json::from_str(r#""best""#).unwrap();
        assert_eq!(back, CompressionLevel::Best);
    }

    #[test]
    fn test_ratio() {
        let ratio = CompressionRatio::new(1000, 250);
        assert!((ratio.ratio() - 4.0).abs() < f64::EPSILON);
        assert!((ratio.savings_percent() - 75.0).abs() < 1e-9);
        assert!(ratio.is_effective());
        assert_eq!(CompressionRatio::new(10, 0).ratio(), 0.0);
    }
}
