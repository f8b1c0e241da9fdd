//! Compressor and decompressor configuration.
//!
//! Plain data with serde derives; nothing here reads files or the
//! environment.

use serde::{Deserialize, Serialize};
use zframe_core::{CompressionLevel, Error, Result, DEFAULT_LEVEL};

use crate::frame::{BLOCK_SIZE_MAX, MAX_WINDOW_SIZE};

/// Smallest block size a compressor may be configured with.
pub const MIN_BLOCK_SIZE: usize = 1 << 10;

/// Window log bounds accepted by `CompressorConfig::window_log`.
pub const MIN_WINDOW_LOG: u8 = 10;
pub const MAX_WINDOW_LOG: u8 = 27;

/// Frame encoder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorConfig {
    /// Numeric level, `1..=22`.
    pub level: i32,
    /// Append the XXH64 content checksum.
    pub checksum: bool,
    /// Record the input length in the frame header.
    pub content_size: bool,
    /// Upper bound on block content, clamped to `1 KiB..=128 KiB`.
    pub max_block_size: usize,
    /// Overrides the level's window log.
    pub window_log: Option<u8>,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            checksum: true,
            content_size: true,
            max_block_size: BLOCK_SIZE_MAX,
            window_log: None,
        }
    }
}

impl CompressorConfig {
    pub fn with_level(level: impl Into<CompressionLevel>) -> Self {
        Self {
            level: level.into().to_level(),
            ..Self::default()
        }
    }

    pub fn checksum(mut self, enabled: bool) -> Self {
        self.checksum = enabled;
        self
    }

    pub fn content_size(mut self, enabled: bool) -> Self {
        self.content_size = enabled;
        self
    }

    pub fn max_block_size(mut self, size: usize) -> Self {
        self.max_block_size = size;
        self
    }

    pub fn window_log(mut self, log: u8) -> Self {
        self.window_log = Some(log);
        self
    }

    /// Reject settings the encoder cannot honour.
    pub fn validate(&self) -> Result<()> {
        CompressionLevel::from_level(self.level).validate()?;
        if let Some(log) = self.window_log {
            if !(MIN_WINDOW_LOG..=MAX_WINDOW_LOG).contains(&log) {
                return Err(Error::unsupported(format!(
                    "window log {} outside {}..={}",
                    log, MIN_WINDOW_LOG, MAX_WINDOW_LOG
                )));
            }
        }
        Ok(())
    }

    /// Block size actually used.
    pub fn effective_block_size(&self) -> usize {
        self.max_block_size.clamp(MIN_BLOCK_SIZE, BLOCK_SIZE_MAX)
    }
}

/// Frame decoder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompressorConfig {
    /// Check the content checksum when a frame carries one.
    pub verify_checksum: bool,
    /// Largest window a frame may declare.
    pub max_window_size: u64,
    /// Refuse to produce more than this many bytes.
    pub max_output_size: Option<usize>,
}

impl Default for DecompressorConfig {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            max_window_size: MAX_WINDOW_SIZE as u64,
            max_output_size: None,
        }
    }
}

impl DecompressorConfig {
    pub fn verify_checksum(mut self, enabled: bool) -> Self {
        self.verify_checksum = enabled;
        self
    }

    pub fn max_window_size(mut self, size: u64) -> Self {
        self.max_window_size = size;
        self
    }

    pub fn max_output_size(mut self, limit: usize) -> Self {
        self.max_output_size = Some(limit);
        self
    }
}
