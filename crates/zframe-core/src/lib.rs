//! # zframe Core
//!
//! Core traits, error taxonomy and level types shared by the zframe codec.
//!
//! ## Design Philosophy
//!
//! - **Pure functions**: compression and decompression are deterministic in
//!   their inputs, so every error is permanent for that input
//! - **Typed failures**: each malformed-input condition has its own variant
//! - **Caller-owned buffers**: one-shot APIs return owned `Vec<u8>`; the
//!   `*_to` variants write into caller buffers
//!
//! ## Core Traits
//!
//! - [`Compressor`] - One-shot compression operations
//! - [`Decompressor`] - One-shot decompression operations
//! - [`Codec`] - Combined compress/decompress capability
//!
//! ## Example
//!
//! ```ignore
//! use zframe_core::{Codec, CompressionLevel};
//! use zframe::ZstdCodec;
//!
//! let codec = ZstdCodec::with_level(CompressionLevel::Fast);
//! let compressed = codec.compress(data)?;
//! let original = codec.decompress(&compressed)?;
//! ```

pub mod error;
pub mod stats;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use stats::{BlockCounts, CompressionStats};
pub use traits::{Codec, Compressor, Decompressor};
pub use types::{CompressionLevel, CompressionRatio, DEFAULT_LEVEL, MAX_LEVEL, MIN_LEVEL};
