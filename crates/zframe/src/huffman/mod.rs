//! Huffman coding for literals.
//!
//! Literal sections carry a tree description (per-symbol weights, either
//! packed as nibbles or FSE-compressed) followed by one or four backward
//! bitstreams. Codes are canonical, so a table is fully determined by its
//! weights; the encoder and decoder both rebuild codes from them.
//!
//! ## References
//!
//! - [RFC 8878 Section 4.2](https://datatracker.ietf.org/doc/html/rfc8878#section-4.2)

mod encoder;
mod table;

pub use encoder::HuffmanEncoder;
pub use table::{HuffmanEntry, HuffmanTable, HUF_MAX_BITS, HUF_MAX_SYMBOLS};
