//! Finite State Entropy coding.
//!
//! FSE is the table-based asymmetric numeral system zstd uses for the
//! literal-length, match-length and offset code streams, and for
//! compressing Huffman weights.
//!
//! ## References
//!
//! - [RFC 8878 Section 4.1](https://datatracker.ietf.org/doc/html/rfc8878#section-4.1)

mod decoder;
mod encoder;
mod table;

use std::sync::OnceLock;

pub use decoder::FseDecoder;
pub use encoder::FseEncodeTable;
pub use table::{
    estimate_bits, normalize_counts, optimal_table_log, read_distribution, write_distribution,
    FseEntry, FseTable, FSE_MAX_TABLE_LOG, FSE_MIN_TABLE_LOG,
};

/// Largest literal-length code.
pub const LL_MAX_SYMBOL: u8 = 35;
/// Largest match-length code.
pub const ML_MAX_SYMBOL: u8 = 52;
/// Largest offset code accepted by the decoder.
pub const OF_MAX_SYMBOL: u8 = 31;

/// Accuracy-log ceilings for sequence tables carried in a frame.
pub const LL_MAX_LOG: u8 = 9;
pub const ML_MAX_LOG: u8 = 9;
pub const OF_MAX_LOG: u8 = 8;

pub const LL_DEFAULT_LOG: u8 = 6;
pub const ML_DEFAULT_LOG: u8 = 6;
pub const OF_DEFAULT_LOG: u8 = 5;

/// Predefined literal-length distribution (RFC 8878 §3.1.1.3.2.2.1).
pub const LL_DEFAULT_DISTRIBUTION: [i16; 36] = [
    4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 2, 1, 1, 1, 1, 1,
    -1, -1, -1, -1,
];

/// Predefined match-length distribution (RFC 8878 §3.1.1.3.2.2.2).
pub const ML_DEFAULT_DISTRIBUTION: [i16; 53] = [
    1, 4, 3, 2, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1, -1,
];

/// Predefined offset distribution (RFC 8878 §3.1.1.3.2.2.3).
pub const OF_DEFAULT_DISTRIBUTION: [i16; 29] = [
    1, 1, 1, 1, 1, 1, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1,
];

/// Which of the three sequence streams a table serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceStream {
    LiteralLength,
    Offset,
    MatchLength,
}

impl SequenceStream {
    pub fn max_symbol(self) -> u8 {
        match self {
            SequenceStream::LiteralLength => LL_MAX_SYMBOL,
            SequenceStream::Offset => OF_MAX_SYMBOL,
            SequenceStream::MatchLength => ML_MAX_SYMBOL,
        }
    }

    pub fn max_log(self) -> u8 {
        match self {
            SequenceStream::LiteralLength => LL_MAX_LOG,
            SequenceStream::Offset => OF_MAX_LOG,
            SequenceStream::MatchLength => ML_MAX_LOG,
        }
    }

    pub fn default_distribution(self) -> (&'static [i16], u8) {
        match self {
            SequenceStream::LiteralLength => (&LL_DEFAULT_DISTRIBUTION, LL_DEFAULT_LOG),
            SequenceStream::Offset => (&OF_DEFAULT_DISTRIBUTION, OF_DEFAULT_LOG),
            SequenceStream::MatchLength => (&ML_DEFAULT_DISTRIBUTION, ML_DEFAULT_LOG),
        }
    }

    /// Cached decoding table for the predefined distribution.
    pub fn predefined_table(self) -> &'static FseTable {
        static LL: OnceLock<FseTable> = OnceLock::new();
        static OF: OnceLock<FseTable> = OnceLock::new();
        static ML: OnceLock<FseTable> = OnceLock::new();
        let cell = match self {
            SequenceStream::LiteralLength => &LL,
            SequenceStream::Offset => &OF,
            SequenceStream::MatchLength => &ML,
        };
        cell.get_or_init(|| {
            let (distribution, log) = self.default_distribution();
            build_predefined(distribution, log)
        })
    }

    /// Cached encoding table for the predefined distribution.
    pub fn predefined_encoder(self) -> &'static FseEncodeTable {
        static LL: OnceLock<FseEncodeTable> = OnceLock::new();
        static OF: OnceLock<FseEncodeTable> = OnceLock::new();
        static ML: OnceLock<FseEncodeTable> = OnceLock::new();
        let cell = match self {
            SequenceStream::LiteralLength => &LL,
            SequenceStream::Offset => &OF,
            SequenceStream::MatchLength => &ML,
        };
        cell.get_or_init(|| {
            let (distribution, log) = self.default_distribution();
            match FseEncodeTable::build(distribution, log) {
                Ok(table) => table,
                Err(err) => unreachable!("predefined distribution rejected: {}", err),
            }
        })
    }
}

fn build_predefined(distribution: &[i16], log: u8) -> FseTable {
    match FseTable::build(distribution, log) {
        Ok(table) => table,
        Err(err) => unreachable!("predefined distribution rejected: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(distribution: &[i16]) -> i32 {
        distribution
            .iter()
            .map(|&n| if n == -1 { 1 } else { n as i32 })
            .sum()
    }

    #[test]
    fn test_predefined_distributions_fill_tables() {
        assert_eq!(slots(&LL_DEFAULT_DISTRIBUTION), 1 << LL_DEFAULT_LOG);
        assert_eq!(slots(&ML_DEFAULT_DISTRIBUTION), 1 << ML_DEFAULT_LOG);
        assert_eq!(slots(&OF_DEFAULT_DISTRIBUTION), 1 << OF_DEFAULT_LOG);
    }

    #[test]
    fn test_predefined_tables_cached() {
        for stream in [
            SequenceStream::LiteralLength,
            SequenceStream::Offset,
            SequenceStream::MatchLength,
        ] {
            let a = stream.predefined_table() as *const FseTable;
            let b = stream.predefined_table() as *const FseTable;
            assert_eq!(a, b);
            let (distribution, log) = stream.default_distribution();
            assert_eq!(stream.predefined_table().accuracy_log(), log);
            assert_eq!(stream.predefined_encoder().accuracy_log(), log);
            assert_eq!(stream.predefined_table().distribution(), distribution);
        }
    }

    #[test]
    fn test_predefined_ml_first_states() {
        // First states of the reference ML table.
        let table = SequenceStream::MatchLength.predefined_table();
        assert_eq!(table.entry(0).symbol, 0);
        assert_eq!(table.entry(0).num_bits, 6);
        assert_eq!(table.entry(1).symbol, 1);
        assert_eq!(table.entry(1).num_bits, 4);
    }
}
