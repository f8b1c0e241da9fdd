//! Per-level search parameters.

use zframe_core::{CompressionLevel, Result};

/// How the match finder parses a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Take the best match at each position.
    Greedy,
    /// Also try the next position before committing.
    Lazy,
    /// Look up to two positions ahead.
    Lazy2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelParams {
    pub level: i32,
    pub window_log: u8,
    pub chain_log: u8,
    pub hash_log: u8,
    /// Chain candidates visited per position.
    pub search_depth: u32,
    pub min_match: usize,
    /// Stop searching once a match this long is found.
    pub target_length: usize,
    pub strategy: Strategy,
}

//   window chain hash depth min target strategy
const LEVELS: [(u8, u8, u8, u32, usize, usize, Strategy); 22] = [
    (19, 12, 14, 2, 4, 16, Strategy::Greedy),
    (20, 14, 15, 4, 4, 16, Strategy::Greedy),
    (21, 16, 16, 8, 4, 32, Strategy::Greedy),
    (21, 16, 17, 12, 4, 32, Strategy::Lazy),
    (21, 17, 17, 16, 4, 32, Strategy::Lazy),
    (21, 18, 17, 24, 4, 48, Strategy::Lazy),
    (22, 18, 18, 32, 4, 64, Strategy::Lazy),
    (22, 19, 18, 48, 4, 64, Strategy::Lazy),
    (22, 19, 18, 64, 4, 96, Strategy::Lazy2),
    (22, 20, 19, 96, 4, 128, Strategy::Lazy2),
    (22, 20, 19, 128, 4, 128, Strategy::Lazy2),
    (23, 21, 20, 192, 4, 192, Strategy::Lazy2),
    (23, 21, 20, 256, 4, 256, Strategy::Lazy2),
    (23, 22, 21, 384, 4, 256, Strategy::Lazy2),
    (23, 22, 21, 512, 4, 384, Strategy::Lazy2),
    (23, 22, 22, 768, 3, 512, Strategy::Lazy2),
    (23, 23, 22, 1024, 3, 768, Strategy::Lazy2),
    (23, 23, 22, 1536, 3, 1024, Strategy::Lazy2),
    (23, 24, 23, 2048, 3, 1024, Strategy::Lazy2),
    (25, 24, 23, 3072, 3, 2048, Strategy::Lazy2),
    (26, 25, 24, 4096, 3, 4096, Strategy::Lazy2),
    (27, 26, 25, 8192, 3, 8192, Strategy::Lazy2),
];

impl LevelParams {
    /// Parameters for a numeric level, rejecting levels outside `1..=22`.
    pub fn for_level(level: i32) -> Result<Self> {
        let level = CompressionLevel::from_level(level).validate()?;
        let (window_log, chain_log, hash_log, search_depth, min_match, target_length, strategy) =
            LEVELS[(level - 1) as usize];
        Ok(Self {
            level,
            window_log,
            chain_log,
            hash_log,
            search_depth,
            min_match,
            target_length,
            strategy,
        })
    }

    /// Shrink the tables to what `history_len` bytes can use.
    pub fn fit_to(mut self, history_len: usize) -> Self {
        let needed = ceil_log2(history_len.max(1)).max(6) as u8;
        self.chain_log = self.chain_log.min(needed);
        self.hash_log = self.hash_log.min(needed + 1);
        self
    }
}

/// Smallest `n` with `2^n >= value`.
pub(crate) fn ceil_log2(value: usize) -> u32 {
    if value <= 1 {
        0
    } else {
        usize::BITS - (value - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zframe_core::Error;

    #[test]
    fn test_every_level_has_params() {
        for level in 1..=22 {
            let params = LevelParams::for_level(level).unwrap();
            assert_eq!(params.level, level);
            assert!(params.window_log >= 10 && params.window_log <= 27);
            assert!(params.min_match >= 3);
        }
    }

    #[test]
    fn test_levels_strengthen() {
        let fast = LevelParams::for_level(1).unwrap();
        let max = LevelParams::for_level(22).unwrap();
        assert!(max.search_depth > fast.search_depth);
        assert!(max.window_log > fast.window_log);
        assert_eq!(fast.strategy, Strategy::Greedy);
        assert_eq!(max.strategy, Strategy::Lazy2);
    }

    #[test]
    fn test_invalid_levels() {
        for level in [0, -1, 23, 100] {
            assert!(matches!(
                LevelParams::for_level(level),
                Err(Error::InvalidLevel { .. })
            ));
        }
    }

    #[test]
    fn test_fit_to_small_input() {
        let params = LevelParams::for_level(22).unwrap().fit_to(1000);
        assert_eq!(params.chain_log, 10);
        assert_eq!(params.hash_log, 11);
        let tiny = LevelParams::for_level(22).unwrap().fit_to(0);
        assert_eq!(tiny.chain_log, 6);
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(1024), 10);
        assert_eq!(ceil_log2(1025), 11);
    }
}
