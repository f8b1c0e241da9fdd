//! LZ77 match finding over hash chains.
//!
//! The finder indexes one history buffer (dictionary content followed by
//! the input) and parses it block by block. Each position is hashed on its
//! first `min_match` bytes; `head` holds the most recent position per hash
//! and `chain` links every position to the previous one with the same hash.
//! The chain is a ring of `2^chain_log` slots, so links older than that are
//! gone and end the walk.
//!
//! Repeat offsets are tried before the chain. A match is scored as
//! `4 * length - log2(offset_value)`, which makes a repeat (offset value
//! 1-3) win over an equally long fresh offset.

use super::params::{LevelParams, Strategy};
use crate::block::{RepeatOffsets, Sequence, MIN_MATCH};

const NONE: usize = usize::MAX;

/// Multiplier for the 32-bit multiplicative hash.
const HASH_PRIME: u32 = 0x9E37_79B1;

/// Bonus the current match keeps when compared with a lazy candidate.
const LAZY_BONUS: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub offset: usize,
    pub length: usize,
    /// Offset value as it will be written, given the repeat history.
    pub offset_value: u32,
}

impl Match {
    #[inline]
    fn score(&self) -> i64 {
        4 * self.length as i64 - (31 - self.offset_value.leading_zeros()) as i64
    }
}

/// Hash-chain match finder over a single history buffer.
#[derive(Debug)]
pub struct MatchFinder<'h> {
    history: &'h [u8],
    params: LevelParams,
    head: Vec<usize>,
    chain: Vec<usize>,
    chain_mask: usize,
    window_size: usize,
    next_to_index: usize,
}

impl<'h> MatchFinder<'h> {
    /// Create a finder. `window_size` bounds every offset it emits.
    pub fn new(history: &'h [u8], params: LevelParams, window_size: usize) -> Self {
        let params = params.fit_to(history.len());
        Self {
            history,
            params,
            head: vec![NONE; 1 << params.hash_log],
            chain: vec![NONE; 1 << params.chain_log],
            chain_mask: (1 << params.chain_log) - 1,
            window_size,
            next_to_index: 0,
        }
    }

    /// Index every position before `end` (used for dictionary content).
    pub fn prime(&mut self, end: usize) {
        self.insert_until(end);
    }

    /// Parse `[start, end)` into sequences.
    ///
    /// Returns the sequences (offsets resolved, not encoded) and the length
    /// of the trailing literal run. `reps` is updated the same way the
    /// decoder will update it.
    pub fn find_sequences(&mut self, start: usize, end: usize, reps: &mut RepeatOffsets) -> (Vec<Sequence>, usize) {
        let mut sequences = Vec::new();
        let mut anchor = start;
        let mut pos = start;
        let min_match = self.params.min_match;

        while pos + min_match <= end {
            let literal_length = (pos - anchor) as u32;
            let Some(mut best) = self.best_match(pos, end, reps, literal_length) else {
                pos += 1;
                continue;
            };
            let mut best_pos = pos;

            let lookahead = match self.params.strategy {
                Strategy::Greedy => 0,
                Strategy::Lazy => 1,
                Strategy::Lazy2 => 2,
            };
            let mut step = 0;
            while step < lookahead && best.length < self.params.target_length {
                let next = best_pos + 1;
                if next + min_match > end {
                    break;
                }
                let next_ll = (next - anchor) as u32;
                match self.best_match(next, end, reps, next_ll) {
                    Some(candidate) if candidate.score() > best.score() + LAZY_BONUS => {
                        best = candidate;
                        best_pos = next;
                        step += 1;
                    }
                    _ => break,
                }
            }

            let literal_length = (best_pos - anchor) as u32;
            let value = reps.encode(best.offset as u32, literal_length);
            // Values come from the same history, so resolution cannot fail.
            let _ = reps.resolve(value, literal_length);
            sequences.push(Sequence::new(literal_length, best.offset as u32, best.length as u32));

            pos = best_pos + best.length;
            anchor = pos;
        }

        (sequences, end - anchor)
    }

    /// Best match at `pos`, repeat offsets first.
    fn best_match(&mut self, pos: usize, end: usize, reps: &RepeatOffsets, literal_length: u32) -> Option<Match> {
        self.insert_until(pos);
        let history = self.history;
        let limit = end - pos;
        let min_match = self.params.min_match;
        let mut best: Option<Match> = None;

        let consider = |offset: usize, length: usize, best: &mut Option<Match>| {
            let candidate = Match {
                offset,
                length,
                offset_value: reps.encode(offset as u32, literal_length),
            };
            if best.map_or(true, |b| candidate.score() > b.score()) {
                *best = Some(candidate);
            }
        };

        for offset in repeat_candidates(reps, literal_length) {
            let offset = offset as usize;
            if offset == 0 || offset > pos || offset > self.window_size {
                continue;
            }
            let length = common_prefix(&history[pos - offset..], &history[pos..end]);
            if length >= min_match.max(MIN_MATCH as usize) {
                consider(offset, length, &mut best);
            }
        }

        if pos + min_match > history.len() {
            return best;
        }
        let mut candidate = self.head[self.hash(pos)];
        let mut depth = 0;
        while candidate != NONE && depth < self.params.search_depth {
            let offset = pos - candidate;
            if offset > self.window_size {
                break;
            }
            let best_len = best.map_or(0, |b| b.length);
            // Cheap reject: the byte that would extend the best match.
            if best_len < limit && history[candidate + best_len] == history[pos + best_len] {
                let length = common_prefix(&history[candidate..], &history[pos..end]);
                if length >= min_match {
                    consider(offset, length, &mut best);
                    if length >= self.params.target_length || length == limit {
                        break;
                    }
                }
            }

            if offset >= self.chain.len() {
                break;
            }
            let next = self.chain[candidate & self.chain_mask];
            if next == NONE || next >= candidate {
                break;
            }
            candidate = next;
            depth += 1;
        }
        best
    }

    fn insert_until(&mut self, end: usize) {
        let min_match = self.params.min_match;
        let last = (self.history.len() + 1).saturating_sub(min_match);
        while self.next_to_index < end {
            let pos = self.next_to_index;
            if pos < last {
                let hash = self.hash(pos);
                self.chain[pos & self.chain_mask] = self.head[hash];
                self.head[hash] = pos;
            }
            self.next_to_index += 1;
        }
    }

    #[inline]
    fn hash(&self, pos: usize) -> usize {
        let bytes = &self.history[pos..];
        let value = if self.params.min_match >= 4 {
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
        } else {
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0])
        };
        (value.wrapping_mul(HASH_PRIME) >> (32 - self.params.hash_log as u32)) as usize
    }
}

/// Offsets the repeat codes can express at this literal length.
fn repeat_candidates(reps: &RepeatOffsets, literal_length: u32) -> [u32; 3] {
    let [r0, r1, r2] = reps.get();
    if literal_length > 0 {
        [r0, r1, r2]
    } else {
        [r1, r2, r0.saturating_sub(1)]
    }
}

/// Length of the common prefix, compared eight bytes at a time.
pub fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    let max = a.len().min(b.len());
    let mut length = 0;
    while length + 8 <= max {
        let mut x = [0u8; 8];
        let mut y = [0u8; 8];
        x.copy_from_slice(&a[length..length + 8]);
        y.copy_from_slice(&b[length..length + 8]);
        let diff = u64::from_le_bytes(x) ^ u64::from_le_bytes(y);
        if diff != 0 {
            return length + (diff.trailing_zeros() / 8) as usize;
        }
        length += 8;
    }
    while length < max && a[length] == b[length] {
        length += 1;
    }
    length
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &[u8], level: i32) -> (Vec<Sequence>, usize) {
        let params = LevelParams::for_level(level).unwrap();
        let mut finder = MatchFinder::new(data, params, data.len());
        let mut reps = RepeatOffsets::default();
        finder.find_sequences(0, data.len(), &mut reps)
    }

    /// Rebuild the block from sequences, as the decoder would.
    fn replay(data: &[u8], sequences: &[Sequence], trailing: usize) -> Vec<u8> {
        let mut out: Vec<u8> = Vec::new();
        let mut pos = 0;
        for seq in sequences {
            out.extend_from_slice(&data[pos..pos + seq.literal_length as usize]);
            pos += seq.literal_length as usize;
            let start = out.len() - seq.offset as usize;
            for i in 0..seq.match_length as usize {
                let byte = out[start + i];
                out.push(byte);
            }
            pos += seq.match_length as usize;
        }
        out.extend_from_slice(&data[pos..pos + trailing]);
        out
    }

    #[test]
    fn test_common_prefix() {
        assert_eq!(common_prefix(b"abcdefghijk", b"abcdefghijz"), 10);
        assert_eq!(common_prefix(b"abc", b"abd"), 2);
        assert_eq!(common_prefix(b"", b"abc"), 0);
        assert_eq!(common_prefix(b"same", b"same"), 4);
    }

    #[test]
    fn test_no_matches_in_unique_data() {
        let data: Vec<u8> = (0..=255u8).collect();
        let (sequences, trailing) = parse(&data, 3);
        assert!(sequences.is_empty());
        assert_eq!(trailing, 256);
    }

    #[test]
    fn test_repetitive_data_replays() {
        let data = b"abcabcabcabcabcabcabcabcXYZabcabcabc_the end".to_vec();
        for level in [1, 3, 9, 19] {
            let (sequences, trailing) = parse(&data, level);
            assert!(!sequences.is_empty());
            assert_eq!(replay(&data, &sequences, trailing), data, "level {}", level);
        }
    }

    #[test]
    fn test_overlapping_match() {
        let data = vec![b'q'; 100];
        let (sequences, trailing) = parse(&data, 3);
        assert_eq!(sequences[0].literal_length, 1);
        assert_eq!(sequences[0].offset, 1);
        assert_eq!(replay(&data, &sequences, trailing), data);
    }

    #[test]
    fn test_matches_stay_inside_block_and_window() {
        let mut data = Vec::new();
        for i in 0..2000u32 {
            data.extend_from_slice(format!("line {} of text\n", i % 37).as_bytes());
        }
        let params = LevelParams::for_level(6).unwrap();
        let window = 512;
        let mut finder = MatchFinder::new(&data, params, window);
        let mut reps = RepeatOffsets::default();
        let end = data.len() / 2;
        let (sequences, trailing) = finder.find_sequences(0, end, &mut reps);
        let mut pos = 0usize;
        for seq in &sequences {
            pos += seq.literal_length as usize;
            assert!(seq.offset as usize <= window);
            pos += seq.match_length as usize;
        }
        assert_eq!(pos + trailing, end);
    }

    /// `first`, 20 unique bytes, `second`, 30 unique bytes, `target`.
    fn two_prior_occurrences(first: &[u8], second: &[u8], target: &[u8]) -> Vec<u8> {
        let mut data = first.to_vec();
        data.extend(0x80u8..0x94);
        data.extend_from_slice(second);
        data.extend(0xA0u8..0xBE);
        data.extend_from_slice(target);
        data
    }

    #[test]
    fn test_equal_length_prefers_smallest_offset() {
        let data = two_prior_occurrences(b"abcdefgh1", b"abcdefgh2", b"abcdefgh3");
        let (sequences, trailing) = parse(&data, 3);
        let last = sequences.last().unwrap();
        assert_eq!(last.match_length, 8);
        assert_eq!(last.offset, 39);
        assert_eq!(trailing, 1);
        assert_eq!(replay(&data, &sequences, trailing), data);
    }

    #[test]
    fn test_longer_older_match_still_wins() {
        let data = two_prior_occurrences(b"abcdefgh3", b"abcdefgh2", b"abcdefgh3");
        let (sequences, trailing) = parse(&data, 3);
        let last = sequences.last().unwrap();
        assert_eq!(last.match_length, 9);
        assert_eq!(last.offset, 68);
        assert_eq!(trailing, 0);
        assert_eq!(replay(&data, &sequences, trailing), data);
    }

    #[test]
    fn test_dictionary_prefix_is_searchable() {
        let dictionary = b"common header: zframe payload v1;".to_vec();
        let mut history = dictionary.clone();
        history.extend_from_slice(b"common header: zframe payload v1;");
        let params = LevelParams::for_level(3).unwrap();
        let mut finder = MatchFinder::new(&history, params, history.len());
        finder.prime(dictionary.len());
        let mut reps = RepeatOffsets::default();
        let (sequences, trailing) = finder.find_sequences(dictionary.len(), history.len(), &mut reps);
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].offset as usize, dictionary.len());
        assert_eq!(trailing, 0);
    }
}
