//! Block decoding.
//!
//! A compressed block holds a literals section followed by a sequences
//! section. Sequences are executed against the frame's history: the
//! dictionary content followed by everything the frame has produced.
//!
//! ## References
//!
//! - [RFC 8878 Section 3.1.1.3](https://datatracker.ietf.org/doc/html/rfc8878#section-3.1.1.3)

mod literals;
mod sequences;

pub use literals::{decode_literals, LiteralsBlockType, LiteralsHeader};
pub use sequences::{
    decode_sequences, literal_length_code, match_length_code, offset_code, parse_sequence_count,
    RepeatOffsets, Sequence, SequenceTables, SymbolMode, LITERAL_LENGTH_BASELINE,
    MATCH_LENGTH_BASELINE, MIN_MATCH,
};

use crate::huffman::HuffmanTable;
use zframe_core::{Error, Result};

/// Entropy state carried across the blocks of one frame.
#[derive(Debug, Clone, Default)]
pub struct DecoderState {
    pub huffman: Option<HuffmanTable>,
    pub sequences: SequenceTables,
}

/// Where match offsets may reach: dictionary content, then the current
/// frame's output starting at `frame_start`.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    pub dictionary: &'a [u8],
    pub frame_start: usize,
    /// Total output length no append may exceed.
    pub output_limit: Option<usize>,
}

impl History<'_> {
    fn check_limit(&self, total: usize) -> Result<()> {
        match self.output_limit {
            Some(limit) if total > limit => Err(Error::OutputLimitExceeded { limit }),
            _ => Ok(()),
        }
    }
}

pub fn decode_raw_block(input: &[u8], output: &mut Vec<u8>) {
    output.extend_from_slice(input);
}

pub fn decode_rle_block(byte: u8, size: usize, output: &mut Vec<u8>) {
    output.resize(output.len() + size, byte);
}

/// Decode a compressed block, appending to `output`.
pub fn decode_compressed_block(
    payload: &[u8],
    state: &mut DecoderState,
    history: History<'_>,
    max_block_size: usize,
    output: &mut Vec<u8>,
) -> Result<()> {
    let (literals, literals_size) = decode_literals(payload, &mut state.huffman)?;
    let sequences = decode_sequences(&payload[literals_size..], &mut state.sequences)?;
    execute_sequences(&literals, &sequences, history, max_block_size, output)
}

/// Interleave literal runs and matches.
pub fn execute_sequences(
    literals: &[u8],
    sequences: &[Sequence],
    history: History<'_>,
    max_block_size: usize,
    output: &mut Vec<u8>,
) -> Result<()> {
    let block_start = output.len();
    let mut literal_pos = 0;

    for seq in sequences {
        let literal_end = literal_pos + seq.literal_length as usize;
        if literal_end > literals.len() {
            return Err(Error::corrupt(format!(
                "literal length {} exceeds the {} remaining literals",
                seq.literal_length,
                literals.len() - literal_pos
            )));
        }
        let block_len = output.len() - block_start + seq.literal_length as usize + seq.match_length as usize;
        if block_len > max_block_size {
            return Err(Error::corrupt("block decodes past maximum block size"));
        }
        history.check_limit(block_start + block_len)?;

        output.extend_from_slice(&literals[literal_pos..literal_end]);
        literal_pos = literal_end;
        copy_match(output, history, seq.offset as usize, seq.match_length as usize)?;
    }

    let rest = &literals[literal_pos..];
    if output.len() - block_start + rest.len() > max_block_size {
        return Err(Error::corrupt("block decodes past maximum block size"));
    }
    history.check_limit(output.len() + rest.len())?;
    output.extend_from_slice(rest);
    Ok(())
}

fn copy_match(output: &mut Vec<u8>, history: History<'_>, offset: usize, length: usize) -> Result<()> {
    let produced = output.len() - history.frame_start;
    let available = produced + history.dictionary.len();
    if offset == 0 || offset > available {
        return Err(Error::corrupt(format!(
            "match offset {} exceeds history of {} bytes",
            offset, available
        )));
    }

    if offset > produced {
        let dictionary = history.dictionary;
        let start = dictionary.len() - (offset - produced);
        let from_dictionary = (dictionary.len() - start).min(length);
        output.extend_from_slice(&dictionary[start..start + from_dictionary]);
        // The rest continues at the first byte of the frame.
        for i in 0..length - from_dictionary {
            let byte = output[history.frame_start + i];
            output.push(byte);
        }
        return Ok(());
    }

    let start = output.len() - offset;
    if offset >= length {
        output.extend_from_within(start..start + length);
    } else {
        // Overlapping copy repeats the last `offset` bytes.
        for i in 0..length {
            let byte = output[start + i];
            output.push(byte);
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const NO_DICT: History<'static> = History {
        dictionary: &[],
        frame_start: 0,
        output_limit: None,
    };

    #[test]
    fn test_raw_and_rle_blocks() {
        let mut out = Vec::new();
        decode_raw_block(b"abc", &mut out);
        decode_rle_block(b'x', 4, &mut out);
        assert_eq!(out, b"abcxxxx");
    }

    #[test]
    fn test_execute_with_overlap() {
        let mut out = Vec::new();
        let sequences = [Sequence::new(2, 2, 6), Sequence::new(1, 1, 3)];
        execute_sequences(b"abZ!", &sequences, NO_DICT, 1 << 17, &mut out).unwrap();
        assert_eq!(out, b"ababababZZZZ!");
    }

    #[test]
    fn test_offset_beyond_history() {
        let mut out = Vec::new();
        let sequences = [Sequence::new(3, 4, 3)];
        let err = execute_sequences(b"abc", &sequences, NO_DICT, 1 << 17, &mut out).unwrap_err();
        assert!(matches!(err, Error::CorruptFrame { .. }));
    }

    #[test]
    fn test_match_reaches_into_dictionary() {
        let history = History {
            dictionary: b"hello world",
            frame_start: 0,
            output_limit: None,
        };
        let mut out = Vec::new();
        // Copy "world" from the dictionary, then "world" plus " w" across the seam.
        let sequences = [Sequence::new(1, 6, 5), Sequence::new(0, 11, 7)];
        execute_sequences(b" ", &sequences, history, 1 << 17, &mut out).unwrap();
        assert_eq!(out, b" worldworld w");
    }

    #[test]
    fn test_history_is_per_frame() {
        // Earlier frames in the same output are not addressable.
        let history = History {
            dictionary: &[],
            frame_start: 5,
            output_limit: None,
        };
        let mut out = b"12345".to_vec();
        let sequences = [Sequence::new(1, 3, 3)];
        assert!(execute_sequences(b"a", &sequences, history, 1 << 17, &mut out).is_err());
    }

    #[test]
    fn test_literal_overrun_and_block_limit() {
        let mut out = Vec::new();
        let sequences = [Sequence::new(5, 1, 3)];
        assert!(execute_sequences(b"abc", &sequences, NO_DICT, 1 << 17, &mut out).is_err());

        let mut out = Vec::new();
        let sequences = [Sequence::new(1, 1, 100)];
        assert!(execute_sequences(b"a", &sequences, NO_DICT, 64, &mut out).is_err());
    }

    #[test]
    fn test_output_limit_stops_before_append() {
        let history = History {
            output_limit: Some(10),
            ..NO_DICT
        };
        let sequences = [Sequence::new(2, 2, 4), Sequence::new(0, 2, 6)];

        let mut out = Vec::new();
        let err = execute_sequences(b"ab", &sequences, history, 1 << 17, &mut out).unwrap_err();
        assert!(matches!(err, Error::OutputLimitExceeded { limit: 10 }));
        assert_eq!(out, b"ababab");

        // Trailing literals count too.
        let mut out = b"0123456789".to_vec();
        let err = execute_sequences(b"x", &[], history, 1 << 17, &mut out).unwrap_err();
        assert!(matches!(err, Error::OutputLimitExceeded { limit: 10 }));
        assert_eq!(out.len(), 10);

        let roomy = History {
            output_limit: Some(12),
            ..NO_DICT
        };
        let mut out = Vec::new();
        execute_sequences(b"ab", &sequences, roomy, 1 << 17, &mut out).unwrap();
        assert_eq!(out, b"abababababab");
    }
}
