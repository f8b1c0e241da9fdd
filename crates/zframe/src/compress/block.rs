//! Block-level encoding.
//!
//! A block becomes RLE when every byte is equal. Otherwise a compressed
//! candidate (literals section + sequences section) is built and kept only
//! if it is smaller than the input; a rejected candidate leaves the entropy
//! state exactly as it was, since the decoder never sees it.

use super::literals::encode_literals;
use super::match_finder::MatchFinder;
use super::sequences::{encode_sequences, SequenceEncoderTables};
use crate::block::{RepeatOffsets, Sequence};
use crate::huffman::HuffmanEncoder;
use zframe_core::Result;

/// Encoder-side mirror of the decoder's cross-block state.
#[derive(Debug, Clone, Default)]
pub struct EntropyState {
    /// Table Treeless literals would reuse.
    pub huffman: Option<HuffmanEncoder>,
    pub sequences: SequenceEncoderTables,
    pub repeat_offsets: RepeatOffsets,
}

/// How one block is represented in the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedBlock {
    Raw,
    Rle(u8),
    Compressed { payload: Vec<u8>, sequences: usize },
}

/// Encode `history[start..end]`.
///
/// The finder must have indexed everything before `start` it may reference.
pub fn encode_block(
    finder: &mut MatchFinder<'_>,
    history: &[u8],
    start: usize,
    end: usize,
    state: &mut EntropyState,
) -> Result<EncodedBlock> {
    let block = &history[start..end];
    if let Some(&first) = block.first() {
        if block.len() > 1 && block.iter().all(|&b| b == first) {
            return Ok(EncodedBlock::Rle(first));
        }
    }

    let mut finder_offsets = state.repeat_offsets;
    let (sequences, trailing) = finder.find_sequences(start, end, &mut finder_offsets);
    let literals = gather_literals(block, &sequences, trailing);

    let snapshot = state.clone();
    let mut payload = encode_literals(&literals, &mut state.huffman);
    payload.extend_from_slice(&encode_sequences(
        &sequences,
        &mut state.repeat_offsets,
        &mut state.sequences,
    )?);

    if payload.len() < block.len() {
        Ok(EncodedBlock::Compressed {
            payload,
            sequences: sequences.len(),
        })
    } else {
        *state = snapshot;
        Ok(EncodedBlock::Raw)
    }
}

/// Literal bytes in stream order: each sequence's run, then the tail.
fn gather_literals(block: &[u8], sequences: &[Sequence], trailing: usize) -> Vec<u8> {
    let mut literals = Vec::with_capacity(block.len());
    let mut pos = 0;
    for seq in sequences {
        let run = seq.literal_length as usize;
        literals.extend_from_slice(&block[pos..pos + run]);
        pos += run + seq.match_length as usize;
    }
    literals.extend_from_slice(&block[pos..pos + trailing]);
    literals
}
