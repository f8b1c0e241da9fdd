//! Literals section encoding.
//!
//! Candidates, smallest wins:
//!
//! | Literals                 | Section                         |
//! |--------------------------|---------------------------------|
//! | none, or fewer than 64   | Raw                             |
//! | one distinct byte        | RLE                             |
//! | otherwise                | Compressed (fresh table),       |
//! |                          | Treeless (previous table), Raw  |

use crate::block::LiteralsBlockType;
use crate::huffman::HuffmanEncoder;

/// Below this many literals Huffman coding is not attempted.
const MIN_HUFFMAN_LITERALS: usize = 64;

/// Single-stream literals stay under this size.
const SINGLE_STREAM_MAX: usize = 256;

/// Encode `literals`, updating `previous` when a fresh table is written.
pub fn encode_literals(literals: &[u8], previous: &mut Option<HuffmanEncoder>) -> Vec<u8> {
    if literals.len() > 1 && literals.iter().all(|&b| b == literals[0]) {
        let mut out = size_header(LiteralsBlockType::Rle, literals.len());
        out.push(literals[0]);
        return out;
    }
    if literals.len() < MIN_HUFFMAN_LITERALS {
        return raw_literals(literals);
    }

    let mut counts = [0u32; 256];
    for &byte in literals {
        counts[byte as usize] += 1;
    }

    let raw_size = size_header(LiteralsBlockType::Raw, literals.len()).len() + literals.len();
    let mut best: Option<(Vec<u8>, Option<HuffmanEncoder>)> = None;

    if let Some(encoder) = HuffmanEncoder::build(&counts) {
        if let Some(description) = encoder.describe() {
            if let Some(section) = huffman_section(&encoder, Some(&description), literals) {
                best = Some((section, Some(encoder)));
            }
        }
    }

    if let Some(prev) = previous.as_ref().filter(|p| p.can_encode(&counts)) {
        if let Some(section) = huffman_section(prev, None, literals) {
            if best.as_ref().map_or(true, |(b, _)| section.len() < b.len()) {
                best = Some((section, None));
            }
        }
    }

    match best {
        Some((section, table)) if section.len() < raw_size => {
            if let Some(table) = table {
                *previous = Some(table);
            }
            section
        }
        _ => raw_literals(literals),
    }
}

fn raw_literals(literals: &[u8]) -> Vec<u8> {
    let mut out = size_header(LiteralsBlockType::Raw, literals.len());
    out.extend_from_slice(literals);
    out
}

/// Raw and RLE header: 5, 12 or 20 bits of size.
fn size_header(block_type: LiteralsBlockType, size: usize) -> Vec<u8> {
    let kind = block_type.field() as usize;
    if size < 32 {
        vec![(kind | size << 3) as u8]
    } else if size < 4096 {
        let value = kind | 1 << 2 | size << 4;
        vec![value as u8, (value >> 8) as u8]
    } else {
        let value = kind | 3 << 2 | size << 4;
        vec![value as u8, (value >> 8) as u8, (value >> 16) as u8]
    }
}

/// Huffman-coded section; `description` is `None` for Treeless.
fn huffman_section(encoder: &HuffmanEncoder, description: Option<&[u8]>, literals: &[u8]) -> Option<Vec<u8>> {
    let single = literals.len() < SINGLE_STREAM_MAX;
    let streams = if single {
        encoder.encode_stream(literals)
    } else {
        encoder.encode_four_streams(literals)?
    };
    let compressed_size = description.map_or(0, <[u8]>::len) + streams.len();
    let regenerated = literals.len();
    let largest = regenerated.max(compressed_size);

    let (size_format, bits, header_size) = if single {
        if largest >= 1 << 10 {
            return None;
        }
        (0, 10, 3)
    } else if largest < 1 << 10 {
        (1, 10, 3)
    } else if largest < 1 << 14 {
        (2, 14, 4)
    } else if largest < 1 << 18 {
        (3, 18, 5)
    } else {
        return None;
    };

    let block_type = if description.is_some() {
        LiteralsBlockType::Compressed
    } else {
        LiteralsBlockType::Treeless
    };
    let value = block_type.field() as u64
        | (size_format as u64) << 2
        | (regenerated as u64) << 4
        | (compressed_size as u64) << (4 + bits);

    let mut out = Vec::with_capacity(header_size + compressed_size);
    out.extend_from_slice(&value.to_le_bytes()[..header_size]);
    if let Some(description) = description {
        out.extend_from_slice(description);
    }
    out.extend_from_slice(&streams);
    Some(out)
}
