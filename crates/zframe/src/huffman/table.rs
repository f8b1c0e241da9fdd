//! Huffman tree descriptions and decoding tables.
//!
//! A tree is described by per-symbol weights: `num_bits = max_bits + 1 -
//! weight`, with weight 0 meaning "absent". The weight of the last symbol is
//! implied by completing the sum to a power of two.

use crate::bits::{highbit32, BackwardBitReader};
use crate::fse::{read_distribution, FseDecoder, FseTable};
use zframe_core::{Error, Result};

/// Longest literal code allowed by the format.
pub const HUF_MAX_BITS: u8 = 11;

/// Largest symbol count a description can carry.
pub const HUF_MAX_SYMBOLS: usize = 256;

/// Accuracy-log ceiling for FSE-compressed weights.
pub const HUF_WEIGHT_MAX_LOG: u8 = 6;

/// One decoding slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HuffmanEntry {
    pub symbol: u8,
    pub num_bits: u8,
}

/// Huffman decoding table indexed by the next `max_bits` stream bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    max_bits: u8,
    entries: Vec<HuffmanEntry>,
    weights: Vec<u8>,
}

impl HuffmanTable {
    /// Build from the full weight list (last symbol included).
    pub fn from_weights(weights: &[u8]) -> Result<Self> {
        let max_bits = max_bits_for(weights)?;
        let mut rank_start = rank_starts(weights, max_bits);

        let mut entries = vec![HuffmanEntry::default(); 1 << max_bits];
        for (symbol, &weight) in weights.iter().enumerate() {
            if weight == 0 {
                continue;
            }
            let span = 1usize << (weight - 1);
            let start = rank_start[weight as usize];
            rank_start[weight as usize] += span;
            let entry = HuffmanEntry {
                symbol: symbol as u8,
                num_bits: max_bits + 1 - weight,
            };
            entries[start..start + span].fill(entry);
        }

        Ok(Self {
            max_bits,
            entries,
            weights: weights.to_vec(),
        })
    }

    /// Parse a tree description.
    ///
    /// Returns the table and the number of bytes consumed.
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        let (transmitted, consumed) = read_weights(data)?;
        let weights = complete_weights(&transmitted)?;
        Ok((Self::from_weights(&weights)?, consumed))
    }

    #[inline]
    pub fn max_bits(&self) -> u8 {
        self.max_bits
    }

    #[inline]
    pub fn entry(&self, index: usize) -> HuffmanEntry {
        self.entries[index]
    }

    /// Full per-symbol weights.
    pub fn weights(&self) -> &[u8] {
        &self.weights
    }

    /// Decode one backward stream that must hold exactly `count` symbols.
    pub fn decode_stream(&self, stream: &[u8], count: usize, out: &mut Vec<u8>) -> Result<()> {
        let mut reader = BackwardBitReader::new(stream)?;
        let max_bits = self.max_bits as u32;
        for _ in 0..count {
            let entry = self.entries[reader.peek_bits(max_bits) as usize];
            out.push(entry.symbol);
            reader.consume(entry.num_bits as u32);
        }
        if !reader.is_empty() {
            return Err(Error::corrupt(format!(
                "Huffman stream not fully consumed ({} bits left)",
                reader.remaining()
            )));
        }
        Ok(())
    }

    /// Decode four streams behind a 6-byte jump table.
    pub fn decode_four_streams(&self, data: &[u8], regenerated: usize, out: &mut Vec<u8>) -> Result<()> {
        if data.len() < 6 {
            return Err(Error::corrupt("Huffman jump table truncated"));
        }
        let sizes = [
            u16::from_le_bytes([data[0], data[1]]) as usize,
            u16::from_le_bytes([data[2], data[3]]) as usize,
            u16::from_le_bytes([data[4], data[5]]) as usize,
        ];
        let declared: usize = 6 + sizes.iter().sum::<usize>();
        if declared > data.len() {
            return Err(Error::corrupt("Huffman jump table exceeds literals size"));
        }

        let segment = regenerated.div_ceil(4);
        if segment * 3 > regenerated {
            return Err(Error::corrupt("too few literals for four streams"));
        }
        let last_segment = regenerated - segment * 3;

        let mut position = 6;
        for size in sizes {
            self.decode_stream(&data[position..position + size], segment, out)?;
            position += size;
        }
        self.decode_stream(&data[position..], last_segment, out)
    }
}

/// Largest code length implied by a complete weight list.
pub(crate) fn max_bits_for(weights: &[u8]) -> Result<u8> {
    if weights.len() > HUF_MAX_SYMBOLS {
        return Err(Error::corrupt("too many Huffman symbols"));
    }
    let mut total: u32 = 0;
    for &weight in weights {
        if weight > HUF_MAX_BITS {
            return Err(Error::corrupt(format!("Huffman weight {} too large", weight)));
        }
        if weight > 0 {
            total += 1 << (weight - 1);
        }
    }
    if total < 2 || !total.is_power_of_two() {
        return Err(Error::corrupt("Huffman weights do not form a complete code"));
    }
    let max_bits = highbit32(total) as u8;
    if max_bits > HUF_MAX_BITS {
        return Err(Error::corrupt("Huffman code exceeds 11 bits"));
    }
    Ok(max_bits)
}

/// First table index for each weight, longest codes first.
pub(crate) fn rank_starts(weights: &[u8], max_bits: u8) -> Vec<usize> {
    let mut rank_count = vec![0usize; max_bits as usize + 1];
    for &weight in weights {
        if weight > 0 {
            rank_count[weight as usize] += 1;
        }
    }
    let mut starts = vec![0usize; max_bits as usize + 1];
    let mut next = 0usize;
    for weight in 1..=max_bits as usize {
        starts[weight] = next;
        next += rank_count[weight] << (weight - 1);
    }
    starts
}

/// Derive the implied last weight and append it.
pub(crate) fn complete_weights(transmitted: &[u8]) -> Result<Vec<u8>> {
    if transmitted.is_empty() || transmitted.len() >= HUF_MAX_SYMBOLS {
        return Err(Error::corrupt("invalid Huffman weight count"));
    }
    let mut total: u32 = 0;
    let mut ones = 0usize;
    for &weight in transmitted {
        if weight > HUF_MAX_BITS {
            return Err(Error::corrupt(format!("Huffman weight {} too large", weight)));
        }
        if weight > 0 {
            total += 1 << (weight - 1);
        }
        ones += (weight == 1) as usize;
    }
    if total == 0 {
        return Err(Error::corrupt("Huffman description has no symbols"));
    }
    let max_bits = highbit32(total) + 1;
    if max_bits > HUF_MAX_BITS as u32 {
        return Err(Error::corrupt("Huffman code exceeds 11 bits"));
    }
    let rest = (1u32 << max_bits) - total;
    if !rest.is_power_of_two() {
        return Err(Error::corrupt("Huffman weights cannot be completed"));
    }
    let last_weight = highbit32(rest) as u8 + 1;
    ones += (last_weight == 1) as usize;
    if ones < 2 || ones % 2 != 0 {
        return Err(Error::corrupt("Huffman weights have invalid shortest rank"));
    }

    let mut weights = transmitted.to_vec();
    weights.push(last_weight);
    Ok(weights)
}

/// Read the transmitted weights (all but the last symbol).
fn read_weights(data: &[u8]) -> Result<(Vec<u8>, usize)> {
    let header = match data.first() {
        Some(&byte) => byte as usize,
        None => return Err(Error::corrupt("missing Huffman tree description")),
    };

    if header >= 128 {
        let count = header - 127;
        let bytes = count.div_ceil(2);
        if data.len() < 1 + bytes {
            return Err(Error::corrupt("Huffman direct weights truncated"));
        }
        let weights = (0..count)
            .map(|i| {
                let byte = data[1 + i / 2];
                if i % 2 == 0 {
                    byte >> 4
                } else {
                    byte & 0x0F
                }
            })
            .collect();
        return Ok((weights, 1 + bytes));
    }

    let size = header;
    if data.len() < 1 + size {
        return Err(Error::corrupt("Huffman compressed weights truncated"));
    }
    let weights = decode_compressed_weights(&data[1..1 + size])?;
    Ok((weights, 1 + size))
}

/// Two interleaved FSE states over one backward stream.
fn decode_compressed_weights(data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Err(Error::corrupt("empty compressed Huffman weights"));
    }
    let (distribution, log, consumed) = read_distribution(data, HUF_MAX_BITS, HUF_WEIGHT_MAX_LOG)?;
    let table = FseTable::build(&distribution, log)?;
    if consumed >= data.len() {
        return Err(Error::corrupt("Huffman weight stream missing"));
    }

    let mut reader = BackwardBitReader::new(&data[consumed..])?;
    let mut first = FseDecoder::new(&table, &mut reader);
    let mut second = FseDecoder::new(&table, &mut reader);
    let mut weights = Vec::new();
    loop {
        if weights.len() + 2 > HUF_MAX_SYMBOLS {
            return Err(Error::corrupt("too many Huffman weights"));
        }
        weights.push(first.decode(&mut reader));
        if reader.is_overflowed() {
            weights.push(second.symbol());
            break;
        }
        weights.push(second.decode(&mut reader));
        if reader.is_overflowed() {
            weights.push(first.symbol());
            break;
        }
    }
    Ok(weights)
}
