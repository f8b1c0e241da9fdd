//! Length-limited Huffman code construction and literal stream encoding.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::table::{max_bits_for, rank_starts, HUF_MAX_BITS, HUF_WEIGHT_MAX_LOG};
use crate::bits::BitWriter;
use crate::fse::{normalize_counts, optimal_table_log, write_distribution, FseEncodeTable};
use zframe_core::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HuffmanCode {
    code: u16,
    num_bits: u8,
}

/// Canonical Huffman code for byte literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanEncoder {
    max_bits: u8,
    weights: Vec<u8>,
    codes: Vec<HuffmanCode>,
}

impl HuffmanEncoder {
    /// Build a code for a byte histogram.
    ///
    /// Returns `None` when fewer than two distinct bytes are present.
    pub fn build(counts: &[u32]) -> Option<Self> {
        let lengths = code_lengths(counts, HUF_MAX_BITS)?;
        let max_bits = lengths.iter().copied().max()?;
        let last = lengths.iter().rposition(|&len| len > 0)?;
        let weights: Vec<u8> = lengths[..=last]
            .iter()
            .map(|&len| if len == 0 { 0 } else { max_bits + 1 - len })
            .collect();
        Self::from_weights(&weights).ok()
    }

    /// Rebuild the code a decoder derives from `weights`.
    pub fn from_weights(weights: &[u8]) -> Result<Self> {
        let max_bits = max_bits_for(weights)?;
        let mut rank_start = rank_starts(weights, max_bits);
        let mut codes = vec![HuffmanCode::default(); 256];
        for (symbol, &weight) in weights.iter().enumerate() {
            if weight == 0 {
                continue;
            }
            let start = rank_start[weight as usize];
            rank_start[weight as usize] += 1 << (weight - 1);
            codes[symbol] = HuffmanCode {
                code: (start >> (weight - 1)) as u16,
                num_bits: max_bits + 1 - weight,
            };
        }
        Ok(Self {
            max_bits,
            weights: weights.to_vec(),
            codes,
        })
    }

    pub fn max_bits(&self) -> u8 {
        self.max_bits
    }

    pub fn weights(&self) -> &[u8] {
        &self.weights
    }

    /// Whether every byte present in `counts` has a code.
    pub fn can_encode(&self, counts: &[u32]) -> bool {
        counts
            .iter()
            .enumerate()
            .all(|(symbol, &count)| count == 0 || self.codes[symbol].num_bits > 0)
    }

    /// Payload bits needed for `counts`, ignoring stream padding.
    pub fn estimate_bits(&self, counts: &[u32]) -> u64 {
        counts
            .iter()
            .zip(&self.codes)
            .map(|(&count, code)| count as u64 * code.num_bits as u64)
            .sum()
    }

    /// Serialized tree description, picking the smaller of the direct and
    /// FSE-compressed weight forms.
    pub fn describe(&self) -> Option<Vec<u8>> {
        let transmitted = &self.weights[..self.weights.len() - 1];
        let direct = direct_weights(transmitted);
        let compressed = compress_weights(transmitted);
        match (direct, compressed) {
            (Some(d), Some(c)) => Some(if c.len() < d.len() { c } else { d }),
            (d, c) => d.or(c),
        }
    }

    /// Encode one backward stream.
    pub fn encode_stream(&self, data: &[u8]) -> Vec<u8> {
        let mut writer = BitWriter::with_capacity(data.len());
        for &byte in data.iter().rev() {
            let code = self.codes[byte as usize];
            writer.add_bits(code.code as u64, code.num_bits as u32);
        }
        writer.finish()
    }

    /// Encode four streams behind a jump table.
    ///
    /// Returns `None` if one of the first three streams overflows its
    /// 16-bit size.
    pub fn encode_four_streams(&self, data: &[u8]) -> Option<Vec<u8>> {
        let segment = data.len().div_ceil(4);
        let streams: Vec<Vec<u8>> = data.chunks(segment.max(1)).map(|s| self.encode_stream(s)).collect();
        if streams.len() != 4 {
            return None;
        }

        let mut out = Vec::with_capacity(6 + streams.iter().map(Vec::len).sum::<usize>());
        for stream in &streams[..3] {
            let size = u16::try_from(stream.len()).ok()?;
            out.extend_from_slice(&size.to_le_bytes());
        }
        for stream in &streams {
            out.extend_from_slice(stream);
        }
        Some(out)
    }
}

/// Optimal code lengths limited to `limit` bits.
///
/// Counts are halved until the tree fits, which keeps every present symbol
/// while flattening the deepest branches.
fn code_lengths(counts: &[u32], limit: u8) -> Option<Vec<u8>> {
    let mut scaled: Vec<u64> = counts.iter().map(|&c| c as u64).collect();
    if scaled.iter().filter(|&&c| c > 0).count() < 2 {
        return None;
    }
    loop {
        let lengths = unlimited_lengths(&scaled);
        if lengths.iter().all(|&len| len <= limit as usize) {
            return Some(lengths.into_iter().map(|len| len as u8).collect());
        }
        for count in scaled.iter_mut().filter(|c| **c > 0) {
            *count = (*count + 1) / 2;
        }
    }
}

fn unlimited_lengths(counts: &[u64]) -> Vec<usize> {
    let leaves: Vec<usize> = (0..counts.len()).filter(|&s| counts[s] > 0).collect();
    let leaf_count = leaves.len();
    let mut parent = vec![usize::MAX; 2 * leaf_count - 1];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = leaves
        .iter()
        .enumerate()
        .map(|(node, &symbol)| Reverse((counts[symbol], node)))
        .collect();

    let mut next = leaf_count;
    while heap.len() > 1 {
        let (Some(Reverse((a, left))), Some(Reverse((b, right)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        parent[left] = next;
        parent[right] = next;
        heap.push(Reverse((a + b, next)));
        next += 1;
    }

    // Parents always have higher indices than their children.
    let mut depth = vec![0usize; parent.len()];
    for node in (0..parent.len().saturating_sub(1)).rev() {
        depth[node] = depth[parent[node]] + 1;
    }

    let mut lengths = vec![0usize; counts.len()];
    for (node, &symbol) in leaves.iter().enumerate() {
        lengths[symbol] = depth[node];
    }
    lengths
}

fn direct_weights(transmitted: &[u8]) -> Option<Vec<u8>> {
    if transmitted.is_empty() || transmitted.len() > 128 {
        return None;
    }
    let mut out = Vec::with_capacity(1 + transmitted.len().div_ceil(2));
    out.push((127 + transmitted.len()) as u8);
    for pair in transmitted.chunks(2) {
        let high = pair[0] << 4;
        let low = pair.get(1).copied().unwrap_or(0);
        out.push(high | low);
    }
    Some(out)
}

/// FSE-compress weights with two interleaved states.
fn compress_weights(transmitted: &[u8]) -> Option<Vec<u8>> {
    let count = transmitted.len();
    if count < 2 {
        return None;
    }
    let mut histogram = [0u32; HUF_MAX_BITS as usize + 1];
    for &weight in transmitted {
        histogram[weight as usize] += 1;
    }
    if histogram.iter().filter(|&&c| c > 0).count() < 2 {
        return None;
    }
    let max_weight = histogram.iter().rposition(|&c| c > 0)?;

    let log = optimal_table_log(HUF_WEIGHT_MAX_LOG, count, max_weight);
    let distribution = normalize_counts(&histogram, log).ok()?;
    let header = write_distribution(&distribution, log).ok()?;
    let table = FseEncodeTable::build(&distribution, log).ok()?;

    let mut writer = BitWriter::new();
    let (mut first, mut second, mut index) = if count % 2 == 1 {
        let mut first = table.initial_state(transmitted[count - 1]).ok()?;
        let second = table.initial_state(transmitted[count - 2]).ok()?;
        table.encode(&mut first, transmitted[count - 3], &mut writer).ok()?;
        (first, second, count - 3)
    } else {
        let second = table.initial_state(transmitted[count - 1]).ok()?;
        let first = table.initial_state(transmitted[count - 2]).ok()?;
        (first, second, count - 2)
    };
    while index > 0 {
        table.encode(&mut second, transmitted[index - 1], &mut writer).ok()?;
        table.encode(&mut first, transmitted[index - 2], &mut writer).ok()?;
        index -= 2;
    }
    table.flush(second, &mut writer);
    table.flush(first, &mut writer);
    let stream = writer.finish();

    let size = header.len() + stream.len();
    if size >= 128 {
        return None;
    }
    let mut out = Vec::with_capacity(1 + size);
    out.push(size as u8);
    out.extend_from_slice(&header);
    out.extend_from_slice(&stream);
    Some(out)
}
