//! FSE distributions, table headers and decode tables.
//!
//! A distribution assigns each symbol a share of `2^accuracy_log` table
//! slots. `-1` marks a "less than one" probability: the symbol gets a
//! single slot at the top of the table and always reads a full state.

use crate::bits::{highbit32, BitWriter, ForwardBitReader};
use zframe_core::{Error, Result};

/// Smallest accuracy log a table header may declare.
pub const FSE_MIN_TABLE_LOG: u8 = 5;

/// Largest accuracy log accepted by any table in this crate.
pub const FSE_MAX_TABLE_LOG: u8 = 12;

/// One decoding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FseEntry {
    /// Symbol emitted in this state.
    pub symbol: u8,
    /// Bits read to reach the next state.
    pub num_bits: u8,
    /// Added to the bits read to form the next state.
    pub baseline: u16,
}

/// FSE decoding table plus the distribution it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FseTable {
    accuracy_log: u8,
    entries: Vec<FseEntry>,
    distribution: Vec<i16>,
}

impl FseTable {
    /// Build a decoding table from a normalized distribution.
    pub fn build(distribution: &[i16], accuracy_log: u8) -> Result<Self> {
        validate_distribution(distribution, accuracy_log)?;

        let table_size = 1usize << accuracy_log;
        let spread = spread_symbols(distribution, accuracy_log);
        let mut next_state: Vec<u32> = distribution
            .iter()
            .map(|&count| if count == -1 { 1 } else { count.max(0) as u32 })
            .collect();

        let mut entries = Vec::with_capacity(table_size);
        for &symbol in &spread {
            let next = next_state[symbol as usize];
            next_state[symbol as usize] += 1;
            let num_bits = accuracy_log as u32 - highbit32(next);
            let baseline = (next << num_bits) as usize - table_size;
            entries.push(FseEntry {
                symbol,
                num_bits: num_bits as u8,
                baseline: baseline as u16,
            });
        }

        Ok(Self {
            accuracy_log,
            entries,
            distribution: distribution.to_vec(),
        })
    }

    /// Single-state table that always yields `symbol` and reads no bits.
    pub fn rle(symbol: u8) -> Self {
        let mut distribution = vec![0i16; symbol as usize + 1];
        distribution[symbol as usize] = 1;
        Self {
            accuracy_log: 0,
            entries: vec![FseEntry {
                symbol,
                num_bits: 0,
                baseline: 0,
            }],
            distribution,
        }
    }

    /// Parse a table header and build the table.
    ///
    /// Returns the table and the number of header bytes consumed.
    pub fn parse(data: &[u8], max_symbol: u8, max_log: u8) -> Result<(Self, usize)> {
        let (distribution, accuracy_log, consumed) = read_distribution(data, max_symbol, max_log)?;
        Ok((Self::build(&distribution, accuracy_log)?, consumed))
    }

    #[inline]
    pub fn accuracy_log(&self) -> u8 {
        self.accuracy_log
    }

    #[inline]
    pub fn entry(&self, state: usize) -> FseEntry {
        self.entries[state]
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn distribution(&self) -> &[i16] {
        &self.distribution
    }

    /// Whether every symbol with a non-zero count has a slot.
    pub fn covers(&self, counts: &[u32]) -> bool {
        covers(&self.distribution, counts)
    }
}

fn validate_distribution(distribution: &[i16], accuracy_log: u8) -> Result<()> {
    if accuracy_log > FSE_MAX_TABLE_LOG {
        return Err(Error::corrupt(format!(
            "FSE accuracy log {} exceeds maximum {}",
            accuracy_log, FSE_MAX_TABLE_LOG
        )));
    }
    if distribution.is_empty() || distribution.len() > 256 {
        return Err(Error::corrupt("FSE distribution has invalid symbol count"));
    }
    let mut total: u32 = 0;
    for &count in distribution {
        match count {
            -1 => total += 1,
            c if c >= 0 => total += c as u32,
            _ => return Err(Error::corrupt("FSE distribution has invalid count")),
        }
    }
    if total != 1 << accuracy_log {
        return Err(Error::corrupt(format!(
            "FSE distribution sums to {}, expected {}",
            total,
            1u32 << accuracy_log
        )));
    }
    Ok(())
}

/// Symbol at each table position, in state order.
pub(crate) fn spread_symbols(distribution: &[i16], accuracy_log: u8) -> Vec<u8> {
    let table_size = 1usize << accuracy_log;
    let mask = table_size - 1;
    let step = (table_size >> 1) + (table_size >> 3) + 3;
    let mut symbols = vec![0u8; table_size];

    let mut high_threshold = table_size - 1;
    for (symbol, &count) in distribution.iter().enumerate() {
        if count == -1 {
            symbols[high_threshold] = symbol as u8;
            high_threshold = high_threshold.wrapping_sub(1);
        }
    }

    let mut position = 0usize;
    for (symbol, &count) in distribution.iter().enumerate() {
        for _ in 0..count.max(0) {
            symbols[position] = symbol as u8;
            position = (position + step) & mask;
            while position > high_threshold {
                position = (position + step) & mask;
            }
        }
    }
    debug_assert_eq!(position, 0);
    symbols
}

pub(crate) fn covers(distribution: &[i16], counts: &[u32]) -> bool {
    counts
        .iter()
        .enumerate()
        .all(|(symbol, &count)| count == 0 || distribution.get(symbol).is_some_and(|&n| n != 0))
}

/// Scale symbol counts to a distribution over `2^accuracy_log` slots.
pub fn normalize_counts(counts: &[u32], accuracy_log: u8) -> Result<Vec<i16>> {
    let total: u64 = counts.iter().map(|&c| c as u64).sum();
    if total == 0 {
        return Err(Error::corrupt("cannot normalize an empty histogram"));
    }
    let table_size = 1i64 << accuracy_log;
    let present = counts.iter().filter(|&&c| c > 0).count() as i64;
    if present > table_size {
        return Err(Error::corrupt("too many symbols for FSE table size"));
    }

    let last = counts.iter().rposition(|&c| c > 0).unwrap_or(0);
    let mut distribution = vec![0i16; last + 1];
    let mut distributed = 0i64;
    let mut largest = 0usize;
    for (symbol, &count) in counts.iter().enumerate().take(last + 1) {
        if count == 0 {
            continue;
        }
        let share = (count as u64 * table_size as u64 * 2 + total) / (2 * total);
        if share == 0 {
            distribution[symbol] = -1;
            distributed += 1;
        } else {
            distribution[symbol] = share as i16;
            distributed += share as i64;
        }
        if count > counts[largest] {
            largest = symbol;
        }
    }

    let mut diff = table_size - distributed;
    if diff > 0 {
        distribution[largest] += diff as i16;
    }
    while diff < 0 {
        let (symbol, _) = distribution
            .iter()
            .enumerate()
            .max_by_key(|&(_, &n)| n)
            .ok_or_else(|| Error::corrupt("empty distribution"))?;
        if distribution[symbol] <= 1 {
            return Err(Error::corrupt("cannot fit distribution into table"));
        }
        distribution[symbol] -= 1;
        diff += 1;
    }
    Ok(distribution)
}

/// Accuracy log suited to `total` samples whose largest symbol is `max_symbol`.
pub fn optimal_table_log(max_log: u8, total: usize, max_symbol: usize) -> u8 {
    if total <= 1 {
        return FSE_MIN_TABLE_LOG;
    }
    let src_bits = highbit32((total - 1) as u32) as i32;
    let max_bits_src = src_bits - 2;
    let min_bits_src = src_bits + 1;
    let min_bits_symbols = highbit32(max_symbol.max(1) as u32) as i32 + 2;
    let min_bits = min_bits_src.min(min_bits_symbols);

    let mut log = max_log as i32;
    if max_bits_src < log {
        log = max_bits_src;
    }
    if min_bits > log {
        log = min_bits;
    }
    log.clamp(FSE_MIN_TABLE_LOG as i32, max_log as i32) as u8
}

/// Estimated encoded size, in bits, of a histogram under a distribution.
///
/// Returns `None` when some present symbol has no slot.
pub fn estimate_bits(distribution: &[i16], accuracy_log: u8, counts: &[u32]) -> Option<u64> {
    if !covers(distribution, counts) {
        return None;
    }
    let mut bits = 0.0f64;
    for (symbol, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let slots = distribution[symbol].max(1) as f64;
        bits += count as f64 * (accuracy_log as f64 - slots.log2());
    }
    Some(bits.ceil() as u64)
}

/// Serialize a distribution as an FSE table header.
pub fn write_distribution(distribution: &[i16], accuracy_log: u8) -> Result<Vec<u8>> {
    validate_distribution(distribution, accuracy_log)?;
    if accuracy_log < FSE_MIN_TABLE_LOG {
        return Err(Error::corrupt("accuracy log too small for table header"));
    }
    let alphabet = distribution
        .iter()
        .rposition(|&n| n != 0)
        .map_or(0, |last| last + 1);

    let mut writer = BitWriter::new();
    writer.add_bits((accuracy_log - FSE_MIN_TABLE_LOG) as u64, 4);

    let table_size = 1i32 << accuracy_log;
    let mut remaining = table_size + 1;
    let mut threshold = table_size;
    let mut num_bits = accuracy_log as u32 + 1;
    let mut symbol = 0usize;
    let mut previous_zero = false;

    while symbol < alphabet && remaining > 1 {
        if previous_zero {
            let mut start = symbol;
            while symbol < alphabet && distribution[symbol] == 0 {
                symbol += 1;
            }
            while symbol >= start + 24 {
                start += 24;
                writer.add_bits(0xFFFF, 16);
            }
            while symbol >= start + 3 {
                start += 3;
                writer.add_bits(3, 2);
            }
            writer.add_bits((symbol - start) as u64, 2);
        }

        let mut count = distribution[symbol] as i32;
        symbol += 1;
        let max = (2 * threshold - 1) - remaining;
        remaining -= count.abs();
        count += 1;
        if count >= threshold {
            count += max;
        }
        let width = if count < max { num_bits - 1 } else { num_bits };
        writer.add_bits(count as u64, width);
        previous_zero = count == 1;
        while remaining < threshold {
            num_bits -= 1;
            threshold >>= 1;
        }
    }

    Ok(writer.finish_unmarked())
}

/// Parse an FSE table header.
///
/// Returns the distribution, its accuracy log and the bytes consumed.
pub fn read_distribution(data: &[u8], max_symbol: u8, max_log: u8) -> Result<(Vec<i16>, u8, usize)> {
    if data.is_empty() {
        return Err(Error::corrupt("empty FSE table header"));
    }
    let mut reader = ForwardBitReader::new(data);
    let accuracy_log = reader.read_bits(4)? as u8 + FSE_MIN_TABLE_LOG;
    if accuracy_log > max_log {
        return Err(Error::corrupt(format!(
            "FSE accuracy log {} exceeds limit {}",
            accuracy_log, max_log
        )));
    }

    let max_symbol = max_symbol as usize;
    let mut distribution: Vec<i16> = Vec::with_capacity(max_symbol + 1);
    let mut remaining = (1i32 << accuracy_log) + 1;
    let mut threshold = 1i32 << accuracy_log;
    let mut num_bits = accuracy_log as u32 + 1;
    let mut previous_zero = false;

    while remaining > 1 && distribution.len() <= max_symbol {
        if previous_zero {
            let mut zeros = 0usize;
            while reader.peek_bits(16) == 0xFFFF {
                zeros += 24;
                reader.skip_bits(16)?;
            }
            while reader.peek_bits(2) == 3 {
                zeros += 3;
                reader.skip_bits(2)?;
            }
            zeros += reader.read_bits(2)? as usize;
            if distribution.len() + zeros > max_symbol {
                return Err(Error::corrupt("FSE zero run passes last symbol"));
            }
            distribution.resize(distribution.len() + zeros, 0);
        }

        let max = (2 * threshold - 1) - remaining;
        let raw = reader.peek_bits(num_bits) as i32;
        let mut count;
        if (raw & (threshold - 1)) < max {
            count = raw & (threshold - 1);
            reader.skip_bits(num_bits - 1)?;
        } else {
            count = raw & (2 * threshold - 1);
            if count >= threshold {
                count -= max;
            }
            reader.skip_bits(num_bits)?;
        }
        count -= 1;
        remaining -= count.abs();
        distribution.push(count as i16);
        previous_zero = count == 0;
        while remaining < threshold && threshold > 1 {
            num_bits -= 1;
            threshold >>= 1;
        }
    }

    if remaining != 1 {
        return Err(Error::corrupt("FSE table header does not sum to table size"));
    }
    Ok((distribution, accuracy_log, reader.bytes_consumed()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fse::{LL_DEFAULT_DISTRIBUTION, LL_DEFAULT_LOG, OF_DEFAULT_DISTRIBUTION, OF_DEFAULT_LOG};

    #[test]
    fn test_build_predefined_ll() {
        let table = FseTable::build(&LL_DEFAULT_DISTRIBUTION, LL_DEFAULT_LOG).unwrap();
        assert_eq!(table.size(), 64);
        // Reference decoder: state 0 is LL code 0 reading 4 bits from baseline 0.
        assert_eq!(
            table.entry(0),
            FseEntry {
                symbol: 0,
                num_bits: 4,
                baseline: 0
            }
        );
        // The four "less than one" symbols occupy the top of the table.
        let top: Vec<u8> = (60..64).map(|s| table.entry(s).symbol).collect();
        assert_eq!(top, vec![35, 34, 33, 32]);
        assert!((60..64).all(|s| table.entry(s).num_bits == 6 && table.entry(s).baseline == 0));
    }

    #[test]
    fn test_states_cover_table() {
        let table = FseTable::build(&OF_DEFAULT_DISTRIBUTION, OF_DEFAULT_LOG).unwrap();
        for state in 0..table.size() {
            let entry = table.entry(state);
            let end = entry.baseline as usize + (1usize << entry.num_bits);
            assert!(end <= table.size());
        }
    }

    #[test]
    fn test_build_rejects_bad_sum() {
        assert!(FseTable::build(&[10, 10], 5).is_err());
        assert!(FseTable::build(&[16, 16], 13).is_err());
        assert!(FseTable::build(&[-2, 34], 5).is_err());
    }

    #[test]
    fn test_distribution_header_roundtrip() {
        let distributions: Vec<(Vec<i16>, u8)> = vec![
            (LL_DEFAULT_DISTRIBUTION.to_vec(), LL_DEFAULT_LOG),
            (OF_DEFAULT_DISTRIBUTION.to_vec(), OF_DEFAULT_LOG),
            (vec![30, 0, 0, 0, 0, 1, -1], 5),
            (
                {
                    let mut d = vec![0i16; 40];
                    d[0] = 200;
                    d[39] = 56;
                    d
                },
                8,
            ),
        ];
        for (distribution, log) in distributions {
            let header = write_distribution(&distribution, log).unwrap();
            let (parsed, parsed_log, consumed) = read_distribution(&header, 255, 12).unwrap();
            assert_eq!(parsed_log, log);
            assert_eq!(parsed, distribution);
            assert_eq!(consumed, header.len());
        }
    }

    #[test]
    fn test_read_rejects_log_above_limit() {
        let header = write_distribution(&LL_DEFAULT_DISTRIBUTION, LL_DEFAULT_LOG).unwrap();
        assert!(read_distribution(&header, 255, 5).is_err());
        assert!(read_distribution(&[], 255, 9).is_err());
    }

    #[test]
    fn test_normalize_counts() {
        let counts = [1000u32, 10, 1, 0, 500];
        let distribution = normalize_counts(&counts, 6).unwrap();
        let total: i32 = distribution.iter().map(|&n| if n == -1 { 1 } else { n as i32 }).sum();
        assert_eq!(total, 64);
        assert_eq!(distribution[3], 0);
        assert!(distribution.iter().enumerate().all(|(s, &n)| (counts[s] > 0) == (n != 0)));
        assert_eq!(distribution.len(), 5);
        assert!(FseTable::build(&distribution, 6).is_ok());
    }

    #[test]
    fn test_normalize_many_rare_symbols() {
        let mut counts = vec![1u32; 30];
        counts[0] = 100_000;
        let distribution = normalize_counts(&counts, 5).unwrap();
        assert!(FseTable::build(&distribution, 5).is_ok());
        assert!(distribution[1..].iter().all(|&n| n == -1 || n == 1));
    }

    #[test]
    fn test_estimate_bits() {
        let distribution = [32i16, 32];
        assert_eq!(estimate_bits(&distribution, 6, &[10, 10]), Some(20));
        assert_eq!(estimate_bits(&distribution, 6, &[1, 1, 1]), None);
    }

    #[test]
    fn test_optimal_table_log_bounds() {
        assert_eq!(optimal_table_log(9, 1, 0), FSE_MIN_TABLE_LOG);
        let log = optimal_table_log(9, 100_000, 35);
        assert_eq!(log, 9);
        let log = optimal_table_log(6, 40, 11);
        assert!((FSE_MIN_TABLE_LOG..=6).contains(&log));
    }
}
