//! Sequences section encoding.
//!
//! Each of the three code streams picks the cheapest of four modes:
//! RLE when one code covers every sequence, Repeat when the previous
//! block's table still covers the histogram, Predefined, or a new FSE
//! table written in front of the bitstream. Cost is header bits plus the
//! estimated payload bits.
//!
//! The bitstream is written back to front so the decoder can read it
//! forwards from the end marker.

use crate::bits::BitWriter;
use crate::block::{
    literal_length_code, match_length_code, offset_code, RepeatOffsets, Sequence, SymbolMode,
    LITERAL_LENGTH_BASELINE, MATCH_LENGTH_BASELINE,
};
use crate::fse::{
    estimate_bits, normalize_counts, optimal_table_log, write_distribution, FseEncodeTable,
    SequenceStream,
};
use zframe_core::{Error, Result};

/// Encoding table for one sequence stream.
#[derive(Debug, Clone)]
pub enum SequenceTable {
    /// Every sequence uses the same code; no bits are written.
    Rle(u8),
    Fse {
        table: FseEncodeTable,
        distribution: Vec<i16>,
        log: u8,
    },
}

impl SequenceTable {
    /// Build an FSE table from a normalized distribution.
    pub fn from_distribution(distribution: Vec<i16>, log: u8) -> Result<Self> {
        let table = FseEncodeTable::build(&distribution, log)?;
        Ok(SequenceTable::Fse {
            table,
            distribution,
            log,
        })
    }

    fn predefined(stream: SequenceStream) -> Self {
        let (distribution, log) = stream.default_distribution();
        SequenceTable::Fse {
            table: stream.predefined_encoder().clone(),
            distribution: distribution.to_vec(),
            log,
        }
    }

    /// Estimated payload bits for `counts`, or `None` if a code is missing.
    fn cost(&self, counts: &[u32]) -> Option<u64> {
        match self {
            SequenceTable::Rle(symbol) => counts
                .iter()
                .enumerate()
                .all(|(code, &count)| count == 0 || code == *symbol as usize)
                .then_some(0),
            SequenceTable::Fse {
                distribution, log, ..
            } => estimate_bits(distribution, *log, counts),
        }
    }

    fn initial_state(&self, symbol: u8) -> Result<u32> {
        match self {
            SequenceTable::Rle(_) => Ok(0),
            SequenceTable::Fse { table, .. } => table.initial_state(symbol),
        }
    }

    fn encode(&self, state: &mut u32, symbol: u8, writer: &mut BitWriter) -> Result<()> {
        match self {
            SequenceTable::Rle(expected) if *expected == symbol => Ok(()),
            SequenceTable::Rle(expected) => Err(Error::corrupt(format!(
                "code {} written with RLE table for {}",
                symbol, expected
            ))),
            SequenceTable::Fse { table, .. } => table.encode(state, symbol, writer),
        }
    }

    fn flush(&self, state: u32, writer: &mut BitWriter) {
        if let SequenceTable::Fse { table, .. } = self {
            table.flush(state, writer);
        }
    }
}

/// Encoder tables carried from block to block, mirroring the decoder's.
#[derive(Debug, Clone, Default)]
pub struct SequenceEncoderTables {
    pub literal_lengths: Option<SequenceTable>,
    pub offsets: Option<SequenceTable>,
    pub match_lengths: Option<SequenceTable>,
}

impl SequenceEncoderTables {
    fn slot(&mut self, stream: SequenceStream) -> &mut Option<SequenceTable> {
        match stream {
            SequenceStream::LiteralLength => &mut self.literal_lengths,
            SequenceStream::Offset => &mut self.offsets,
            SequenceStream::MatchLength => &mut self.match_lengths,
        }
    }
}

/// Codes and extra bits for one sequence.
#[derive(Debug, Clone, Copy)]
struct SequenceCodes {
    ll_code: u8,
    ll_extra: u32,
    ml_code: u8,
    ml_extra: u32,
    of_code: u8,
    of_extra: u32,
}

/// Write the sequence count in its 1, 2 or 3 byte form.
pub fn write_sequence_count(count: usize, out: &mut Vec<u8>) {
    if count < 128 {
        out.push(count as u8);
    } else if count < 0x7F00 {
        out.push(((count >> 8) + 128) as u8);
        out.push(count as u8);
    } else {
        let rest = count - 0x7F00;
        out.extend_from_slice(&[255, rest as u8, (rest >> 8) as u8]);
    }
}

/// Encode a sequences section.
///
/// `sequences` carry actual offsets; `reps` is advanced to the history the
/// decoder will hold after this block.
pub fn encode_sequences(
    sequences: &[Sequence],
    reps: &mut RepeatOffsets,
    tables: &mut SequenceEncoderTables,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_sequence_count(sequences.len(), &mut out);
    if sequences.is_empty() {
        return Ok(out);
    }

    let codes = sequences
        .iter()
        .map(|seq| sequence_codes(seq, reps))
        .collect::<Result<Vec<_>>>()?;

    let mut modes = 0u8;
    let mut headers = Vec::new();
    for (stream, shift) in [
        (SequenceStream::LiteralLength, 6),
        (SequenceStream::Offset, 4),
        (SequenceStream::MatchLength, 2),
    ] {
        let mut counts = vec![0u32; stream.max_symbol() as usize + 1];
        for code in &codes {
            let symbol = match stream {
                SequenceStream::LiteralLength => code.ll_code,
                SequenceStream::Offset => code.of_code,
                SequenceStream::MatchLength => code.ml_code,
            };
            counts[symbol as usize] += 1;
        }
        let slot = tables.slot(stream);
        let (mode, header, table) = choose_table(stream, &counts, codes.len(), slot.as_ref())?;
        modes |= mode.field() << shift;
        headers.extend_from_slice(&header);
        *slot = Some(table);
    }

    out.push(modes);
    out.extend_from_slice(&headers);

    let (Some(ll), Some(of), Some(ml)) = (&tables.literal_lengths, &tables.offsets, &tables.match_lengths) else {
        return Err(Error::corrupt("sequence tables missing after selection"));
    };
    out.extend_from_slice(&write_bitstream(&codes, ll, of, ml)?);
    Ok(out)
}

fn sequence_codes(seq: &Sequence, reps: &mut RepeatOffsets) -> Result<SequenceCodes> {
    let offset_value = reps.encode(seq.offset, seq.literal_length);
    reps.resolve(offset_value, seq.literal_length)?;

    let ll_code = literal_length_code(seq.literal_length);
    let ml_code = match_length_code(seq.match_length);
    let of_code = offset_code(offset_value);
    Ok(SequenceCodes {
        ll_code,
        ll_extra: seq.literal_length - LITERAL_LENGTH_BASELINE[ll_code as usize].1,
        ml_code,
        ml_extra: seq.match_length - MATCH_LENGTH_BASELINE[ml_code as usize].1,
        of_code,
        of_extra: offset_value - (1 << of_code),
    })
}

/// Pick the cheapest mode. Returns the mode, the header bytes it needs
/// and the table the next block may repeat.
fn choose_table(
    stream: SequenceStream,
    counts: &[u32],
    total: usize,
    previous: Option<&SequenceTable>,
) -> Result<(SymbolMode, Vec<u8>, SequenceTable)> {
    let present: Vec<usize> = counts
        .iter()
        .enumerate()
        .filter(|(_, &count)| count > 0)
        .map(|(code, _)| code)
        .collect();

    let mut best: Option<(u64, SymbolMode, Vec<u8>, SequenceTable)> = None;
    let mut offer = |cost: u64, mode: SymbolMode, header: Vec<u8>, table: SequenceTable| {
        if best.as_ref().map_or(true, |(current, ..)| cost < *current) {
            best = Some((cost, mode, header, table));
        }
    };

    if let Some(previous) = previous {
        if let Some(cost) = previous.cost(counts) {
            offer(cost, SymbolMode::Repeat, Vec::new(), previous.clone());
        }
    }
    if let &[symbol] = present.as_slice() {
        offer(8, SymbolMode::Rle, vec![symbol as u8], SequenceTable::Rle(symbol as u8));
    }

    let predefined = SequenceTable::predefined(stream);
    if let Some(cost) = predefined.cost(counts) {
        offer(cost, SymbolMode::Predefined, Vec::new(), predefined);
    }

    if present.len() > 1 {
        let max_symbol = present.last().copied().unwrap_or(0);
        let log = optimal_table_log(stream.max_log(), total, max_symbol);
        if let Ok(distribution) = normalize_counts(counts, log) {
            let header = write_distribution(&distribution, log)?;
            if let Some(bits) = estimate_bits(&distribution, log, counts) {
                let table = SequenceTable::from_distribution(distribution, log)?;
                offer(header.len() as u64 * 8 + bits, SymbolMode::Fse, header, table);
            }
        }
    }

    best.map(|(_, mode, header, table)| (mode, header, table))
        .ok_or_else(|| Error::corrupt(format!("no table can encode {:?} codes", stream)))
}

fn write_bitstream(
    codes: &[SequenceCodes],
    ll: &SequenceTable,
    of: &SequenceTable,
    ml: &SequenceTable,
) -> Result<Vec<u8>> {
    let Some((last, rest)) = codes.split_last() else {
        return Ok(Vec::new());
    };
    let mut writer = BitWriter::with_capacity(codes.len() * 4);

    let mut ll_state = ll.initial_state(last.ll_code)?;
    let mut of_state = of.initial_state(last.of_code)?;
    let mut ml_state = ml.initial_state(last.ml_code)?;
    write_extra_bits(last, &mut writer);

    for code in rest.iter().rev() {
        of.encode(&mut of_state, code.of_code, &mut writer)?;
        ml.encode(&mut ml_state, code.ml_code, &mut writer)?;
        ll.encode(&mut ll_state, code.ll_code, &mut writer)?;
        write_extra_bits(code, &mut writer);
    }

    ml.flush(ml_state, &mut writer);
    of.flush(of_state, &mut writer);
    ll.flush(ll_state, &mut writer);
    Ok(writer.finish())
}

#[inline]
fn write_extra_bits(code: &SequenceCodes, writer: &mut BitWriter) {
    writer.add_bits(code.ll_extra as u64, LITERAL_LENGTH_BASELINE[code.ll_code as usize].0 as u32);
    writer.add_bits(code.ml_extra as u64, MATCH_LENGTH_BASELINE[code.ml_code as usize].0 as u32);
    writer.add_bits(code.of_extra as u64, code.of_code as u32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{decode_sequences, parse_sequence_count, SequenceTables};

    fn roundtrip(sequences: &[Sequence], enc: &mut SequenceEncoderTables, dec: &mut SequenceTables) -> Vec<u8> {
        let mut reps = dec.repeat_offsets;
        let section = encode_sequences(sequences, &mut reps, enc).unwrap();
        let decoded = decode_sequences(&section, dec).unwrap();
        assert_eq!(decoded, sequences);
        assert_eq!(reps, dec.repeat_offsets);
        section
    }

    fn varied(count: u32) -> Vec<Sequence> {
        (0..count)
            .map(|i| Sequence::new(i % 23, 16 + (i * 37) % 4000, 3 + (i * 11) % 300))
            .collect()
    }

    #[test]
    fn test_sequence_count_forms() {
        for count in [0, 1, 127, 128, 300, 0x7EFF, 0x7F00, 0x7F00 + 5000] {
            let mut out = Vec::new();
            write_sequence_count(count, &mut out);
            assert_eq!(parse_sequence_count(&out).unwrap(), (count, out.len()));
        }
    }

    #[test]
    fn test_empty_section() {
        let mut reps = RepeatOffsets::default();
        let section = encode_sequences(&[], &mut reps, &mut SequenceEncoderTables::default()).unwrap();
        assert_eq!(section, vec![0]);
    }

    #[test]
    fn test_single_sequence() {
        let mut enc = SequenceEncoderTables::default();
        let mut dec = SequenceTables::default();
        roundtrip(&[Sequence::new(5, 100, 20)], &mut enc, &mut dec);
    }

    #[test]
    fn test_uniform_codes_use_rle() {
        let sequences = vec![Sequence::new(4, 1000, 10); 50];
        let mut enc = SequenceEncoderTables::default();
        let mut dec = SequenceTables::default();
        let section = roundtrip(&sequences, &mut enc, &mut dec);
        // Literal and match lengths are constant.
        assert_eq!((section[1] >> 6) & 3, SymbolMode::Rle.field());
        assert_eq!((section[1] >> 2) & 3, SymbolMode::Rle.field());
    }

    #[test]
    fn test_many_sequences_build_tables() {
        let sequences = varied(2000);
        let mut enc = SequenceEncoderTables::default();
        let mut dec = SequenceTables::default();
        let section = roundtrip(&sequences, &mut enc, &mut dec);
        assert_eq!((section[2] >> 2) & 3, SymbolMode::Fse.field());
    }

    #[test]
    fn test_tables_carry_across_blocks() {
        let mut enc = SequenceEncoderTables::default();
        let mut dec = SequenceTables::default();
        roundtrip(&varied(3000), &mut enc, &mut dec);
        let second = roundtrip(&varied(1500), &mut enc, &mut dec);
        let modes = second[2];
        assert_eq!((modes >> 2) & 3, SymbolMode::Repeat.field());
    }

    #[test]
    fn test_repeat_offsets_are_encoded() {
        let sequences = vec![
            Sequence::new(3, 50, 4),
            Sequence::new(2, 50, 5),
            Sequence::new(0, 1, 6),
            Sequence::new(7, 50, 8),
            Sequence::new(1, 49, 3),
        ];
        let mut enc = SequenceEncoderTables::default();
        let mut dec = SequenceTables::default();
        roundtrip(&sequences, &mut enc, &mut dec);
    }

    #[test]
    fn test_long_lengths_and_offsets() {
        let sequences = vec![
            Sequence::new(70_000, 1 << 20, 60_000),
            Sequence::new(0, 3, 131_000),
            Sequence::new(65_535, (1 << 26) + 12345, 3),
        ];
        let mut enc = SequenceEncoderTables::default();
        let mut dec = SequenceTables::default();
        roundtrip(&sequences, &mut enc, &mut dec);
    }
}
