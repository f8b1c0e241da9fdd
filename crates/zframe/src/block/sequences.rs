//! Sequences section: LZ77 commands `(literal_length, offset, match_length)`.
//!
//! ## Layout
//!
//! ```text
//! Number_of_Sequences | Symbol_Compression_Modes | LL table | OF table | ML table | bitstream
//! ```
//!
//! ## Repeat Offsets
//!
//! Offset values 1-3 refer to the three most recent offsets; larger values
//! carry `offset + 3`. The history starts at `[1, 4, 8]` unless a
//! dictionary supplies its own.
//!
//! ## Symbol Compression Modes
//!
//! - Predefined: built-in distributions
//! - RLE: one code for every sequence
//! - FSE: a table header precedes the bitstream
//! - Repeat: the previous block's table

use crate::bits::{highbit32, BackwardBitReader};
use crate::fse::{FseDecoder, FseTable, SequenceStream};
use zframe_core::{Error, Result};

/// `(extra bits, baseline)` per literal-length code.
pub const LITERAL_LENGTH_BASELINE: [(u8, u32); 36] = [
    (0, 0), (0, 1), (0, 2), (0, 3), (0, 4), (0, 5), (0, 6), (0, 7),
    (0, 8), (0, 9), (0, 10), (0, 11), (0, 12), (0, 13), (0, 14), (0, 15),
    (1, 16), (1, 18), (1, 20), (1, 22), (2, 24), (2, 28), (3, 32), (3, 40),
    (4, 48), (6, 64), (7, 128), (8, 256), (9, 512), (10, 1024), (11, 2048), (12, 4096),
    (13, 8192), (14, 16384), (15, 32768), (16, 65536),
];

/// `(extra bits, baseline)` per match-length code.
pub const MATCH_LENGTH_BASELINE: [(u8, u32); 53] = [
    (0, 3), (0, 4), (0, 5), (0, 6), (0, 7), (0, 8), (0, 9), (0, 10),
    (0, 11), (0, 12), (0, 13), (0, 14), (0, 15), (0, 16), (0, 17), (0, 18),
    (0, 19), (0, 20), (0, 21), (0, 22), (0, 23), (0, 24), (0, 25), (0, 26),
    (0, 27), (0, 28), (0, 29), (0, 30), (0, 31), (0, 32), (0, 33), (0, 34),
    (1, 35), (1, 37), (1, 39), (1, 41), (2, 43), (2, 47), (3, 51), (3, 59),
    (4, 67), (4, 83), (5, 99), (7, 131), (8, 259), (9, 515), (10, 1027), (11, 2051),
    (12, 4099), (13, 8195), (14, 16387), (15, 32771), (16, 65539),
];

/// Shortest match the format can express.
pub const MIN_MATCH: u32 = 3;

/// Literal-length code for `length`.
pub fn literal_length_code(length: u32) -> u8 {
    if length < 16 {
        return length as u8;
    }
    if length < 64 {
        return (16..=24u8)
            .rev()
            .find(|&code| LITERAL_LENGTH_BASELINE[code as usize].1 <= length)
            .unwrap_or(16);
    }
    (highbit32(length) + 19) as u8
}

/// Match-length code for `length` (at least 3).
pub fn match_length_code(length: u32) -> u8 {
    let base = length - MIN_MATCH;
    if base < 32 {
        return base as u8;
    }
    if base < 128 {
        return (32..=42u8)
            .rev()
            .find(|&code| MATCH_LENGTH_BASELINE[code as usize].1 <= length)
            .unwrap_or(32);
    }
    (highbit32(base) + 36) as u8
}

/// Offset code for an offset value (`offset + 3`, or a repeat index 1-3).
#[inline]
pub fn offset_code(offset_value: u32) -> u8 {
    highbit32(offset_value) as u8
}

/// The three most recent match offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatOffsets {
    offsets: [u32; 3],
}

impl Default for RepeatOffsets {
    fn default() -> Self {
        Self { offsets: [1, 4, 8] }
    }
}

impl RepeatOffsets {
    pub fn new(offsets: [u32; 3]) -> Self {
        Self { offsets }
    }

    pub fn get(&self) -> [u32; 3] {
        self.offsets
    }

    /// Resolve an offset value to an actual offset and update the history.
    ///
    /// With a zero literal length the repeat indices shift by one, and
    /// index 3 means `offsets[0] - 1`.
    pub fn resolve(&mut self, offset_value: u32, literal_length: u32) -> Result<u32> {
        if offset_value == 0 {
            return Err(Error::corrupt("offset value 0"));
        }
        if offset_value > 3 {
            let offset = offset_value - 3;
            self.offsets = [offset, self.offsets[0], self.offsets[1]];
            return Ok(offset);
        }

        let index = offset_value - 1 + (literal_length == 0) as u32;
        let [r0, r1, r2] = self.offsets;
        let offset = match index {
            0 => return Ok(r0),
            1 => r1,
            2 => r2,
            _ => r0.checked_sub(1).filter(|&o| o > 0).ok_or_else(|| Error::corrupt("repeat offset underflow"))?,
        };
        self.offsets = match index {
            1 => [r1, r0, r2],
            2 => [r2, r0, r1],
            _ => [offset, r0, r1],
        };
        Ok(offset)
    }

    /// Offset value that encodes `offset` at the current history, if it is
    /// a repeat.
    pub fn repeat_value(&self, offset: u32, literal_length: u32) -> Option<u32> {
        let [r0, r1, r2] = self.offsets;
        if literal_length > 0 {
            [r0, r1, r2].iter().position(|&r| r == offset).map(|i| i as u32 + 1)
        } else if offset == r1 {
            Some(1)
        } else if offset == r2 {
            Some(2)
        } else if r0 > 1 && offset == r0 - 1 {
            Some(3)
        } else {
            None
        }
    }

    /// Offset value the encoder writes for `offset`.
    pub fn encode(&self, offset: u32, literal_length: u32) -> u32 {
        self.repeat_value(offset, literal_length).unwrap_or(offset + 3)
    }
}

/// A decoded sequence with its offset resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    pub literal_length: u32,
    pub offset: u32,
    pub match_length: u32,
}

impl Sequence {
    pub fn new(literal_length: u32, offset: u32, match_length: u32) -> Self {
        Self {
            literal_length,
            offset,
            match_length,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolMode {
    Predefined,
    Rle,
    Fse,
    Repeat,
}

impl SymbolMode {
    pub fn from_field(field: u8) -> Self {
        match field & 0x03 {
            0 => SymbolMode::Predefined,
            1 => SymbolMode::Rle,
            2 => SymbolMode::Fse,
            _ => SymbolMode::Repeat,
        }
    }

    pub fn field(self) -> u8 {
        match self {
            SymbolMode::Predefined => 0,
            SymbolMode::Rle => 1,
            SymbolMode::Fse => 2,
            SymbolMode::Repeat => 3,
        }
    }
}

/// Sequence tables and offsets carried from block to block.
#[derive(Debug, Clone, Default)]
pub struct SequenceTables {
    pub literal_lengths: Option<FseTable>,
    pub offsets: Option<FseTable>,
    pub match_lengths: Option<FseTable>,
    pub repeat_offsets: RepeatOffsets,
}

impl SequenceTables {
    fn slot(&mut self, stream: SequenceStream) -> &mut Option<FseTable> {
        match stream {
            SequenceStream::LiteralLength => &mut self.literal_lengths,
            SequenceStream::Offset => &mut self.offsets,
            SequenceStream::MatchLength => &mut self.match_lengths,
        }
    }
}

/// Read the sequence count. Returns `(count, bytes consumed)`.
pub fn parse_sequence_count(input: &[u8]) -> Result<(usize, usize)> {
    let truncated = || Error::corrupt("sequence count truncated");
    let b0 = *input.first().ok_or_else(truncated)? as usize;
    match b0 {
        0..=127 => Ok((b0, 1)),
        128..=254 => {
            let b1 = *input.get(1).ok_or_else(truncated)? as usize;
            Ok((((b0 - 128) << 8) + b1, 2))
        }
        _ => {
            let b1 = *input.get(1).ok_or_else(truncated)? as usize;
            let b2 = *input.get(2).ok_or_else(truncated)? as usize;
            Ok((b1 + (b2 << 8) + 0x7F00, 3))
        }
    }
}

/// Decode a sequences section.
pub fn decode_sequences(input: &[u8], tables: &mut SequenceTables) -> Result<Vec<Sequence>> {
    let (count, mut position) = parse_sequence_count(input)?;
    if count == 0 {
        if position != input.len() {
            return Err(Error::corrupt("trailing bytes after empty sequences section"));
        }
        return Ok(Vec::new());
    }

    let modes = *input
        .get(position)
        .ok_or_else(|| Error::corrupt("missing symbol compression modes"))?;
    position += 1;
    if modes & 0x03 != 0 {
        return Err(Error::corrupt("reserved bits set in symbol compression modes"));
    }

    for (stream, shift) in [
        (SequenceStream::LiteralLength, 6),
        (SequenceStream::Offset, 4),
        (SequenceStream::MatchLength, 2),
    ] {
        let mode = SymbolMode::from_field(modes >> shift);
        position += load_table(stream, mode, &input[position..], tables)?;
    }

    let (Some(ll_table), Some(of_table), Some(ml_table)) =
        (&tables.literal_lengths, &tables.offsets, &tables.match_lengths)
    else {
        return Err(Error::corrupt("sequence tables missing"));
    };

    let stream = input
        .get(position..)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::corrupt("missing sequences bitstream"))?;
    let mut reader = BackwardBitReader::new(stream)?;
    let mut ll = FseDecoder::new(ll_table, &mut reader);
    let mut of = FseDecoder::new(of_table, &mut reader);
    let mut ml = FseDecoder::new(ml_table, &mut reader);

    let mut repeat_offsets = tables.repeat_offsets;
    let mut sequences = Vec::with_capacity(count);
    for index in 0..count {
        let of_code = of.symbol() as u32;
        let ml_code = ml.symbol() as usize;
        let ll_code = ll.symbol() as usize;
        if of_code > 31 || ml_code >= MATCH_LENGTH_BASELINE.len() || ll_code >= LITERAL_LENGTH_BASELINE.len() {
            return Err(Error::corrupt("sequence code out of range"));
        }

        let offset_value = (1u32 << of_code) + reader.read_bits(of_code) as u32;
        let (ml_bits, ml_base) = MATCH_LENGTH_BASELINE[ml_code];
        let match_length = ml_base + reader.read_bits(ml_bits as u32) as u32;
        let (ll_bits, ll_base) = LITERAL_LENGTH_BASELINE[ll_code];
        let literal_length = ll_base + reader.read_bits(ll_bits as u32) as u32;

        if index + 1 < count {
            ll.update(&mut reader);
            ml.update(&mut reader);
            of.update(&mut reader);
        }
        if reader.is_overflowed() {
            return Err(Error::corrupt("sequences bitstream overread"));
        }

        let offset = repeat_offsets.resolve(offset_value, literal_length)?;
        sequences.push(Sequence::new(literal_length, offset, match_length));
    }

    if !reader.is_empty() {
        return Err(Error::corrupt("sequences bitstream not fully consumed"));
    }
    tables.repeat_offsets = repeat_offsets;
    Ok(sequences)
}

fn load_table(
    stream: SequenceStream,
    mode: SymbolMode,
    input: &[u8],
    tables: &mut SequenceTables,
) -> Result<usize> {
    let (table, consumed) = match mode {
        SymbolMode::Predefined => (stream.predefined_table().clone(), 0),
        SymbolMode::Rle => {
            let symbol = *input
                .first()
                .ok_or_else(|| Error::corrupt("missing RLE sequence symbol"))?;
            if symbol > stream.max_symbol() {
                return Err(Error::corrupt(format!("RLE sequence symbol {} out of range", symbol)));
            }
            (FseTable::rle(symbol), 1)
        }
        SymbolMode::Fse => FseTable::parse(input, stream.max_symbol(), stream.max_log())?,
        SymbolMode::Repeat => {
            if tables.slot(stream).is_none() {
                return Err(Error::corrupt("repeat mode without a previous table"));
            }
            return Ok(0);
        }
    };
    *tables.slot(stream) = Some(table);
    Ok(consumed)
}
