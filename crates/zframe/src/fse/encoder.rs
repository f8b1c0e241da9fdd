//! FSE (tANS) encoding tables.
//!
//! The encoder walks symbols in reverse order. Each step emits the low bits
//! of the current state and moves to a state that decodes to the new
//! symbol; the decoder replays the same transitions forward. Encoder state
//! values live in `[table_size, 2 * table_size)`; subtracting `table_size`
//! gives the decoder's state index.

use super::table::spread_symbols;
use crate::bits::{highbit32, BitWriter};
use zframe_core::{Error, Result};

#[derive(Debug, Clone, Copy, Default)]
struct SymbolTransform {
    /// Bits emitted from states at or above `min_state_plus`.
    max_bits: u32,
    min_state_plus: u32,
    /// Offset into `state_table` for this symbol's slots.
    find_offset: i32,
    /// State with the most bits to read; used to start a stream.
    first_state: u32,
    present: bool,
}

/// Encoding side of an FSE table.
#[derive(Debug, Clone)]
pub struct FseEncodeTable {
    accuracy_log: u8,
    state_table: Vec<u32>,
    transforms: Vec<SymbolTransform>,
}

impl FseEncodeTable {
    /// Build from a normalized distribution.
    pub fn build(distribution: &[i16], accuracy_log: u8) -> Result<Self> {
        // Reuse decode-side validation.
        super::FseTable::build(distribution, accuracy_log)?;

        let table_size = 1u32 << accuracy_log;
        let spread = spread_symbols(distribution, accuracy_log);

        let mut starts = Vec::with_capacity(distribution.len());
        let mut cumulative = 0u32;
        for &count in distribution {
            starts.push(cumulative);
            cumulative += slot_count(count);
        }

        let mut state_table = vec![0u32; table_size as usize];
        let mut fill = starts.clone();
        for (position, &symbol) in spread.iter().enumerate() {
            let slot = &mut fill[symbol as usize];
            state_table[*slot as usize] = table_size + position as u32;
            *slot += 1;
        }

        let transforms = distribution
            .iter()
            .zip(&starts)
            .map(|(&count, &start)| {
                let count = slot_count(count);
                if count == 0 {
                    return SymbolTransform::default();
                }
                let max_bits = if count == 1 {
                    accuracy_log as u32
                } else {
                    accuracy_log as u32 - highbit32(count - 1)
                };
                SymbolTransform {
                    max_bits,
                    min_state_plus: count << max_bits,
                    find_offset: start as i32 - count as i32,
                    first_state: state_table[start as usize],
                    present: true,
                }
            })
            .collect();

        Ok(Self {
            accuracy_log,
            state_table,
            transforms,
        })
    }

    #[inline]
    pub fn accuracy_log(&self) -> u8 {
        self.accuracy_log
    }

    /// Whether `symbol` can be encoded with this table.
    pub fn has_symbol(&self, symbol: u8) -> bool {
        self.transforms
            .get(symbol as usize)
            .is_some_and(|transform| transform.present)
    }

    /// Starting state for a stream whose final symbol is `symbol`.
    ///
    /// The chosen state always reads at least one bit when the table has
    /// more than one symbol, which two-state streams rely on to terminate.
    pub fn initial_state(&self, symbol: u8) -> Result<u32> {
        let transform = self.transform(symbol)?;
        Ok(transform.first_state)
    }

    /// Emit the bits for `state` and move it to a state decoding `symbol`.
    #[inline]
    pub fn encode(&self, state: &mut u32, symbol: u8, writer: &mut BitWriter) -> Result<()> {
        let transform = self.transform(symbol)?;
        let num_bits = if *state >= transform.min_state_plus {
            transform.max_bits
        } else {
            transform.max_bits - 1
        };
        writer.add_bits(*state as u64, num_bits);
        let index = (*state >> num_bits) as i32 + transform.find_offset;
        *state = self.state_table[index as usize];
        Ok(())
    }

    /// Write the final state so the decoder can start from it.
    #[inline]
    pub fn flush(&self, state: u32, writer: &mut BitWriter) {
        writer.add_bits(state as u64, self.accuracy_log as u32);
    }

    fn transform(&self, symbol: u8) -> Result<SymbolTransform> {
        match self.transforms.get(symbol as usize) {
            Some(transform) if transform.present => Ok(*transform),
            _ => Err(Error::corrupt(format!(
                "symbol {} has no slot in FSE table",
                symbol
            ))),
        }
    }
}

fn slot_count(count: i16) -> u32 {
    if count == -1 {
        1
    } else {
        count.max(0) as u32
    }
}
