//! FSE state machine over a backward bitstream.

use super::FseTable;
use crate::bits::BackwardBitReader;

/// One FSE decoding state bound to its table.
#[derive(Debug)]
pub struct FseDecoder<'t> {
    table: &'t FseTable,
    state: usize,
}

impl<'t> FseDecoder<'t> {
    /// Read the initial state (`accuracy_log` bits).
    pub fn new(table: &'t FseTable, reader: &mut BackwardBitReader<'_>) -> Self {
        let state = reader.read_bits(table.accuracy_log() as u32) as usize;
        Self { table, state }
    }

    /// Symbol for the current state.
    #[inline]
    pub fn symbol(&self) -> u8 {
        self.table.entry(self.state).symbol
    }

    /// Advance to the next state.
    #[inline]
    pub fn update(&mut self, reader: &mut BackwardBitReader<'_>) {
        let entry = self.table.entry(self.state);
        let bits = reader.read_bits(entry.num_bits as u32) as usize;
        self.state = entry.baseline as usize + bits;
    }

    /// Emit the current symbol, then advance.
    #[inline]
    pub fn decode(&mut self, reader: &mut BackwardBitReader<'_>) -> u8 {
        let symbol = self.symbol();
        self.update(reader);
        symbol
    }

    pub fn state(&self) -> usize {
        self.state
    }
}
