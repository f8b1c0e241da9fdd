//! LSB-first bit writer.

use super::low_mask;

/// Accumulates bit fields into little-endian bytes.
#[derive(Debug, Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    accumulator: u64,
    pending: u32,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with byte capacity reserved.
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(bytes),
            accumulator: 0,
            pending: 0,
        }
    }

    /// Append the low `n` bits of `value`. `n` must be at most 56.
    #[inline]
    pub fn add_bits(&mut self, value: u64, n: u32) {
        debug_assert!(n <= 56);
        if n == 0 {
            return;
        }
        self.accumulator |= (value & low_mask(n)) << self.pending;
        self.pending += n;
        while self.pending >= 8 {
            self.buffer.push(self.accumulator as u8);
            self.accumulator >>= 8;
            self.pending -= 8;
        }
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.buffer.len() * 8 + self.pending as usize
    }

    /// Close an entropy-coded stream: append the `1` end marker and pad.
    pub fn finish(mut self) -> Vec<u8> {
        self.add_bits(1, 1);
        self.finish_unmarked()
    }

    /// Pad the final partial byte with zeros.
    pub fn finish_unmarked(mut self) -> Vec<u8> {
        if self.pending > 0 {
            self.buffer.push(self.accumulator as u8);
        }
        self.buffer
    }
}
