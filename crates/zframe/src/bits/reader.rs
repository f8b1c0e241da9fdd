//! Forward and backward bit readers.

use super::{highbit32, load_bits};
use zframe_core::{Error, Result};

/// Reads an entropy-coded stream from its end marker toward bit 0.
///
/// `read_bits(n)` returns the last `n` bits the writer appended that have
/// not been read yet. Reading past the start yields zero bits and leaves
/// the reader overflowed, which stream decoders use to detect their end.
#[derive(Debug, Clone)]
pub struct BackwardBitReader<'a> {
    data: &'a [u8],
    /// Bits not yet consumed; negative once reads ran past the start.
    remaining: isize,
}

impl<'a> BackwardBitReader<'a> {
    /// Open a stream, positioning below its end marker.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let last = match data.last() {
            Some(&byte) => byte,
            None => return Err(Error::corrupt("empty bitstream")),
        };
        if last == 0 {
            return Err(Error::corrupt("bitstream end marker missing"));
        }
        let remaining = (data.len() - 1) * 8 + highbit32(last as u32) as usize;
        Ok(Self {
            data,
            remaining: remaining as isize,
        })
    }

    /// Value of the next `n <= 56` bits without consuming them.
    #[inline]
    pub fn peek_bits(&self, n: u32) -> u64 {
        if n == 0 {
            return 0;
        }
        let start = self.remaining - n as isize;
        if start >= 0 {
            load_bits(self.data, start as usize, n)
        } else if self.remaining > 0 {
            // Missing low bits read as zero.
            let available = self.remaining as u32;
            load_bits(self.data, 0, available) << (n - available)
        } else {
            0
        }
    }

    /// Consume `n` bits.
    #[inline]
    pub fn consume(&mut self, n: u32) {
        self.remaining -= n as isize;
    }

    /// Read `n <= 56` bits.
    #[inline]
    pub fn read_bits(&mut self, n: u32) -> u64 {
        let value = self.peek_bits(n);
        self.consume(n);
        value
    }

    /// Every bit consumed, none past the start.
    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Reads ran past the start of the stream.
    pub fn is_overflowed(&self) -> bool {
        self.remaining < 0
    }

    /// Bits left to read (negative after overflow).
    pub fn remaining(&self) -> isize {
        self.remaining
    }
}

/// Reads bit fields front to back.
#[derive(Debug, Clone)]
pub struct ForwardBitReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ForwardBitReader<'a> {
    /// Start at bit 0 of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Value of the next `n <= 56` bits; bits past the end read as zero.
    #[inline]
    pub fn peek_bits(&self, n: u32) -> u64 {
        load_bits(self.data, self.position, n)
    }

    /// Consume `n` bits, failing if that runs past the end.
    #[inline]
    pub fn skip_bits(&mut self, n: u32) -> Result<()> {
        let next = self.position + n as usize;
        if next > self.data.len() * 8 {
            return Err(Error::corrupt_at(
                "bit field runs past end of section",
                self.data.len(),
            ));
        }
        self.position = next;
        Ok(())
    }

    /// Read `n <= 56` bits.
    #[inline]
    pub fn read_bits(&mut self, n: u32) -> Result<u64> {
        let value = self.peek_bits(n);
        self.skip_bits(n)?;
        Ok(value)
    }

    /// Whole bytes touched so far.
    pub fn bytes_consumed(&self) -> usize {
        self.position.div_ceil(8)
    }
}
