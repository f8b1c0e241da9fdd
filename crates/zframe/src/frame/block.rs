//! Block headers.
//!
//! Every block starts with a 3-byte little-endian header:
//!
//! ```text
//! Bit 0:     Last_Block
//! Bits 1-2:  Block_Type
//! Bits 3-23: Block_Size
//! ```

use zframe_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    /// Stored bytes.
    Raw,
    /// One byte repeated `Block_Size` times.
    Rle,
    /// Literals and sequences sections.
    Compressed,
}

impl BlockType {
    pub fn from_field(field: u8) -> Result<Self> {
        match field & 0x03 {
            0 => Ok(BlockType::Raw),
            1 => Ok(BlockType::Rle),
            2 => Ok(BlockType::Compressed),
            _ => Err(Error::unsupported("reserved block type")),
        }
    }

    pub fn field(self) -> u8 {
        match self {
            BlockType::Raw => 0,
            BlockType::Rle => 1,
            BlockType::Compressed => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub last_block: bool,
    pub block_type: BlockType,
    /// Content size for Raw and RLE blocks, payload size for Compressed ones.
    pub block_size: usize,
}

impl BlockHeader {
    pub const SIZE: usize = 3;

    pub fn new(last_block: bool, block_type: BlockType, block_size: usize) -> Self {
        Self {
            last_block,
            block_type,
            block_size,
        }
    }

    /// Parse from the first three bytes of `data`.
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::truncated(offset + data.len(), Self::SIZE - data.len()));
        }
        let raw = u32::from_le_bytes([data[0], data[1], data[2], 0]);
        Ok(Self {
            last_block: raw & 1 != 0,
            block_type: BlockType::from_field((raw >> 1) as u8)?,
            block_size: (raw >> 3) as usize,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let raw = self.last_block as u32
            | (self.block_type.field() as u32) << 1
            | (self.block_size as u32) << 3;
        out.extend_from_slice(&raw.to_le_bytes()[..3]);
    }

    /// Bytes following the header.
    pub fn payload_size(&self) -> usize {
        match self.block_type {
            BlockType::Rle => 1,
            BlockType::Raw | BlockType::Compressed => self.block_size,
        }
    }
}
