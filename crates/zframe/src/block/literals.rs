//! Literals section decoding.
//!
//! ```text
//! Literals_Section_Header | [Huffman_Tree_Description] | [Jump_Table] | Streams
//! ```
//!
//! The first two bits select Raw, RLE, Compressed or Treeless literals; the
//! next two select the header layout.

use crate::frame::BLOCK_SIZE_MAX;
use crate::huffman::HuffmanTable;
use zframe_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralsBlockType {
    Raw,
    Rle,
    Compressed,
    /// Huffman-compressed with the previous block's table.
    Treeless,
}

impl LiteralsBlockType {
    pub fn from_field(field: u8) -> Self {
        match field & 0x03 {
            0 => LiteralsBlockType::Raw,
            1 => LiteralsBlockType::Rle,
            2 => LiteralsBlockType::Compressed,
            _ => LiteralsBlockType::Treeless,
        }
    }

    pub fn field(self) -> u8 {
        match self {
            LiteralsBlockType::Raw => 0,
            LiteralsBlockType::Rle => 1,
            LiteralsBlockType::Compressed => 2,
            LiteralsBlockType::Treeless => 3,
        }
    }
}

/// Sizes decoded from a literals section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralsHeader {
    pub block_type: LiteralsBlockType,
    pub regenerated_size: usize,
    /// Payload bytes after the header; 1 for RLE.
    pub compressed_size: usize,
    pub four_streams: bool,
    pub header_size: usize,
}

impl LiteralsHeader {
    pub fn parse(input: &[u8]) -> Result<Self> {
        let b0 = *input.first().ok_or_else(|| Error::corrupt("missing literals section"))?;
        let block_type = LiteralsBlockType::from_field(b0);
        let size_format = (b0 >> 2) & 0x03;

        let byte = |i: usize| -> Result<usize> {
            input
                .get(i)
                .map(|&b| b as usize)
                .ok_or_else(|| Error::corrupt("literals header truncated"))
        };

        match block_type {
            LiteralsBlockType::Raw | LiteralsBlockType::Rle => {
                let (regenerated_size, header_size) = match size_format {
                    0 | 2 => ((b0 >> 3) as usize, 1),
                    1 => (((b0 >> 4) as usize) | byte(1)? << 4, 2),
                    _ => (((b0 >> 4) as usize) | byte(1)? << 4 | byte(2)? << 12, 3),
                };
                let compressed_size = if block_type == LiteralsBlockType::Rle {
                    1
                } else {
                    regenerated_size
                };
                Ok(Self {
                    block_type,
                    regenerated_size,
                    compressed_size,
                    four_streams: false,
                    header_size,
                })
            }
            LiteralsBlockType::Compressed | LiteralsBlockType::Treeless => {
                let (header_size, bits) = match size_format {
                    0 | 1 => (3, 10),
                    2 => (4, 14),
                    _ => (5, 18),
                };
                let mut value = 0u64;
                for i in 0..header_size {
                    value |= (byte(i)? as u64) << (8 * i);
                }
                let mask = (1u64 << bits) - 1;
                Ok(Self {
                    block_type,
                    regenerated_size: ((value >> 4) & mask) as usize,
                    compressed_size: ((value >> (4 + bits)) & mask) as usize,
                    four_streams: size_format != 0,
                    header_size,
                })
            }
        }
    }
}

/// Decode the literals section at the start of a compressed block.
///
/// `huffman` holds the table carried between blocks: it is replaced by
/// Compressed literals and required by Treeless ones. Returns the literals
/// and the section's size in bytes.
pub fn decode_literals(input: &[u8], huffman: &mut Option<HuffmanTable>) -> Result<(Vec<u8>, usize)> {
    let header = LiteralsHeader::parse(input)?;
    if header.regenerated_size > BLOCK_SIZE_MAX {
        return Err(Error::corrupt(format!(
            "literals size {} exceeds block maximum",
            header.regenerated_size
        )));
    }
    let start = header.header_size;
    let end = start + header.compressed_size;
    if end > input.len() {
        return Err(Error::corrupt("literals section exceeds block"));
    }
    let payload = &input[start..end];

    let literals = match header.block_type {
        LiteralsBlockType::Raw => payload.to_vec(),
        LiteralsBlockType::Rle => vec![payload[0]; header.regenerated_size],
        LiteralsBlockType::Compressed => {
            let (table, consumed) = HuffmanTable::parse(payload)?;
            let literals = decode_huffman(&table, &payload[consumed..], &header)?;
            *huffman = Some(table);
            literals
        }
        LiteralsBlockType::Treeless => {
            let table = huffman
                .as_ref()
                .ok_or_else(|| Error::corrupt("treeless literals without a previous Huffman table"))?;
            decode_huffman(table, payload, &header)?
        }
    };
    Ok((literals, end))
}

fn decode_huffman(table: &HuffmanTable, streams: &[u8], header: &LiteralsHeader) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(header.regenerated_size);
    if header.four_streams {
        table.decode_four_streams(streams, header.regenerated_size, &mut out)?;
    } else {
        table.decode_stream(streams, header.regenerated_size, &mut out)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_one_byte_header() {
        // Raw, 5 literals: 5 << 3 = 0x28.
        let input = [0x28, b'h', b'e', b'l', b'l', b'o', 0xFF];
        let mut table = None;
        let (literals, consumed) = decode_literals(&input, &mut table).unwrap();
        assert_eq!(literals, b"hello");
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_rle_two_byte_header() {
        // RLE, size format 1, 100 literals: 1 | 1<<2 | (100 & 0xF)<<4, 100 >> 4.
        let input = [0x01 | 0x04 | (4 << 4), 6, b'z'];
        let mut table = None;
        let (literals, consumed) = decode_literals(&input, &mut table).unwrap();
        assert_eq!(literals, vec![b'z'; 100]);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_compressed_header_sizes() {
        // Compressed, 4 streams, 14-bit sizes: regen 1000, comp 600.
        let value: u64 = 2 | 2 << 2 | 1000 << 4 | 600 << 18;
        let bytes = value.to_le_bytes();
        let header = LiteralsHeader::parse(&bytes[..4]).unwrap();
        assert_eq!(header.block_type, LiteralsBlockType::Compressed);
        assert_eq!(header.regenerated_size, 1000);
        assert_eq!(header.compressed_size, 600);
        assert!(header.four_streams);
        assert_eq!(header.header_size, 4);
    }

    #[test]
    fn test_treeless_needs_table() {
        let value: u32 = 3 | 10 << 4 | 4 << 14;
        let bytes = value.to_le_bytes();
        let mut input = bytes[..3].to_vec();
        input.extend_from_slice(&[1, 2, 3, 4]);
        let mut table = None;
        assert!(decode_literals(&input, &mut table).is_err());
    }

    #[test]
    fn test_payload_past_block_end() {
        let input = [0x28, b'h', b'i'];
        let mut table = None;
        assert!(matches!(
            decode_literals(&input, &mut table),
            Err(Error::CorruptFrame { .. })
        ));
    }
}
