//! Frame header parsing and serialization.
//!
//! The frame header follows the magic number:
//!
//! ```text
//! +--------------------+------------------+-----------+--------------------+
//! | Frame_Header_Desc. | Window_Descriptor| Dict_ID   | Frame_Content_Size |
//! | 1 byte             | 0-1 byte         | 0-4 bytes | 0-8 bytes          |
//! +--------------------+------------------+-----------+--------------------+
//! ```

use zframe_core::{Error, Result};

/// Frame header descriptor byte.
///
/// ```text
/// Bit 7-6: Frame_Content_Size_flag
/// Bit 5:   Single_Segment_flag
/// Bit 4:   Unused_bit
/// Bit 3:   Reserved_bit (must be 0)
/// Bit 2:   Content_Checksum_flag
/// Bit 1-0: Dictionary_ID_flag
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDescriptor {
    raw: u8,
}

impl FrameDescriptor {
    pub fn new(byte: u8) -> Result<Self> {
        if byte & 0x08 != 0 {
            return Err(Error::unsupported("reserved bit set in frame descriptor"));
        }
        Ok(Self { raw: byte })
    }

    #[inline]
    pub fn raw(&self) -> u8 {
        self.raw
    }

    #[inline]
    pub fn frame_content_size_flag(&self) -> u8 {
        self.raw >> 6
    }

    /// Width of the frame content size field.
    pub fn frame_content_size_bytes(&self) -> usize {
        match self.frame_content_size_flag() {
            0 if self.single_segment_flag() => 1,
            0 => 0,
            1 => 2,
            2 => 4,
            _ => 8,
        }
    }

    /// When set, the window equals the frame content size.
    #[inline]
    pub fn single_segment_flag(&self) -> bool {
        self.raw & 0x20 != 0
    }

    #[inline]
    pub fn content_checksum_flag(&self) -> bool {
        self.raw & 0x04 != 0
    }

    #[inline]
    pub fn dictionary_id_flag(&self) -> u8 {
        self.raw & 0x03
    }

    pub fn dictionary_id_bytes(&self) -> usize {
        match self.dictionary_id_flag() {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        }
    }

    #[inline]
    pub fn has_window_descriptor(&self) -> bool {
        !self.single_segment_flag()
    }
}

/// Parsed or to-be-written frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Window size in bytes. Equals the content size for single-segment frames.
    pub window_size: u64,
    /// Dictionary ID, 0 when absent.
    pub dictionary_id: u32,
    pub frame_content_size: Option<u64>,
    pub single_segment: bool,
    pub has_checksum: bool,
    /// Header length in bytes, excluding the magic number.
    pub header_size: usize,
}

impl FrameHeader {
    /// Header for a frame written without a window descriptor.
    pub fn single_segment(content_size: u64, dictionary_id: u32, checksum: bool) -> Self {
        let mut header = Self {
            window_size: content_size,
            dictionary_id,
            frame_content_size: Some(content_size),
            single_segment: true,
            has_checksum: checksum,
            header_size: 0,
        };
        header.header_size = header.encoded_len();
        header
    }

    /// Header for a frame with an explicit `2^window_log` window.
    pub fn windowed(
        window_log: u8,
        content_size: Option<u64>,
        dictionary_id: u32,
        checksum: bool,
    ) -> Self {
        let mut header = Self {
            window_size: 1u64 << window_log,
            dictionary_id,
            frame_content_size: content_size,
            single_segment: false,
            has_checksum: checksum,
            header_size: 0,
        };
        header.header_size = header.encoded_len();
        header
    }

    /// Parse a header starting right after the magic number.
    ///
    /// `base` is the absolute input offset of `data`, used for error
    /// reporting.
    pub fn parse(data: &[u8], base: usize) -> Result<Self> {
        let first = *data.first().ok_or_else(|| Error::truncated(base, 1))?;
        let descriptor = FrameDescriptor::new(first)?;

        let window_bytes = descriptor.has_window_descriptor() as usize;
        let dict_bytes = descriptor.dictionary_id_bytes();
        let fcs_bytes = descriptor.frame_content_size_bytes();
        let header_size = 1 + window_bytes + dict_bytes + fcs_bytes;
        if data.len() < header_size {
            return Err(Error::truncated(base + data.len(), header_size - data.len()));
        }

        let mut offset = 1;
        let window_size = if descriptor.has_window_descriptor() {
            let size = decode_window_descriptor(data[offset]);
            offset += 1;
            Some(size)
        } else {
            None
        };

        let dictionary_id = read_le(&data[offset..offset + dict_bytes]) as u32;
        offset += dict_bytes;

        let frame_content_size = match fcs_bytes {
            0 => None,
            2 => Some(read_le(&data[offset..offset + 2]) + 256),
            n => Some(read_le(&data[offset..offset + n])),
        };

        let window_size = match (window_size, frame_content_size) {
            (Some(window), _) => window,
            (None, Some(size)) => size,
            (None, None) => return Err(Error::corrupt_at("single-segment frame without content size", base)),
        };

        Ok(Self {
            window_size,
            dictionary_id,
            frame_content_size,
            single_segment: descriptor.single_segment_flag(),
            has_checksum: descriptor.content_checksum_flag(),
            header_size,
        })
    }

    /// Serialize the header (without magic).
    pub fn write(&self, out: &mut Vec<u8>) {
        let (fcs_flag, fcs_bytes) = self.content_size_field();
        let (dict_flag, dict_bytes) = dictionary_id_field(self.dictionary_id);

        let mut descriptor = (fcs_flag << 6) | dict_flag;
        if self.single_segment {
            descriptor |= 0x20;
        }
        if self.has_checksum {
            descriptor |= 0x04;
        }
        out.push(descriptor);

        if !self.single_segment {
            out.push(encode_window_descriptor(self.window_size));
        }
        out.extend_from_slice(&self.dictionary_id.to_le_bytes()[..dict_bytes]);

        if let Some(size) = self.frame_content_size {
            let value = if fcs_bytes == 2 { size - 256 } else { size };
            out.extend_from_slice(&value.to_le_bytes()[..fcs_bytes]);
        }
    }

    /// Bytes `write` will produce.
    pub fn encoded_len(&self) -> usize {
        1 + (!self.single_segment) as usize
            + dictionary_id_field(self.dictionary_id).1
            + self.content_size_field().1
    }

    fn content_size_field(&self) -> (u8, usize) {
        match self.frame_content_size {
            None => (0, 0),
            Some(size) if size < 256 && self.single_segment => (0, 1),
            // A zero flag without single-segment means "absent".
            Some(size) if size < 256 => (2, 4),
            Some(size) if size < 65536 + 256 => (1, 2),
            Some(size) if size <= u32::MAX as u64 => (2, 4),
            Some(_) => (3, 8),
        }
    }
}

fn dictionary_id_field(id: u32) -> (u8, usize) {
    match id {
        0 => (0, 0),
        1..=0xFF => (1, 1),
        0x100..=0xFFFF => (2, 2),
        _ => (3, 4),
    }
}

/// Window size for a window descriptor byte.
pub fn decode_window_descriptor(byte: u8) -> u64 {
    let exponent = (byte >> 3) as u32;
    let mantissa = (byte & 0x07) as u64;
    let base = 1u64 << (10 + exponent);
    base + (base >> 3) * mantissa
}

/// Smallest window descriptor covering `window_size`.
pub fn encode_window_descriptor(window_size: u64) -> u8 {
    let window_size = window_size.max(super::MIN_WINDOW_SIZE as u64);
    for byte in 0..=u8::MAX {
        if decode_window_descriptor(byte) >= window_size {
            return byte;
        }
    }
    u8::MAX
}

fn read_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .enumerate()
        .fold(0u64, |value, (i, &byte)| value | (byte as u64) << (8 * i))
}

// =============================================================================
// Tests
// =============================================================================
