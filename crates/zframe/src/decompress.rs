//! Frame decompression.
//!
//! Each frame is walked through an explicit stage machine:
//!
//! ```text
//! ExpectMagic -> ExpectFrameHeader -> ExpectBlockHeader -> ExpectBlockBody
//!                                            ^                   |
//!                                            +---- not last -----+
//!                                                                | last
//!                                                                v
//!                                                   ExpectChecksum -> Done
//! ```
//!
//! Concatenated frames decode to the concatenation of their contents and
//! skippable frames are stepped over. Every length is checked against the
//! input before it is read; a structure that runs past the end of the
//! input is `TruncatedInput`, never a partial result.

use tracing::{debug, trace};

use crate::block::{decode_compressed_block, decode_raw_block, decode_rle_block, DecoderState, History};
use crate::config::DecompressorConfig;
use crate::dictionary::Dictionary;
use crate::frame::{
    content_checksum, is_skippable_magic, BlockHeader, BlockType, FrameHeader, BLOCK_SIZE_MAX,
    CHECKSUM_SIZE, MAGIC_SIZE, ZSTD_MAGIC,
};
use zframe_core::{Error, Result};

/// Upper bound on memory reserved up front from a declared content size.
const MAX_RESERVE: usize = 8 << 20;

/// Decoder position within one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ExpectMagic,
    ExpectFrameHeader,
    ExpectBlockHeader,
    ExpectBlockBody(BlockHeader),
    ExpectChecksum,
    Done,
}

/// Per-frame decoding state.
struct FrameState<'d> {
    header: FrameHeader,
    entropy: DecoderState,
    dictionary: &'d [u8],
    frame_start: usize,
    block_max: usize,
}

/// Decompression settings plus an optional dictionary.
#[derive(Debug, Clone, Default)]
pub struct DecompressContext<'d> {
    config: DecompressorConfig,
    dictionary: Option<&'d Dictionary>,
}

impl<'d> DecompressContext<'d> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DecompressorConfig) -> Self {
        Self {
            config,
            dictionary: None,
        }
    }

    /// Decompress frames that name `dictionary`.
    pub fn with_dictionary(mut self, dictionary: &'d Dictionary) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn config(&self) -> &DecompressorConfig {
        &self.config
    }

    /// Decode every frame in `input`.
    pub fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        if input.is_empty() {
            return Err(Error::truncated(0, MAGIC_SIZE));
        }
        let mut output = Vec::new();
        let mut position = 0;
        let mut frames = 0usize;
        while position < input.len() {
            position = self.decode_frame(input, position, &mut output)?;
            frames += 1;
        }
        debug!(input = input.len(), output = output.len(), frames, "decompressed");
        Ok(output)
    }

    /// Decode the frame starting at `start`, returning the position after it.
    fn decode_frame(&self, input: &[u8], start: usize, output: &mut Vec<u8>) -> Result<usize> {
        let mut position = start;
        let mut stage = Stage::ExpectMagic;
        let mut frame: Option<FrameState<'d>> = None;

        loop {
            trace!(?stage, position, "frame stage");
            stage = match stage {
                Stage::ExpectMagic => {
                    let magic = read_magic(input, position)?;
                    if is_skippable_magic(magic) {
                        return skip_frame(input, position);
                    }
                    if magic != ZSTD_MAGIC {
                        return Err(Error::corrupt_at(format!("bad magic 0x{:08X}", magic), position));
                    }
                    position += MAGIC_SIZE;
                    Stage::ExpectFrameHeader
                }
                Stage::ExpectFrameHeader => {
                    let header = FrameHeader::parse(&input[position..], position)?;
                    position += header.header_size;
                    frame = Some(self.begin_frame(header, output)?);
                    Stage::ExpectBlockHeader
                }
                Stage::ExpectBlockHeader => {
                    let state = frame_state(&mut frame)?;
                    let block = BlockHeader::parse(&input[position..], position)?;
                    if block.block_size > state.block_max {
                        return Err(Error::corrupt_at(
                            format!("block size {} exceeds maximum {}", block.block_size, state.block_max),
                            position,
                        ));
                    }
                    position += BlockHeader::SIZE;
                    Stage::ExpectBlockBody(block)
                }
                Stage::ExpectBlockBody(block) => {
                    let state = frame_state(&mut frame)?;
                    let size = block.payload_size();
                    let available = input.len() - position;
                    if available < size {
                        return Err(Error::truncated(input.len(), size - available));
                    }
                    let payload = &input[position..position + size];
                    self.decode_block(block, payload, state, output)?;
                    position += size;
                    trace!(
                        block_type = ?block.block_type,
                        size,
                        produced = output.len() - state.frame_start,
                        "block decoded"
                    );

                    if block.last_block {
                        check_content_size(state, output)?;
                        Stage::ExpectChecksum
                    } else {
                        Stage::ExpectBlockHeader
                    }
                }
                Stage::ExpectChecksum => {
                    let state = frame_state(&mut frame)?;
                    if state.header.has_checksum {
                        let bytes = input.get(position..position + CHECKSUM_SIZE).ok_or_else(|| {
                            Error::truncated(input.len(), position + CHECKSUM_SIZE - input.len())
                        })?;
                        let expected = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                        position += CHECKSUM_SIZE;
                        if self.config.verify_checksum {
                            let actual = content_checksum(&output[state.frame_start..]);
                            if actual != expected {
                                debug!(expected, actual, "content checksum mismatch");
                                return Err(Error::checksum_mismatch(expected, actual, std::mem::take(output)));
                            }
                        }
                    }
                    Stage::Done
                }
                Stage::Done => return Ok(position),
            };
        }
    }

    fn begin_frame(&self, header: FrameHeader, output: &mut Vec<u8>) -> Result<FrameState<'d>> {
        if header.window_size > self.config.max_window_size {
            return Err(Error::unsupported(format!(
                "window of {} bytes exceeds limit of {}",
                header.window_size, self.config.max_window_size
            )));
        }

        let dictionary = match (header.dictionary_id, self.dictionary) {
            (0, _) => None,
            (expected, Some(dictionary)) if dictionary.id() == expected => Some(dictionary),
            (expected, provided) => {
                return Err(Error::DictionaryMismatch {
                    expected,
                    provided: provided.map(Dictionary::id),
                })
            }
        };

        if let (Some(limit), Some(size)) = (self.config.max_output_size, header.frame_content_size) {
            if output.len() as u64 + size > limit as u64 {
                return Err(Error::OutputLimitExceeded { limit });
            }
        }
        if let Some(size) = header.frame_content_size {
            output.reserve(size.min(MAX_RESERVE as u64) as usize);
        }

        debug!(
            window = header.window_size,
            content_size = ?header.frame_content_size,
            dictionary_id = header.dictionary_id,
            checksum = header.has_checksum,
            "frame header"
        );

        Ok(FrameState {
            block_max: (header.window_size.min(BLOCK_SIZE_MAX as u64)) as usize,
            entropy: dictionary.map(Dictionary::decoder_state).unwrap_or_default(),
            dictionary: dictionary.map_or(&[][..], Dictionary::content),
            frame_start: output.len(),
            header,
        })
    }

    fn decode_block(
        &self,
        block: BlockHeader,
        payload: &[u8],
        state: &mut FrameState<'d>,
        output: &mut Vec<u8>,
    ) -> Result<()> {
        match block.block_type {
            BlockType::Raw => {
                self.check_limit(output.len() + payload.len())?;
                decode_raw_block(payload, output);
            }
            BlockType::Rle => {
                self.check_limit(output.len() + block.block_size)?;
                decode_rle_block(payload[0], block.block_size, output);
            }
            BlockType::Compressed => {
                let history = History {
                    dictionary: state.dictionary,
                    frame_start: state.frame_start,
                    output_limit: self.config.max_output_size,
                };
                decode_compressed_block(payload, &mut state.entropy, history, state.block_max, output)?;
            }
        }
        if let Some(size) = state.header.frame_content_size {
            if (output.len() - state.frame_start) as u64 > size {
                return Err(Error::corrupt(format!("frame decodes past declared content size {}", size)));
            }
        }
        Ok(())
    }

    fn check_limit(&self, total: usize) -> Result<()> {
        match self.config.max_output_size {
            Some(limit) if total > limit => Err(Error::OutputLimitExceeded { limit }),
            _ => Ok(()),
        }
    }
}

fn frame_state<'a, 'd>(frame: &'a mut Option<FrameState<'d>>) -> Result<&'a mut FrameState<'d>> {
    frame
        .as_mut()
        .ok_or_else(|| Error::corrupt("block before frame header"))
}

fn check_content_size(state: &FrameState<'_>, output: &[u8]) -> Result<()> {
    let produced = (output.len() - state.frame_start) as u64;
    match state.header.frame_content_size {
        Some(size) if size != produced => Err(Error::corrupt(format!(
            "frame declares {} bytes but decodes to {}",
            size, produced
        ))),
        _ => Ok(()),
    }
}

/// Read a frame magic. A short input that could still be a magic is
/// truncated rather than corrupt.
fn read_magic(input: &[u8], position: usize) -> Result<u32> {
    let rest = &input[position..];
    if rest.len() >= MAGIC_SIZE {
        return Ok(u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]));
    }
    let zstd = ZSTD_MAGIC.to_le_bytes();
    let skippable = [0x2A, 0x4D, 0x18];
    let could_be_zstd = zstd.starts_with(rest);
    let could_be_skippable = rest.first().map_or(true, |b| b & 0xF0 == 0x50) && skippable.starts_with(rest.get(1..).unwrap_or(&[]));
    if could_be_zstd || could_be_skippable {
        Err(Error::truncated(input.len(), MAGIC_SIZE - rest.len()))
    } else {
        Err(Error::corrupt_at("bad magic", position))
    }
}

fn skip_frame(input: &[u8], position: usize) -> Result<usize> {
    let size_at = position + MAGIC_SIZE;
    let bytes = input
        .get(size_at..size_at + 4)
        .ok_or_else(|| Error::truncated(input.len(), size_at + 4 - input.len()))?;
    let size = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let end = size_at + 4 + size;
    if end > input.len() {
        return Err(Error::truncated(input.len(), end - input.len()));
    }
    trace!(position, size, "skippable frame");
    Ok(end)
}

/// Declared content size of the first frame, if it records one.
///
/// Skippable frames declare zero.
pub fn frame_content_size(input: &[u8]) -> Result<Option<u64>> {
    let magic = read_magic(input, 0)?;
    if is_skippable_magic(magic) {
        return Ok(Some(0));
    }
    if magic != ZSTD_MAGIC {
        return Err(Error::corrupt_at(format!("bad magic 0x{:08X}", magic), 0));
    }
    let header = FrameHeader::parse(&input[MAGIC_SIZE..], MAGIC_SIZE)?;
    Ok(header.frame_content_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressContext;
    use crate::config::CompressorConfig;

    fn frame(data: &[u8]) -> Vec<u8> {
        CompressContext::new(3).unwrap().compress(data).unwrap()
    }

    #[test]
    fn test_hand_built_raw_frame() {
        // Single segment, 5-byte content, no checksum, one raw block.
        let mut input = ZSTD_MAGIC.to_le_bytes().to_vec();
        input.extend_from_slice(&[0x20, 5]);
        BlockHeader::new(true, BlockType::Raw, 5).write(&mut input);
        input.extend_from_slice(b"hello");
        assert_eq!(DecompressContext::new().decompress(&input).unwrap(), b"hello");
    }

    #[test]
    fn test_bad_magic() {
        let err = DecompressContext::new().decompress(b"not a frame").unwrap_err();
        assert!(matches!(err, Error::CorruptFrame { .. }));
    }

    #[test]
    fn test_partial_magic_is_truncated() {
        for len in 1..4 {
            let err = DecompressContext::new().decompress(&[0x28, 0xB5, 0x2F][..len]).unwrap_err();
            assert!(matches!(err, Error::TruncatedInput { .. }), "len {}", len);
        }
        assert!(matches!(
            DecompressContext::new().decompress(&[0x99]),
            Err(Error::CorruptFrame { .. })
        ));
    }

    #[test]
    fn test_reserved_block_type() {
        let mut input = ZSTD_MAGIC.to_le_bytes().to_vec();
        input.extend_from_slice(&[0x20, 1]);
        // last = 1, type = 3, size = 1
        input.extend_from_slice(&[0x07 | 0x08, 0, 0, b'x']);
        let err = DecompressContext::new().decompress(&input).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFeature(_)));
    }

    #[test]
    fn test_reserved_descriptor_bit() {
        let mut input = ZSTD_MAGIC.to_le_bytes().to_vec();
        input.extend_from_slice(&[0x28, 0]);
        assert!(matches!(
            DecompressContext::new().decompress(&input),
            Err(Error::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_window_limit() {
        let mut input = ZSTD_MAGIC.to_le_bytes().to_vec();
        // Windowed, window descriptor exponent 20 => 2^30.
        input.extend_from_slice(&[0x00, 20 << 3]);
        BlockHeader::new(true, BlockType::Raw, 0).write(&mut input);
        assert!(matches!(
            DecompressContext::new().decompress(&input),
            Err(Error::UnsupportedFeature(_))
        ));
        let relaxed = DecompressContext::with_config(DecompressorConfig::default().max_window_size(1 << 30));
        assert!(relaxed.decompress(&input).unwrap().is_empty());
    }

    #[test]
    fn test_content_size_disagreement() {
        let mut input = ZSTD_MAGIC.to_le_bytes().to_vec();
        input.extend_from_slice(&[0x20, 6]);
        BlockHeader::new(true, BlockType::Raw, 5).write(&mut input);
        input.extend_from_slice(b"hello");
        assert!(matches!(
            DecompressContext::new().decompress(&input),
            Err(Error::CorruptFrame { .. })
        ));
    }

    #[test]
    fn test_output_limit() {
        let data = vec![b'z'; 10_000];
        let compressed = frame(&data);
        let limited = DecompressContext::with_config(DecompressorConfig::default().max_output_size(4096));
        assert!(matches!(
            limited.decompress(&compressed),
            Err(Error::OutputLimitExceeded { limit: 4096 })
        ));
        let roomy = DecompressContext::with_config(DecompressorConfig::default().max_output_size(10_000));
        assert_eq!(roomy.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_output_limit_without_content_size() {
        let data = b"limit me, limit me again. ".repeat(400);
        let config = CompressorConfig::with_level(3).content_size(false);
        let compressed = CompressContext::with_config(config).unwrap().compress(&data).unwrap();
        assert_eq!(frame_content_size(&compressed).unwrap(), None);

        let limited = DecompressContext::with_config(DecompressorConfig::default().max_output_size(4096));
        assert!(matches!(
            limited.decompress(&compressed),
            Err(Error::OutputLimitExceeded { limit: 4096 })
        ));
        let exact = DecompressContext::with_config(DecompressorConfig::default().max_output_size(data.len()));
        assert_eq!(exact.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_skippable_and_concatenated_frames() {
        let mut input = frame(b"first frame;");
        input.extend_from_slice(&0x184D_2A53u32.to_le_bytes());
        input.extend_from_slice(&3u32.to_le_bytes());
        input.extend_from_slice(b"???");
        input.extend_from_slice(&frame(b"second frame"));
        assert_eq!(
            DecompressContext::new().decompress(&input).unwrap(),
            b"first frame;second frame"
        );
    }

    #[test]
    fn test_truncated_skippable_frame() {
        let mut input = 0x184D_2A50u32.to_le_bytes().to_vec();
        input.extend_from_slice(&10u32.to_le_bytes());
        input.extend_from_slice(b"short");
        assert!(matches!(
            DecompressContext::new().decompress(&input),
            Err(Error::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_checksum_verification_can_be_disabled() {
        let mut compressed = frame(b"checksummed content, checksummed content");
        let last = compressed.len() - 1;
        compressed[last] ^= 0xFF;
        let err = DecompressContext::new().decompress(&compressed).unwrap_err();
        assert_eq!(
            err.untrusted_output(),
            Some(&b"checksummed content, checksummed content"[..])
        );
        let lenient = DecompressContext::with_config(DecompressorConfig::default().verify_checksum(false));
        assert_eq!(
            lenient.decompress(&compressed).unwrap(),
            b"checksummed content, checksummed content"
        );
    }

    #[test]
    fn test_frame_content_size() {
        assert_eq!(frame_content_size(&frame(&[7u8; 1234])).unwrap(), Some(1234));
        assert_eq!(frame_content_size(&frame(b"")).unwrap(), Some(0));
        assert!(matches!(frame_content_size(&[0x28, 0xB5]), Err(Error::TruncatedInput { .. })));
        assert!(matches!(frame_content_size(b"nope"), Err(Error::CorruptFrame { .. })));
    }
}
