//! Dictionaries: shared history and entropy tables for small inputs.
//!
//! ## Structured Format
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ Magic: 0xEC30A437 (4 bytes)                                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Dictionary ID (4 bytes)                                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Huffman tree description (literals)                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ FSE Offset Table                                                │
//! │ FSE Match Length Table                                          │
//! │ FSE Literal Length Table                                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Repeat offsets (3 x 4 bytes)                                    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Content                                                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Anything without the magic is a raw dictionary: content only, with an
//! id derived from the content so both sides agree on identity.
//!
//! A loaded dictionary never changes. Share it across threads with
//! `Arc<Dictionary>`.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::debug;
use xxhash_rust::xxh64::xxh64;

use crate::block::{DecoderState, RepeatOffsets, SequenceTables};
use crate::compress::{EntropyState, SequenceEncoderTables, SequenceTable};
use crate::fse::{write_distribution, FseTable, SequenceStream};
use crate::huffman::{HuffmanEncoder, HuffmanTable};
use zframe_core::{Error, Result};

/// Structured dictionary magic number.
pub const DICTIONARY_MAGIC: u32 = 0xEC30_A437;

/// Smallest usable dictionary content.
pub const MIN_DICT_SIZE: usize = 8;

/// Minimum samples for training.
pub const MIN_SAMPLES: usize = 5;

/// Raw dictionary ids start here; lower ids are reserved for registries.
const RAW_ID_MIN: u32 = 32_768;

/// Bytes hashed per training key.
const TRAIN_DMER: usize = 8;

/// Length of each segment a trained dictionary is assembled from.
const TRAIN_SEGMENT: usize = 64;

#[derive(Clone)]
struct EntropyTables {
    huffman: HuffmanTable,
    huffman_encoder: HuffmanEncoder,
    offsets: FseTable,
    match_lengths: FseTable,
    literal_lengths: FseTable,
}

/// A loaded dictionary, immutable after construction.
#[derive(Clone)]
pub struct Dictionary {
    id: u32,
    content: Vec<u8>,
    entropy: Option<EntropyTables>,
    repeat_offsets: RepeatOffsets,
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("id", &self.id)
            .field("content_len", &self.content.len())
            .field("has_entropy_tables", &self.entropy.is_some())
            .field("repeat_offsets", &self.repeat_offsets.get())
            .finish()
    }
}

impl Dictionary {
    /// Load a structured or raw dictionary.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        if bytes.len() >= 8 && read_u32(bytes, 0) == Some(DICTIONARY_MAGIC) {
            Self::parse_structured(bytes)
        } else {
            Self::from_content(bytes.to_vec())
        }
    }

    /// Wrap raw content. The id is derived from the content.
    pub fn from_content(content: Vec<u8>) -> Result<Self> {
        if content.len() < MIN_DICT_SIZE {
            return Err(Error::InvalidDictionary(format!(
                "content of {} bytes is below the {} byte minimum",
                content.len(),
                MIN_DICT_SIZE
            )));
        }
        Ok(Self {
            id: raw_dictionary_id(&content),
            content,
            entropy: None,
            repeat_offsets: RepeatOffsets::default(),
        })
    }

    fn parse_structured(bytes: &[u8]) -> Result<Self> {
        let invalid = |what: &str, err: Error| Error::InvalidDictionary(format!("{}: {}", what, err));

        let id = read_u32(bytes, 4).unwrap_or(0);
        if id == 0 {
            return Err(Error::InvalidDictionary("structured dictionary with id 0".into()));
        }
        let mut position = 8;

        let (huffman, consumed) =
            HuffmanTable::parse(&bytes[position..]).map_err(|e| invalid("literals table", e))?;
        position += consumed;
        let huffman_encoder =
            HuffmanEncoder::from_weights(huffman.weights()).map_err(|e| invalid("literals table", e))?;

        let mut fse = |stream: SequenceStream| -> Result<FseTable> {
            let (table, consumed) = FseTable::parse(&bytes[position..], stream.max_symbol(), stream.max_log())
                .map_err(|e| invalid(&format!("{:?} table", stream), e))?;
            position += consumed;
            Ok(table)
        };
        let offsets = fse(SequenceStream::Offset)?;
        let match_lengths = fse(SequenceStream::MatchLength)?;
        let literal_lengths = fse(SequenceStream::LiteralLength)?;

        let mut reps = [0u32; 3];
        for rep in &mut reps {
            *rep = read_u32(bytes, position)
                .ok_or_else(|| Error::InvalidDictionary("repeat offsets truncated".into()))?;
            position += 4;
        }
        let content = bytes[position..].to_vec();
        if let Some(bad) = reps.iter().find(|&&r| r == 0 || r as usize > content.len()) {
            return Err(Error::InvalidDictionary(format!(
                "repeat offset {} outside {} bytes of content",
                bad,
                content.len()
            )));
        }

        debug!(id, content = content.len(), "loaded structured dictionary");
        Ok(Self {
            id,
            content,
            entropy: Some(EntropyTables {
                huffman,
                huffman_encoder,
                offsets,
                match_lengths,
                literal_lengths,
            }),
            repeat_offsets: RepeatOffsets::new(reps),
        })
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    pub fn has_entropy_tables(&self) -> bool {
        self.entropy.is_some()
    }

    pub fn repeat_offsets(&self) -> [u32; 3] {
        self.repeat_offsets.get()
    }

    /// Decoder state a frame using this dictionary starts from.
    pub(crate) fn decoder_state(&self) -> DecoderState {
        let Some(tables) = &self.entropy else {
            return DecoderState {
                huffman: None,
                sequences: SequenceTables {
                    repeat_offsets: self.repeat_offsets,
                    ..SequenceTables::default()
                },
            };
        };
        DecoderState {
            huffman: Some(tables.huffman.clone()),
            sequences: SequenceTables {
                literal_lengths: Some(tables.literal_lengths.clone()),
                offsets: Some(tables.offsets.clone()),
                match_lengths: Some(tables.match_lengths.clone()),
                repeat_offsets: self.repeat_offsets,
            },
        }
    }

    /// Encoder mirror of [`Dictionary::decoder_state`].
    pub(crate) fn entropy_state(&self) -> Result<EntropyState> {
        let Some(tables) = &self.entropy else {
            return Ok(EntropyState {
                repeat_offsets: self.repeat_offsets,
                ..EntropyState::default()
            });
        };
        let encoder = |table: &FseTable| {
            SequenceTable::from_distribution(table.distribution().to_vec(), table.accuracy_log()).map(Some)
        };
        Ok(EntropyState {
            huffman: Some(tables.huffman_encoder.clone()),
            sequences: SequenceEncoderTables {
                literal_lengths: encoder(&tables.literal_lengths)?,
                offsets: encoder(&tables.offsets)?,
                match_lengths: encoder(&tables.match_lengths)?,
            },
            repeat_offsets: self.repeat_offsets,
        })
    }

    /// Serialize in the structured form.
    ///
    /// Dictionaries loaded without tables get a literals table built from
    /// their content and the predefined sequence distributions. Frames
    /// decode differently against those tables, so the result carries an
    /// id derived from the serialized tables and content rather than the
    /// raw id.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut body = Vec::with_capacity(self.content.len() + 256);
        let description = match &self.entropy {
            Some(tables) => tables
                .huffman_encoder
                .describe()
                .ok_or_else(|| Error::InvalidDictionary("literals table cannot be described".into()))?,
            None => content_literal_table(&self.content)?.1,
        };
        body.extend_from_slice(&description);

        for stream in [SequenceStream::Offset, SequenceStream::MatchLength, SequenceStream::LiteralLength] {
            let header = match &self.entropy {
                Some(tables) => {
                    let table = match stream {
                        SequenceStream::Offset => &tables.offsets,
                        SequenceStream::MatchLength => &tables.match_lengths,
                        SequenceStream::LiteralLength => &tables.literal_lengths,
                    };
                    write_distribution(table.distribution(), table.accuracy_log())?
                }
                None => {
                    let (distribution, log) = stream.default_distribution();
                    write_distribution(distribution, log)?
                }
            };
            body.extend_from_slice(&header);
        }

        for rep in self.repeat_offsets.get() {
            body.extend_from_slice(&rep.to_le_bytes());
        }
        body.extend_from_slice(&self.content);

        let id = match self.entropy {
            Some(_) => self.id,
            None => raw_dictionary_id(&body),
        };
        let mut out = Vec::with_capacity(8 + body.len());
        out.extend_from_slice(&DICTIONARY_MAGIC.to_le_bytes());
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Build a raw dictionary of about `size` bytes from samples.
    ///
    /// Keys of eight bytes are counted once per sample they appear in.
    /// The corpus is split into one epoch per segment slot; each epoch
    /// contributes its best scoring segment, and keys already used score
    /// nothing afterwards. Earlier picks land at the end of the content,
    /// closest to the data being compressed.
    pub fn train<S: AsRef<[u8]>>(samples: &[S], size: usize) -> Result<Self> {
        if samples.len() < MIN_SAMPLES {
            return Err(Error::InvalidDictionary(format!(
                "need at least {} samples for training, got {}",
                MIN_SAMPLES,
                samples.len()
            )));
        }
        if size < MIN_DICT_SIZE {
            return Err(Error::InvalidDictionary(format!("dictionary size {} too small", size)));
        }

        let mut frequency: HashMap<&[u8], u32> = HashMap::new();
        for sample in samples {
            let sample = sample.as_ref();
            let keys: HashSet<&[u8]> = sample.windows(TRAIN_DMER).collect();
            for key in keys {
                *frequency.entry(key).or_insert(0) += 1;
            }
        }

        let corpus: Vec<u8> = samples.iter().flat_map(|s| s.as_ref().iter().copied()).collect();
        if corpus.len() < MIN_DICT_SIZE {
            return Err(Error::InvalidDictionary("samples hold too little data".into()));
        }

        let epochs = (size / TRAIN_SEGMENT).max(1);
        let epoch_len = (corpus.len() / epochs).max(TRAIN_SEGMENT);
        let mut segments: Vec<&[u8]> = Vec::new();
        let mut selected = 0;
        for epoch in corpus.chunks(epoch_len) {
            if selected >= size {
                break;
            }
            let Some((start, score)) = best_segment(epoch, &frequency) else {
                continue;
            };
            if score == 0 {
                continue;
            }
            let end = (start + TRAIN_SEGMENT).min(epoch.len());
            let segment = &epoch[start..end];
            for key in segment.windows(TRAIN_DMER) {
                if let Some(count) = frequency.get_mut(key) {
                    *count = 0;
                }
            }
            selected += segment.len();
            segments.push(segment);
        }

        let mut content: Vec<u8> = segments.iter().rev().flat_map(|s| s.iter().copied()).collect();
        if content.len() < MIN_DICT_SIZE {
            // Nothing recurs; fall back to the most recent sample data.
            let take = size.min(corpus.len());
            content = corpus[corpus.len() - take..].to_vec();
        }
        if content.len() > size {
            content.drain(..content.len() - size);
        }

        debug!(
            samples = samples.len(),
            segments = segments.len(),
            size = content.len(),
            "trained dictionary"
        );
        Self::from_content(content)
    }
}

/// Id for raw content: XXH64 mapped into `32768..2^31`.
pub fn raw_dictionary_id(content: &[u8]) -> u32 {
    let span = (1u64 << 31) - RAW_ID_MIN as u64;
    RAW_ID_MIN + (xxh64(content, 0) % span) as u32
}

/// Start and score of the best segment in `epoch`.
///
/// A segment scores the summed frequency of its distinct keys; the window
/// slides with per-key occurrence counts so each step is constant work.
fn best_segment(epoch: &[u8], frequency: &HashMap<&[u8], u32>) -> Option<(usize, u64)> {
    if epoch.len() < TRAIN_DMER {
        return None;
    }
    let keys_per_segment = TRAIN_SEGMENT.saturating_sub(TRAIN_DMER) + 1;
    let keys: Vec<&[u8]> = epoch.windows(TRAIN_DMER).collect();
    let weight = |key: &[u8]| frequency.get(key).copied().unwrap_or(0) as u64;

    let mut active: HashMap<&[u8], u32> = HashMap::new();
    let mut score = 0u64;
    let mut best = (0usize, 0u64);
    for (index, &key) in keys.iter().enumerate() {
        let count = active.entry(key).or_insert(0);
        if *count == 0 {
            score += weight(key);
        }
        *count += 1;

        if index >= keys_per_segment {
            let leaving = keys[index - keys_per_segment];
            if let Some(count) = active.get_mut(leaving) {
                *count -= 1;
                if *count == 0 {
                    score -= weight(leaving);
                }
            }
        }

        let start = (index + 1).saturating_sub(keys_per_segment);
        if score > best.1 {
            best = (start, score);
        }
    }
    Some(best)
}

/// Literals table weighted by the bytes the content holds, with its
/// serialized description.
///
/// Candidates go from exact counts, to log-scaled counts, to the bytes
/// below 128 only; the last always fits the direct weight form.
fn content_literal_table(content: &[u8]) -> Result<(HuffmanEncoder, Vec<u8>)> {
    let mut counts = [0u32; 256];
    for &byte in content {
        counts[byte as usize] = counts[byte as usize].saturating_add(1);
    }
    let flattened = counts.map(|c| if c == 0 { 0 } else { 1 + c.ilog2() });
    let mut low = counts;
    low[128..].fill(0);

    for mut candidate in [counts, flattened, low] {
        ensure_two_symbols(&mut candidate);
        let Some(encoder) = HuffmanEncoder::build(&candidate) else {
            continue;
        };
        if let Some(description) = encoder.describe() {
            return Ok((encoder, description));
        }
    }
    Err(Error::InvalidDictionary("cannot build literals table".into()))
}

/// A Huffman table needs two symbols; fill the lowest empty slots.
fn ensure_two_symbols(counts: &mut [u32; 256]) {
    let mut present = counts.iter().filter(|&&c| c > 0).count();
    for count in counts.iter_mut() {
        if present >= 2 {
            break;
        }
        if *count == 0 {
            *count = 1;
            present += 1;
        }
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let slice = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Vec<u8>> {
        (0..40)
            .map(|i| {
                format!(
                    "{{\"user\":\"user{}\",\"status\":\"active\",\"plan\":\"standard\",\"region\":\"eu-west-{}\"}}",
                    i,
                    i % 3
                )
                .into_bytes()
            })
            .collect()
    }

    #[test]
    fn test_raw_dictionary_id_range() {
        let dict = Dictionary::load(b"some shared dictionary content").unwrap();
        assert!(dict.id() >= 32_768 && dict.id() < 1 << 31);
        assert!(!dict.has_entropy_tables());
        assert_eq!(dict.repeat_offsets(), [1, 4, 8]);

        let again = Dictionary::load(b"some shared dictionary content").unwrap();
        assert_eq!(dict.id(), again.id());
        let other = Dictionary::load(b"different shared dictionary content").unwrap();
        assert_ne!(dict.id(), other.id());
    }

    #[test]
    fn test_too_small() {
        assert!(matches!(Dictionary::load(b"abc"), Err(Error::InvalidDictionary(_))));
    }

    #[test]
    fn test_structured_roundtrip() {
        let raw = Dictionary::from_content(b"header: value; header: other value; trailer".to_vec()).unwrap();
        let bytes = raw.to_bytes().unwrap();
        assert_eq!(&bytes[..4], &[0x37, 0xA4, 0x30, 0xEC]);

        let structured = Dictionary::load(&bytes).unwrap();
        assert_ne!(structured.id(), raw.id());
        assert!(structured.id() >= 32_768);
        assert_eq!(structured.content(), raw.content());
        assert!(structured.has_entropy_tables());

        // Serializing a loaded structured dictionary is stable.
        assert_eq!(structured.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_structured_seeds_state() {
        let raw = Dictionary::from_content(b"seeded entropy tables for the first block".to_vec()).unwrap();
        let dict = Dictionary::load(&raw.to_bytes().unwrap()).unwrap();
        let decoder = dict.decoder_state();
        assert!(decoder.huffman.is_some());
        assert!(decoder.sequences.offsets.is_some());
        let encoder = dict.entropy_state().unwrap();
        assert!(encoder.huffman.is_some());
        assert!(encoder.sequences.match_lengths.is_some());
    }

    #[test]
    fn test_structured_rejects_bad_offsets_and_truncation() {
        let raw = Dictionary::from_content(b"0123456789abcdef".to_vec()).unwrap();
        let mut bytes = raw.to_bytes().unwrap();
        let reps_at = bytes.len() - raw.size() - 12;
        bytes[reps_at..reps_at + 4].copy_from_slice(&1000u32.to_le_bytes());
        assert!(matches!(Dictionary::load(&bytes), Err(Error::InvalidDictionary(_))));

        let bytes = raw.to_bytes().unwrap();
        assert!(Dictionary::load(&bytes[..12]).is_err());
    }

    #[test]
    fn test_to_bytes_across_content_shapes() {
        use crate::compress::CompressContext;
        use crate::decompress::DecompressContext;

        let shapes: [(&str, fn(usize) -> u8); 4] = [
            ("hex", |i| b"0123456789abcdef"[i % 16]),
            ("high", |i| (i * 37 % 256) as u8),
            ("single", |_| 0xAA),
            ("every", |i| (i % 256) as u8),
        ];
        for (name, byte_at) in shapes {
            for size in [8, 9, 16, 31, 64, 200, 256, 1000, 4096] {
                let content: Vec<u8> = (0..size).map(byte_at).collect();
                let raw = Dictionary::from_content(content.clone()).unwrap();
                let bytes = raw
                    .to_bytes()
                    .unwrap_or_else(|e| panic!("{} content of {} bytes: {}", name, size, e));
                let structured = Dictionary::load(&bytes).unwrap();
                assert_eq!(structured.content(), &content[..]);

                let message: Vec<u8> = content.iter().rev().copied().chain(content.iter().copied()).collect();
                let frame = CompressContext::new(3)
                    .unwrap()
                    .with_dictionary(&structured)
                    .compress(&message)
                    .unwrap();
                let restored = DecompressContext::new().with_dictionary(&structured).decompress(&frame).unwrap();
                assert_eq!(restored, message, "{} content of {} bytes", name, size);
            }
        }
    }

    #[test]
    fn test_content_literal_table_falls_back_to_direct_form() {
        let mut content = Vec::new();
        for byte in 0..=255u8 {
            content.extend(std::iter::repeat(byte).take(3));
        }
        let (encoder, description) = content_literal_table(&content).unwrap();
        assert!(!description.is_empty());
        assert!(encoder.weights().len() >= 2);

        let (encoder, _) = content_literal_table(&[7u8; 64]).unwrap();
        assert!(encoder.weights().iter().filter(|&&w| w > 0).count() >= 2);
    }

    #[test]
    fn test_raw_and_structured_forms_do_not_cross_decode() {
        use crate::compress::CompressContext;
        use crate::decompress::DecompressContext;

        let raw = Dictionary::train(&samples(), 512).unwrap();
        let structured = Dictionary::load(&raw.to_bytes().unwrap()).unwrap();
        let message = b"{\"user\":\"user7\",\"status\":\"active\",\"plan\":\"standard\"}";

        let frame = CompressContext::new(9)
            .unwrap()
            .with_dictionary(&structured)
            .compress(message)
            .unwrap();
        match DecompressContext::new().with_dictionary(&raw).decompress(&frame) {
            Err(Error::DictionaryMismatch { expected, provided }) => {
                assert_eq!(expected, structured.id());
                assert_eq!(provided, Some(raw.id()));
            }
            other => panic!("expected DictionaryMismatch, got {:?}", other),
        }

        let frame = CompressContext::new(9).unwrap().with_dictionary(&raw).compress(message).unwrap();
        assert!(matches!(
            DecompressContext::new().with_dictionary(&structured).decompress(&frame),
            Err(Error::DictionaryMismatch { .. })
        ));
    }

    #[test]
    fn test_train_picks_shared_content() {
        let samples = samples();
        let dict = Dictionary::train(&samples, 512).unwrap();
        assert!(dict.size() <= 512);
        assert!(dict.size() >= MIN_DICT_SIZE);
        let content = String::from_utf8_lossy(dict.content());
        assert!(content.contains("status"));
    }

    #[test]
    fn test_train_needs_samples() {
        let few = vec![b"only one sample".to_vec()];
        assert!(matches!(Dictionary::train(&few, 1024), Err(Error::InvalidDictionary(_))));
    }

    #[test]
    fn test_dictionary_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Dictionary>();
    }
}
