//! Property-based tests for frame encoding and decoding.
//!
//! - Any input round-trips at any level, with or without a dictionary
//! - Output never exceeds `compress_bound`
//! - Truncated frames fail with `TruncatedInput`
//! - Arbitrary bytes never panic the decoder

use proptest::prelude::*;

use zframe::{
    compress, compress_bound, compress_with_dict, decompress, decompress_with_dict, CompressContext,
    CompressorConfig, Dictionary, Error,
};

/// Inputs with enough repetition for matches to appear.
fn repetitive_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec((prop::collection::vec(any::<u8>(), 1..24), 1usize..40), 0..40).prop_map(|runs| {
        runs.into_iter()
            .flat_map(|(chunk, repeat)| chunk.repeat(repeat))
            .collect()
    })
}

fn level_strategy() -> impl Strategy<Value = i32> {
    1i32..=22
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn prop_random_roundtrip(data in prop::collection::vec(any::<u8>(), 0..4096), level in level_strategy()) {
        let frame = compress(&data, level).unwrap();
        prop_assert!(frame.len() <= compress_bound(data.len()));
        prop_assert_eq!(decompress(&frame).unwrap(), data);
    }

    #[test]
    fn prop_repetitive_roundtrip(data in repetitive_strategy(), level in level_strategy()) {
        let frame = compress(&data, level).unwrap();
        prop_assert!(frame.len() <= compress_bound(data.len()));
        prop_assert_eq!(decompress(&frame).unwrap(), data);
    }

    #[test]
    fn prop_small_blocks_roundtrip(data in repetitive_strategy(), block in 1024usize..4096, checksum in any::<bool>()) {
        let config = CompressorConfig::with_level(4).max_block_size(block).checksum(checksum);
        let frame = CompressContext::with_config(config).unwrap().compress(&data).unwrap();
        prop_assert_eq!(decompress(&frame).unwrap(), data);
    }

    #[test]
    fn prop_dictionary_roundtrip(
        content in prop::collection::vec(any::<u8>(), 8..512),
        suffix in prop::collection::vec(any::<u8>(), 0..64),
        level in level_strategy(),
    ) {
        let dictionary = Dictionary::load(&content).unwrap();
        let mut data = content[..content.len() / 2].to_vec();
        data.extend_from_slice(&suffix);
        let frame = compress_with_dict(&data, level, &dictionary).unwrap();
        prop_assert_eq!(decompress_with_dict(&frame, &dictionary).unwrap(), data);
    }

    #[test]
    fn prop_truncation_detected(data in repetitive_strategy(), cut in any::<prop::sample::Index>()) {
        let frame = compress(&data, 3).unwrap();
        let len = cut.index(frame.len());
        let truncated = matches!(decompress(&frame[..len]), Err(Error::TruncatedInput { .. }));
        prop_assert!(truncated, "cut at {} of {}", len, frame.len());
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(mut bytes in prop::collection::vec(any::<u8>(), 0..512), framed in any::<bool>()) {
        if framed && bytes.len() >= 4 {
            bytes[..4].copy_from_slice(&[0x28, 0xB5, 0x2F, 0xFD]);
        }
        let _ = decompress(&bytes);
    }
}
