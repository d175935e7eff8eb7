//! Edge case tests for DEFLATE compression.

use oxiflate_deflate::{Deflater, Inflater, deflate, deflate_into, inflate, inflate_into};

fn lcg_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            (state >> 16) as u8
        })
        .collect()
}

#[test]
fn test_single_byte() {
    for level in 0..=12 {
        let compressed = deflate(b"A", level).unwrap();
        assert_eq!(inflate(&compressed).unwrap(), b"A", "level {}", level);
    }
}

#[test]
fn test_all_zeros() {
    let input = vec![0u8; 1000];
    let compressed = deflate(&input, 6).unwrap();
    let decompressed = inflate(&compressed).unwrap();
    assert_eq!(decompressed, input);
    // All zeros should compress very well
    assert!(compressed.len() < input.len() / 10);
}

#[test]
fn test_all_same_byte() {
    let input = vec![255u8; 5000];
    let compressed = deflate(&input, 6).unwrap();
    let decompressed = inflate(&compressed).unwrap();
    assert_eq!(decompressed, input);
    assert!(compressed.len() < input.len() / 20);
}

#[test]
fn test_max_match_length() {
    let pattern = vec![42u8; 258];
    let mut input = Vec::new();
    for _ in 0..10 {
        input.extend_from_slice(&pattern);
    }

    let compressed = deflate(&input, 9).unwrap();
    let decompressed = inflate(&compressed).unwrap();
    assert_eq!(decompressed, input);
}

#[test]
fn test_random_literals() {
    for seed in [1, 7, 99, 12345] {
        let input = lcg_bytes(3000, seed);
        for level in [1, 4, 6, 9, 11] {
            let compressed = deflate(&input, level).unwrap();
            assert_eq!(inflate(&compressed).unwrap(), input, "seed {} level {}", seed, level);
        }
    }
}

#[test]
fn test_alternating_pattern() {
    let input: Vec<u8> = (0..1000).map(|i| if i % 2 == 0 { b'A' } else { b'B' }).collect();

    let compressed = deflate(&input, 6).unwrap();
    let decompressed = inflate(&compressed).unwrap();
    assert_eq!(decompressed, input);
}

#[test]
fn test_incremental_pattern() {
    let mut input = Vec::new();
    for i in 0..256 {
        for _ in 0..10 {
            input.push(i as u8);
        }
    }

    for level in [1, 6, 12] {
        let compressed = deflate(&input, level).unwrap();
        assert_eq!(inflate(&compressed).unwrap(), input);
    }
}

#[test]
fn test_utf8_text() {
    let input = "Grüße aus Köln! 東京タワー 🚀 - ünïcödé text repeats: Grüße aus Köln! 東京タワー 🚀"
        .repeat(20)
        .into_bytes();
    for level in [2, 7, 10] {
        let compressed = deflate(&input, level).unwrap();
        assert!(compressed.len() < input.len() / 4);
        assert_eq!(inflate(&compressed).unwrap(), input);
    }
}

#[test]
fn test_binary_data() {
    let input: Vec<u8> = (0..=255).cycle().take(5000).collect();

    let compressed = deflate(&input, 6).unwrap();
    let decompressed = inflate(&compressed).unwrap();
    assert_eq!(decompressed, input);
}

#[test]
fn test_long_distance_match() {
    // Match at the maximum distance (32KB)
    let mut input = lcg_bytes(32768 + 64, 5);
    let pattern = input[..64].to_vec();
    input[32768..].copy_from_slice(&pattern);

    for level in [1, 6, 9, 12] {
        let compressed = deflate(&input, level).unwrap();
        assert_eq!(inflate(&compressed).unwrap(), input);
    }
}

#[test]
fn test_block_boundaries_between_stored_and_huffman() {
    // Noise, text, noise: the splitter should put the text in its own block
    let mut input = lcg_bytes(40_000, 3);
    input.extend(b"stored blocks and huffman blocks side by side. ".repeat(1000));
    input.extend(lcg_bytes(40_000, 4));

    for level in [2, 6, 10] {
        let compressed = deflate(&input, level).unwrap();
        assert!(compressed.len() < 90_000);
        assert_eq!(inflate(&compressed).unwrap(), input);
    }
}

#[test]
fn test_buffer_api_exact_sizes() {
    let input = b"exact sized buffers everywhere, exact sized buffers".repeat(4);
    let mut compressed = vec![0u8; Deflater::compress_bound(input.len())];
    let n = deflate_into(&input, &mut compressed, 8).unwrap();

    let mut out = vec![0u8; input.len()];
    assert_eq!(inflate_into(&compressed[..n], &mut out).unwrap(), input.len());
    assert_eq!(out, input);

    let mut bigger = vec![0u8; input.len() + 10];
    let err = Inflater::new()
        .decompress_exact(&compressed[..n], &mut bigger)
        .unwrap_err();
    assert!(!err.is_capacity());
    assert!(!err.is_malformed());
}

#[test]
fn test_inflater_reuse_across_streams() {
    let mut inflater = Inflater::new();
    let a = deflate(&lcg_bytes(5000, 1), 12).unwrap();
    let b = deflate(b"second stream, fixed codes", 1).unwrap();
    let mut out = vec![0u8; 5000];
    assert_eq!(inflater.decompress(&a, &mut out).unwrap(), 5000);
    assert_eq!(inflater.decompress(&b, &mut out).unwrap(), 26);
    assert_eq!(&out[..26], b"second stream, fixed codes");
}
