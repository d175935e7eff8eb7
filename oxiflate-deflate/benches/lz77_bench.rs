//! Benchmarks for LZ77 tokenization.
//!
//! Measures the match finder alone, without Huffman coding, for each parsing
//! strategy on random, repeated and text-like inputs.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxiflate_deflate::lz77::{Lz77Encoder, Lz77Token};
use std::hint::black_box;

mod test_data {
    /// Simple LCG random bytes
    pub fn random(size: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(size);
        let mut seed = 12345u32;
        for _ in 0..size {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            data.push((seed >> 16) as u8);
        }
        data
    }

    /// Highly compressible repeated pattern
    pub fn repeated(size: usize) -> Vec<u8> {
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789"
            .iter()
            .copied()
            .cycle()
            .take(size)
            .collect()
    }

    /// English-like text with word patterns
    pub fn text_like(size: usize) -> Vec<u8> {
        let words: &[&[u8]] = &[
            b"the", b"quick", b"brown", b"fox", b"jumps", b"over", b"lazy", b"dog", b"and",
            b"runs", b"through", b"forest", b"near", b"river", b"under", b"blue", b"sky", b"with",
            b"wind", b"blowing",
        ];
        let mut data = Vec::with_capacity(size);
        let mut seed = 42u32;
        while data.len() < size {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            data.extend_from_slice(words[(seed >> 16) as usize % words.len()]);
            data.push(b' ');
        }
        data.truncate(size);
        data
    }
}

/// Bytes covered by `tokens`; must equal the input length.
fn covered(tokens: &[Lz77Token]) -> usize {
    tokens
        .iter()
        .map(|t| match t {
            Lz77Token::Literal(_) => 1,
            Lz77Token::Match { length, .. } => *length as usize,
        })
        .sum()
}

fn bench_levels(c: &mut Criterion) {
    let inputs = [
        ("random", test_data::random(256 * 1024)),
        ("repeated", test_data::repeated(256 * 1024)),
        ("text", test_data::text_like(256 * 1024)),
    ];

    for (name, data) in &inputs {
        let mut group = c.benchmark_group(format!("lz77_{}", name));
        group.throughput(Throughput::Bytes(data.len() as u64));

        // greedy, lazy, lazy with two-step lookahead
        for level in [1u32, 6, 9] {
            let mut encoder = Lz77Encoder::with_level(level);
            assert_eq!(covered(&encoder.compress(data)), data.len());

            group.bench_with_input(BenchmarkId::from_parameter(level), data, |b, data| {
                b.iter(|| encoder.compress(black_box(data)));
            });
        }

        group.finish();
    }
}

criterion_group!(benches, bench_levels);
criterion_main!(benches);
