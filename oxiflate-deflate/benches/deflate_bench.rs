//! End-to-end DEFLATE throughput.
//!
//! Compression at representative levels, decompression with every
//! acceleration variant the CPU supports, and the gzip wrapper.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxiflate_deflate::{Accel, Deflater, Inflater, gzip_compress, gzip_decompress};
use std::hint::black_box;

/// Log-like text interleaved with short runs of noise.
fn mixed(size: usize) -> Vec<u8> {
    let lines: &[&[u8]] = &[
        b"GET /index.html 200 1043\n",
        b"GET /style.css 304 0\n",
        b"POST /api/login 401 87\n",
        b"GET /images/logo.png 200 20931\n",
    ];
    let mut data = Vec::with_capacity(size);
    let mut seed = 7u32;
    while data.len() < size {
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        data.extend_from_slice(lines[(seed >> 28) as usize % lines.len()]);
        if seed & 0xF == 0 {
            data.extend_from_slice(&seed.to_le_bytes());
        }
    }
    data.truncate(size);
    data
}

const SIZE: usize = 1024 * 1024;

fn bench_compress(c: &mut Criterion) {
    let data = mixed(SIZE);
    let mut group = c.benchmark_group("deflate_compress");
    group.throughput(Throughput::Bytes(SIZE as u64));
    group.sample_size(10);

    for level in [1u32, 4, 6, 9, 12] {
        let mut deflater = Deflater::new(level).expect("valid level");
        let mut output = vec![0u8; Deflater::compress_bound(SIZE)];
        group.bench_with_input(BenchmarkId::from_parameter(level), &data, |b, data| {
            b.iter(|| deflater.compress(black_box(data), &mut output).expect("fits"));
        });
    }

    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let data = mixed(SIZE);
    let compressed = Deflater::new(6)
        .and_then(|mut d| d.compress_to_vec(&data))
        .expect("compress");
    let mut group = c.benchmark_group("deflate_decompress");
    group.throughput(Throughput::Bytes(SIZE as u64));

    for accel in Accel::available() {
        let mut inflater = Inflater::with_accel(accel);
        let mut output = vec![0u8; SIZE];
        group.bench_with_input(
            BenchmarkId::from_parameter(accel.name()),
            &compressed,
            |b, compressed| {
                b.iter(|| {
                    inflater
                        .decompress(black_box(compressed), &mut output)
                        .expect("valid stream")
                });
            },
        );
    }

    group.finish();
}

fn bench_gzip(c: &mut Criterion) {
    let data = mixed(256 * 1024);
    let compressed = gzip_compress(&data, 6).expect("compress");
    let mut group = c.benchmark_group("gzip");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("compress_6", |b| {
        b.iter(|| gzip_compress(black_box(&data), 6).expect("compress"));
    });
    group.bench_function("decompress", |b| {
        b.iter(|| gzip_decompress(black_box(&compressed)).expect("decompress"));
    });

    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress, bench_gzip);
criterion_main!(benches);
