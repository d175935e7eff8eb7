//! # OxiFlate Deflate
//!
//! Pure Rust implementation of the DEFLATE compression algorithm (RFC 1951)
//! with zlib (RFC 1950) and gzip (RFC 1952) framing.
//!
//! Both engines work on caller-supplied buffers: the compressor writes into
//! an output slice and reports `InsufficientSpace` when it is too small, and
//! the decompressor never writes past the slice it is given.
//!
//! ## Features
//!
//! - **Decompression**: all DEFLATE block types
//!   - Stored (uncompressed) blocks
//!   - Fixed Huffman codes
//!   - Dynamic Huffman codes
//! - **Compression**: LZ77 + Huffman encoding
//!   - Levels 0-12 (greedy, lazy and near-optimal parsing)
//!   - Per-block choice of stored, fixed or dynamic encoding
//!   - Statistical block splitting
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_deflate::{deflate, inflate};
//!
//! // Compress data
//! let original = b"Hello, World! Hello, World!";
//! let compressed = deflate(original, 6).unwrap();
//!
//! // Decompress data
//! let decompressed = inflate(&compressed).unwrap();
//! assert_eq!(&decompressed, original);
//! ```
//!
//! ## Compression Levels
//!
//! - Level 0: No compression (stored blocks)
//! - Level 1-4: Greedy parsing
//! - Level 5-9: Lazy parsing (default is 6)
//! - Level 10-12: Near-optimal parsing (slowest, smallest)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod accel;
pub mod block;
pub mod deflate;
pub mod gzip;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod optimal;
pub mod tables;
pub mod zlib;

// Re-exports
pub use accel::Accel;
pub use block::BlockType;
pub use deflate::{DEFAULT_LEVEL, Deflater, deflate, deflate_into};
pub use gzip::{
    GzipHeader, GzipWriter, gzip_compress, gzip_compress_into, gzip_decompress,
    gzip_decompress_into,
};
pub use huffman::{HuffmanBuilder, HuffmanCode, HuffmanTree};
pub use inflate::{Inflater, inflate, inflate_into};
pub use lz77::{LevelParams, Lz77Encoder, Lz77Token, Strategy};
pub use zlib::{zlib_compress, zlib_compress_into, zlib_decompress, zlib_decompress_into};
