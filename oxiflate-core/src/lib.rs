//! # OxiFlate Core
//!
//! Shared building blocks for the OxiFlate DEFLATE codec:
//!
//! - [`bitstream`]: LSB-first bit reader/writer over in-memory buffers
//! - [`crc`]: CRC-32 (gzip trailer)
//! - [`adler`]: Adler-32 (zlib trailer)
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ CLI: oxiflate (gzip-style front end)                    │
//! ├─────────────────────────────────────────────────────────┤
//! │ Container: zlib, gzip framing                           │
//! ├─────────────────────────────────────────────────────────┤
//! │ Codec: DEFLATE compressor / decompressor engines        │
//! ├─────────────────────────────────────────────────────────┤
//! │ Primitives (this crate): BitReader/BitWriter, checksums │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use oxiflate_core::bitstream::BitReader;
//! use oxiflate_core::crc::Crc32;
//!
//! let data = [0xAB, 0xCD];
//! let mut reader = BitReader::new(&data);
//! assert_eq!(reader.read_bits(12).unwrap(), 0xDAB);
//!
//! assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod adler;
pub mod bitstream;
pub mod crc;
pub mod error;

// Re-exports for convenience
pub use adler::{Adler32, adler32};
pub use bitstream::{BitReader, BitWriter};
pub use crc::{Crc32, crc32};
pub use error::{ErrorKind, OxiflateError, Result};
