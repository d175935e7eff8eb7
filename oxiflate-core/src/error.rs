//! Error types for OxiFlate operations.
//!
//! Every failure the codec can report is a variant of [`OxiflateError`]. The
//! variants fall into a small number of classes (see [`ErrorKind`]) so callers
//! can decide whether to retry with a bigger buffer, reject the input, or fix
//! their configuration without matching on every variant.

use std::io;
use thiserror::Error;

/// Broad class of an [`OxiflateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid engine configuration (e.g. an out-of-range level).
    Configuration,
    /// The caller-supplied output buffer was too small.
    Capacity,
    /// The compressed stream is structurally invalid.
    MalformedInput,
    /// A zlib/gzip wrapper was invalid or its checksum did not match.
    Container,
    /// I/O error from an underlying reader/writer.
    Io,
}

/// The main error type for OxiFlate operations.
#[derive(Debug, Error)]
pub enum OxiflateError {
    /// I/O error from underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Compression level outside the supported range.
    #[error("Invalid compression level {level}: must be in 0..={max}")]
    InvalidLevel {
        /// The rejected level.
        level: u32,
        /// Highest supported level.
        max: u32,
    },

    /// Output buffer too small to hold the result.
    #[error("Insufficient output space: buffer of {available} bytes is too small")]
    InsufficientSpace {
        /// Size of the buffer that was supplied.
        available: usize,
    },

    /// Decompression finished before filling the output buffer exactly.
    #[error("Short output: expected {expected} bytes, stream produced {actual}")]
    ShortOutput {
        /// Number of bytes the caller expected.
        expected: usize,
        /// Number of bytes actually produced.
        actual: usize,
    },

    /// Reserved block type (3) in a block header.
    #[error("Invalid block type at bit position {bit_position}")]
    InvalidBlockType {
        /// Bit position of the block header.
        bit_position: u64,
    },

    /// Stored block LEN does not match the complement of NLEN.
    #[error("Stored block length mismatch: LEN={len:#06x}, NLEN={nlen:#06x}")]
    StoredLengthMismatch {
        /// LEN field.
        len: u16,
        /// NLEN field.
        nlen: u16,
    },

    /// A set of code lengths does not describe a usable prefix code.
    #[error("Invalid code lengths: {message}")]
    InvalidCodeLengths {
        /// Description of the problem.
        message: String,
    },

    /// Invalid Huffman code encountered during decompression.
    #[error("Invalid Huffman code at bit position {bit_position}")]
    InvalidHuffmanCode {
        /// Bit position where the invalid code was found.
        bit_position: u64,
    },

    /// Invalid distance in an LZ77 back-reference.
    #[error("Invalid back-reference distance: {distance} exceeds history size {history_size}")]
    InvalidDistance {
        /// The invalid distance value.
        distance: usize,
        /// Number of bytes produced so far.
        history_size: usize,
    },

    /// The stream ended before a required field was complete.
    #[error("Unexpected end of stream at bit position {bit_position}")]
    UnexpectedEof {
        /// Bit position at which data ran out.
        bit_position: u64,
    },

    /// Invalid magic number in a container header.
    #[error("Invalid magic number: expected {expected:02x?}, found {found:02x?}")]
    InvalidMagic {
        /// Expected magic bytes.
        expected: Vec<u8>,
        /// Actual magic bytes found.
        found: Vec<u8>,
    },

    /// Unsupported compression method or container feature.
    #[error("Unsupported compression method: {method}")]
    UnsupportedMethod {
        /// The compression method identifier.
        method: String,
    },

    /// Invalid container header.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// Checksum stored in a container trailer does not match the data.
    #[error("Checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Expected checksum from the trailer.
        expected: u32,
        /// Checksum computed over the decompressed data.
        computed: u32,
    },

    /// Uncompressed size stored in a container trailer does not match the data.
    #[error("Size mismatch: trailer says {expected} bytes, decompressed {actual}")]
    SizeMismatch {
        /// Size recorded in the trailer (modulo 2^32 for gzip).
        expected: u64,
        /// Actual decompressed size.
        actual: u64,
    },
}

/// Result type alias for OxiFlate operations.
pub type Result<T> = std::result::Result<T, OxiflateError>;

impl OxiflateError {
    /// Create an invalid level error.
    pub fn invalid_level(level: u32, max: u32) -> Self {
        Self::InvalidLevel { level, max }
    }

    /// Create an insufficient space error.
    pub fn insufficient_space(available: usize) -> Self {
        Self::InsufficientSpace { available }
    }

    /// Create a short output error.
    pub fn short_output(expected: usize, actual: usize) -> Self {
        Self::ShortOutput { expected, actual }
    }

    /// Create an invalid block type error.
    pub fn invalid_block_type(bit_position: u64) -> Self {
        Self::InvalidBlockType { bit_position }
    }

    /// Create a stored length mismatch error.
    pub fn stored_length_mismatch(len: u16, nlen: u16) -> Self {
        Self::StoredLengthMismatch { len, nlen }
    }

    /// Create an invalid code lengths error.
    pub fn invalid_code_lengths(message: impl Into<String>) -> Self {
        Self::InvalidCodeLengths {
            message: message.into(),
        }
    }

    /// Create an invalid Huffman code error.
    pub fn invalid_huffman(bit_position: u64) -> Self {
        Self::InvalidHuffmanCode { bit_position }
    }

    /// Create an invalid distance error.
    pub fn invalid_distance(distance: usize, history_size: usize) -> Self {
        Self::InvalidDistance {
            distance,
            history_size,
        }
    }

    /// Create an unexpected EOF error.
    pub fn unexpected_eof(bit_position: u64) -> Self {
        Self::UnexpectedEof { bit_position }
    }

    /// Create an invalid magic error.
    pub fn invalid_magic(expected: impl Into<Vec<u8>>, found: impl Into<Vec<u8>>) -> Self {
        Self::InvalidMagic {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an unsupported method error.
    pub fn unsupported_method(method: impl Into<String>) -> Self {
        Self::UnsupportedMethod {
            method: method.into(),
        }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create a checksum mismatch error.
    pub fn checksum_mismatch(expected: u32, computed: u32) -> Self {
        Self::ChecksumMismatch { expected, computed }
    }

    /// Create a size mismatch error.
    pub fn size_mismatch(expected: u64, actual: u64) -> Self {
        Self::SizeMismatch { expected, actual }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidLevel { .. } => ErrorKind::Configuration,
            Self::InsufficientSpace { .. } | Self::ShortOutput { .. } => ErrorKind::Capacity,
            Self::InvalidBlockType { .. }
            | Self::StoredLengthMismatch { .. }
            | Self::InvalidCodeLengths { .. }
            | Self::InvalidHuffmanCode { .. }
            | Self::InvalidDistance { .. }
            | Self::UnexpectedEof { .. } => ErrorKind::MalformedInput,
            Self::InvalidMagic { .. }
            | Self::UnsupportedMethod { .. }
            | Self::InvalidHeader { .. }
            | Self::ChecksumMismatch { .. }
            | Self::SizeMismatch { .. } => ErrorKind::Container,
        }
    }

    /// True if the compressed input itself is invalid.
    pub fn is_malformed(&self) -> bool {
        self.kind() == ErrorKind::MalformedInput
    }

    /// True if retrying with a larger output buffer could succeed.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::InsufficientSpace { .. })
    }
}
