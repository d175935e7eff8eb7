//! Zlib format wrapper for DEFLATE compression.
//!
//! The zlib format (RFC 1950) wraps raw DEFLATE data with a header and
//! an Adler-32 checksum. It is widely used in PNG, HTTP compression, and
//! many other applications.
//!
//! # Format
//!
//! ```text
//! +---+---+============+---+---+---+---+
//! |CMF|FLG| compressed |    ADLER32    |
//! +---+---+============+---+---+---+---+
//! ```
//!
//! - CMF: Compression Method and Flags
//!   - Bits 0-3: CM (Compression Method) - must be 8 for DEFLATE
//!   - Bits 4-7: CINFO (Compression Info) - log2(window size) - 8
//! - FLG: Flags
//!   - Bits 0-4: FCHECK - check bits so (CMF*256 + FLG) mod 31 == 0
//!   - Bit 5: FDICT - preset dictionary present (not supported)
//!   - Bits 6-7: FLEVEL - compression level (0-3)
//! - Compressed data (DEFLATE format)
//! - ADLER32: Adler-32 checksum of uncompressed data (big-endian)

use crate::deflate::Deflater;
use crate::inflate::Inflater;
use oxiflate_core::adler32;
use oxiflate_core::error::{OxiflateError, Result};

/// Header plus trailer size.
const ZLIB_OVERHEAD: usize = 6;

/// CM=8 (DEFLATE), CINFO=7 (32KB window).
const CMF: u8 = 0x78;

/// Zlib compression level indicator in header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ZlibLevel {
    /// Fastest compression.
    Fastest = 0,
    /// Fast compression.
    Fast = 1,
    /// Default compression.
    Default = 2,
    /// Maximum compression.
    Maximum = 3,
}

impl ZlibLevel {
    /// Header indicator for a compression level (0-12).
    pub fn from_level(level: u32) -> Self {
        match level {
            0..=1 => Self::Fastest,
            2..=5 => Self::Fast,
            6 => Self::Default,
            _ => Self::Maximum,
        }
    }
}

/// The two header bytes for `level`.
fn header(level: u32) -> [u8; 2] {
    let flg = (ZlibLevel::from_level(level) as u8) << 6;
    let remainder = (CMF as u16 * 256 + flg as u16) % 31;
    let fcheck = ((31 - remainder) % 31) as u8;
    [CMF, flg | fcheck]
}

/// Validate a zlib header.
fn check_header(input: &[u8]) -> Result<()> {
    let [cmf, flg] = match input {
        [cmf, flg, ..] => [*cmf, *flg],
        _ => return Err(OxiflateError::invalid_header("zlib data too short")),
    };

    if (cmf as u16 * 256 + flg as u16) % 31 != 0 {
        return Err(OxiflateError::invalid_header("zlib header check bits mismatch"));
    }
    let cm = cmf & 0x0F;
    if cm != 8 {
        return Err(OxiflateError::unsupported_method(format!(
            "zlib compression method {}",
            cm
        )));
    }
    if cmf >> 4 > 7 {
        return Err(OxiflateError::invalid_header(format!(
            "zlib window size 2^{} exceeds 32KB",
            (cmf >> 4) + 8
        )));
    }
    if flg & 0x20 != 0 {
        return Err(OxiflateError::unsupported_method("zlib preset dictionary"));
    }
    Ok(())
}

/// Verify the Adler-32 trailer following `consumed` bytes of DEFLATE data.
fn check_trailer(body: &[u8], consumed: usize, data: &[u8]) -> Result<()> {
    let trailer = body
        .get(consumed..consumed + 4)
        .ok_or_else(|| OxiflateError::invalid_header("missing Adler-32 trailer"))?;
    let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let computed = adler32(1, data);
    if expected != computed {
        return Err(OxiflateError::checksum_mismatch(expected, computed));
    }
    Ok(())
}

/// Compress data into a caller-supplied buffer using zlib format.
///
/// Returns the number of bytes written.
pub fn zlib_compress_into(input: &[u8], output: &mut [u8], level: u32) -> Result<usize> {
    let mut deflater = Deflater::new(level)?;
    if output.len() < ZLIB_OVERHEAD {
        return Err(OxiflateError::insufficient_space(output.len()));
    }

    let body_end = output.len() - 4;
    let len = deflater
        .compress(input, &mut output[2..body_end])
        .map_err(|e| match e {
            OxiflateError::InsufficientSpace { .. } => {
                OxiflateError::insufficient_space(output.len())
            }
            other => other,
        })?;

    output[..2].copy_from_slice(&header(level));
    output[2 + len..2 + len + 4].copy_from_slice(&adler32(1, input).to_be_bytes());
    Ok(len + ZLIB_OVERHEAD)
}

/// Compress data using zlib format.
///
/// # Example
///
/// ```
/// use oxiflate_deflate::zlib::{zlib_compress, zlib_decompress};
///
/// let data = b"Hello, World! Hello, World!";
/// let compressed = zlib_compress(data, 6).unwrap();
/// let decompressed = zlib_decompress(&compressed).unwrap();
/// assert_eq!(decompressed, data);
/// ```
pub fn zlib_compress(input: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut output = vec![0u8; Deflater::compress_bound(input.len()) + ZLIB_OVERHEAD];
    let len = zlib_compress_into(input, &mut output, level)?;
    output.truncate(len);
    Ok(output)
}

/// Decompress zlib data into a caller-supplied buffer.
///
/// Returns the number of bytes written.
pub fn zlib_decompress_into(input: &[u8], output: &mut [u8]) -> Result<usize> {
    check_header(input)?;
    let body = &input[2..];
    let (consumed, written) = Inflater::new().decompress_ex(body, output)?;
    check_trailer(body, consumed, &output[..written])?;
    Ok(written)
}

/// Decompress zlib format data.
pub fn zlib_decompress(input: &[u8]) -> Result<Vec<u8>> {
    check_header(input)?;
    let body = &input[2..];
    let (output, consumed) = Inflater::new().decompress_to_vec(body, body.len().saturating_mul(4))?;
    check_trailer(body, consumed, &output)?;
    Ok(output)
}
