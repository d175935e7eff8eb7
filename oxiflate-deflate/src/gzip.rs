//! GZIP header parsing and writing.
//!
//! A gzip file (RFC 1952) is one or more members, each a header, a raw
//! DEFLATE body and an 8-byte trailer:
//!
//! ```text
//! +---+---+---+---+---+---+---+---+---+---+========//========+
//! |ID1|ID2|CM |FLG|     MTIME     |XFL|OS | optional fields  |
//! +---+---+---+---+---+---+---+---+---+---+========//========+
//! +=======================+---+---+---+---+---+---+---+---+
//! | compressed blocks     |     CRC32     |     ISIZE     |
//! +=======================+---+---+---+---+---+---+---+---+
//! ```
//!
//! Optional fields appear in the order FEXTRA, FNAME, FCOMMENT, FHCRC.
//! ISIZE is the uncompressed length modulo 2^32.

use crate::deflate::Deflater;
use crate::inflate::Inflater;
use oxiflate_core::crc::{Crc32, crc32};
use oxiflate_core::error::{OxiflateError, Result};

/// GZIP magic bytes.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// GZIP compression method: DEFLATE.
pub const CM_DEFLATE: u8 = 8;

/// Operating system byte written by this crate ("unknown").
pub const OS_UNKNOWN: u8 = 255;

const FIXED_HEADER_SIZE: usize = 10;
const TRAILER_SIZE: usize = 8;

/// GZIP header flags.
pub mod flags {
    /// Text file.
    pub const FTEXT: u8 = 0x01;
    /// Header CRC present.
    pub const FHCRC: u8 = 0x02;
    /// Extra field present.
    pub const FEXTRA: u8 = 0x04;
    /// Original filename present.
    pub const FNAME: u8 = 0x08;
    /// Comment present.
    pub const FCOMMENT: u8 = 0x10;
    /// Bits that must be zero.
    pub const RESERVED: u8 = 0xE0;
}

/// XFL byte for a compression level.
pub fn xfl_for_level(level: u32) -> u8 {
    match level {
        0..=1 => 4,
        2..=7 => 0,
        _ => 2,
    }
}

/// GZIP member header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipHeader {
    /// Compression method (should be 8 for DEFLATE).
    pub method: u8,
    /// Flag byte. FEXTRA, FNAME and FCOMMENT are derived from the optional
    /// fields when writing; FTEXT and FHCRC are taken from here.
    pub flags: u8,
    /// Modification time (Unix timestamp, 0 if unknown).
    pub mtime: u32,
    /// Extra flags.
    pub xfl: u8,
    /// Operating system.
    pub os: u8,
    /// Extra field (FEXTRA).
    pub extra: Option<Vec<u8>>,
    /// Original filename (FNAME).
    pub filename: Option<String>,
    /// Comment (FCOMMENT).
    pub comment: Option<String>,
    /// Header CRC16 as read from the stream (FHCRC).
    pub header_crc: Option<u16>,
}

impl Default for GzipHeader {
    fn default() -> Self {
        Self {
            method: CM_DEFLATE,
            flags: 0,
            mtime: 0,
            xfl: 0,
            os: OS_UNKNOWN,
            extra: None,
            filename: None,
            comment: None,
            header_crc: None,
        }
    }
}

impl GzipHeader {
    /// Create a new GZIP header with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a header with filename.
    pub fn with_filename(filename: &str) -> Self {
        Self {
            flags: flags::FNAME,
            filename: Some(filename.to_string()),
            ..Self::default()
        }
    }

    /// Set the modification time.
    pub fn with_mtime(mut self, mtime: u32) -> Self {
        self.mtime = mtime;
        self
    }

    /// Set the comment field.
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    /// Request a CRC16 over the header bytes.
    pub fn with_header_crc(mut self) -> Self {
        self.flags |= flags::FHCRC;
        self
    }

    fn flag_byte(&self) -> u8 {
        let mut flg = self.flags & (flags::FTEXT | flags::FHCRC);
        if self.extra.is_some() {
            flg |= flags::FEXTRA;
        }
        if self.filename.is_some() {
            flg |= flags::FNAME;
        }
        if self.comment.is_some() {
            flg |= flags::FCOMMENT;
        }
        flg
    }

    /// Number of bytes [`write_to`](Self::write_to) produces.
    pub fn encoded_len(&self) -> usize {
        let mut len = FIXED_HEADER_SIZE;
        if let Some(extra) = &self.extra {
            len += 2 + extra.len();
        }
        if let Some(name) = &self.filename {
            len += name.len() + 1;
        }
        if let Some(comment) = &self.comment {
            len += comment.len() + 1;
        }
        if self.flags & flags::FHCRC != 0 {
            len += 2;
        }
        len
    }

    /// Write the header to the start of `output`.
    ///
    /// Returns the number of bytes written.
    pub fn write_to(&self, output: &mut [u8]) -> Result<usize> {
        let extra_len = match &self.extra {
            Some(extra) => u16::try_from(extra.len()).map_err(|_| {
                OxiflateError::invalid_header("gzip extra field exceeds 65535 bytes")
            })?,
            None => 0,
        };
        for text in [&self.filename, &self.comment].into_iter().flatten() {
            if text.as_bytes().contains(&0) {
                return Err(OxiflateError::invalid_header(
                    "gzip filename or comment contains NUL",
                ));
            }
        }

        let len = self.encoded_len();
        let available = output.len();
        let out = output
            .get_mut(..len)
            .ok_or_else(|| OxiflateError::insufficient_space(available))?;

        out[..2].copy_from_slice(&GZIP_MAGIC);
        out[2] = self.method;
        out[3] = self.flag_byte();
        out[4..8].copy_from_slice(&self.mtime.to_le_bytes());
        out[8] = self.xfl;
        out[9] = self.os;

        let mut pos = FIXED_HEADER_SIZE;
        if let Some(extra) = &self.extra {
            out[pos..pos + 2].copy_from_slice(&extra_len.to_le_bytes());
            pos += 2;
            out[pos..pos + extra.len()].copy_from_slice(extra);
            pos += extra.len();
        }
        for text in [&self.filename, &self.comment].into_iter().flatten() {
            out[pos..pos + text.len()].copy_from_slice(text.as_bytes());
            pos += text.len();
            out[pos] = 0;
            pos += 1;
        }
        if self.flags & flags::FHCRC != 0 {
            let crc = Crc32::compute(&out[..pos]) as u16;
            out[pos..pos + 2].copy_from_slice(&crc.to_le_bytes());
        }

        Ok(len)
    }

    /// Parse a GZIP header from the start of `input`.
    ///
    /// Returns the header and its length in bytes.
    pub fn parse(input: &[u8]) -> Result<(Self, usize)> {
        if input.get(..2) != Some(&GZIP_MAGIC[..]) {
            return Err(OxiflateError::invalid_magic(
                GZIP_MAGIC.to_vec(),
                input[..input.len().min(2)].to_vec(),
            ));
        }
        let fixed = input.get(..FIXED_HEADER_SIZE).ok_or_else(truncated)?;

        let method = fixed[2];
        if method != CM_DEFLATE {
            return Err(OxiflateError::unsupported_method(format!(
                "GZIP method {}",
                method
            )));
        }

        let flags = fixed[3];
        if flags & flags::RESERVED != 0 {
            return Err(OxiflateError::invalid_header(format!(
                "reserved gzip flag bits set: {:#04x}",
                flags
            )));
        }
        let mtime = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
        let xfl = fixed[8];
        let os = fixed[9];

        let mut pos = FIXED_HEADER_SIZE;

        let extra = if flags & flags::FEXTRA != 0 {
            let xlen = read_u16(input, pos)? as usize;
            pos += 2;
            let field = input.get(pos..pos + xlen).ok_or_else(truncated)?;
            pos += xlen;
            Some(field.to_vec())
        } else {
            None
        };

        let filename = if flags & flags::FNAME != 0 {
            Some(read_null_terminated(input, &mut pos)?)
        } else {
            None
        };

        let comment = if flags & flags::FCOMMENT != 0 {
            Some(read_null_terminated(input, &mut pos)?)
        } else {
            None
        };

        let header_crc = if flags & flags::FHCRC != 0 {
            let stored = read_u16(input, pos)?;
            let computed = Crc32::compute(&input[..pos]) as u16;
            if stored != computed {
                return Err(OxiflateError::checksum_mismatch(stored as u32, computed as u32));
            }
            pos += 2;
            Some(stored)
        } else {
            None
        };

        let header = Self {
            method,
            flags,
            mtime,
            xfl,
            os,
            extra,
            filename,
            comment,
            header_crc,
        };
        Ok((header, pos))
    }
}

fn truncated() -> OxiflateError {
    OxiflateError::invalid_header("truncated gzip header")
}

fn read_u16(input: &[u8], pos: usize) -> Result<u16> {
    let bytes = input.get(pos..pos + 2).ok_or_else(truncated)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_null_terminated(input: &[u8], pos: &mut usize) -> Result<String> {
    let rest = input.get(*pos..).ok_or_else(truncated)?;
    let nul = rest.iter().position(|&b| b == 0).ok_or_else(truncated)?;
    *pos += nul + 1;
    Ok(String::from_utf8_lossy(&rest[..nul]).into_owned())
}

/// Check a member trailer against the decompressed data.
fn check_trailer(trailer: &[u8], data: &[u8]) -> Result<()> {
    let expected_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let expected_size = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);

    let computed = crc32(0, data);
    if computed != expected_crc {
        return Err(OxiflateError::checksum_mismatch(expected_crc, computed));
    }
    if data.len() as u32 != expected_size {
        return Err(OxiflateError::size_mismatch(
            expected_size as u64,
            data.len() as u64,
        ));
    }
    Ok(())
}

fn member_trailer(input: &[u8], pos: usize) -> Result<&[u8]> {
    input
        .get(pos..pos + TRAILER_SIZE)
        .ok_or_else(|| OxiflateError::invalid_header("missing gzip trailer"))
}

/// GZIP writer that compresses data.
#[derive(Debug, Clone)]
pub struct GzipWriter {
    /// Header to use.
    header: GzipHeader,
    /// Compression level (0-12).
    level: u32,
}

impl GzipWriter {
    /// Create a new GZIP writer with default settings.
    pub fn new() -> Self {
        Self::with_header(GzipHeader::new())
    }

    /// Create a writer with a specific header.
    pub fn with_header(header: GzipHeader) -> Self {
        Self { header, level: 6 }
    }

    /// Set compression level (0-12); the header's XFL follows it.
    ///
    /// Out-of-range levels are reported when compressing.
    pub fn level(mut self, level: u32) -> Self {
        self.level = level;
        self.header.xfl = xfl_for_level(level);
        self
    }

    /// Upper bound on the member size for `input_len` bytes of data.
    pub fn compress_bound(&self, input_len: usize) -> usize {
        self.header.encoded_len() + Deflater::compress_bound(input_len) + TRAILER_SIZE
    }

    /// Compress data into `output` as one gzip member.
    ///
    /// Returns the number of bytes written.
    pub fn compress_into(&self, data: &[u8], output: &mut [u8]) -> Result<usize> {
        let mut deflater = Deflater::new(self.level)?;
        let available = output.len();
        let header_len = self.header.write_to(output)?;
        if available < header_len + TRAILER_SIZE {
            return Err(OxiflateError::insufficient_space(available));
        }

        let body_end = available - TRAILER_SIZE;
        let body_len = deflater
            .compress(data, &mut output[header_len..body_end])
            .map_err(|e| match e {
                OxiflateError::InsufficientSpace { .. } => {
                    OxiflateError::insufficient_space(available)
                }
                other => other,
            })?;

        let pos = header_len + body_len;
        output[pos..pos + 4].copy_from_slice(&crc32(0, data).to_le_bytes());
        output[pos + 4..pos + 8].copy_from_slice(&(data.len() as u32).to_le_bytes());
        Ok(pos + TRAILER_SIZE)
    }

    /// Compress data and return as Vec.
    pub fn compress_to_vec(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut output = vec![0u8; self.compress_bound(data.len())];
        let len = self.compress_into(data, &mut output)?;
        output.truncate(len);
        Ok(output)
    }
}

impl Default for GzipWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Compress data to a single GZIP member.
///
/// # Example
///
/// ```
/// use oxiflate_deflate::gzip::{gzip_compress, gzip_decompress};
///
/// let data = b"Hello, GZIP World!";
/// let compressed = gzip_compress(data, 6).unwrap();
/// assert_eq!(&compressed[..2], &[0x1F, 0x8B]);
/// assert_eq!(gzip_decompress(&compressed).unwrap(), data);
/// ```
pub fn gzip_compress(input: &[u8], level: u32) -> Result<Vec<u8>> {
    GzipWriter::new().level(level).compress_to_vec(input)
}

/// Compress data to a single GZIP member in a caller-supplied buffer.
pub fn gzip_compress_into(input: &[u8], output: &mut [u8], level: u32) -> Result<usize> {
    GzipWriter::new().level(level).compress_into(input, output)
}

/// Decompress all members of a GZIP stream.
///
/// Every member's CRC-32 and ISIZE are verified. Bytes after the last
/// member must start another member.
pub fn gzip_decompress(input: &[u8]) -> Result<Vec<u8>> {
    if input.is_empty() {
        return Err(OxiflateError::invalid_magic(GZIP_MAGIC.to_vec(), Vec::new()));
    }

    let mut inflater = Inflater::new();
    let mut output = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let (_, header_len) = GzipHeader::parse(&input[pos..])?;
        let body = &input[pos + header_len..];

        // The final ISIZE is exact for single-member files.
        let hint = match input.len().checked_sub(4) {
            Some(at) if output.is_empty() => {
                let size_field = [input[at], input[at + 1], input[at + 2], input[at + 3]];
                u32::from_le_bytes(size_field) as usize
            }
            _ => body.len().saturating_mul(4),
        };
        let (data, consumed) = inflater.decompress_to_vec(body, hint)?;
        let trailer = member_trailer(body, consumed)?;
        check_trailer(trailer, &data)?;

        if output.is_empty() {
            output = data;
        } else {
            output.extend_from_slice(&data);
        }
        pos += header_len + consumed + TRAILER_SIZE;
    }

    Ok(output)
}

/// Decompress all members of a GZIP stream into a caller-supplied buffer.
///
/// Returns the number of bytes written.
pub fn gzip_decompress_into(input: &[u8], output: &mut [u8]) -> Result<usize> {
    if input.is_empty() {
        return Err(OxiflateError::invalid_magic(GZIP_MAGIC.to_vec(), Vec::new()));
    }

    let mut inflater = Inflater::new();
    let mut pos = 0;
    let mut written = 0;

    while pos < input.len() {
        let (_, header_len) = GzipHeader::parse(&input[pos..])?;
        let body = &input[pos + header_len..];
        let (consumed, n) = inflater.decompress_ex(body, &mut output[written..])?;
        let trailer = member_trailer(body, consumed)?;
        check_trailer(trailer, &output[written..written + n])?;
        written += n;
        pos += header_len + consumed + TRAILER_SIZE;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxiflate_core::ErrorKind;

    #[test]
    fn test_gzip_header_default() {
        let header = GzipHeader::new();
        assert_eq!(header.method, CM_DEFLATE);
        assert_eq!(header.flags, 0);
        assert_eq!(header.os, OS_UNKNOWN);
        assert_eq!(header.encoded_len(), 10);
    }

    #[test]
    fn test_gzip_fixed_header_bytes() {
        let compressed = gzip_compress(b"abc", 1).unwrap();
        assert_eq!(&compressed[..10], &[0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 4, 255]);

        let compressed = gzip_compress(b"abc", 9).unwrap();
        assert_eq!(compressed[8], 2);
        let compressed = gzip_compress(b"abc", 6).unwrap();
        assert_eq!(compressed[8], 0);
    }

    #[test]
    fn test_gzip_empty_layout() {
        let compressed = gzip_compress(b"", 6).unwrap();
        assert_eq!(compressed.len(), 10 + 2 + 8);
        assert_eq!(&compressed[10..12], &[0x03, 0x00]);
        assert_eq!(&compressed[12..], &[0u8; 8]);
        assert!(gzip_decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_gzip_roundtrip_with_optional_fields() {
        let original = b"Test data with filename, comment and extra field";
        let mut header = GzipHeader::with_filename("data.txt")
            .with_mtime(1_700_000_000)
            .with_comment("made by a test")
            .with_header_crc();
        header.extra = Some(vec![b'A', b'P', 2, 0, 0xAA, 0xBB]);

        let compressed = GzipWriter::with_header(header.clone())
            .level(6)
            .compress_to_vec(original)
            .unwrap();

        let (parsed, len) = GzipHeader::parse(&compressed).unwrap();
        assert_eq!(len, header.encoded_len());
        assert_eq!(parsed.filename.as_deref(), Some("data.txt"));
        assert_eq!(parsed.comment.as_deref(), Some("made by a test"));
        assert_eq!(parsed.extra, header.extra);
        assert_eq!(parsed.mtime, 1_700_000_000);
        assert!(parsed.header_crc.is_some());
        assert_eq!(
            parsed.flags,
            flags::FHCRC | flags::FEXTRA | flags::FNAME | flags::FCOMMENT
        );

        assert_eq!(gzip_decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_gzip_header_crc_mismatch() {
        let compressed = GzipWriter::with_header(GzipHeader::new().with_header_crc())
            .compress_to_vec(b"x")
            .unwrap();
        let mut bad = compressed.clone();
        bad[4] ^= 1;
        let err = gzip_decompress(&bad).unwrap_err();
        assert!(matches!(err, OxiflateError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_gzip_repeated() {
        let original = vec![b'A'; 10000];
        let compressed = gzip_compress(&original, 9).unwrap();
        assert!(compressed.len() < original.len() / 10);
        assert_eq!(gzip_decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_gzip_multi_member() {
        let mut stream = gzip_compress(b"first member, ", 6).unwrap();
        stream.extend(gzip_compress(b"", 0).unwrap());
        stream.extend(gzip_compress(b"second member", 12).unwrap());

        assert_eq!(gzip_decompress(&stream).unwrap(), b"first member, second member");

        let mut out = vec![0u8; 27];
        assert_eq!(gzip_decompress_into(&stream, &mut out).unwrap(), 27);
        assert_eq!(&out, b"first member, second member");
    }

    #[test]
    fn test_gzip_trailer_checks() {
        let data = b"checked by crc and size";
        let compressed = gzip_compress(data, 6).unwrap();
        let len = compressed.len();

        let mut bad_crc = compressed.clone();
        bad_crc[len - 8] ^= 0x01;
        let err = gzip_decompress(&bad_crc).unwrap_err();
        assert!(matches!(err, OxiflateError::ChecksumMismatch { .. }));
        assert_eq!(err.kind(), ErrorKind::Container);

        let mut bad_size = compressed.clone();
        bad_size[len - 4] ^= 0x01;
        let err = gzip_decompress(&bad_size).unwrap_err();
        assert!(matches!(err, OxiflateError::SizeMismatch { .. }));

        assert!(gzip_decompress(&compressed[..len - 3]).is_err());
    }

    #[test]
    fn test_gzip_bad_magic_and_method() {
        let err = gzip_decompress(b"PK\x03\x04").unwrap_err();
        assert!(matches!(err, OxiflateError::InvalidMagic { .. }));
        assert!(gzip_decompress(b"").is_err());

        let mut compressed = gzip_compress(b"abc", 6).unwrap();
        compressed[2] = 7;
        assert!(matches!(
            gzip_decompress(&compressed).unwrap_err(),
            OxiflateError::UnsupportedMethod { .. }
        ));

        let mut compressed = gzip_compress(b"abc", 6).unwrap();
        compressed[3] = 0x20;
        assert!(matches!(
            gzip_decompress(&compressed).unwrap_err(),
            OxiflateError::InvalidHeader { .. }
        ));
    }

    #[test]
    fn test_gzip_trailing_garbage_rejected() {
        let mut compressed = gzip_compress(b"abc", 6).unwrap();
        compressed.extend_from_slice(b"junk");
        assert!(matches!(
            gzip_decompress(&compressed).unwrap_err(),
            OxiflateError::InvalidMagic { .. }
        ));
    }

    #[test]
    fn test_gzip_compress_into_capacity() {
        let data = vec![7u8; 1000];
        let mut small = [0u8; 12];
        assert!(gzip_compress_into(&data, &mut small, 6).unwrap_err().is_capacity());
        assert!(matches!(
            gzip_compress_into(&data, &mut small, 13).unwrap_err(),
            OxiflateError::InvalidLevel { .. }
        ));

        let mut out = vec![0u8; 64];
        let n = gzip_compress_into(&data, &mut out, 6).unwrap();
        let mut back = vec![0u8; 1000];
        assert_eq!(gzip_decompress_into(&out[..n], &mut back).unwrap(), 1000);
        assert_eq!(back, data);
    }
}
