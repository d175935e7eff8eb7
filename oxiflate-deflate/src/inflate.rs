//! DEFLATE decompression (inflate).
//!
//! This module implements the DEFLATE decompression algorithm as specified
//! in RFC 1951. It supports all three block types:
//! - Type 0: Stored (uncompressed)
//! - Type 1: Fixed Huffman codes
//! - Type 2: Dynamic Huffman codes
//!
//! Output goes straight into a caller-supplied buffer, which doubles as the
//! LZ77 window. Nothing is ever written past the end of that buffer and every
//! back-reference is checked against the bytes produced so far, so malformed
//! input can only produce an error.

use crate::accel::Accel;
use crate::block::BlockType;
use crate::huffman::{DISTANCE_ALPHABET_SIZE, END_OF_BLOCK, HuffmanTree, LITLEN_ALPHABET_SIZE};
use crate::tables::{
    CODE_LENGTH_ORDER, DISTANCE_EXTRA_BITS, LENGTH_EXTRA_BITS, decode_distance, decode_length,
    fixed_distance_tree, fixed_litlen_tree,
};
use oxiflate_core::BitReader;
use oxiflate_core::error::{OxiflateError, Result};

/// Largest expansion a DEFLATE stream can achieve (a 258-byte match costs
/// at least two bits).
const MAX_EXPANSION: usize = 1032;

/// DEFLATE decompressor.
///
/// Keeps its decoding tables between calls to reuse their allocations; no
/// other state carries over.
#[derive(Debug, Clone, Default)]
pub struct Inflater {
    accel: Accel,
    litlen: HuffmanTree,
    dist: HuffmanTree,
    codelen: HuffmanTree,
    /// Literal/length and distance code lengths of the current dynamic block.
    lengths: Vec<u8>,
}

impl Inflater {
    /// Create a new DEFLATE decompressor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decompressor that uses `accel` for window copies.
    pub fn with_accel(accel: Accel) -> Self {
        Self {
            accel,
            ..Self::default()
        }
    }

    /// Decompress `input` into `output`, returning the number of bytes written.
    pub fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.decompress_ex(input, output).map(|(_, written)| written)
    }

    /// Decompress `input` into `output`.
    ///
    /// Returns `(bytes consumed, bytes written)`. Decoding stops after the
    /// final block, so anything after it in `input` is left unconsumed.
    pub fn decompress_ex(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize)> {
        let mut reader = BitReader::new(input);
        let mut written = 0;

        loop {
            let header_position = reader.bit_position();
            let is_final = reader.read_bit()?;
            let block_type = BlockType::from_bits(reader.read_bits(2)?)
                .ok_or_else(|| OxiflateError::invalid_block_type(header_position))?;

            written = match block_type {
                BlockType::Stored => Self::inflate_stored(&mut reader, output, written)?,
                BlockType::Fixed => Self::inflate_codes(
                    &mut reader,
                    output,
                    written,
                    fixed_litlen_tree(),
                    fixed_distance_tree(),
                    self.accel,
                )?,
                BlockType::Dynamic => {
                    self.read_dynamic_tables(&mut reader)?;
                    Self::inflate_codes(
                        &mut reader,
                        output,
                        written,
                        &self.litlen,
                        &self.dist,
                        self.accel,
                    )?
                }
            };

            if is_final {
                break;
            }
        }

        Ok((reader.bytes_consumed(), written))
    }

    /// Decompress into `output`, requiring the stream to fill it exactly.
    pub fn decompress_exact(&mut self, input: &[u8], output: &mut [u8]) -> Result<()> {
        let (_, written) = self.decompress_ex(input, output)?;
        if written != output.len() {
            return Err(OxiflateError::short_output(output.len(), written));
        }
        Ok(())
    }

    /// Decompress into a growable buffer, starting from `size_hint` bytes and
    /// doubling on capacity errors.
    ///
    /// Returns the output and the number of input bytes consumed.
    pub fn decompress_to_vec(
        &mut self,
        input: &[u8],
        size_hint: usize,
    ) -> Result<(Vec<u8>, usize)> {
        // No stream expands more than this, whatever a container header claims.
        let ceiling = input.len().saturating_mul(MAX_EXPANSION).max(64);
        let mut capacity = size_hint.clamp(64, ceiling);
        loop {
            let mut output = vec![0u8; capacity];
            match self.decompress_ex(input, &mut output) {
                Ok((consumed, written)) => {
                    output.truncate(written);
                    return Ok((output, consumed));
                }
                Err(e) if e.is_capacity() && capacity < ceiling => {
                    capacity = capacity.saturating_mul(2).min(ceiling);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Decompress a stored (uncompressed) block.
    fn inflate_stored(
        reader: &mut BitReader<'_>,
        output: &mut [u8],
        written: usize,
    ) -> Result<usize> {
        reader.align_to_byte();

        let len = reader.read_bits(16)? as u16;
        let nlen = reader.read_bits(16)? as u16;
        if len != !nlen {
            return Err(OxiflateError::stored_length_mismatch(len, nlen));
        }

        let end = written + len as usize;
        if end > output.len() {
            return Err(OxiflateError::insufficient_space(output.len()));
        }
        reader.read_bytes(&mut output[written..end])?;
        Ok(end)
    }

    /// Read the code descriptions of a dynamic block into `self.litlen` and
    /// `self.dist`.
    fn read_dynamic_tables(&mut self, reader: &mut BitReader<'_>) -> Result<()> {
        let hlit = reader.read_bits(5)? as usize + 257;
        let hdist = reader.read_bits(5)? as usize + 1;
        let hclen = reader.read_bits(4)? as usize + 4;
        if hlit > LITLEN_ALPHABET_SIZE || hdist > DISTANCE_ALPHABET_SIZE {
            return Err(OxiflateError::invalid_code_lengths(format!(
                "too many length or distance symbols ({}, {})",
                hlit, hdist
            )));
        }

        let mut codelen_lengths = [0u8; 19];
        for &symbol in &CODE_LENGTH_ORDER[..hclen] {
            codelen_lengths[symbol] = reader.read_bits(3)? as u8;
        }
        self.codelen.rebuild(&codelen_lengths, false)?;

        let total = hlit + hdist;
        self.lengths.clear();
        while self.lengths.len() < total {
            let symbol = self.codelen.decode(reader)?;
            let (value, repeat) = match symbol {
                0..=15 => (symbol as u8, 1),
                16 => {
                    let prev = *self.lengths.last().ok_or_else(|| {
                        OxiflateError::invalid_code_lengths("repeat with no previous length")
                    })?;
                    (prev, 3 + reader.read_bits(2)? as usize)
                }
                17 => (0, 3 + reader.read_bits(3)? as usize),
                18 => (0, 11 + reader.read_bits(7)? as usize),
                _ => return Err(OxiflateError::invalid_huffman(reader.bit_position())),
            };
            if self.lengths.len() + repeat > total {
                return Err(OxiflateError::invalid_code_lengths(
                    "repeat overruns the code lengths",
                ));
            }
            self.lengths.extend(std::iter::repeat_n(value, repeat));
        }

        if self.lengths[END_OF_BLOCK as usize] == 0 {
            return Err(OxiflateError::invalid_code_lengths(
                "missing end-of-block code",
            ));
        }
        self.litlen.rebuild(&self.lengths[..hlit], true)?;
        self.dist.rebuild(&self.lengths[hlit..], true)?;
        Ok(())
    }

    /// Decode symbols until end-of-block.
    fn inflate_codes(
        reader: &mut BitReader<'_>,
        output: &mut [u8],
        mut written: usize,
        litlen_tree: &HuffmanTree,
        dist_tree: &HuffmanTree,
        accel: Accel,
    ) -> Result<usize> {
        loop {
            let symbol = litlen_tree.decode(reader)?;

            if symbol < END_OF_BLOCK {
                let output_len = output.len();
                let slot = output
                    .get_mut(written)
                    .ok_or_else(|| OxiflateError::insufficient_space(output_len))?;
                *slot = symbol as u8;
                written += 1;
            } else if symbol == END_OF_BLOCK {
                return Ok(written);
            } else {
                // 286 and 287 only exist in the fixed code and never occur.
                if symbol as usize >= LITLEN_ALPHABET_SIZE {
                    return Err(OxiflateError::invalid_huffman(reader.bit_position()));
                }
                let extra_bits = LENGTH_EXTRA_BITS[(symbol - 257) as usize];
                let extra = reader.read_bits(extra_bits as u32)? as u16;
                let length = decode_length(symbol, extra) as usize;

                let dist_symbol = dist_tree.decode(reader)?;
                if dist_symbol as usize >= DISTANCE_ALPHABET_SIZE {
                    return Err(OxiflateError::invalid_huffman(reader.bit_position()));
                }
                let extra_bits = DISTANCE_EXTRA_BITS[dist_symbol as usize];
                let extra = reader.read_bits(extra_bits as u32)? as u16;
                let distance = decode_distance(dist_symbol, extra) as usize;

                if distance > written {
                    return Err(OxiflateError::invalid_distance(distance, written));
                }
                if written + length > output.len() {
                    return Err(OxiflateError::insufficient_space(output.len()));
                }
                accel.copy_match(output, written, distance, length);
                written += length;
            }
        }
    }
}

/// Decompress DEFLATE data.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut inflater = Inflater::new();
    let (output, _) = inflater.decompress_to_vec(data, data.len().saturating_mul(4))?;
    Ok(output)
}

/// Decompress DEFLATE data into a caller-supplied buffer.
pub fn inflate_into(data: &[u8], output: &mut [u8]) -> Result<usize> {
    Inflater::new().decompress(data, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{distance_to_code, fixed_distance_code, fixed_litlen_code, length_to_code};
    use oxiflate_core::BitWriter;

    /// Hand-assembled fixed Huffman streams.
    struct FixedStream {
        buf: [u8; 128],
        bits: Vec<(u32, u32)>,
    }

    impl FixedStream {
        fn new() -> Self {
            Self {
                buf: [0; 128],
                // BFINAL=1, BTYPE=01
                bits: vec![(1, 1), (1, 2)],
            }
        }

        fn symbol(mut self, symbol: usize) -> Self {
            let (code, len) = fixed_litlen_code().code(symbol);
            self.bits.push((code as u32, len as u32));
            self
        }

        fn literal(self, byte: u8) -> Self {
            self.symbol(byte as usize)
        }

        fn copy(mut self, length: u16, distance: u16) -> Self {
            let (symbol, extra_bits, extra) = length_to_code(length);
            self = self.symbol(symbol as usize);
            self.bits.push((extra as u32, extra_bits as u32));
            let (symbol, extra_bits, extra) = distance_to_code(distance);
            let (code, len) = fixed_distance_code().code(symbol as usize);
            self.bits.push((code as u32, len as u32));
            self.bits.push((extra as u32, extra_bits as u32));
            self
        }

        fn raw(mut self, value: u32, count: u32) -> Self {
            self.bits.push((value, count));
            self
        }

        fn finish(mut self) -> Vec<u8> {
            let mut writer = BitWriter::new(&mut self.buf);
            for &(value, count) in &self.bits {
                writer.write_bits(value, count);
            }
            let len = writer.finish().unwrap();
            self.buf[..len].to_vec()
        }
    }

    #[test]
    fn test_inflate_stored() {
        let compressed = vec![
            0x01, // BFINAL=1, BTYPE=00, padding
            0x05, 0x00, // LEN=5
            0xFA, 0xFF, // NLEN=65530
            b'H', b'e', b'l', b'l', b'o',
        ];

        let result = inflate(&compressed).unwrap();
        assert_eq!(result, b"Hello");
    }

    #[test]
    fn test_inflate_empty() {
        let compressed = vec![
            0x01, // BFINAL=1, BTYPE=00
            0x00, 0x00, // LEN=0
            0xFF, 0xFF, // NLEN
        ];
        assert!(inflate(&compressed).unwrap().is_empty());
        // Empty fixed block
        assert!(inflate(&[0x03, 0x00]).unwrap().is_empty());
    }

    #[test]
    fn test_inflate_fixed() {
        let stream = FixedStream::new()
            .literal(b'a')
            .literal(b'b')
            .literal(b'c')
            .copy(6, 3)
            .symbol(256)
            .finish();
        assert_eq!(inflate(&stream).unwrap(), b"abcabcabc");
    }

    #[test]
    fn test_overlapping_copy() {
        let stream = FixedStream::new().literal(b'A').copy(258, 1).symbol(256).finish();
        for accel in Accel::available() {
            let mut out = [0u8; 259];
            let n = Inflater::with_accel(accel).decompress(&stream, &mut out).unwrap();
            assert_eq!(n, 259);
            assert!(out.iter().all(|&b| b == b'A'), "{}", accel.name());
        }
    }

    #[test]
    fn test_distance_too_far() {
        let stream = FixedStream::new().literal(b'x').copy(3, 2).symbol(256).finish();
        let err = inflate(&stream).unwrap_err();
        assert!(matches!(
            err,
            OxiflateError::InvalidDistance {
                distance: 2,
                history_size: 1
            }
        ));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_reserved_symbols() {
        let stream = FixedStream::new().literal(b'x').symbol(286).finish();
        assert!(inflate(&stream).unwrap_err().is_malformed());

        // Length 3, then distance code 30
        let stream = FixedStream::new()
            .literal(b'x')
            .symbol(257)
            .raw(fixed_reversed_distance(30), 5)
            .finish();
        assert!(inflate(&stream).unwrap_err().is_malformed());
    }

    fn fixed_reversed_distance(code: u16) -> u32 {
        crate::huffman::reverse_bits(code, 5) as u32
    }

    #[test]
    fn test_invalid_block_type() {
        // BFINAL=1, BTYPE=11
        let err = inflate(&[0x07, 0x00]).unwrap_err();
        assert!(matches!(err, OxiflateError::InvalidBlockType { bit_position: 0 }));
    }

    #[test]
    fn test_stored_length_mismatch() {
        let err = inflate(&[0x01, 0x05, 0x00, 0x00, 0x00, 1, 2, 3, 4, 5]).unwrap_err();
        assert!(matches!(err, OxiflateError::StoredLengthMismatch { len: 5, nlen: 0 }));
    }

    #[test]
    fn test_truncated() {
        let stream = FixedStream::new()
            .literal(b'a')
            .copy(100, 1)
            .symbol(256)
            .finish();
        for cut in 0..stream.len() {
            let err = inflate(&stream[..cut]).unwrap_err();
            assert!(err.is_malformed(), "cut {}: {}", cut, err);
        }
        // Stored block shorter than its LEN
        let err = inflate(&[0x01, 0x05, 0x00, 0xFA, 0xFF, b'H']).unwrap_err();
        assert!(matches!(err, OxiflateError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_too_many_symbols() {
        // BFINAL=1, BTYPE=10, HLIT=30 (287 codes)
        let stream = FixedStream {
            buf: [0; 128],
            bits: vec![(1, 1), (2, 2), (30, 5), (0, 5), (0, 4)],
        }
        .finish();
        let err = inflate(&stream).unwrap_err();
        assert!(matches!(err, OxiflateError::InvalidCodeLengths { .. }));
    }

    #[test]
    fn test_repeat_without_previous() {
        // HCLEN=0 sends lengths for 16, 17, 18, 0: give 16 and 0 one bit each.
        // Symbol 0 gets code 0 and symbol 16 code 1; start with a 1.
        let stream = FixedStream {
            buf: [0; 128],
            bits: vec![
                (1, 1),
                (2, 2),
                (0, 5),
                (0, 5),
                (0, 4),
                (1, 3),
                (0, 3),
                (0, 3),
                (1, 3),
                (1, 1),
                (0, 16),
            ],
        }
        .finish();
        let err = inflate(&stream).unwrap_err();
        assert!(matches!(err, OxiflateError::InvalidCodeLengths { .. }), "{}", err);
    }

    #[test]
    fn test_capacity_boundary() {
        let stream = FixedStream::new().literal(b'q').copy(20, 1).symbol(256).finish();
        let mut inflater = Inflater::new();

        let mut exact = [0u8; 21];
        assert_eq!(inflater.decompress(&stream, &mut exact).unwrap(), 21);
        inflater.decompress_exact(&stream, &mut exact).unwrap();

        let mut short = [0u8; 20];
        assert!(inflater.decompress(&stream, &mut short).unwrap_err().is_capacity());

        let mut long = [0u8; 22];
        let err = inflater.decompress_exact(&stream, &mut long).unwrap_err();
        assert!(matches!(err, OxiflateError::ShortOutput { expected: 22, actual: 21 }));
    }

    #[test]
    fn test_capacity_error_reports_buffer_size() {
        let literals = FixedStream::new()
            .literal(b'a')
            .literal(b'b')
            .literal(b'c')
            .symbol(256)
            .finish();
        let copy = FixedStream::new().literal(b'a').copy(10, 1).symbol(256).finish();
        let stored = [0x01, 0x05, 0x00, 0xFA, 0xFF, b'H', b'e', b'l', b'l', b'o'];

        for stream in [&literals[..], &copy[..], &stored[..]] {
            let mut out = [0u8; 2];
            let err = Inflater::new().decompress(stream, &mut out).unwrap_err();
            assert!(matches!(err, OxiflateError::InsufficientSpace { available: 2 }));
        }
    }

    #[test]
    fn test_consumed_stops_at_final_block() {
        let mut data = vec![0x03, 0x00];
        data.extend_from_slice(b"trailer");
        let mut out = [0u8; 4];
        let (consumed, written) = Inflater::new().decompress_ex(&data, &mut out).unwrap();
        assert_eq!((consumed, written), (2, 0));
    }

    #[test]
    fn test_inflate_grows_buffer() {
        // 2 literals and a long run of copies expand far beyond 4x the input.
        let mut stream = FixedStream::new().literal(b'z');
        for _ in 0..20 {
            stream = stream.copy(258, 1);
        }
        let stream = stream.symbol(256).finish();
        assert_eq!(inflate(&stream).unwrap(), vec![b'z'; 1 + 20 * 258]);
    }
}
