//! Bit-level I/O over in-memory buffers.
//!
//! This module provides `BitReader` and `BitWriter` for reading and writing
//! variable-width bit fields, as needed by the Huffman codes and extra-bit
//! fields of DEFLATE.
//!
//! # Bit Ordering
//!
//! DEFLATE uses LSB-first ordering within bytes: the first field written
//! occupies the least significant bits of the first byte.
//!
//! # End of input
//!
//! `BitReader` refills its 64-bit buffer several bytes at a time. It never
//! reads past the end of the slice: once the real input is exhausted it
//! shifts in zero bytes and remembers how many it invented. Peeking into those
//! zero bits is harmless (a Huffman lookup may look ahead further than the
//! code it finally decodes), but consuming them is reported as
//! [`OxiflateError::UnexpectedEof`].
//!
//! # Example
//!
//! ```
//! use oxiflate_core::bitstream::{BitReader, BitWriter};
//!
//! let mut output = [0u8; 4];
//! let mut writer = BitWriter::new(&mut output);
//! writer.write_bits(0b101, 3);
//! writer.write_bits(0b1100, 4);
//! let len = writer.finish().unwrap();
//!
//! let mut reader = BitReader::new(&output[..len]);
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1100);
//! ```

use crate::error::{OxiflateError, Result};

/// A bit-level reader over a byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    /// Input bytes.
    data: &'a [u8],
    /// Next byte of `data` to load into the buffer.
    pos: usize,
    /// Bit buffer (LSB-first).
    buffer: u64,
    /// Number of valid bits in buffer.
    bits_in_buffer: u32,
    /// Zero bytes loaded after the end of `data`.
    overrun: usize,
}

impl<'a> BitReader<'a> {
    /// Create a new `BitReader` over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            buffer: 0,
            bits_in_buffer: 0,
            overrun: 0,
        }
    }

    /// Number of bits consumed so far.
    pub fn bit_position(&self) -> u64 {
        ((self.pos + self.overrun) as u64) * 8 - self.bits_in_buffer as u64
    }

    /// Number of input bytes consumed, counting a partially consumed byte.
    pub fn bytes_consumed(&self) -> usize {
        (self.bit_position().div_ceil(8) as usize).min(self.data.len())
    }

    /// True if more bits were consumed than the input holds.
    #[inline]
    pub fn is_overrun(&self) -> bool {
        self.overrun * 8 > self.bits_in_buffer as usize
    }

    /// Fill the buffer to at least 56 bits.
    #[inline]
    fn refill(&mut self) {
        if self.pos + 8 <= self.data.len() {
            let mut word = [0u8; 8];
            word.copy_from_slice(&self.data[self.pos..self.pos + 8]);
            let word = u64::from_le_bytes(word);
            // Whole bytes only, leaving room so the total stays below 64.
            let take = (63 - self.bits_in_buffer) / 8;
            let filled = self.bits_in_buffer + take * 8;
            self.buffer |= word << self.bits_in_buffer;
            self.buffer &= (1u64 << filled) - 1;
            self.bits_in_buffer = filled;
            self.pos += take as usize;
        } else {
            self.refill_slow();
        }
    }

    #[cold]
    fn refill_slow(&mut self) {
        while self.bits_in_buffer <= 56 {
            let byte = match self.data.get(self.pos) {
                Some(&b) => {
                    self.pos += 1;
                    b
                }
                None => {
                    self.overrun += 1;
                    0
                }
            };
            self.buffer |= (byte as u64) << self.bits_in_buffer;
            self.bits_in_buffer += 8;
        }
    }

    /// Peek at up to 32 bits without consuming them.
    ///
    /// Bits past the end of the input read as zero.
    #[inline]
    pub fn peek_bits(&mut self, count: u32) -> u32 {
        debug_assert!(count <= 32, "Cannot peek more than 32 bits at once");
        if self.bits_in_buffer < count {
            self.refill();
        }
        (self.buffer & ((1u64 << count) - 1)) as u32
    }

    /// Consume `count` bits previously examined with [`peek_bits`](Self::peek_bits).
    #[inline]
    pub fn consume(&mut self, count: u32) -> Result<()> {
        debug_assert!(count <= self.bits_in_buffer);
        self.buffer >>= count;
        self.bits_in_buffer -= count;
        if self.is_overrun() {
            return Err(OxiflateError::unexpected_eof(self.bit_position()));
        }
        Ok(())
    }

    /// Read up to 32 bits from the stream.
    ///
    /// The first bit read ends up in the LSB position of the result.
    #[inline]
    pub fn read_bits(&mut self, count: u32) -> Result<u32> {
        if count == 0 {
            return Ok(0);
        }
        let value = self.peek_bits(count);
        self.consume(count)?;
        Ok(value)
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Align to the next byte boundary by discarding partial bits.
    pub fn align_to_byte(&mut self) {
        let remainder = self.bits_in_buffer % 8;
        self.buffer >>= remainder;
        self.bits_in_buffer -= remainder;
    }

    /// Copy `buf.len()` bytes straight from the input.
    ///
    /// The reader must be byte-aligned (see [`align_to_byte`](Self::align_to_byte)).
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(self.bits_in_buffer % 8, 0);
        if self.is_overrun() {
            return Err(OxiflateError::unexpected_eof(self.bit_position()));
        }
        // Rewind over whatever the buffer holds and copy from the slice.
        let start = (self.bit_position() / 8) as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| OxiflateError::unexpected_eof(self.data.len() as u64 * 8))?;
        buf.copy_from_slice(&self.data[start..end]);
        self.pos = end;
        self.overrun = 0;
        self.buffer = 0;
        self.bits_in_buffer = 0;
        Ok(())
    }
}

/// A bit-level writer into a caller-supplied byte slice.
///
/// Writes never fail individually. When the slice fills up the writer keeps
/// counting bits but drops them, and [`finish`](Self::finish) reports
/// [`OxiflateError::InsufficientSpace`].
#[derive(Debug)]
pub struct BitWriter<'a> {
    /// Output bytes.
    out: &'a mut [u8],
    /// Bytes flushed so far (may exceed `out.len()` after overflow).
    pos: usize,
    /// Bit buffer (LSB-first).
    buffer: u64,
    /// Number of bits in buffer.
    bits_in_buffer: u32,
    overflowed: bool,
}

impl<'a> BitWriter<'a> {
    /// Create a new `BitWriter` writing to the start of `out`.
    pub fn new(out: &'a mut [u8]) -> Self {
        Self {
            out,
            pos: 0,
            buffer: 0,
            bits_in_buffer: 0,
            overflowed: false,
        }
    }

    /// Get the total number of bits written so far.
    pub fn bits_written(&self) -> u64 {
        self.pos as u64 * 8 + self.bits_in_buffer as u64
    }

    /// True once a write has failed to fit.
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    #[inline]
    fn put_byte(&mut self, byte: u8) {
        match self.out.get_mut(self.pos) {
            Some(slot) => *slot = byte,
            None => self.overflowed = true,
        }
        self.pos += 1;
    }

    /// Flush four bytes from the buffer.
    #[inline]
    fn flush_word(&mut self) {
        let bytes = (self.buffer as u32).to_le_bytes();
        if self.pos + 4 <= self.out.len() {
            self.out[self.pos..self.pos + 4].copy_from_slice(&bytes);
            self.pos += 4;
        } else {
            for byte in bytes {
                self.put_byte(byte);
            }
        }
        self.buffer >>= 32;
        self.bits_in_buffer -= 32;
    }

    /// Flush every complete byte held in the buffer.
    fn flush_bytes(&mut self) {
        while self.bits_in_buffer >= 8 {
            self.put_byte(self.buffer as u8);
            self.buffer >>= 8;
            self.bits_in_buffer -= 8;
        }
    }

    /// Write the low `count` bits of `value` (0-32 bits), LSB first.
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u32) {
        debug_assert!(count <= 32, "Cannot write more than 32 bits at once");
        let mask = (1u64 << count) - 1;
        self.buffer |= (value as u64 & mask) << self.bits_in_buffer;
        self.bits_in_buffer += count;
        if self.bits_in_buffer >= 32 {
            self.flush_word();
        }
    }

    /// Write a single bit.
    #[inline(always)]
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(bit as u32, 1);
    }

    /// Pad to byte boundary with zeros.
    pub fn align_to_byte(&mut self) {
        let remainder = self.bits_in_buffer % 8;
        if remainder != 0 {
            self.write_bits(0, 8 - remainder);
        }
    }

    /// Write bytes directly to the stream.
    ///
    /// The writer must be byte-aligned.
    pub fn write_bytes(&mut self, buf: &[u8]) {
        debug_assert_eq!(self.bits_in_buffer % 8, 0);
        self.flush_bytes();
        let end = self.pos + buf.len();
        if end <= self.out.len() {
            self.out[self.pos..end].copy_from_slice(buf);
        } else {
            self.overflowed = true;
        }
        self.pos = end;
    }

    /// Pad the final byte with zeros and return the number of bytes written.
    pub fn finish(mut self) -> Result<usize> {
        self.align_to_byte();
        self.flush_bytes();
        if self.overflowed {
            return Err(OxiflateError::insufficient_space(self.out.len()));
        }
        Ok(self.pos)
    }
}
