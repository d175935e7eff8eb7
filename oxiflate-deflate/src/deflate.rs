//! DEFLATE compression.
//!
//! This module implements DEFLATE compression as specified in RFC 1951.
//! The input is cut into blocks; each block is tokenized with the level's
//! parsing strategy and then written as whichever of stored, fixed Huffman
//! or dynamic Huffman encoding is smallest.
//!
//! Consecutive stored blocks are merged before being written, so data that
//! does not compress costs at most five bytes per 65 535-byte chunk.

use crate::accel::Accel;
use crate::block::{
    BlockPlan, BlockSplitter, BlockType, Frequencies, MAX_STORED_BLOCK, MIN_BLOCK_LENGTH,
    SOFT_MAX_BLOCK_LENGTH, write_stored,
};
use crate::lz77::{LevelParams, Lz77Encoder, Lz77Token, Strategy};
use crate::optimal::NearOptimalParser;
use oxiflate_core::BitWriter;
use oxiflate_core::error::{OxiflateError, Result};

/// Default compression level.
pub const DEFAULT_LEVEL: u32 = 6;

/// DEFLATE compressor.
///
/// Holds the match-finder tables and token buffers so repeated calls reuse
/// their allocations. Each call is independent of the previous ones.
#[derive(Debug, Clone)]
pub struct Deflater {
    level: u32,
    params: LevelParams,
    lz77: Lz77Encoder,
    optimal: NearOptimalParser,
    splitter: BlockSplitter,
    freqs: Frequencies,
    tokens: Vec<Lz77Token>,
}

impl Deflater {
    /// Highest supported level.
    pub const MAX_LEVEL: u32 = LevelParams::MAX_LEVEL;

    /// Create a compressor for `level` (0-12).
    ///
    /// Level 0 only stores; 1-4 parse greedily, 5-9 lazily, 10-12 with the
    /// near-optimal parser.
    pub fn new(level: u32) -> Result<Self> {
        Self::with_accel(level, Accel::detect())
    }

    /// Create a compressor that uses `accel` for match comparisons.
    pub fn with_accel(level: u32, accel: Accel) -> Result<Self> {
        let params = LevelParams::for_level(level)
            .ok_or_else(|| OxiflateError::invalid_level(level, Self::MAX_LEVEL))?;
        Ok(Self::from_params(level, params, accel))
    }

    fn from_params(level: u32, params: LevelParams, accel: Accel) -> Self {
        Self {
            level,
            params,
            lz77: Lz77Encoder::new(params, accel),
            optimal: NearOptimalParser::new(&params),
            splitter: BlockSplitter::new(),
            freqs: Frequencies::new(),
            tokens: Vec::new(),
        }
    }

    /// Compression level.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Output size that always suffices for `input_len` input bytes.
    ///
    /// Every block costs at most its stored size, and blocks other than the
    /// last hold at least `MIN_BLOCK_LENGTH` bytes.
    pub fn compress_bound(input_len: usize) -> usize {
        let blocks = input_len / MIN_BLOCK_LENGTH + input_len / MAX_STORED_BLOCK + 2;
        input_len + 6 * blocks + 1
    }

    /// Compress `input` into `output`, returning the number of bytes written.
    ///
    /// Fails with `InsufficientSpace` if `output` is too small; whatever was
    /// written to it is then meaningless.
    pub fn compress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let capacity = output.len();
        let mut writer = BitWriter::new(output);

        if self.params.strategy == Strategy::Stored {
            write_stored(&mut writer, input, true);
            return writer.finish();
        }

        self.lz77.reset(input.len());
        // Start of stored blocks not yet written.
        let mut pending_stored: Option<usize> = None;
        let mut start = 0;
        loop {
            let end = self.next_block(input, start);
            let is_final = end >= input.len();

            // Pending stored data is flushed before any Huffman block, leaving
            // the writer byte-aligned.
            let bit_position = match pending_stored {
                Some(_) => 0,
                None => writer.bits_written(),
            };
            let plan = BlockPlan::choose(&self.freqs, end - start, bit_position);

            if plan.block_type == BlockType::Stored {
                let from = *pending_stored.get_or_insert(start);
                if is_final {
                    write_stored(&mut writer, &input[from..end], true);
                }
            } else {
                if let Some(from) = pending_stored.take() {
                    write_stored(&mut writer, &input[from..start], false);
                }
                plan.write_huffman(&mut writer, &self.tokens, is_final);
            }

            if writer.is_overflowed() {
                return Err(OxiflateError::insufficient_space(capacity));
            }
            if is_final {
                break;
            }
            start = end;
        }

        writer.finish()
    }

    /// Tokenize the block starting at `start`, filling `self.tokens` and
    /// `self.freqs`. Returns the end of the block.
    fn next_block(&mut self, input: &[u8], start: usize) -> usize {
        self.tokens.clear();
        self.splitter.reset();
        let split = self.params.split_blocks;

        let end = match self.params.strategy {
            Strategy::NearOptimal { .. } => {
                let end = self.optimal.collect_block(
                    self.lz77.finder_mut(),
                    input,
                    start,
                    &mut self.splitter,
                    split,
                );
                self.optimal.parse(input, start, end, &mut self.tokens);
                end
            }
            _ => {
                let mut pos = start;
                while pos < input.len() && pos - start < SOFT_MAX_BLOCK_LENGTH {
                    let before = self.tokens.len();
                    pos = self.lz77.step(input, pos, &mut self.tokens);
                    for token in &self.tokens[before..] {
                        self.splitter.observe(token);
                    }
                    if split && self.splitter.should_end(pos - start, input.len() - pos) {
                        break;
                    }
                }
                pos
            }
        };

        self.freqs.clear();
        for token in &self.tokens {
            self.freqs.add(token);
        }
        end
    }

    /// Compress data to a Vec.
    pub fn compress_to_vec(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = vec![0u8; Self::compress_bound(input.len())];
        let len = self.compress(input, &mut output)?;
        output.truncate(len);
        Ok(output)
    }
}

impl Default for Deflater {
    fn default() -> Self {
        Self::from_params(
            DEFAULT_LEVEL,
            LevelParams::clamped(DEFAULT_LEVEL),
            Accel::detect(),
        )
    }
}

/// Compress data using DEFLATE.
pub fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    Deflater::new(level)?.compress_to_vec(data)
}

/// Compress data using DEFLATE into a caller-supplied buffer.
pub fn deflate_into(data: &[u8], output: &mut [u8], level: u32) -> Result<usize> {
    Deflater::new(level)?.compress(data, output)
}
