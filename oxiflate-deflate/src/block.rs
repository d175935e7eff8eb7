//! Block sequencing for DEFLATE output.
//!
//! A block is a run of tokens coded with one pair of Huffman codes. For each
//! block the sequencer computes the exact size of all three encodings
//! (stored, fixed Huffman, dynamic Huffman) and emits the smallest.
//!
//! [`BlockSplitter`] decides where blocks end: it tracks a coarse histogram of
//! the symbols seen so far and ends the block once recent symbols stop
//! looking like the earlier ones, so each block can get codes tuned to its
//! own statistics.

use crate::huffman::{
    CODELEN_ALPHABET_SIZE, DISTANCE_ALPHABET_SIZE, END_OF_BLOCK, HuffmanBuilder, HuffmanCode,
    LITLEN_ALPHABET_SIZE, MAX_CODE_LENGTH, MAX_CODELEN_CODE_LENGTH,
};
use crate::lz77::Lz77Token;
use crate::tables::{
    CODE_LENGTH_ORDER, DISTANCE_EXTRA_BITS, LENGTH_EXTRA_BITS, distance_code_index,
    distance_to_code, fixed_distance_code, fixed_litlen_code, length_to_code,
};
use oxiflate_core::BitWriter;

/// Largest payload of a single stored block.
pub const MAX_STORED_BLOCK: usize = 65535;

/// Input bytes after which a block is always closed.
pub const SOFT_MAX_BLOCK_LENGTH: usize = 300_000;

/// Blocks shorter than this are never split, and no split leaves less than
/// this much input for the rest of the stream.
pub const MIN_BLOCK_LENGTH: usize = 5_000;

/// Blocks shorter than this need stronger divergence before they end.
const SHORT_BLOCK_LENGTH: usize = 10_000;

/// Observation count below which short blocks are penalised.
const SHORT_BLOCK_OBSERVATIONS: u64 = 8192;

/// DEFLATE block type (BTYPE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Uncompressed bytes (BTYPE=00).
    Stored,
    /// Predefined Huffman codes (BTYPE=01).
    Fixed,
    /// Huffman codes transmitted in the block header (BTYPE=10).
    Dynamic,
}

impl BlockType {
    /// Parse the two BTYPE bits; 3 is reserved.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(BlockType::Stored),
            1 => Some(BlockType::Fixed),
            2 => Some(BlockType::Dynamic),
            _ => None,
        }
    }

    /// The BTYPE bits of this block type.
    pub fn bits(self) -> u32 {
        match self {
            BlockType::Stored => 0,
            BlockType::Fixed => 1,
            BlockType::Dynamic => 2,
        }
    }
}

/// Symbol counts of one block. End-of-block is always counted once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frequencies {
    /// Literal/length symbol counts.
    pub litlen: [u32; LITLEN_ALPHABET_SIZE],
    /// Distance symbol counts.
    pub dist: [u32; DISTANCE_ALPHABET_SIZE],
}

impl Frequencies {
    /// Counts of an empty block.
    pub fn new() -> Self {
        let mut freqs = Self {
            litlen: [0; LITLEN_ALPHABET_SIZE],
            dist: [0; DISTANCE_ALPHABET_SIZE],
        };
        freqs.clear();
        freqs
    }

    /// Counts of a block holding `tokens`.
    pub fn from_tokens(tokens: &[Lz77Token]) -> Self {
        let mut freqs = Self::new();
        for token in tokens {
            freqs.add(token);
        }
        freqs
    }

    /// Reset to an empty block.
    pub fn clear(&mut self) {
        self.litlen.fill(0);
        self.dist.fill(0);
        self.litlen[END_OF_BLOCK as usize] = 1;
    }

    /// Count one token.
    #[inline]
    pub fn add(&mut self, token: &Lz77Token) {
        match *token {
            Lz77Token::Literal(byte) => self.litlen[byte as usize] += 1,
            Lz77Token::Match { length, distance } => {
                let (symbol, _, _) = length_to_code(length);
                self.litlen[symbol as usize] += 1;
                self.dist[distance_code_index(distance)] += 1;
            }
        }
    }

    /// Bits needed for the block body (symbols plus extra bits) under the
    /// given code lengths.
    pub fn data_cost(&self, litlen_lengths: &[u8], dist_lengths: &[u8]) -> u64 {
        let mut bits = 0u64;
        for (symbol, &count) in self.litlen.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let mut per_symbol = litlen_lengths[symbol] as u64;
            if symbol > END_OF_BLOCK as usize {
                per_symbol += LENGTH_EXTRA_BITS[symbol - 257] as u64;
            }
            bits += count as u64 * per_symbol;
        }
        for (code, &count) in self.dist.iter().enumerate() {
            if count > 0 {
                let len = dist_lengths[code] as u64 + DISTANCE_EXTRA_BITS[code] as u64;
                bits += count as u64 * len;
            }
        }
        bits
    }
}

impl Default for Frequencies {
    fn default() -> Self {
        Self::new()
    }
}

/// One symbol of the run-length coded code-length sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CodeLenSymbol {
    /// Code-length alphabet symbol (0-18).
    symbol: u8,
    /// Value of the repeat count extra bits (16, 17, 18 only).
    extra: u8,
}

impl CodeLenSymbol {
    fn plain(symbol: u8) -> Self {
        Self { symbol, extra: 0 }
    }

    fn extra_bits(self) -> u32 {
        match self.symbol {
            16 => 2,
            17 => 3,
            18 => 7,
            _ => 0,
        }
    }
}

/// Run-length code a code-length sequence with repeat symbols 16, 17 and 18.
fn rle_code_lengths(lengths: &[u8], out: &mut Vec<CodeLenSymbol>) {
    let mut i = 0;
    while i < lengths.len() {
        let len = lengths[i];
        let run = lengths[i..].iter().take_while(|&&l| l == len).count();
        i += run;

        if len == 0 {
            let mut left = run;
            while left >= 11 {
                let n = left.min(138);
                out.push(CodeLenSymbol {
                    symbol: 18,
                    extra: (n - 11) as u8,
                });
                left -= n;
            }
            if left >= 3 {
                out.push(CodeLenSymbol {
                    symbol: 17,
                    extra: (left - 3) as u8,
                });
                left = 0;
            }
            out.extend(std::iter::repeat_n(CodeLenSymbol::plain(0), left));
        } else {
            // Symbol 16 repeats the previous length, so send it once first.
            out.push(CodeLenSymbol::plain(len));
            let mut left = run - 1;
            while left >= 3 {
                let n = left.min(6);
                out.push(CodeLenSymbol {
                    symbol: 16,
                    extra: (n - 3) as u8,
                });
                left -= n;
            }
            out.extend(std::iter::repeat_n(CodeLenSymbol::plain(len), left));
        }
    }
}

/// A coded code-length sequence together with its code-length code.
#[derive(Debug, Clone)]
struct CodeLenEncoding {
    symbols: Vec<CodeLenSymbol>,
    code: HuffmanCode,
    /// Number of code-length code lengths sent (HCLEN + 4).
    num_codes: usize,
    /// Bits for HCLEN's lengths and the symbol sequence.
    bits: u64,
}

impl CodeLenEncoding {
    fn new(symbols: Vec<CodeLenSymbol>) -> Self {
        let mut freqs = [0u32; CODELEN_ALPHABET_SIZE];
        for s in &symbols {
            freqs[s.symbol as usize] += 1;
        }
        // The code-length code must be complete, so give it two symbols.
        if freqs.iter().filter(|&&f| f > 0).count() < 2 {
            let spare = if freqs[0] == 0 { 0 } else { 1 };
            freqs[spare] = 1;
        }

        let code = HuffmanCode::from_frequencies(&freqs, MAX_CODELEN_CODE_LENGTH);
        let lengths = code.lengths();
        let num_codes = CODE_LENGTH_ORDER
            .iter()
            .rposition(|&symbol| lengths[symbol] != 0)
            .map_or(4, |last| (last + 1).max(4));

        let bits = 3 * num_codes as u64
            + symbols
                .iter()
                .map(|s| lengths[s.symbol as usize] as u64 + s.extra_bits() as u64)
                .sum::<u64>();

        Self {
            symbols,
            code,
            num_codes,
            bits,
        }
    }
}

/// Codes and header of a dynamic Huffman block.
#[derive(Debug, Clone)]
pub struct DynamicHeader {
    litlen: HuffmanCode,
    dist: HuffmanCode,
    /// Literal/length lengths sent (HLIT + 257).
    num_litlen: usize,
    /// Distance lengths sent (HDIST + 1).
    num_dist: usize,
    codelens: CodeLenEncoding,
}

impl DynamicHeader {
    /// Build optimal codes for `freqs` and the cheapest header describing them.
    pub fn build(freqs: &Frequencies) -> Self {
        let max = MAX_CODE_LENGTH as u8;
        let litlen_lengths = HuffmanBuilder::from_frequencies(&freqs.litlen, max).build_lengths();
        let dist_lengths = HuffmanBuilder::from_frequencies(&freqs.dist, max).build_lengths();

        let num_litlen = trimmed_len(&litlen_lengths, 257);
        let num_dist = trimmed_len(&dist_lengths, 1);

        let mut combined = Vec::with_capacity(num_litlen + num_dist);
        combined.extend_from_slice(&litlen_lengths[..num_litlen]);
        combined.extend_from_slice(&dist_lengths[..num_dist]);

        let mut rle = Vec::with_capacity(combined.len());
        rle_code_lengths(&combined, &mut rle);
        let rle = CodeLenEncoding::new(rle);
        let plain =
            CodeLenEncoding::new(combined.iter().map(|&l| CodeLenSymbol::plain(l)).collect());
        let codelens = if plain.bits < rle.bits { plain } else { rle };

        Self {
            litlen: HuffmanCode::from_lengths(&litlen_lengths),
            dist: HuffmanCode::from_lengths(&dist_lengths),
            num_litlen,
            num_dist,
            codelens,
        }
    }

    /// Literal/length code.
    pub fn litlen_code(&self) -> &HuffmanCode {
        &self.litlen
    }

    /// Distance code.
    pub fn distance_code(&self) -> &HuffmanCode {
        &self.dist
    }

    /// Header size in bits, excluding the 3-bit block header.
    pub fn header_bits(&self) -> u64 {
        5 + 5 + 4 + self.codelens.bits
    }

    /// Size of a whole dynamic block with these codes, block header included.
    pub fn block_bits(&self, freqs: &Frequencies) -> u64 {
        3 + self.header_bits() + freqs.data_cost(self.litlen.lengths(), self.dist.lengths())
    }

    /// Write HLIT, HDIST, HCLEN and the code-length sequences.
    pub fn write(&self, writer: &mut BitWriter<'_>) {
        writer.write_bits((self.num_litlen - 257) as u32, 5);
        writer.write_bits((self.num_dist - 1) as u32, 5);
        writer.write_bits((self.codelens.num_codes - 4) as u32, 4);

        let code = &self.codelens.code;
        for &symbol in &CODE_LENGTH_ORDER[..self.codelens.num_codes] {
            writer.write_bits(code.lengths()[symbol] as u32, 3);
        }
        for s in &self.codelens.symbols {
            let (bits, len) = code.code(s.symbol as usize);
            writer.write_bits(bits as u32, len as u32);
            writer.write_bits(s.extra as u32, s.extra_bits());
        }
    }
}

/// Number of leading lengths to send: up to the last non-zero one, at least `min`.
fn trimmed_len(lengths: &[u8], min: usize) -> usize {
    lengths
        .iter()
        .rposition(|&l| l != 0)
        .map_or(min, |last| (last + 1).max(min))
}

/// Exact size of `len` bytes as stored blocks starting at `bit_position`.
pub fn stored_cost(bit_position: u64, len: usize) -> u64 {
    let chunks = len.div_ceil(MAX_STORED_BLOCK).max(1) as u64;
    let first_pad = (8 - (bit_position + 3) % 8) % 8;
    // Later chunks start byte-aligned, so their 3 header bits pad by 5.
    (3 + first_pad + 32) + (chunks - 1) * (3 + 5 + 32) + 8 * len as u64
}

/// Exact size of a fixed Huffman block.
pub fn fixed_cost(freqs: &Frequencies) -> u64 {
    3 + freqs.data_cost(fixed_litlen_code().lengths(), fixed_distance_code().lengths())
}

/// The chosen encoding of one block.
#[derive(Debug, Clone)]
pub struct BlockPlan {
    /// Block type to emit.
    pub block_type: BlockType,
    /// Size in bits, block header included.
    pub bits: u64,
    dynamic: Option<DynamicHeader>,
}

impl BlockPlan {
    /// Pick the cheapest encoding of a block covering `len` input bytes.
    ///
    /// Ties favour fixed over dynamic and stored over both.
    pub fn choose(freqs: &Frequencies, len: usize, bit_position: u64) -> Self {
        let dynamic = DynamicHeader::build(freqs);
        let dynamic_bits = dynamic.block_bits(freqs);
        let fixed_bits = fixed_cost(freqs);
        let stored_bits = stored_cost(bit_position, len);

        let (block_type, bits) = if fixed_bits <= dynamic_bits {
            (BlockType::Fixed, fixed_bits)
        } else {
            (BlockType::Dynamic, dynamic_bits)
        };
        if stored_bits <= bits {
            return Self::stored(stored_bits);
        }
        Self {
            block_type,
            bits,
            dynamic: (block_type == BlockType::Dynamic).then_some(dynamic),
        }
    }

    /// A stored block of known size.
    pub fn stored(bits: u64) -> Self {
        Self {
            block_type: BlockType::Stored,
            bits,
            dynamic: None,
        }
    }

    /// Write a Huffman-coded block. Stored plans are written with
    /// [`write_stored`] instead, since they need the input bytes.
    pub fn write_huffman(&self, writer: &mut BitWriter<'_>, tokens: &[Lz77Token], is_final: bool) {
        writer.write_bit(is_final);
        writer.write_bits(self.block_type.bits(), 2);
        match &self.dynamic {
            Some(header) => {
                header.write(writer);
                write_tokens(writer, tokens, &header.litlen, &header.dist);
            }
            None => write_tokens(writer, tokens, fixed_litlen_code(), fixed_distance_code()),
        }
    }
}

/// Write `data` as one or more stored blocks; only the last may be final.
///
/// Empty `data` still produces one (empty) block.
pub fn write_stored(writer: &mut BitWriter<'_>, data: &[u8], is_final: bool) {
    let mut chunks = data.chunks(MAX_STORED_BLOCK).peekable();
    if chunks.peek().is_none() {
        write_stored_chunk(writer, &[], is_final);
    }
    while let Some(chunk) = chunks.next() {
        write_stored_chunk(writer, chunk, is_final && chunks.peek().is_none());
    }
}

fn write_stored_chunk(writer: &mut BitWriter<'_>, chunk: &[u8], is_final: bool) {
    writer.write_bit(is_final);
    writer.write_bits(BlockType::Stored.bits(), 2);
    writer.align_to_byte();
    let len = chunk.len() as u16;
    writer.write_bits(len as u32, 16);
    writer.write_bits(!len as u32, 16);
    writer.write_bytes(chunk);
}

/// Write `tokens` followed by end-of-block.
pub fn write_tokens(
    writer: &mut BitWriter<'_>,
    tokens: &[Lz77Token],
    litlen: &HuffmanCode,
    dist: &HuffmanCode,
) {
    for token in tokens {
        match *token {
            Lz77Token::Literal(byte) => {
                let (bits, len) = litlen.code(byte as usize);
                writer.write_bits(bits as u32, len as u32);
            }
            Lz77Token::Match { length, distance } => {
                let (symbol, extra_bits, extra) = length_to_code(length);
                let (bits, len) = litlen.code(symbol as usize);
                writer.write_bits(bits as u32, len as u32);
                writer.write_bits(extra as u32, extra_bits as u32);

                let (symbol, extra_bits, extra) = distance_to_code(distance);
                let (bits, len) = dist.code(symbol as usize);
                writer.write_bits(bits as u32, len as u32);
                writer.write_bits(extra as u32, extra_bits as u32);
            }
        }
    }
    let (bits, len) = litlen.code(END_OF_BLOCK as usize);
    writer.write_bits(bits as u32, len as u32);
}

const NUM_LITERAL_OBSERVATION_TYPES: usize = 8;
const NUM_MATCH_OBSERVATION_TYPES: usize = 2;
const NUM_OBSERVATION_TYPES: usize = NUM_LITERAL_OBSERVATION_TYPES + NUM_MATCH_OBSERVATION_TYPES;
const NUM_OBSERVATIONS_PER_BLOCK_CHECK: u32 = 512;

/// Statistical block-boundary detector.
///
/// Literals are bucketed by two high bits and the low bit of the byte, matches
/// by whether they are short or long. Every 512 observations the recent
/// histogram is compared against the block so far; a large enough difference
/// ends the block.
#[derive(Debug, Clone, Default)]
pub struct BlockSplitter {
    new_observations: [u32; NUM_OBSERVATION_TYPES],
    observations: [u32; NUM_OBSERVATION_TYPES],
    num_new_observations: u32,
    num_observations: u32,
}

impl BlockSplitter {
    /// Create a splitter for a fresh block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all observations.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record a literal byte.
    #[inline]
    pub fn observe_literal(&mut self, byte: u8) {
        self.new_observations[(((byte >> 5) & 0x6) | (byte & 1)) as usize] += 1;
        self.num_new_observations += 1;
    }

    /// Record a match of `length` bytes.
    #[inline]
    pub fn observe_match(&mut self, length: u16) {
        self.new_observations[NUM_LITERAL_OBSERVATION_TYPES + (length >= 9) as usize] += 1;
        self.num_new_observations += 1;
    }

    /// Record a token.
    #[inline]
    pub fn observe(&mut self, token: &Lz77Token) {
        match *token {
            Lz77Token::Literal(byte) => self.observe_literal(byte),
            Lz77Token::Match { length, .. } => self.observe_match(length),
        }
    }

    /// Whether the current block (`block_len` bytes so far, `remaining`
    /// bytes of input left) should end here.
    pub fn should_end(&mut self, block_len: usize, remaining: usize) -> bool {
        if self.num_new_observations < NUM_OBSERVATIONS_PER_BLOCK_CHECK
            || block_len < MIN_BLOCK_LENGTH
            || remaining < MIN_BLOCK_LENGTH
        {
            return false;
        }
        if self.num_observations > 0 && self.diverged(block_len) {
            return true;
        }
        self.merge_new_observations();
        false
    }

    fn diverged(&self, block_len: usize) -> bool {
        let old = self.num_observations as u64;
        let new = self.num_new_observations as u64;

        let total_delta: u64 = self
            .new_observations
            .iter()
            .zip(&self.observations)
            .map(|(&n, &o)| (n as u64 * old).abs_diff(o as u64 * new))
            .sum();

        let num_items = old + new;
        let mut cutoff = new * 200 / 512 * old;
        // Short blocks need more evidence: their table overhead is relatively larger.
        if block_len < SHORT_BLOCK_LENGTH && num_items < SHORT_BLOCK_OBSERVATIONS {
            cutoff += cutoff * (SHORT_BLOCK_OBSERVATIONS - num_items) / SHORT_BLOCK_OBSERVATIONS;
        }
        total_delta + (block_len as u64 / 4096) * old >= cutoff
    }

    fn merge_new_observations(&mut self) {
        for (total, new) in self.observations.iter_mut().zip(&mut self.new_observations) {
            *total += *new;
            *new = 0;
        }
        self.num_observations += self.num_new_observations;
        self.num_new_observations = 0;
    }
}
