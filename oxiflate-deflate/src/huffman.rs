//! Canonical Huffman coding for DEFLATE.
//!
//! DEFLATE transmits only code lengths; both sides derive the actual codes
//! with the canonical rule of RFC 1951 Section 3.2.2 (shorter codes first,
//! ties broken by symbol index, counting up from zero).
//!
//! - [`HuffmanBuilder`] turns symbol frequencies into length-limited code
//!   lengths with the package-merge algorithm.
//! - [`HuffmanCode`] is the encoder view: bit-reversed codewords ready to be
//!   written LSB-first.
//! - [`HuffmanTree`] is the decoder view: a direct lookup table for short
//!   codes plus a canonical walk for the rest.
//!
//! # Alphabets
//!
//! DEFLATE uses three Huffman alphabets:
//! - **Literal/Length**: 0-285 (0-255 literals, 256 EOB, 257-285 lengths)
//! - **Distance**: 0-29 (back-reference distances)
//! - **Code Length**: 0-18 (for encoding dynamic Huffman trees)

use oxiflate_core::BitReader;
use oxiflate_core::error::{OxiflateError, Result};

/// Maximum code length in DEFLATE (15 bits).
pub const MAX_CODE_LENGTH: usize = 15;

/// Maximum code length of the code-length alphabet (7 bits).
pub const MAX_CODELEN_CODE_LENGTH: u8 = 7;

/// Size of the literal/length alphabet (0-285).
pub const LITLEN_ALPHABET_SIZE: usize = 286;

/// Size of the distance alphabet (0-29).
pub const DISTANCE_ALPHABET_SIZE: usize = 30;

/// Size of the code length alphabet (0-18).
pub const CODELEN_ALPHABET_SIZE: usize = 19;

/// End of block symbol.
pub const END_OF_BLOCK: u16 = 256;

/// Reverse the low `length` bits of `code`.
#[inline]
pub fn reverse_bits(code: u16, length: u8) -> u16 {
    if length == 0 {
        return 0;
    }
    code.reverse_bits() >> (16 - length as u32)
}

/// Canonical (MSB-first) codes for a set of code lengths.
fn canonical_codes(lengths: &[u8]) -> Vec<u16> {
    let mut bl_count = [0u16; MAX_CODE_LENGTH + 1];
    for &len in lengths {
        bl_count[len as usize] += 1;
    }
    bl_count[0] = 0;

    let mut next_code = [0u16; MAX_CODE_LENGTH + 2];
    let mut code = 0u16;
    for bits in 1..=MAX_CODE_LENGTH {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                0
            } else {
                let c = next_code[len as usize];
                next_code[len as usize] += 1;
                c
            }
        })
        .collect()
}

/// Encoder-side canonical Huffman code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanCode {
    /// Code length per symbol (0 = unused).
    lengths: Vec<u8>,
    /// Bit-reversed codeword per symbol.
    codes: Vec<u16>,
}

impl HuffmanCode {
    /// Derive canonical codewords from code lengths.
    pub fn from_lengths(lengths: &[u8]) -> Self {
        let codes = canonical_codes(lengths)
            .into_iter()
            .zip(lengths)
            .map(|(code, &len)| reverse_bits(code, len))
            .collect();
        Self {
            lengths: lengths.to_vec(),
            codes,
        }
    }

    /// Build an optimal code for `frequencies` with lengths bounded by `max_length`.
    pub fn from_frequencies(frequencies: &[u32], max_length: u8) -> Self {
        let lengths = HuffmanBuilder::from_frequencies(frequencies, max_length).build_lengths();
        Self::from_lengths(&lengths)
    }

    /// Code lengths, indexed by symbol.
    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }

    /// `(reversed codeword, length)` for `symbol`.
    #[inline(always)]
    pub fn code(&self, symbol: usize) -> (u16, u8) {
        (self.codes[symbol], self.lengths[symbol])
    }

    /// Bits needed to encode each symbol as often as `frequencies` says.
    pub fn cost(&self, frequencies: &[u32]) -> u64 {
        frequencies
            .iter()
            .zip(&self.lengths)
            .map(|(&f, &l)| f as u64 * l as u64)
            .sum()
    }
}

/// Builder for creating Huffman code lengths from frequencies.
#[derive(Debug, Clone)]
pub struct HuffmanBuilder {
    frequencies: Vec<u32>,
    max_length: u8,
}

/// Package-merge arena node.
#[derive(Debug, Clone, Copy)]
enum Item {
    /// Index into the sorted leaf list.
    Leaf(u32),
    /// Two items of the previous list.
    Package(u32, u32),
}

impl HuffmanBuilder {
    /// Create a new Huffman builder.
    pub fn new(alphabet_size: usize, max_length: u8) -> Self {
        Self {
            frequencies: vec![0; alphabet_size],
            max_length,
        }
    }

    /// Create a builder pre-loaded with a frequency table.
    pub fn from_frequencies(frequencies: &[u32], max_length: u8) -> Self {
        Self {
            frequencies: frequencies.to_vec(),
            max_length,
        }
    }

    /// Add a symbol occurrence.
    pub fn add(&mut self, symbol: u16) {
        self.add_count(symbol, 1);
    }

    /// Add multiple occurrences of a symbol.
    pub fn add_count(&mut self, symbol: u16, count: u32) {
        if let Some(f) = self.frequencies.get_mut(symbol as usize) {
            *f = f.saturating_add(count);
        }
    }

    /// Build code lengths from frequencies.
    ///
    /// Returns an array where `result[i]` is the code length for symbol `i`.
    /// Unused symbols get length 0. A lone used symbol gets length 1, so the
    /// decoder always has an entry for it.
    pub fn build_lengths(&self) -> Vec<u8> {
        let mut lengths = vec![0u8; self.frequencies.len()];

        let mut symbols: Vec<(u32, usize)> = self
            .frequencies
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f > 0)
            .map(|(i, &f)| (f, i))
            .collect();

        match symbols.len() {
            0 => return lengths,
            1 => {
                lengths[symbols[0].1] = 1;
                return lengths;
            }
            _ => {}
        }

        symbols.sort_unstable();
        debug_assert!(symbols.len() <= 1 << self.max_length);

        for (depth, (_, symbol)) in self.package_merge(&symbols).into_iter().zip(&symbols) {
            lengths[*symbol] = depth;
        }
        lengths
    }

    /// Package-merge (Larmore & Hirschberg) over leaves sorted by weight.
    ///
    /// Returns the code length of each leaf, in leaf order.
    fn package_merge(&self, leaves: &[(u32, usize)]) -> Vec<u8> {
        let n = leaves.len();
        let mut arena: Vec<Item> = Vec::with_capacity(n * 2 * self.max_length as usize);
        let mut weights: Vec<u64> = Vec::with_capacity(arena.capacity());

        for (i, &(f, _)) in leaves.iter().enumerate() {
            arena.push(Item::Leaf(i as u32));
            weights.push(f as u64);
        }
        let leaf_ids: Vec<u32> = (0..n as u32).collect();

        let mut list = leaf_ids.clone();
        for _ in 1..self.max_length {
            // Pair up neighbours of the previous list.
            let mut packages = Vec::with_capacity(list.len() / 2);
            for pair in list.chunks_exact(2) {
                let id = arena.len() as u32;
                arena.push(Item::Package(pair[0], pair[1]));
                weights.push(weights[pair[0] as usize] + weights[pair[1] as usize]);
                packages.push(id);
            }

            // Merge with the leaves; leaves win ties.
            let mut merged = Vec::with_capacity(n + packages.len());
            let (mut a, mut b) = (0, 0);
            while a < n || b < packages.len() {
                let take_leaf = b == packages.len()
                    || (a < n
                        && weights[leaf_ids[a] as usize] <= weights[packages[b] as usize]);
                if take_leaf {
                    merged.push(leaf_ids[a]);
                    a += 1;
                } else {
                    merged.push(packages[b]);
                    b += 1;
                }
            }
            list = merged;
        }

        // Each appearance of a leaf among the first 2n-2 items adds one bit.
        let mut depths = vec![0u8; n];
        let mut stack: Vec<u32> = list[..2 * n - 2].to_vec();
        while let Some(id) = stack.pop() {
            match arena[id as usize] {
                Item::Leaf(leaf) => depths[leaf as usize] += 1,
                Item::Package(x, y) => {
                    stack.push(x);
                    stack.push(y);
                }
            }
        }
        depths
    }
}

/// A Huffman tree for decoding.
///
/// Codes up to `FAST_BITS` long resolve through a direct lookup table indexed
/// by the next (bit-reversed) input bits. Longer codes fall back to a
/// canonical walk over the per-length counts.
#[derive(Debug, Clone, Default)]
pub struct HuffmanTree {
    /// Direct lookup table: `(symbol, code_length)`, length 0 = not resolvable here.
    fast_table: Vec<(u16, u8)>,
    /// Number of bits for fast lookup.
    fast_bits: u8,
    /// Maximum code length in this tree (0 = empty code).
    max_code_length: u8,
    /// Number of codes of each length.
    counts: [u16; MAX_CODE_LENGTH + 1],
    /// Symbols ordered by (code length, symbol).
    symbols: Vec<u16>,
}

impl HuffmanTree {
    /// Number of bits for fast lookup table.
    const FAST_BITS: u8 = 9;

    /// Build a decoding tree for a literal/length or distance code.
    ///
    /// Over-subscribed codes are rejected. Incomplete codes are rejected too,
    /// except for the two shapes RFC 1951 permits: no codes at all, and a single
    /// one-bit code.
    pub fn from_code_lengths(code_lengths: &[u8]) -> Result<Self> {
        let mut tree = Self::default();
        tree.rebuild(code_lengths, true)?;
        Ok(tree)
    }

    /// Rebuild in place, reusing allocations.
    ///
    /// With `allow_single` false, only complete codes (or an empty one) are
    /// accepted; the code-length alphabet is built this way.
    pub fn rebuild(&mut self, code_lengths: &[u8], allow_single: bool) -> Result<()> {
        let mut counts = [0u16; MAX_CODE_LENGTH + 1];
        let mut max_length = 0u8;
        for &len in code_lengths {
            if len as usize > MAX_CODE_LENGTH {
                return Err(OxiflateError::invalid_code_lengths(format!(
                    "code length {} exceeds maximum {}",
                    len, MAX_CODE_LENGTH
                )));
            }
            counts[len as usize] += 1;
            max_length = max_length.max(len);
        }
        counts[0] = 0;

        // Walk the code space: `left` is the number of unassigned codes at each length.
        let mut left: i32 = 1;
        for &count in &counts[1..] {
            left = (left << 1) - count as i32;
            if left < 0 {
                return Err(OxiflateError::invalid_code_lengths(
                    "over-subscribed code",
                ));
            }
        }
        let used: u16 = counts.iter().sum();
        if left > 0 {
            let single_one_bit = allow_single && used == 1 && counts[1] == 1;
            if used != 0 && !single_one_bit {
                return Err(OxiflateError::invalid_code_lengths("incomplete code"));
            }
        }

        self.counts = counts;
        self.max_code_length = max_length;

        // Symbols sorted by (length, symbol).
        let mut offsets = [0u16; MAX_CODE_LENGTH + 2];
        for len in 1..=MAX_CODE_LENGTH {
            offsets[len + 1] = offsets[len] + counts[len];
        }
        self.symbols.clear();
        self.symbols.resize(used as usize, 0);
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len > 0 {
                self.symbols[offsets[len as usize] as usize] = symbol as u16;
                offsets[len as usize] += 1;
            }
        }

        // Fast table.
        self.fast_bits = Self::FAST_BITS.min(max_length.max(1));
        let size = 1usize << self.fast_bits;
        self.fast_table.clear();
        self.fast_table.resize(size, (0, 0));

        let codes = canonical_codes(code_lengths);
        for (symbol, (&len, &code)) in code_lengths.iter().zip(&codes).enumerate() {
            if len == 0 || len > self.fast_bits {
                continue;
            }
            let reversed = reverse_bits(code, len) as usize;
            let stride = 1usize << len;
            let mut index = reversed;
            while index < size {
                self.fast_table[index] = (symbol as u16, len);
                index += stride;
            }
        }

        Ok(())
    }

    /// True if no symbol has a code.
    pub fn is_empty(&self) -> bool {
        self.max_code_length == 0
    }

    /// Decode a symbol from the bit stream.
    #[inline]
    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        let bits = reader.peek_bits(self.fast_bits as u32);
        let (symbol, len) = self.fast_table[bits as usize];
        if len > 0 {
            reader.consume(len as u32)?;
            return Ok(symbol);
        }
        self.decode_slow(reader)
    }

    /// Canonical walk for codes longer than the fast table (or invalid ones).
    #[cold]
    fn decode_slow(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        let bits = reader.peek_bits(MAX_CODE_LENGTH as u32);
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;

        for len in 1..=self.max_code_length as usize {
            code |= ((bits >> (len - 1)) & 1) as i32;
            let count = self.counts[len] as i32;
            if code - first < count {
                reader.consume(len as u32)?;
                return Ok(self.symbols[(index + code - first) as usize]);
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }

        Err(OxiflateError::invalid_huffman(reader.bit_position()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kraft_sum(lengths: &[u8], max: u8) -> u64 {
        lengths
            .iter()
            .filter(|&&l| l > 0)
            .map(|&l| 1u64 << (max - l))
            .sum()
    }

    #[test]
    fn test_huffman_tree_simple() {
        // Code lengths: A=1, B=2, C=2
        // Canonical codes: A=0, B=10, C=11; sent MSB-first within LSB-first bytes
        let lengths = [1u8, 2, 2];
        let tree = HuffmanTree::from_code_lengths(&lengths).unwrap();

        // A B C A: stream bits 0 10 11 0, packed from bit 0 upwards
        let data = [0b0001_1010u8];
        let mut reader = BitReader::new(&data);

        assert_eq!(tree.decode(&mut reader).unwrap(), 0); // A
        assert_eq!(tree.decode(&mut reader).unwrap(), 1); // B
        assert_eq!(tree.decode(&mut reader).unwrap(), 2); // C
        assert_eq!(tree.decode(&mut reader).unwrap(), 0); // A
    }

    #[test]
    fn test_huffman_tree_long_codes() {
        // 1, 2, ..., 14, 15, 15: complete with codes longer than the fast table
        let mut lengths: Vec<u8> = (1..=15).collect();
        lengths.push(15);
        let tree = HuffmanTree::from_code_lengths(&lengths).unwrap();
        let code = HuffmanCode::from_lengths(&lengths);

        let mut out = [0u8; 64];
        let mut writer = oxiflate_core::BitWriter::new(&mut out);
        for symbol in (0..lengths.len()).rev() {
            let (bits, len) = code.code(symbol);
            writer.write_bits(bits as u32, len as u32);
        }
        let len = writer.finish().unwrap();

        let mut reader = BitReader::new(&out[..len]);
        for symbol in (0..lengths.len()).rev() {
            assert_eq!(tree.decode(&mut reader).unwrap(), symbol as u16);
        }
    }

    #[test]
    fn test_reject_oversubscribed() {
        let err = HuffmanTree::from_code_lengths(&[1, 1, 1]).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_reject_incomplete() {
        assert!(HuffmanTree::from_code_lengths(&[2, 2, 2]).is_err());
        // A single one-bit code is fine, but not for the code-length alphabet
        assert!(HuffmanTree::from_code_lengths(&[0, 1, 0]).is_ok());
        let mut tree = HuffmanTree::default();
        assert!(tree.rebuild(&[0, 1, 0], false).is_err());
        // A single two-bit code is never fine
        assert!(HuffmanTree::from_code_lengths(&[0, 2, 0]).is_err());
    }

    #[test]
    fn test_empty_tree() {
        let tree = HuffmanTree::from_code_lengths(&[0, 0, 0, 0]).unwrap();
        assert!(tree.is_empty());
        let data = [0xFFu8; 4];
        let mut reader = BitReader::new(&data);
        assert!(tree.decode(&mut reader).unwrap_err().is_malformed());
    }

    #[test]
    fn test_single_symbol() {
        let tree = HuffmanTree::from_code_lengths(&[0, 1, 0, 0]).unwrap();

        let data = [0b0000_0010u8];
        let mut reader = BitReader::new(&data);
        assert_eq!(tree.decode(&mut reader).unwrap(), 1);
        // The unused one-bit code
        assert!(tree.decode(&mut reader).is_err());
    }

    #[test]
    fn test_builder_prefers_frequent_symbols() {
        let mut builder = HuffmanBuilder::new(4, 15);
        builder.add_count(0, 100);
        builder.add_count(1, 50);
        builder.add_count(2, 25);
        builder.add_count(3, 25);

        let lengths = builder.build_lengths();
        assert_eq!(lengths, vec![1, 2, 3, 3]);
    }

    #[test]
    fn test_builder_respects_limit() {
        // Fibonacci weights force a depth-20 tree without a limit.
        let mut freqs = vec![0u32; 24];
        let (mut a, mut b) = (1u32, 1u32);
        for f in freqs.iter_mut() {
            *f = a;
            let next = a + b;
            a = b;
            b = next;
        }
        let lengths = HuffmanBuilder::from_frequencies(&freqs, 7).build_lengths();
        assert!(lengths.iter().all(|&l| (1..=7).contains(&l)));
        assert_eq!(kraft_sum(&lengths, 7), 1 << 7);
    }

    #[test]
    fn test_builder_edge_cases() {
        assert_eq!(HuffmanBuilder::new(5, 15).build_lengths(), vec![0; 5]);

        let mut builder = HuffmanBuilder::new(5, 15);
        builder.add(3);
        assert_eq!(builder.build_lengths(), vec![0, 0, 0, 1, 0]);

        let lengths = HuffmanBuilder::from_frequencies(&[0, 7, 0, 7], 15).build_lengths();
        assert_eq!(lengths, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_canonical_codes() {
        // RFC 1951 Section 3.2.2 example
        let lengths = [3u8, 3, 3, 3, 3, 2, 4, 4];
        let codes = canonical_codes(&lengths);
        assert_eq!(codes, vec![0b010, 0b011, 0b100, 0b101, 0b110, 0b00, 0b1110, 0b1111]);
    }

    #[test]
    fn test_reverse_bits() {
        assert_eq!(reverse_bits(0b101, 3), 0b101);
        assert_eq!(reverse_bits(0b1100, 4), 0b0011);
        assert_eq!(reverse_bits(0b10101010, 8), 0b01010101);
    }
}
