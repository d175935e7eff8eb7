//! Near-optimal parsing for the highest compression levels.
//!
//! Instead of deciding token by token, the parser first records every useful
//! match candidate for a whole block, then runs a shortest-path search from
//! the end of the block backwards: the cost of position `i` is the cheapest of
//! "literal, then the cost of `i + 1`" and "match of length `l`, then the cost
//! of `i + l`" over all candidates.
//!
//! Symbol costs come from a [`CostModel`]. The first model is built from a
//! greedy parse over the recorded candidates, taking the longest match at
//! every position. Each pass then uses the dynamic code built from the
//! previous parse's tokens. The cheapest parse wins, greedy one included.

use crate::block::{BlockSplitter, DynamicHeader, Frequencies, SOFT_MAX_BLOCK_LENGTH, fixed_cost};
use crate::huffman::MAX_CODE_LENGTH;
use crate::lz77::{LevelParams, Lz77Token, MAX_MATCH, MIN_MATCH, Match, MatchFinder, Strategy};
use crate::tables::{
    DISTANCE_EXTRA_BITS, distance_code_index, fixed_distance_lengths, fixed_litlen_lengths,
    length_to_code,
};

/// Estimated bit cost of every literal, match length and distance code.
#[derive(Debug, Clone)]
pub struct CostModel {
    literal: [u32; 256],
    /// Indexed by match length; entries below 3 are unused.
    length: [u32; MAX_MATCH + 1],
    distance: [u32; 30],
}

impl CostModel {
    /// Costs of the fixed Huffman code.
    pub fn fixed() -> Self {
        Self::from_lengths(&fixed_litlen_lengths(), &fixed_distance_lengths())
    }

    /// Costs of a code with the given lengths.
    ///
    /// Symbols the code leaves unused are priced one bit above its longest
    /// codeword, so the next pass may still pick them up.
    pub fn from_lengths(litlen_lengths: &[u8], dist_lengths: &[u8]) -> Self {
        let unused_cost = |lengths: &[u8]| {
            let longest = lengths.iter().copied().max().unwrap_or(0) as u32;
            (longest + 1).min(MAX_CODE_LENGTH as u32)
        };
        let litlen_unused = unused_cost(litlen_lengths);
        let dist_unused = unused_cost(dist_lengths);
        let litlen_cost = |symbol: usize| match litlen_lengths[symbol] {
            0 => litlen_unused,
            len => len as u32,
        };

        let mut model = Self {
            literal: [0; 256],
            length: [0; MAX_MATCH + 1],
            distance: [0; 30],
        };
        for (byte, cost) in model.literal.iter_mut().enumerate() {
            *cost = litlen_cost(byte);
        }
        for len in MIN_MATCH..=MAX_MATCH {
            let (symbol, extra_bits, _) = length_to_code(len as u16);
            model.length[len] = litlen_cost(symbol as usize) + extra_bits as u32;
        }
        for (code, cost) in model.distance.iter_mut().enumerate() {
            let len = match dist_lengths[code] {
                0 => dist_unused,
                len => len as u32,
            };
            *cost = len + DISTANCE_EXTRA_BITS[code] as u32;
        }
        model
    }

    /// Cost of a literal byte.
    #[inline]
    pub fn literal_cost(&self, byte: u8) -> u32 {
        self.literal[byte as usize]
    }

    /// Cost of a match.
    #[inline]
    pub fn match_cost(&self, length: usize, distance: u16) -> u32 {
        self.length[length] + self.distance[distance_code_index(distance)]
    }
}

/// Decision recorded for one position by the backward pass.
#[derive(Debug, Clone, Copy, Default)]
struct Choice {
    /// Match length, or 1 for a literal.
    length: u16,
    distance: u16,
}

/// Block-at-a-time near-optimal parser.
#[derive(Debug, Clone)]
pub struct NearOptimalParser {
    max_chain: usize,
    nice_length: usize,
    passes: u8,
    /// Candidates of every position in the block, back to back.
    matches: Vec<Match>,
    /// `matches[offsets[k]..offsets[k + 1]]` belong to block position `k`.
    offsets: Vec<u32>,
    costs: Vec<u32>,
    choices: Vec<Choice>,
    scratch: Vec<Lz77Token>,
}

impl NearOptimalParser {
    /// Create a parser for level parameters with the near-optimal strategy.
    ///
    /// Other strategies get a single pass.
    pub fn new(params: &LevelParams) -> Self {
        let passes = match params.strategy {
            Strategy::NearOptimal { passes } => passes.max(1),
            _ => 1,
        };
        Self {
            max_chain: params.max_chain,
            nice_length: params.nice_length,
            passes,
            matches: Vec::new(),
            offsets: Vec::new(),
            costs: Vec::new(),
            choices: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Record candidates from `start` until the block ends.
    ///
    /// The block ends at the end of `data`, after `SOFT_MAX_BLOCK_LENGTH`
    /// bytes, or where `splitter` says so (when `split` is set). Returns the
    /// end position.
    pub fn collect_block(
        &mut self,
        finder: &mut MatchFinder,
        data: &[u8],
        start: usize,
        splitter: &mut BlockSplitter,
        split: bool,
    ) -> usize {
        self.matches.clear();
        self.offsets.clear();

        let mut pos = start;
        while pos < data.len() && pos - start < SOFT_MAX_BLOCK_LENGTH {
            self.offsets.push(self.matches.len() as u32);
            let before = self.matches.len();
            finder.find_all(data, pos, self.max_chain, self.nice_length, &mut self.matches);

            match self.matches[before..].last().copied() {
                Some(longest) => {
                    splitter.observe_match(longest.length);
                    let length = longest.length as usize;
                    if length >= self.nice_length {
                        // Long enough to take outright; skip searching inside it.
                        for _ in 1..length {
                            self.offsets.push(self.matches.len() as u32);
                        }
                        pos += length;
                    } else {
                        pos += 1;
                    }
                }
                None => {
                    splitter.observe_literal(data[pos]);
                    pos += 1;
                }
            }

            if split && splitter.should_end(pos - start, data.len() - pos) {
                break;
            }
        }
        self.offsets.push(self.matches.len() as u32);
        pos
    }

    /// Parse `data[start..end]` (the range of the last
    /// [`collect_block`](Self::collect_block)) into `out`.
    pub fn parse(&mut self, data: &[u8], start: usize, end: usize, out: &mut Vec<Lz77Token>) {
        debug_assert_eq!(self.offsets.len(), end - start + 1);
        out.clear();
        let mut best_bits = u64::MAX;

        self.trace_longest(data, start, end);
        let mut model = self.keep_if_cheaper(out, &mut best_bits);
        for _ in 0..self.passes {
            self.find_costs(data, start, end, &model);
            self.trace(data, start, end);
            model = self.keep_if_cheaper(out, &mut best_bits);
        }
    }

    /// Move the parse in `self.scratch` to `out` if it encodes smaller than
    /// `best_bits`, and return the cost model of its dynamic code.
    fn keep_if_cheaper(&mut self, out: &mut Vec<Lz77Token>, best_bits: &mut u64) -> CostModel {
        let freqs = Frequencies::from_tokens(&self.scratch);
        let header = DynamicHeader::build(&freqs);
        let bits = fixed_cost(&freqs).min(header.block_bits(&freqs));
        if bits < *best_bits {
            *best_bits = bits;
            std::mem::swap(out, &mut self.scratch);
        }
        CostModel::from_lengths(
            header.litlen_code().lengths(),
            header.distance_code().lengths(),
        )
    }

    /// Greedy parse into `self.scratch`: the longest candidate at every
    /// position.
    fn trace_longest(&mut self, data: &[u8], start: usize, end: usize) {
        self.scratch.clear();
        let n = end - start;
        let mut k = 0;
        while k < n {
            let candidates = self.offsets[k] as usize..self.offsets[k + 1] as usize;
            let longest = self.matches[candidates].last().copied();
            match longest.map(|m| (m, (m.length as usize).min(n - k))) {
                Some((m, length)) if length >= MIN_MATCH => {
                    self.scratch.push(Lz77Token::Match {
                        length: length as u16,
                        distance: m.distance,
                    });
                    k += length;
                }
                _ => {
                    self.scratch.push(Lz77Token::Literal(data[start + k]));
                    k += 1;
                }
            }
        }
    }

    /// Backward pass: cheapest cost from every position to the block end.
    fn find_costs(&mut self, data: &[u8], start: usize, end: usize, model: &CostModel) {
        let n = end - start;
        self.costs.clear();
        self.costs.resize(n + 1, 0);
        self.choices.clear();
        self.choices.resize(n, Choice::default());

        for k in (0..n).rev() {
            let mut best = model.literal_cost(data[start + k]) + self.costs[k + 1];
            let mut choice = Choice {
                length: 1,
                distance: 0,
            };

            // Each candidate covers the lengths above the previous one.
            let limit = n - k;
            let mut len = MIN_MATCH;
            let candidates = self.offsets[k] as usize..self.offsets[k + 1] as usize;
            for m in &self.matches[candidates] {
                let max_len = (m.length as usize).min(limit);
                while len <= max_len {
                    let cost = model.match_cost(len, m.distance) + self.costs[k + len];
                    if cost < best {
                        best = cost;
                        choice = Choice {
                            length: len as u16,
                            distance: m.distance,
                        };
                    }
                    len += 1;
                }
            }

            self.costs[k] = best;
            self.choices[k] = choice;
        }
    }

    /// Forward pass: follow the recorded choices into `self.scratch`.
    fn trace(&mut self, data: &[u8], start: usize, end: usize) {
        self.scratch.clear();
        let mut k = 0;
        while k < end - start {
            let choice = self.choices[k];
            if choice.length as usize >= MIN_MATCH {
                self.scratch.push(Lz77Token::Match {
                    length: choice.length,
                    distance: choice.distance,
                });
                k += choice.length as usize;
            } else {
                self.scratch.push(Lz77Token::Literal(data[start + k]));
                k += 1;
            }
        }
    }
}
