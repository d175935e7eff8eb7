//! LZ77 match finding and parsing for DEFLATE.
//!
//! [`MatchFinder`] keeps hash chains over the input: `head` maps the hash of
//! three bytes to the most recent position with that prefix and `prev` links
//! each position to the previous one in its chain. Slots are overwritten as
//! the window slides, so no cleanup is ever needed.
//!
//! [`Lz77Encoder`] turns the input into [`Lz77Token`]s with one of the
//! hash-chain strategies:
//! - **Greedy**: take the longest match at every position.
//! - **Lazy**: before taking a match, look one position ahead and emit a
//!   literal instead if a strictly longer match starts there.
//! - **Lazy2**: as lazy, but also consider the match two positions ahead.
//!
//! The near-optimal strategy lives in [`crate::optimal`]; it uses
//! [`MatchFinder::find_all`] to collect every useful candidate.

use crate::accel::Accel;

/// Maximum window size for DEFLATE (32KB).
pub const WINDOW_SIZE: usize = 32768;

/// Minimum match length.
pub const MIN_MATCH: usize = 3;

/// Maximum match length.
pub const MAX_MATCH: usize = 258;

/// Length-3 matches farther than this cost more than three literals.
pub const MAX_DISTANCE_FOR_MIN_MATCH: usize = 4096;

/// Empty chain slot.
const NIL: usize = usize::MAX;

/// A token produced by LZ77 compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lz77Token {
    /// A literal byte.
    Literal(u8),
    /// A back-reference to previously seen data.
    Match {
        /// Number of bytes to copy (3-258).
        length: u16,
        /// Distance back into the window (1-32768).
        distance: u16,
    },
}

/// A match candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Match length (3-258).
    pub length: u16,
    /// Match distance (1-32768).
    pub distance: u16,
}

/// Parsing strategy used by a compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Stored blocks only; no match finding.
    Stored,
    /// Longest match at each position.
    Greedy,
    /// One position of lookahead.
    Lazy,
    /// Two positions of lookahead.
    Lazy2,
    /// Cost-model dynamic programming over each block.
    NearOptimal {
        /// Number of cost-model refinement passes.
        passes: u8,
    },
}

/// Tuning parameters of a compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelParams {
    /// Parsing strategy.
    pub strategy: Strategy,
    /// Maximum hash-chain candidates examined per search.
    pub max_chain: usize,
    /// Stop searching once a match this long is found.
    pub nice_length: usize,
    /// Whether blocks end on statistical divergence.
    pub split_blocks: bool,
}

impl LevelParams {
    /// Highest supported level.
    pub const MAX_LEVEL: u32 = 12;

    /// Parameters for `level` (0-12), or `None` if out of range.
    pub fn for_level(level: u32) -> Option<Self> {
        (level <= Self::MAX_LEVEL).then(|| Self::clamped(level))
    }

    /// Parameters for `level`, treating anything above 12 as 12.
    pub fn clamped(level: u32) -> Self {
        let (strategy, max_chain, nice_length) = match level {
            0 => (Strategy::Stored, 0, 0),
            1 => (Strategy::Greedy, 2, 8),
            2 => (Strategy::Greedy, 6, 10),
            3 => (Strategy::Greedy, 12, 14),
            4 => (Strategy::Greedy, 16, 30),
            5 => (Strategy::Lazy, 16, 30),
            6 => (Strategy::Lazy, 35, 65),
            7 => (Strategy::Lazy, 100, 130),
            8 => (Strategy::Lazy2, 300, MAX_MATCH),
            9 => (Strategy::Lazy2, 600, MAX_MATCH),
            10 => (Strategy::NearOptimal { passes: 2 }, 600, MAX_MATCH),
            11 => (Strategy::NearOptimal { passes: 4 }, 800, MAX_MATCH),
            _ => (Strategy::NearOptimal { passes: 10 }, 1024, MAX_MATCH),
        };
        Self {
            strategy,
            max_chain,
            nice_length,
            split_blocks: level >= 2,
        }
    }
}

/// Hash-chain match finder over one input buffer.
///
/// Positions `0..next_insert` are in the tables. Searching at `pos` first
/// inserts every earlier position, so callers must search at non-decreasing
/// positions between [`reset`](Self::reset) calls.
#[derive(Debug, Clone)]
pub struct MatchFinder {
    head: Vec<usize>,
    prev: Vec<usize>,
    hash_bits: u32,
    prev_mask: usize,
    next_insert: usize,
    accel: Accel,
}

impl MatchFinder {
    /// Create an empty match finder using `accel` for byte comparisons.
    pub fn new(accel: Accel) -> Self {
        Self {
            head: Vec::new(),
            prev: Vec::new(),
            hash_bits: 8,
            prev_mask: 0,
            next_insert: 0,
            accel,
        }
    }

    /// Size and clear the tables for an input of `input_len` bytes.
    pub fn reset(&mut self, input_len: usize) {
        let wanted = input_len.max(1).next_power_of_two();
        self.hash_bits = wanted.trailing_zeros().clamp(8, 15);
        self.head.clear();
        self.head.resize(1 << self.hash_bits, NIL);

        let prev_len = wanted.min(WINDOW_SIZE);
        self.prev.clear();
        self.prev.resize(prev_len, NIL);
        self.prev_mask = prev_len - 1;
        self.next_insert = 0;
    }

    /// Hash of the three bytes at `pos`.
    #[inline(always)]
    fn hash(&self, data: &[u8], pos: usize) -> usize {
        let key = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], 0]);
        (key.wrapping_mul(0x9E37_79B1) >> (32 - self.hash_bits)) as usize
    }

    /// Insert all positions before `pos` into the chains.
    #[inline]
    pub fn advance_to(&mut self, data: &[u8], pos: usize) {
        let last = pos.min(data.len().saturating_sub(MIN_MATCH - 1));
        while self.next_insert < last {
            let p = self.next_insert;
            let h = self.hash(data, p);
            self.prev[p & self.prev_mask] = self.head[h];
            self.head[h] = p;
            self.next_insert += 1;
        }
        self.next_insert = self.next_insert.max(pos);
    }

    /// Walk the chain for `pos`, calling `visit(length, distance)` for each
    /// candidate that beats `best` so far. Stops when `visit` returns false.
    #[inline]
    fn walk<F>(&mut self, data: &[u8], pos: usize, max_chain: usize, mut visit: F)
    where
        F: FnMut(usize, usize) -> bool,
    {
        debug_assert!(self.next_insert <= pos, "searches must not go backwards");
        self.advance_to(data, pos);

        let max_len = (data.len() - pos).min(MAX_MATCH);
        if max_len < MIN_MATCH {
            return;
        }
        let mut best_len = MIN_MATCH - 1;
        let mut cand = self.head[self.hash(data, pos)];
        let mut chain = max_chain;

        while cand != NIL && chain > 0 {
            let distance = pos - cand;
            if distance > WINDOW_SIZE {
                break;
            }
            // The byte that would make this candidate longer than the best.
            if data[cand + best_len] == data[pos + best_len] {
                let len = self.accel.match_len(&data[cand..], &data[pos..], max_len);
                let too_far = len == MIN_MATCH && distance > MAX_DISTANCE_FOR_MIN_MATCH;
                if len > best_len && !too_far {
                    best_len = len;
                    if !visit(len, distance) || len == max_len {
                        break;
                    }
                }
            }
            let next = self.prev[cand & self.prev_mask];
            if next >= cand {
                break;
            }
            cand = next;
            chain -= 1;
        }
    }

    /// Longest match at `pos` (nearest on ties), giving up after `max_chain`
    /// candidates or once a match of `nice_length` is found.
    pub fn find(
        &mut self,
        data: &[u8],
        pos: usize,
        max_chain: usize,
        nice_length: usize,
    ) -> Option<Match> {
        let mut best = None;
        self.walk(data, pos, max_chain, |length, distance| {
            best = Some(Match {
                length: length as u16,
                distance: distance as u16,
            });
            length < nice_length
        });
        best
    }

    /// Every match at `pos` that is longer than all nearer ones, appended to
    /// `out` in increasing length order.
    pub fn find_all(
        &mut self,
        data: &[u8],
        pos: usize,
        max_chain: usize,
        nice_length: usize,
        out: &mut Vec<Match>,
    ) {
        self.walk(data, pos, max_chain, |length, distance| {
            out.push(Match {
                length: length as u16,
                distance: distance as u16,
            });
            length < nice_length
        });
    }
}

/// LZ77 encoder using the hash-chain strategies.
#[derive(Debug, Clone)]
pub struct Lz77Encoder {
    finder: MatchFinder,
    params: LevelParams,
}

impl Lz77Encoder {
    /// Create an encoder for the given level parameters.
    pub fn new(params: LevelParams, accel: Accel) -> Self {
        Self {
            finder: MatchFinder::new(accel),
            params,
        }
    }

    /// Create an encoder for `level` with the detected accelerator.
    ///
    /// Out-of-range levels are clamped to the highest level.
    pub fn with_level(level: u32) -> Self {
        Self::new(LevelParams::clamped(level), Accel::detect())
    }

    /// Level parameters in use.
    pub fn params(&self) -> &LevelParams {
        &self.params
    }

    /// Mutable access to the underlying match finder.
    pub fn finder_mut(&mut self) -> &mut MatchFinder {
        &mut self.finder
    }

    /// Prepare for a new input of `input_len` bytes.
    pub fn reset(&mut self, input_len: usize) {
        self.finder.reset(input_len);
    }

    /// Emit the tokens for one parsing step starting at `pos`.
    ///
    /// Returns the position after the emitted tokens (always > `pos`).
    pub fn step(&mut self, data: &[u8], pos: usize, out: &mut Vec<Lz77Token>) -> usize {
        let LevelParams {
            strategy,
            max_chain,
            nice_length,
            ..
        } = self.params;

        let found = match strategy {
            Strategy::Stored | Strategy::NearOptimal { .. } => None,
            _ => self.finder.find(data, pos, max_chain, nice_length),
        };
        let Some(mut current) = found else {
            out.push(Lz77Token::Literal(data[pos]));
            return pos + 1;
        };

        let mut p = pos;
        if matches!(strategy, Strategy::Lazy | Strategy::Lazy2) {
            // Defer while a later position offers a strictly longer match.
            while (current.length as usize) < nice_length && p + 1 < data.len() {
                if let Some(next) = self.finder.find(data, p + 1, max_chain, nice_length) {
                    if next.length > current.length {
                        out.push(Lz77Token::Literal(data[p]));
                        p += 1;
                        current = next;
                        continue;
                    }
                }
                if strategy == Strategy::Lazy2 && p + 2 < data.len() {
                    if let Some(next) = self.finder.find(data, p + 2, max_chain, nice_length) {
                        if next.length > current.length + 1 {
                            out.push(Lz77Token::Literal(data[p]));
                            out.push(Lz77Token::Literal(data[p + 1]));
                            p += 2;
                            current = next;
                            continue;
                        }
                    }
                }
                break;
            }
        }

        out.push(Lz77Token::Match {
            length: current.length,
            distance: current.distance,
        });
        p + current.length as usize
    }

    /// Tokenize a whole input (convenience method).
    pub fn compress(&mut self, input: &[u8]) -> Vec<Lz77Token> {
        self.reset(input.len());
        let mut tokens = Vec::with_capacity(input.len() / 2 + 16);
        let mut pos = 0;
        while pos < input.len() {
            pos = self.step(input, pos, &mut tokens);
        }
        tokens
    }

    /// Tokenize all data at once with a fresh encoder.
    pub fn compress_all(input: &[u8], level: u32) -> Vec<Lz77Token> {
        Self::with_level(level).compress(input)
    }
}

impl Default for Lz77Encoder {
    fn default() -> Self {
        Self::with_level(6)
    }
}
