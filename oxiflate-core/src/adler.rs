//! Adler-32 checksum (RFC 1950), as carried in the zlib trailer.

/// Largest prime smaller than 65536.
const ADLER_MOD: u32 = 65521;

/// Most bytes that can be summed before `b` could overflow a `u32`.
const NMAX: usize = 5552;

/// Incremental Adler-32 calculator.
///
/// # Example
///
/// ```
/// use oxiflate_core::adler::Adler32;
///
/// let mut adler = Adler32::new();
/// adler.update(b"Hello");
/// assert_eq!(adler.finish(), 0x058C01F5);
/// ```
#[derive(Clone, Debug)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    /// Create a new Adler-32 calculator.
    pub fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Resume from a previously finished checksum value.
    pub fn from_checksum(state: u32) -> Self {
        Self {
            a: state & 0xFFFF,
            b: state >> 16,
        }
    }

    /// Update the checksum with more data.
    pub fn update(&mut self, data: &[u8]) {
        let mut a = self.a;
        let mut b = self.b;

        for chunk in data.chunks(NMAX) {
            for &byte in chunk {
                a += byte as u32;
                b += a;
            }
            a %= ADLER_MOD;
            b %= ADLER_MOD;
        }

        self.a = a;
        self.b = b;
    }

    /// Return the checksum of everything seen so far.
    pub fn finish(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// Compute Adler-32 checksum of data in one shot.
    pub fn checksum(data: &[u8]) -> u32 {
        adler32(1, data)
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure-function form: extend an Adler-32 `state` with `data`.
///
/// Start from `1`; `adler32(adler32(1, a), b) == adler32(1, ab)`.
pub fn adler32(state: u32, data: &[u8]) -> u32 {
    let mut adler = Adler32::from_checksum(state);
    adler.update(data);
    adler.finish()
}
