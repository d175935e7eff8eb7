//! Interchangeable accelerated kernels.
//!
//! The match finder spends its time comparing byte runs and the decompressor
//! spends its time copying back-references. Byte comparison has one kernel
//! per CPU capability. Copying has a scalar kernel and a chunked one built on
//! `copy_within`, which the word and SIMD variants share. Every variant
//! returns exactly the same result for the same input; only speed differs.
//!
//! [`Accel::detect`] picks the best supported variant once per process.

use std::sync::OnceLock;

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::{
    __m128i, __m256i, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm256_cmpeq_epi8,
    _mm256_loadu_si256, _mm256_movemask_epi8,
};

/// A kernel implementation, tagged by the capability it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accel {
    /// Byte-at-a-time reference implementation.
    Scalar,
    /// Portable 64-bit word implementation.
    Word,
    /// 16-byte SSE2 compares (x86_64).
    Sse2,
    /// 32-byte AVX2 compares (x86_64).
    Avx2,
}

impl Accel {
    /// Every variant, slowest first.
    pub const ALL: [Accel; 4] = [Accel::Scalar, Accel::Word, Accel::Sse2, Accel::Avx2];

    /// Best variant supported by the running CPU (cached).
    pub fn detect() -> Self {
        static BEST: OnceLock<Accel> = OnceLock::new();
        *BEST.get_or_init(|| {
            Self::ALL
                .into_iter()
                .rev()
                .find(|accel| accel.is_supported())
                .unwrap_or(Accel::Scalar)
        })
    }

    /// All variants the running CPU supports.
    pub fn available() -> Vec<Self> {
        Self::ALL.into_iter().filter(|a| a.is_supported()).collect()
    }

    /// Whether this CPU can run the variant.
    pub fn is_supported(self) -> bool {
        match self {
            Accel::Scalar | Accel::Word => true,
            #[cfg(target_arch = "x86_64")]
            Accel::Sse2 => is_x86_feature_detected!("sse2"),
            #[cfg(target_arch = "x86_64")]
            Accel::Avx2 => is_x86_feature_detected!("avx2"),
            #[cfg(not(target_arch = "x86_64"))]
            Accel::Sse2 | Accel::Avx2 => false,
        }
    }

    /// Short lowercase name, for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Accel::Scalar => "scalar",
            Accel::Word => "word",
            Accel::Sse2 => "sse2",
            Accel::Avx2 => "avx2",
        }
    }

    /// Length of the common prefix of `a` and `b`, capped at `max`.
    ///
    /// Falls back to the word variant when the CPU lacks the requested
    /// instructions.
    #[inline]
    pub fn match_len(self, a: &[u8], b: &[u8], max: usize) -> usize {
        let limit = max.min(a.len()).min(b.len());
        match self {
            Accel::Scalar => match_len_scalar(a, b, limit),
            Accel::Word => match_len_word(a, b, limit),
            #[cfg(target_arch = "x86_64")]
            Accel::Sse2 if is_x86_feature_detected!("sse2") => {
                // SAFETY: SSE2 support was just checked; loads stay below `limit`.
                unsafe { match_len_sse2(a, b, limit) }
            }
            #[cfg(target_arch = "x86_64")]
            Accel::Avx2 if is_x86_feature_detected!("avx2") => {
                // SAFETY: AVX2 support was just checked; loads stay below `limit`.
                unsafe { match_len_avx2(a, b, limit) }
            }
            _ => match_len_word(a, b, limit),
        }
    }

    /// Copy `length` bytes to `buf[pos..]` from `distance` bytes back.
    ///
    /// Source and destination may overlap; the result is the same as copying
    /// one byte at a time, so distance 1 repeats the previous byte.
    ///
    /// Only [`Accel::Scalar`] has its own kernel here. The other variants
    /// copy in chunks of up to `distance` bytes with `copy_within`.
    ///
    /// # Panics
    ///
    /// Panics if `distance` is 0, exceeds `pos`, or `pos + length` exceeds
    /// `buf.len()`. Callers validate these first.
    #[inline]
    pub fn copy_match(self, buf: &mut [u8], pos: usize, distance: usize, length: usize) {
        assert!(distance >= 1 && distance <= pos && pos + length <= buf.len());
        match self {
            Accel::Scalar => {
                for i in pos..pos + length {
                    buf[i] = buf[i - distance];
                }
            }
            Accel::Word | Accel::Sse2 | Accel::Avx2 => {
                copy_match_doubling(buf, pos, distance, length)
            }
        }
    }
}

impl Default for Accel {
    fn default() -> Self {
        Self::detect()
    }
}

#[inline]
fn match_len_scalar(a: &[u8], b: &[u8], limit: usize) -> usize {
    a[..limit]
        .iter()
        .zip(&b[..limit])
        .take_while(|(x, y)| x == y)
        .count()
}

#[inline]
fn match_len_word(a: &[u8], b: &[u8], limit: usize) -> usize {
    let mut len = 0;
    while len + 8 <= limit {
        let mut wa = [0u8; 8];
        let mut wb = [0u8; 8];
        wa.copy_from_slice(&a[len..len + 8]);
        wb.copy_from_slice(&b[len..len + 8]);
        let diff = u64::from_le_bytes(wa) ^ u64::from_le_bytes(wb);
        if diff != 0 {
            return len + (diff.trailing_zeros() / 8) as usize;
        }
        len += 8;
    }
    len + match_len_scalar(&a[len..], &b[len..], limit - len)
}

/// # Safety
/// Caller must ensure SSE2 is available and `limit <= a.len().min(b.len())`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn match_len_sse2(a: &[u8], b: &[u8], limit: usize) -> usize {
    let mut len = 0;
    while len + 16 <= limit {
        // SAFETY: `len + 16 <= limit` keeps both unaligned loads in bounds.
        let mask = unsafe {
            let va = _mm_loadu_si128(a.as_ptr().add(len) as *const __m128i);
            let vb = _mm_loadu_si128(b.as_ptr().add(len) as *const __m128i);
            _mm_movemask_epi8(_mm_cmpeq_epi8(va, vb)) as u32
        };
        if mask != 0xFFFF {
            return len + (!mask).trailing_zeros() as usize;
        }
        len += 16;
    }
    len + match_len_word(&a[len..], &b[len..], limit - len)
}

/// # Safety
/// Caller must ensure AVX2 is available and `limit <= a.len().min(b.len())`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn match_len_avx2(a: &[u8], b: &[u8], limit: usize) -> usize {
    let mut len = 0;
    while len + 32 <= limit {
        // SAFETY: `len + 32 <= limit` keeps both unaligned loads in bounds.
        let mask = unsafe {
            let va = _mm256_loadu_si256(a.as_ptr().add(len) as *const __m256i);
            let vb = _mm256_loadu_si256(b.as_ptr().add(len) as *const __m256i);
            _mm256_movemask_epi8(_mm256_cmpeq_epi8(va, vb)) as u32
        };
        if mask != u32::MAX {
            return len + (!mask).trailing_zeros() as usize;
        }
        len += 32;
    }
    // SAFETY: AVX2 implies SSE2; bounds unchanged.
    len + unsafe { match_len_sse2(&a[len..], &b[len..], limit - len) }
}

/// Overlapping copy in non-overlapping `copy_within` steps.
///
/// After `k * distance` bytes the region behind `pos` repeats with period
/// `distance`, so each step may copy everything written so far.
#[inline]
fn copy_match_doubling(buf: &mut [u8], pos: usize, distance: usize, length: usize) {
    let start = pos - distance;
    let mut done = 0;
    while done < length {
        let n = (distance + done).min(length - done);
        buf.copy_within(start..start + n, pos + done);
        done += n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize, seed: u32) -> Vec<u8> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                b"abcab"[(state >> 16) as usize % 5]
            })
            .collect()
    }

    #[test]
    fn test_detect_is_supported() {
        let best = Accel::detect();
        assert!(best.is_supported());
        assert!(Accel::available().contains(&best));
        assert!(Accel::available().contains(&Accel::Scalar));
    }

    #[test]
    fn test_match_len_variants_agree() {
        let data = sample(4096, 7);
        for accel in Accel::ALL {
            for (i, j) in [(0, 5), (10, 300), (17, 18), (1000, 3000), (4000, 4090)] {
                for max in [0, 3, 15, 16, 31, 32, 33, 258] {
                    let expected =
                        match_len_scalar(&data[i..], &data[j..], max.min(data.len() - j));
                    assert_eq!(
                        accel.match_len(&data[i..], &data[j..], max),
                        expected,
                        "{} at ({}, {}) max {}",
                        accel.name(),
                        i,
                        j,
                        max
                    );
                }
            }
        }
    }

    #[test]
    fn test_match_len_full_and_mismatch() {
        let a = vec![7u8; 300];
        let mut b = a.clone();
        b[100] = 8;
        for accel in Accel::ALL {
            assert_eq!(accel.match_len(&a, &a, 258), 258);
            assert_eq!(accel.match_len(&a, &b, 258), 100);
            assert_eq!(accel.match_len(&a, &b[..40], 258), 40);
        }
    }

    #[test]
    fn test_copy_match_overlapping() {
        for accel in Accel::ALL {
            let mut buf = vec![0u8; 259];
            buf[0] = b'A';
            accel.copy_match(&mut buf, 1, 1, 258);
            assert!(buf.iter().all(|&b| b == b'A'), "{}", accel.name());

            let mut buf = b"xyz".to_vec();
            buf.resize(3 + 10, 0);
            accel.copy_match(&mut buf, 3, 3, 10);
            assert_eq!(&buf, b"xyzxyzxyzxyzx");
        }
    }

    #[test]
    fn test_copy_match_variants_agree() {
        let base = sample(600, 99);
        for distance in [1, 2, 3, 7, 16, 31, 100, 300] {
            for length in [3, 4, 17, 64, 258] {
                let pos = 300;
                let mut reference = base.clone();
                Accel::Scalar.copy_match(&mut reference, pos, distance, length);
                for accel in Accel::ALL {
                    let mut buf = base.clone();
                    accel.copy_match(&mut buf, pos, distance, length);
                    assert_eq!(buf, reference, "{} d={} l={}", accel.name(), distance, length);
                }
            }
        }
    }
}
