//! Iterators over bit patterns in ascending order.

use crate::bits::{BitPattern, low_mask};
use crate::combinatorics::{LinTable, binomial};

/// Next larger pattern with the same population count.
///
/// Clears the lowest run of ones, sets the bit above it and refills the
/// remaining ones at the bottom. Zero maps to zero.
#[inline]
pub fn next_combination<B: BitPattern>(v: B) -> B {
    if v == B::ZERO {
        return B::ZERO;
    }
    let t = v | v.wrapping_sub(B::ONE);
    let t1 = t.wrapping_add(B::ONE);
    let fill = ((!t & t1).wrapping_sub(B::ONE)) >> (v.trailing_zeros() + 1);
    t1 | fill
}

/// All `n`-bit patterns with exactly `k` bits set, in ascending order.
///
/// A sub-range of ranks can be requested with [`Combinations::range`], which
/// is how parallel loops split the enumeration into contiguous chunks.
#[derive(Debug, Clone)]
pub struct Combinations<B: BitPattern> {
    current: B,
    remaining: u64,
}

impl<B: BitPattern> Combinations<B> {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            current: low_mask::<B>(k),
            remaining: binomial(n, k),
        }
    }

    /// Patterns with ranks in `[begin, end)`.
    pub fn range(n: usize, k: usize, begin: u64, end: u64) -> Self {
        let end = end.min(binomial(n, k));
        if begin >= end {
            return Self {
                current: B::ZERO,
                remaining: 0,
            };
        }
        let table = LinTable::<B>::new(n, k);
        Self {
            current: table.unrank(begin),
            remaining: end - begin,
        }
    }
}

impl<B: BitPattern> Iterator for Combinations<B> {
    type Item = B;

    #[inline]
    fn next(&mut self) -> Option<B> {
        if self.remaining == 0 {
            return None;
        }
        let out = self.current;
        self.remaining -= 1;
        if self.remaining > 0 {
            self.current = next_combination(out);
        }
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl<B: BitPattern> ExactSizeIterator for Combinations<B> {}

/// All `2^n` patterns of `n` bits in ascending order.
#[derive(Debug, Clone)]
pub struct Subsets<B: BitPattern> {
    current: u64,
    end: u64,
    _marker: std::marker::PhantomData<B>,
}

impl<B: BitPattern> Subsets<B> {
    pub fn new(n: usize) -> Self {
        Self::range(n, 0, u64::MAX)
    }

    pub fn range(n: usize, begin: u64, end: u64) -> Self {
        let size = 1u64 << n;
        Self {
            current: begin.min(size),
            end: end.min(size),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: BitPattern> Iterator for Subsets<B> {
    type Item = B;

    #[inline]
    fn next(&mut self) -> Option<B> {
        if self.current >= self.end {
            return None;
        }
        let out = B::from_u64(self.current);
        self.current += 1;
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end.saturating_sub(self.current) as usize;
        (n, Some(n))
    }
}

impl<B: BitPattern> ExactSizeIterator for Subsets<B> {}
