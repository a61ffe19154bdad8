//! Dense ranking of fixed-popcount bit patterns.
//!
//! For patterns of `n` bits with exactly `k` bits set, the rank of a pattern
//! with set bits at positions `p_0 < p_1 < ... < p_{k-1}` is
//!
//! ```text
//! rank = C(p_0, 1) + C(p_1, 2) + ... + C(p_{k-1}, k)
//! ```
//!
//! (the combinatorial number system). For a fixed popcount this ordering
//! coincides with the ordering of the patterns as integers, so
//! `a < b <=> rank(a) < rank(b)`. The table is immutable once built and can
//! be shared freely between threads.

use crate::bits::BitPattern;
use crate::combinatorics::{binomial, next_combination};
use crate::error::{ErrorKind, Result};

/// Bijection between `k`-populated `n`-bit patterns and `0..C(n, k)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinTable<B: BitPattern> {
    n: usize,
    k: usize,
    size: u64,
    _marker: std::marker::PhantomData<B>,
}

impl<B: BitPattern> LinTable<B> {
    /// Builds the indexer for `k` out of `n` bits.
    ///
    /// # Panics
    ///
    /// Panics if `k > n` or `n` exceeds the width of `B`. Use
    /// [`LinTable::try_new`] when the arguments come from user input.
    pub fn new(n: usize, k: usize) -> Self {
        match Self::try_new(n, k) {
            Ok(table) => table,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_new(n: usize, k: usize) -> Result<Self> {
        if n > B::MAX_SITES {
            return Err(ErrorKind::TooManySites {
                nsites: n,
                max: B::MAX_SITES,
            }
            .into());
        }
        if k > n {
            return Err(ErrorKind::InvalidQuantumNumbers {
                nsites: n,
                nup: k,
                ndn: 0,
                reason: "population exceeds the number of bits".to_string(),
            }
            .into());
        }
        Ok(Self {
            n,
            k,
            size: binomial(n, k),
            _marker: std::marker::PhantomData,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of patterns, `C(n, k)`.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Rank of `pattern`, which must have exactly `k` bits set below bit `n`.
    #[inline]
    pub fn rank(&self, pattern: B) -> u64 {
        let mut rest = pattern;
        let mut rank = 0u64;
        let mut j = 1;
        while rest != B::ZERO {
            let pos = rest.trailing_zeros() as usize;
            rank += binomial(pos, j);
            rest = rest & rest.wrapping_sub(B::ONE);
            j += 1;
        }
        rank
    }

    #[inline]
    pub fn index(&self, pattern: B) -> usize {
        self.rank(pattern) as usize
    }

    /// Pattern of the given rank.
    pub fn unrank(&self, rank: u64) -> B {
        let mut rest = rank;
        let mut pattern = B::ZERO;
        let mut pos = self.n;
        for j in (1..=self.k).rev() {
            // largest position p < pos with C(p, j) <= rest
            pos -= 1;
            while binomial(pos, j) > rest {
                pos -= 1;
            }
            rest -= binomial(pos, j);
            pattern |= B::bit(pos);
        }
        pattern
    }

    /// Successor of `pattern` in rank order.
    #[inline]
    pub fn next(&self, pattern: B) -> B {
        next_combination(pattern)
    }
}
