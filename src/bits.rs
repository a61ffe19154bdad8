//! Fixed-width bit patterns.
//!
//! A many-body state of `n` sites is stored as an unsigned integer in which
//! bit `i` encodes the occupation of site `i`. The [`BitPattern`] trait
//! abstracts over the three supported widths (`u16`, `u32`, `u64`) so that
//! combinatorics, symmetries and bases are written once. The topmost bit of
//! each width is kept free, which bounds the number of sites to 15, 31 and 63
//! respectively. [`Width`] selects the narrowest backend for a site count.

use std::fmt::{Binary, Debug, Display};
use std::hash::Hash;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Not, Shl, Shr};

use crate::error::{ErrorKind, Result};

/// An unsigned integer used as a bit-packed many-body state.
pub trait BitPattern:
    Copy
    + Eq
    + Ord
    + Hash
    + Debug
    + Display
    + Binary
    + Default
    + Send
    + Sync
    + 'static
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + Not<Output = Self>
    + Shl<u32, Output = Self>
    + Shr<u32, Output = Self>
    + BitAndAssign
    + BitOrAssign
    + BitXorAssign
{
    /// Number of bits of the underlying integer.
    const BITS: u32;
    const ZERO: Self;
    const ONE: Self;

    /// Largest number of sites this width can hold.
    const MAX_SITES: usize = Self::BITS as usize - 1;

    fn from_u64(value: u64) -> Self;
    fn to_u64(self) -> u64;
    fn popcnt(self) -> u32;
    fn trailing_zeros(self) -> u32;
    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;

    #[inline]
    fn to_usize(self) -> usize {
        self.to_u64() as usize
    }

    /// Returns whether bit `site` is set.
    #[inline]
    fn gbit(self, site: usize) -> bool {
        (self >> site as u32) & Self::ONE == Self::ONE
    }

    #[inline]
    fn bit(site: usize) -> Self {
        Self::ONE << site as u32
    }

    /// Parity of the population count, `true` if odd.
    #[inline]
    fn parity(self) -> bool {
        self.popcnt() & 1 == 1
    }
}

macro_rules! impl_bit_pattern {
    ($($t:ty),*) => {
        $(
            impl BitPattern for $t {
                const BITS: u32 = <$t>::BITS;
                const ZERO: Self = 0;
                const ONE: Self = 1;

                #[inline]
                fn from_u64(value: u64) -> Self {
                    value as $t
                }

                #[inline]
                fn to_u64(self) -> u64 {
                    self as u64
                }

                #[inline]
                fn popcnt(self) -> u32 {
                    self.count_ones()
                }

                #[inline]
                fn trailing_zeros(self) -> u32 {
                    <$t>::trailing_zeros(self)
                }

                #[inline]
                fn wrapping_add(self, rhs: Self) -> Self {
                    <$t>::wrapping_add(self, rhs)
                }

                #[inline]
                fn wrapping_sub(self, rhs: Self) -> Self {
                    <$t>::wrapping_sub(self, rhs)
                }
            }
        )*
    };
}

impl_bit_pattern!(u16, u32, u64);

/// Pattern with the lowest `n` bits set.
#[inline]
pub fn low_mask<B: BitPattern>(n: usize) -> B {
    if n == 0 {
        B::ZERO
    } else {
        !B::ZERO >> (B::BITS - n as u32)
    }
}

/// Pattern with all bits strictly between sites `i` and `j` set.
#[inline]
pub fn between_mask<B: BitPattern>(i: usize, j: usize) -> B {
    let (lo, hi) = if i < j { (i, j) } else { (j, i) };
    if hi <= lo + 1 {
        B::ZERO
    } else {
        low_mask::<B>(hi) ^ low_mask::<B>(lo + 1)
    }
}

/// Scatters the low bits of `src` into the set positions of `mask` (pdep).
#[inline]
pub fn deposit<B: BitPattern>(src: B, mask: B) -> B {
    let mut result = B::ZERO;
    let mut mask = mask;
    let mut k = 0u32;
    while mask != B::ZERO {
        let low = mask & (!mask).wrapping_add(B::ONE);
        if (src >> k) & B::ONE == B::ONE {
            result |= low;
        }
        mask ^= low;
        k += 1;
    }
    result
}

/// Gathers the bits of `src` at the set positions of `mask` into the low bits (pext).
#[inline]
pub fn extract<B: BitPattern>(src: B, mask: B) -> B {
    let mut result = B::ZERO;
    let mut mask = mask;
    let mut k = 0u32;
    while mask != B::ZERO {
        let low = mask & (!mask).wrapping_add(B::ONE);
        if src & low != B::ZERO {
            result |= B::ONE << k;
        }
        mask ^= low;
        k += 1;
    }
    result
}

/// The integer backend chosen for a given number of sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    U16,
    U32,
    U64,
}

impl Width {
    /// Selects the narrowest width that leaves the topmost bit free.
    pub fn for_sites(nsites: usize) -> Result<Width> {
        if nsites <= u16::MAX_SITES {
            Ok(Width::U16)
        } else if nsites <= u32::MAX_SITES {
            Ok(Width::U32)
        } else if nsites <= u64::MAX_SITES {
            Ok(Width::U64)
        } else {
            Err(ErrorKind::TooManySites {
                nsites,
                max: u64::MAX_SITES,
            }
            .into())
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Width::U16 => 16,
            Width::U32 => 32,
            Width::U64 => 64,
        }
    }
}
