//! Site permutations.

use std::fmt;
use std::ops::Mul;

use crate::bits::BitPattern;
use crate::error::{ErrorKind, Result};

/// A bijection of the sites `0..n`, stored as the image of every site.
///
/// Applying a permutation to a bit pattern moves the bit at site `i` to site
/// `array[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permutation {
    array: Vec<usize>,
}

impl Permutation {
    /// Validates that `array` is a bijection of `0..array.len()`.
    pub fn new(array: Vec<usize>) -> Result<Self> {
        let n = array.len();
        let mut seen = vec![false; n];
        for &image in &array {
            if image >= n {
                return Err(ErrorKind::InvalidPermutation {
                    reason: format!("image {image} is out of range for {n} sites"),
                    array,
                }
                .into());
            }
            if seen[image] {
                return Err(ErrorKind::InvalidPermutation {
                    reason: format!("image {image} appears more than once"),
                    array,
                }
                .into());
            }
            seen[image] = true;
        }
        Ok(Self { array })
    }

    pub fn identity(nsites: usize) -> Self {
        Self {
            array: (0..nsites).collect(),
        }
    }

    /// Cyclic shift by `shift` sites: site `i` moves to `(i + shift) mod n`.
    pub fn translation(nsites: usize, shift: usize) -> Self {
        Self {
            array: (0..nsites).map(|i| (i + shift) % nsites.max(1)).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.array.len()
    }

    pub fn array(&self) -> &[usize] {
        &self.array
    }

    #[inline]
    pub fn image(&self, site: usize) -> usize {
        self.array[site]
    }

    pub fn is_identity(&self) -> bool {
        self.array.iter().enumerate().all(|(i, &j)| i == j)
    }

    pub fn inverse(&self) -> Self {
        let mut array = vec![0; self.array.len()];
        for (i, &j) in self.array.iter().enumerate() {
            array[j] = i;
        }
        Self { array }
    }

    /// Bit-by-bit application; used to fill lookup tables and in tests.
    pub fn apply<B: BitPattern>(&self, state: B) -> B {
        let mut out = B::ZERO;
        let mut rest = state;
        while rest != B::ZERO {
            let site = rest.trailing_zeros() as usize;
            out |= B::bit(self.array[site]);
            rest = rest & rest.wrapping_sub(B::ONE);
        }
        out
    }
}

/// Composition `(p * q)[i] = p[q[i]]`, i.e. `q` acts first.
impl Mul for &Permutation {
    type Output = Permutation;

    fn mul(self, rhs: &Permutation) -> Permutation {
        Permutation {
            array: rhs.array.iter().map(|&i| self.array[i]).collect(),
        }
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_arrays_are_rejected() {
        let err = Permutation::new(vec![0, 2, 2]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid permutation [0, 2, 2]: image 2 appears more than once"
        );
        let err = Permutation::new(vec![0, 3, 1]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid permutation [0, 3, 1]: image 3 is out of range for 3 sites"
        );
    }

    #[test]
    fn test_apply_moves_bits() {
        let p = Permutation::new(vec![1, 2, 3, 0]).unwrap();
        assert_eq!(p.apply(0b0001u16), 0b0010);
        assert_eq!(p.apply(0b1000u16), 0b0001);
        assert_eq!(p.apply(0b1010u32), 0b0101);
    }

    #[test]
    fn test_product_and_inverse() {
        let p = Permutation::translation(5, 1);
        let q = Permutation::translation(5, 3);
        assert_eq!(&p * &q, Permutation::translation(5, 4));
        assert!((&p * &p.inverse()).is_identity());
        let s = 0b10110u32;
        assert_eq!((&p * &q).apply(s), p.apply(q.apply(s)));
    }
}
