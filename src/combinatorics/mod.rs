//! Bit combinatorics.
//!
//! Enumeration of fixed-popcount bit patterns in ascending integer order and
//! the [`LinTable`] indexer mapping such a pattern to its dense rank and back.

pub mod combinations;
pub mod lin_table;

pub use combinations::{Combinations, Subsets, next_combination};
pub use lin_table::LinTable;

/// Largest `n` for which binomial coefficients are tabulated.
const BINOM_MAX: usize = 64;

const fn binomial_table() -> [[u64; BINOM_MAX + 1]; BINOM_MAX + 1] {
    let mut table = [[0u64; BINOM_MAX + 1]; BINOM_MAX + 1];
    let mut n = 0;
    while n <= BINOM_MAX {
        table[n][0] = 1;
        let mut k = 1;
        while k <= n {
            table[n][k] = table[n - 1][k - 1].wrapping_add(if k < n { table[n - 1][k] } else { 0 });
            k += 1;
        }
        n += 1;
    }
    table
}

static BINOMIALS: [[u64; BINOM_MAX + 1]; BINOM_MAX + 1] = binomial_table();

/// Binomial coefficient `C(n, k)`, zero if `k > n`.
///
/// # Panics
///
/// Panics if `n > 64`; patterns never hold more than 63 sites.
#[inline]
pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n { 0 } else { BINOMIALS[n][k] }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binomial_values() {
        assert_eq!(binomial(0, 0), 1);
        assert_eq!(binomial(4, 2), 6);
        assert_eq!(binomial(10, 3), 120);
        assert_eq!(binomial(3, 5), 0);
        assert_eq!(binomial(63, 31), 916312070471295267);
        for n in 1..30 {
            let row_sum: u64 = (0..=n).map(|k| binomial(n, k)).sum();
            assert_eq!(row_sum, 1u64 << n);
        }
    }
}
