//! Action of a permutation group on bit patterns.
//!
//! Applying a permutation bit by bit costs one iteration per set bit. The
//! [`GroupAction`] instead precomputes, for every symmetry and every byte of
//! the pattern, the image of all 256 byte values; applying a symmetry is then
//! one table lookup and one OR per byte.
//!
//! The orbit operations (`representative`, `stabilizer_syms`, ...) are all
//! defined with respect to the numerically smallest pattern of an orbit.

use crate::bits::BitPattern;
use crate::symmetries::PermutationGroup;

const CHUNK_BITS: usize = 8;
const CHUNK_VALUES: usize = 1 << CHUNK_BITS;

/// Lookup-table-backed action of a [`PermutationGroup`] on patterns of type `B`.
#[derive(Debug, Clone)]
pub struct GroupAction<B: BitPattern> {
    nsites: usize,
    nsyms: usize,
    nchunks: usize,
    group: PermutationGroup,
    /// `tables[(sym * nchunks + chunk) * 256 + value]`
    tables: Vec<B>,
}

impl<B: BitPattern> GroupAction<B> {
    pub fn new(group: &PermutationGroup) -> Self {
        let nsites = group.nsites();
        let nsyms = group.size();
        let nchunks = nsites.div_ceil(CHUNK_BITS).max(1);
        let mut tables = vec![B::ZERO; nsyms * nchunks * CHUNK_VALUES];
        for sym in 0..nsyms {
            let perm = group.get(sym);
            for chunk in 0..nchunks {
                let base = (sym * nchunks + chunk) * CHUNK_VALUES;
                for value in 0..CHUNK_VALUES {
                    let mut image = B::ZERO;
                    for bit in 0..CHUNK_BITS {
                        let site = chunk * CHUNK_BITS + bit;
                        if site < nsites && (value >> bit) & 1 == 1 {
                            image |= B::bit(perm.image(site));
                        }
                    }
                    tables[base + value] = image;
                }
            }
        }
        Self {
            nsites,
            nsyms,
            nchunks,
            group: group.clone(),
            tables,
        }
    }

    pub fn nsites(&self) -> usize {
        self.nsites
    }

    pub fn n_symmetries(&self) -> usize {
        self.nsyms
    }

    pub fn group(&self) -> &PermutationGroup {
        &self.group
    }

    /// Image of `state` under symmetry `sym`.
    #[inline]
    pub fn apply(&self, sym: usize, state: B) -> B {
        let mut out = B::ZERO;
        let base = sym * self.nchunks * CHUNK_VALUES;
        let low = B::from_u64((CHUNK_VALUES - 1) as u64);
        let mut rest = state;
        let mut chunk = 0;
        while rest != B::ZERO {
            let value = (rest & low).to_usize();
            out |= self.tables[base + chunk * CHUNK_VALUES + value];
            rest = rest >> CHUNK_BITS as u32;
            chunk += 1;
        }
        out
    }

    /// Fermionic sign of realizing `sym` on the occupied sites of `state`.
    ///
    /// The occupied sites, taken in ascending order, are mapped to their images;
    /// the sign is the parity of the number of inversions in that sequence.
    /// `true` means a factor of -1.
    #[inline]
    pub fn fermi_sign(&self, sym: usize, state: B) -> bool {
        fermi_sign_of_permutation(self.group.get(sym).array(), state)
    }

    /// Smallest pattern in the orbit of `state`.
    #[inline]
    pub fn representative(&self, state: B) -> B {
        let mut rep = state;
        for sym in 0..self.nsyms {
            let image = self.apply(sym, state);
            if image < rep {
                rep = image;
            }
        }
        rep
    }

    /// Returns whether `state` is the smallest pattern of its orbit.
    #[inline]
    pub fn is_representative(&self, state: B) -> bool {
        (0..self.nsyms).all(|sym| self.apply(sym, state) >= state)
    }

    /// Representative of `state` and the first symmetry mapping onto it.
    #[inline]
    pub fn representative_sym(&self, state: B) -> (B, usize) {
        let mut rep = state;
        let mut rep_sym = self.group.identity();
        for sym in 0..self.nsyms {
            let image = self.apply(sym, state);
            if image < rep {
                rep = image;
                rep_sym = sym;
            }
        }
        (rep, rep_sym)
    }

    /// Representative of `state` and every symmetry mapping onto it.
    pub fn representative_syms(&self, state: B) -> (B, Vec<usize>) {
        let mut rep = state;
        let mut syms = Vec::new();
        for sym in 0..self.nsyms {
            let image = self.apply(sym, state);
            if image < rep {
                rep = image;
                syms.clear();
                syms.push(sym);
            } else if image == rep {
                syms.push(sym);
            }
        }
        (rep, syms)
    }

    /// Symmetries leaving `state` unchanged.
    pub fn stabilizer_syms(&self, state: B) -> Vec<usize> {
        (0..self.nsyms)
            .filter(|&sym| self.apply(sym, state) == state)
            .collect()
    }

    /// Smallest image of `state` under the symmetries in `syms`.
    #[inline]
    pub fn representative_subset(&self, state: B, syms: &[usize]) -> B {
        syms.iter()
            .map(|&sym| self.apply(sym, state))
            .min()
            .unwrap_or(state)
    }

    /// Smallest image of `state` under `syms` and the first symmetry reaching it.
    ///
    /// `syms` must not be empty.
    #[inline]
    pub fn representative_sym_subset(&self, state: B, syms: &[usize]) -> (B, usize) {
        let mut best = (state, syms[0]);
        let mut first = true;
        for &sym in syms {
            let image = self.apply(sym, state);
            if first || image < best.0 {
                best = (image, sym);
                first = false;
            }
        }
        best
    }
}

/// Parity of the permutation induced on the occupied sites of `state`.
pub fn fermi_sign_of_permutation<B: BitPattern>(array: &[usize], state: B) -> bool {
    // `seen` collects the images of the sites visited so far; every earlier
    // image larger than the current one is an inversion.
    let mut seen: u64 = 0;
    let mut inversions = 0u32;
    let mut rest = state;
    while rest != B::ZERO {
        let site = rest.trailing_zeros() as usize;
        let image = array[site];
        let above = if image >= 63 { 0 } else { !((1u64 << (image + 1)) - 1) };
        inversions += (seen & above).count_ones();
        seen |= 1u64 << image;
        rest = rest & rest.wrapping_sub(B::ONE);
    }
    inversions & 1 == 1
}
