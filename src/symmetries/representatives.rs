//! Tables of orbit representatives for a single species.

use std::ops::Range;

use rayon::prelude::*;

use crate::apply::chunk_bounds;
use crate::bits::BitPattern;
use crate::combinatorics::{Combinations, LinTable, Subsets};
use crate::error::{ErrorKind, Result};
use crate::symmetries::{GroupAction, NORM_TOL, Representation, norm};

/// Marks a raw pattern whose representative is not part of the table.
pub const INVALID_INDEX: usize = usize::MAX;

/// The unsymmetrized space a table is built over: either all patterns with a
/// fixed population or all `2^n` patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSpace<B: BitPattern> {
    Fixed(LinTable<B>),
    All(usize),
}

impl<B: BitPattern> RawSpace<B> {
    pub fn nsites(&self) -> usize {
        match self {
            RawSpace::Fixed(table) => table.n(),
            RawSpace::All(n) => *n,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            RawSpace::Fixed(table) => table.size() as usize,
            RawSpace::All(n) => 1usize << n,
        }
    }

    /// Position of `state` in the raw space, `None` if it does not belong to it.
    #[inline]
    pub fn index(&self, state: B) -> Option<usize> {
        match self {
            RawSpace::Fixed(table) => {
                (state.popcnt() as usize == table.k()).then(|| table.index(state))
            }
            RawSpace::All(n) => {
                let index = state.to_usize();
                (index < (1usize << n)).then_some(index)
            }
        }
    }

    /// Pattern at position `index`.
    #[inline]
    pub fn state(&self, index: usize) -> B {
        match self {
            RawSpace::Fixed(table) => table.unrank(index as u64),
            RawSpace::All(_) => B::from_u64(index as u64),
        }
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = B> + '_> {
        match self {
            RawSpace::Fixed(table) => Box::new(Combinations::new(table.n(), table.k())),
            RawSpace::All(n) => Box::new(Subsets::new(*n)),
        }
    }

    /// Patterns at positions `range`, in the order of [`RawSpace::iter`].
    pub fn iter_range(&self, range: Range<usize>) -> Box<dyn Iterator<Item = B> + '_> {
        let (begin, end) = (range.start as u64, range.end as u64);
        match self {
            RawSpace::Fixed(table) => {
                Box::new(Combinations::range(table.n(), table.k(), begin, end))
            }
            RawSpace::All(n) => Box::new(Subsets::range(*n, begin, end)),
        }
    }
}

/// Representatives of a raw space under a group, with the lookup data needed
/// to map any raw pattern onto its representative.
///
/// For every raw pattern the table stores the index of its representative
/// (or [`INVALID_INDEX`] if that representative has zero norm) and the
/// complete list of symmetries `g` with `g(pattern) == representative`. The
/// lists of all raw patterns share one flat buffer delimited by `sym_offsets`.
#[derive(Debug, Clone)]
pub struct RepresentativeTable<B: BitPattern> {
    space: RawSpace<B>,
    representatives: Vec<B>,
    norms: Vec<f64>,
    index_of_raw: Vec<usize>,
    sym_offsets: Vec<usize>,
    syms: Vec<u32>,
}

impl<B: BitPattern> RepresentativeTable<B> {
    /// Enumerates `space` and keeps every representative whose norm under
    /// `irrep` exceeds the tolerance.
    ///
    /// The raw space is split into one contiguous chunk per rayon thread.
    /// Symmetry lists are counted in a first pass and written into disjoint
    /// slices of a single buffer in a second one.
    pub fn new(space: RawSpace<B>, action: &GroupAction<B>, irrep: &Representation) -> Result<Self> {
        Self::with_chunks(space, action, irrep, rayon::current_num_threads())
    }

    pub(crate) fn with_chunks(
        space: RawSpace<B>,
        action: &GroupAction<B>,
        irrep: &Representation,
        nchunks: usize,
    ) -> Result<Self> {
        let nsyms = u32::try_from(action.n_symmetries()).map_err(|_| {
            ErrorKind::InputError(format!(
                "a group of {} symmetries cannot be indexed with 32 bits",
                action.n_symmetries()
            ))
        })?;
        let chunks = chunk_bounds(space.size(), nchunks);

        let found: Vec<Vec<(B, f64)>> = chunks
            .par_iter()
            .map(|range| {
                space
                    .iter_range(range.clone())
                    .filter(|&state| action.is_representative(state))
                    .filter_map(|state| {
                        let n = norm(state, action, irrep);
                        (n > NORM_TOL).then_some((state, n))
                    })
                    .collect()
            })
            .collect();
        let (representatives, norms): (Vec<B>, Vec<f64>) = found.into_iter().flatten().unzip();

        // first pass: representative index and number of symmetries per raw pattern
        let counted: Vec<(Vec<usize>, Vec<usize>)> = chunks
            .par_iter()
            .map(|range| {
                let mut indices = Vec::with_capacity(range.len());
                let mut counts = Vec::with_capacity(range.len());
                for state in space.iter_range(range.clone()) {
                    let mut rep = state;
                    let mut count = 0usize;
                    for sym in 0..nsyms {
                        let image = action.apply(sym as usize, state);
                        if image < rep {
                            rep = image;
                            count = 1;
                        } else if image == rep {
                            count += 1;
                        }
                    }
                    match representatives.binary_search(&rep) {
                        Ok(index) => {
                            indices.push(index);
                            counts.push(count);
                        }
                        Err(_) => {
                            indices.push(INVALID_INDEX);
                            counts.push(0);
                        }
                    }
                }
                (indices, counts)
            })
            .collect();

        let mut index_of_raw = Vec::with_capacity(space.size());
        let mut sym_offsets = Vec::with_capacity(space.size() + 1);
        let mut total = 0usize;
        for (indices, counts) in counted {
            index_of_raw.extend(indices);
            for count in counts {
                sym_offsets.push(total);
                total += count;
            }
        }
        sym_offsets.push(total);

        // second pass: fill disjoint slices of the flat buffer
        let mut syms = vec![0u32; total];
        let mut slices = Vec::with_capacity(chunks.len());
        let mut rest = syms.as_mut_slice();
        for range in &chunks {
            let len = sym_offsets[range.end] - sym_offsets[range.start];
            let (head, tail) = rest.split_at_mut(len);
            slices.push(head);
            rest = tail;
        }
        slices
            .into_par_iter()
            .zip(chunks.par_iter())
            .for_each(|(slots, range)| {
                let mut position = 0;
                for (raw, state) in range.clone().zip(space.iter_range(range.clone())) {
                    let index = index_of_raw[raw];
                    if index == INVALID_INDEX {
                        continue;
                    }
                    let rep = representatives[index];
                    for sym in 0..nsyms {
                        if action.apply(sym as usize, state) == rep {
                            slots[position] = sym;
                            position += 1;
                        }
                    }
                }
            });

        Ok(Self {
            space,
            representatives,
            norms,
            index_of_raw,
            sym_offsets,
            syms,
        })
    }

    pub fn space(&self) -> &RawSpace<B> {
        &self.space
    }

    pub fn len(&self) -> usize {
        self.representatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.representatives.is_empty()
    }

    pub fn representatives(&self) -> &[B] {
        &self.representatives
    }

    #[inline]
    pub fn representative(&self, index: usize) -> B {
        self.representatives[index]
    }

    #[inline]
    pub fn norm(&self, index: usize) -> f64 {
        self.norms[index]
    }

    /// Index of the representative of `state`, `None` if it is not tabulated.
    #[inline]
    pub fn index(&self, state: B) -> Option<usize> {
        let raw = self.space.index(state)?;
        let index = self.index_of_raw[raw];
        (index != INVALID_INDEX).then_some(index)
    }

    /// Symmetries mapping `state` onto its representative.
    #[inline]
    pub fn syms(&self, state: B) -> &[u32] {
        match self.space.index(state) {
            Some(raw) => &self.syms[self.sym_offsets[raw]..self.sym_offsets[raw + 1]],
            None => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetries::PermutationGroup;

    #[test]
    fn test_table_on_four_site_ring() {
        let group = PermutationGroup::cyclic(4).unwrap();
        let action = GroupAction::<u16>::new(&group);
        let irrep = Representation::trivial(group);
        let table = RepresentativeTable::new(RawSpace::Fixed(LinTable::new(4, 2)), &action, &irrep).unwrap();
        assert_eq!(table.representatives(), &[0b0011, 0b0101]);
        assert_eq!(table.index(0b1001), Some(0));
        assert_eq!(table.index(0b1010), Some(1));
        assert_eq!(table.index(0b0111), None);
        for state in [0b0011u16, 0b0110, 0b1100, 0b1001, 0b0101, 0b1010] {
            let rep = table.representative(table.index(state).unwrap());
            let syms = table.syms(state);
            assert!(!syms.is_empty());
            for &sym in syms {
                assert_eq!(action.apply(sym as usize, state), rep);
            }
        }
        assert_eq!(table.syms(0b1010).len(), 2);
    }

    #[test]
    fn test_zero_norm_representatives_are_dropped() {
        let group = PermutationGroup::cyclic(4).unwrap();
        let action = GroupAction::<u16>::new(&group);
        let k1 = Representation::momentum(group, 1).unwrap();
        let table = RepresentativeTable::new(RawSpace::All(4), &action, &k1).unwrap();
        // 0000, 1111 and 0101 are annihilated by the projector at k = π/2
        assert!(!table.representatives().contains(&0b0101));
        assert!(!table.representatives().contains(&0b0000));
        assert_eq!(table.index(0b1010), None);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_chunked_construction_matches_orbit_search() {
        let group = PermutationGroup::cyclic(12).unwrap();
        let action = GroupAction::<u16>::new(&group);
        let irrep = Representation::momentum(group, 3).unwrap();
        let space = RawSpace::Fixed(LinTable::new(12, 6));
        let serial =
            RepresentativeTable::with_chunks(space.clone(), &action, &irrep, 1).unwrap();
        let chunked = RepresentativeTable::with_chunks(space.clone(), &action, &irrep, 7).unwrap();
        assert_eq!(serial.representatives(), chunked.representatives());
        assert!(!chunked.is_empty());

        let mut listed = 0;
        for state in space.iter() {
            let (rep, expected) = action.representative_syms(state);
            let expected: Vec<u32> = expected.into_iter().map(|s| s as u32).collect();
            match chunked.index(state) {
                Some(index) => {
                    assert_eq!(chunked.representative(index), rep);
                    assert_eq!(chunked.syms(state), expected.as_slice());
                    assert_eq!(serial.syms(state), expected.as_slice());
                    listed += expected.len();
                }
                None => {
                    assert!(chunked.representatives().binary_search(&rep).is_err());
                    assert!(chunked.syms(state).is_empty());
                }
            }
        }
        assert_eq!(listed, chunked.syms.len());
    }

    #[test]
    fn test_more_chunks_than_patterns() {
        let group = PermutationGroup::cyclic(3).unwrap();
        let action = GroupAction::<u32>::new(&group);
        let irrep = Representation::trivial(group);
        let table =
            RepresentativeTable::with_chunks(RawSpace::All(3), &action, &irrep, 64).unwrap();
        assert_eq!(table.representatives(), &[0b000, 0b001, 0b011, 0b111]);
        assert_eq!(table.syms(0b111), &[0, 1, 2]);
        assert_eq!(table.syms(0b010).len(), 1);
    }
}
