//! Spin-1/2 bases.

use std::time::Instant;

use crate::basis::{Located, Sector, check_quantum_numbers, symmetry_action};
use crate::bits::BitPattern;
use crate::combinatorics::{Combinations, LinTable};
use crate::context::{Context, ctx_log};
use crate::error::{ErrorKind, Result};
use crate::operators::Model;
use crate::symmetries::{GroupAction, RawSpace, Representation, RepresentativeTable};

/// Spin-1/2 basis without spatial symmetries.
///
/// Row `i` is the `i`-th pattern of the raw space in ascending order: all
/// `2^n` patterns, or all patterns with `nup` bits set.
#[derive(Debug, Clone)]
pub struct Spinhalf<B: BitPattern> {
    nsites: usize,
    nup: Option<usize>,
    space: RawSpace<B>,
    states: Vec<B>,
}

impl<B: BitPattern> Spinhalf<B> {
    pub fn new(ctx: &Context, nsites: usize, nup: Option<usize>) -> Result<Self> {
        if nsites > B::MAX_SITES {
            return Err(ErrorKind::TooManySites {
                nsites,
                max: B::MAX_SITES,
            }
            .into());
        }
        let (space, states) = match nup {
            Some(nup) => {
                check_quantum_numbers(nsites, nup, 0, true)?;
                let table = LinTable::try_new(nsites, nup)?;
                (RawSpace::Fixed(table), Combinations::new(nsites, nup).collect())
            }
            None => (RawSpace::All(nsites), Vec::new()),
        };
        let basis = Self {
            nsites,
            nup,
            space,
            states,
        };
        ctx_log!(
            ctx,
            log::Level::Info,
            "Spinhalf basis: nsites={nsites}, nup={nup:?}, dimension={}",
            basis.size()
        );
        Ok(basis)
    }

    pub fn nsites(&self) -> usize {
        self.nsites
    }

    pub fn nup(&self) -> Option<usize> {
        self.nup
    }

    pub fn size(&self) -> usize {
        self.space.size()
    }

    #[inline]
    pub fn state(&self, index: usize) -> B {
        match self.space {
            RawSpace::Fixed(_) => self.states[index],
            RawSpace::All(_) => B::from_u64(index as u64),
        }
    }

    #[inline]
    pub fn index(&self, state: B) -> Option<usize> {
        self.space.index(state)
    }
}

impl<B: BitPattern> Sector<B> for Spinhalf<B> {
    fn model(&self) -> Model {
        Model::Spinhalf
    }

    fn nsites(&self) -> usize {
        self.nsites
    }

    fn size(&self) -> usize {
        self.space.size()
    }

    fn n_outer(&self) -> usize {
        self.space.size()
    }

    #[inline]
    fn visit<F: FnMut(usize, B, B, f64)>(&self, outer: usize, mut f: F) {
        f(outer, self.state(outer), B::ZERO, 1.0);
    }

    #[inline]
    fn locate(&self, ups: B, _dns: B) -> Option<Located> {
        self.space.index(ups).map(Located::plain)
    }
}

/// Spin-1/2 basis of one symmetry sector.
///
/// Rows are the orbit representatives with non-vanishing norm, in ascending
/// order.
#[derive(Debug, Clone)]
pub struct SpinhalfSymmetric<B: BitPattern> {
    nsites: usize,
    nup: Option<usize>,
    irrep: Representation,
    action: GroupAction<B>,
    table: RepresentativeTable<B>,
}

impl<B: BitPattern> SpinhalfSymmetric<B> {
    pub fn new(
        ctx: &Context,
        nsites: usize,
        nup: Option<usize>,
        irrep: &Representation,
    ) -> Result<Self> {
        if nsites > B::MAX_SITES {
            return Err(ErrorKind::TooManySites {
                nsites,
                max: B::MAX_SITES,
            }
            .into());
        }
        let start = Instant::now();
        let action = symmetry_action::<B>(nsites, irrep)?;
        let space = match nup {
            Some(nup) => {
                check_quantum_numbers(nsites, nup, 0, true)?;
                RawSpace::Fixed(LinTable::try_new(nsites, nup)?)
            }
            None => RawSpace::All(nsites),
        };
        let table = RepresentativeTable::new(space, &action, irrep)?;
        ctx_log!(
            ctx,
            log::Level::Info,
            "Symmetric spinhalf basis: nsites={nsites}, nup={nup:?}, nsyms={}, dimension={}",
            irrep.size(),
            table.len()
        );
        ctx_log!(
            ctx,
            log::Level::Debug,
            "representatives computed in {:.3}s",
            start.elapsed().as_secs_f64()
        );
        Ok(Self {
            nsites,
            nup,
            irrep: irrep.clone(),
            action,
            table,
        })
    }

    pub fn nsites(&self) -> usize {
        self.nsites
    }

    pub fn nup(&self) -> Option<usize> {
        self.nup
    }

    pub fn size(&self) -> usize {
        self.table.len()
    }

    pub fn irrep(&self) -> &Representation {
        &self.irrep
    }

    pub fn group_action(&self) -> &GroupAction<B> {
        &self.action
    }

    pub fn representatives(&self) -> &[B] {
        self.table.representatives()
    }

    pub fn norms(&self) -> Vec<f64> {
        (0..self.table.len()).map(|i| self.table.norm(i)).collect()
    }

    /// Row of the representative of `state`, if that representative is in the sector.
    pub fn index(&self, state: B) -> Option<usize> {
        self.table.index(state)
    }
}

impl<B: BitPattern> Sector<B> for SpinhalfSymmetric<B> {
    fn model(&self) -> Model {
        Model::Spinhalf
    }

    fn nsites(&self) -> usize {
        self.nsites
    }

    fn size(&self) -> usize {
        self.table.len()
    }

    fn n_outer(&self) -> usize {
        self.table.len()
    }

    #[inline]
    fn visit<F: FnMut(usize, B, B, f64)>(&self, outer: usize, mut f: F) {
        f(outer, self.table.representative(outer), B::ZERO, self.table.norm(outer));
    }

    #[inline]
    fn locate(&self, ups: B, _dns: B) -> Option<Located> {
        let row = self.table.index(ups)?;
        let sym = *self.table.syms(ups).first()? as usize;
        Some(Located {
            row,
            sym,
            fermi: false,
            norm: self.table.norm(row),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetries::PermutationGroup;

    #[test]
    fn test_four_site_ring_with_two_up_spins() {
        let ctx = Context::quiet(0);
        let plain = Spinhalf::<u16>::new(&ctx, 4, Some(2)).unwrap();
        assert_eq!(plain.size(), 6);
        let group = PermutationGroup::cyclic(4).unwrap();
        let trivial = Representation::trivial(group.clone());
        let sym = SpinhalfSymmetric::<u16>::new(&ctx, 4, Some(2), &trivial).unwrap();
        // orbits {0011, 0110, 1100, 1001} and {0101, 1010}
        assert_eq!(sym.size(), 2);
        assert_eq!(sym.representatives(), &[0b0011, 0b0101]);
        let k1 = Representation::momentum(group.clone(), 1).unwrap();
        assert_eq!(SpinhalfSymmetric::<u16>::new(&ctx, 4, Some(2), &k1).unwrap().size(), 1);
        let k2 = Representation::momentum(group, 2).unwrap();
        assert_eq!(SpinhalfSymmetric::<u16>::new(&ctx, 4, Some(2), &k2).unwrap().size(), 2);
    }

    #[test]
    fn test_sector_dimensions_add_up() {
        let ctx = Context::quiet(0);
        let group = PermutationGroup::cyclic(8).unwrap();
        for nup in [None, Some(3), Some(4)] {
            let total: usize = (0..8)
                .map(|k| {
                    let irrep = Representation::momentum(group.clone(), k).unwrap();
                    SpinhalfSymmetric::<u16>::new(&ctx, 8, nup, &irrep).unwrap().size()
                })
                .sum();
            assert_eq!(total, Spinhalf::<u16>::new(&ctx, 8, nup).unwrap().size());
        }
    }

    #[test]
    fn test_locate_plain_states() {
        let ctx = Context::quiet(0);
        let basis = Spinhalf::<u32>::new(&ctx, 5, Some(2)).unwrap();
        for i in 0..basis.size() {
            assert_eq!(basis.index(basis.state(i)), Some(i));
        }
        assert_eq!(basis.locate(0b111, 0), None);
        let all = Spinhalf::<u32>::new(&ctx, 3, None).unwrap();
        assert_eq!(all.locate(0b101, 0), Some(Located::plain(5)));
    }
}
