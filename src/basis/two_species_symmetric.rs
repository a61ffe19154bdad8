//! Symmetry-adapted two-species bases.
//!
//! Construction follows the up-pattern orbits:
//!
//! 1. all up patterns with `nup` bits are reduced to orbit representatives
//!    (under the trivial representation, so every orbit survives);
//! 2. for an up representative with trivial stabilizer every compatible
//!    down pattern is a valid, distinct state of norm one, and the block of
//!    down patterns is stored implicitly (dense);
//! 3. otherwise every down candidate is reduced under the stabilizer of the
//!    up representative, and only canonical candidates whose two-species norm
//!    exceeds the tolerance are stored, together with their norms.
//!
//! Rows are grouped by up representative; `offset(i)` is the first row of the
//! `i`-th up representative.
//!
//! The electron model also has a variant without particle-number
//! conservation: up representatives are then taken over all `2^n` up patterns
//! and every one of the `2^n` down patterns is a candidate.

use std::borrow::Cow;
use std::time::Instant;

use crate::basis::{Located, Sector, check_quantum_numbers, symmetry_action};
use crate::bits::{BitPattern, deposit, extract, low_mask};
use crate::combinatorics::LinTable;
use crate::context::{Context, ctx_log};
use crate::error::{ErrorKind, Result};
use crate::operators::Model;
use crate::symmetries::{
    GroupAction, NORM_TOL, RawSpace, Representation, RepresentativeTable, norm_electron_subset,
};

/// Down patterns belonging to one up representative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DnBlock {
    /// Every compatible down pattern, implicitly, with norm one.
    Dense,
    /// `len` explicit canonical patterns starting at `start` in the storage.
    Listed { start: usize, len: usize },
}

#[derive(Debug, Clone)]
pub struct TwoSpeciesSymmetric<B: BitPattern> {
    nsites: usize,
    /// Particle numbers, `None` for the unrestricted electron variant.
    numbers: Option<(usize, usize)>,
    model: Model,
    irrep: Representation,
    action: GroupAction<B>,
    ups: RepresentativeTable<B>,
    /// Down candidates; compressed relative to the holes of the up pattern in the t-J model.
    dn_candidates: Vec<B>,
    dn_space: RawSpace<B>,
    blocks: Vec<DnBlock>,
    offsets: Vec<usize>,
    dns_storage: Vec<B>,
    norms_storage: Vec<f64>,
    size: usize,
    full: B,
}

impl<B: BitPattern> TwoSpeciesSymmetric<B> {
    pub fn tj(
        ctx: &Context,
        nsites: usize,
        nup: usize,
        ndn: usize,
        irrep: &Representation,
    ) -> Result<Self> {
        Self::build(ctx, nsites, Some((nup, ndn)), irrep, Model::TJ)
    }

    pub fn electron(
        ctx: &Context,
        nsites: usize,
        nup: usize,
        ndn: usize,
        irrep: &Representation,
    ) -> Result<Self> {
        Self::build(ctx, nsites, Some((nup, ndn)), irrep, Model::Electron)
    }

    /// Electron sector of `irrep` over all `4^n` states.
    pub fn electron_unrestricted(
        ctx: &Context,
        nsites: usize,
        irrep: &Representation,
    ) -> Result<Self> {
        Self::build(ctx, nsites, None, irrep, Model::Electron)
    }

    fn build(
        ctx: &Context,
        nsites: usize,
        numbers: Option<(usize, usize)>,
        irrep: &Representation,
        model: Model,
    ) -> Result<Self> {
        if nsites > B::MAX_SITES {
            return Err(ErrorKind::TooManySites {
                nsites,
                max: B::MAX_SITES,
            }
            .into());
        }
        let exclusive = model == Model::TJ;
        let (up_space, dn_space) = match numbers {
            Some((nup, ndn)) => {
                check_quantum_numbers(nsites, nup, ndn, exclusive)?;
                let dn_sites = if exclusive { nsites - nup } else { nsites };
                (
                    RawSpace::Fixed(LinTable::try_new(nsites, nup)?),
                    RawSpace::Fixed(LinTable::try_new(dn_sites, ndn)?),
                )
            }
            None => (RawSpace::All(nsites), RawSpace::All(nsites)),
        };
        let start = Instant::now();
        let action = symmetry_action::<B>(nsites, irrep)?;
        let full = low_mask::<B>(nsites);

        let trivial = Representation::trivial(irrep.group().clone());
        let ups = RepresentativeTable::new(up_space, &action, &trivial)?;
        let dn_candidates: Vec<B> = dn_space.iter().collect();

        let mut blocks = Vec::with_capacity(ups.len());
        let mut offsets = Vec::with_capacity(ups.len() + 1);
        let mut dns_storage = Vec::new();
        let mut norms_storage = Vec::new();
        let mut size = 0usize;

        for &up in ups.representatives() {
            offsets.push(size);
            let stabilizer: Vec<usize> = ups.syms(up).iter().map(|&s| s as usize).collect();
            if stabilizer.len() == 1 {
                blocks.push(DnBlock::Dense);
                size += dn_candidates.len();
                continue;
            }
            let start = dns_storage.len();
            let holes = !up & full;
            for &candidate in &dn_candidates {
                let dn = if exclusive {
                    deposit(candidate, holes)
                } else {
                    candidate
                };
                if action.representative_subset(dn, &stabilizer) != dn {
                    continue;
                }
                let norm = norm_electron_subset(up, dn, &action, irrep, &stabilizer);
                if norm > NORM_TOL {
                    dns_storage.push(dn);
                    norms_storage.push(norm);
                }
            }
            let len = dns_storage.len() - start;
            blocks.push(DnBlock::Listed { start, len });
            size += len;
        }
        offsets.push(size);

        ctx_log!(
            ctx,
            log::Level::Info,
            "Symmetric {model} basis: nsites={nsites}, (nup, ndn)={numbers:?}, nsyms={}, up representatives={}, dimension={size}",
            irrep.size(),
            ups.len()
        );
        ctx_log!(
            ctx,
            log::Level::Debug,
            "symmetric {model} basis built in {:.3}s",
            start.elapsed().as_secs_f64()
        );

        Ok(Self {
            nsites,
            numbers,
            model,
            irrep: irrep.clone(),
            action,
            ups,
            dn_candidates,
            dn_space,
            blocks,
            offsets,
            dns_storage,
            norms_storage,
            size,
            full,
        })
    }

    pub fn nsites(&self) -> usize {
        self.nsites
    }

    /// Number of up electrons, `None` without particle-number conservation.
    pub fn nup(&self) -> Option<usize> {
        self.numbers.map(|(nup, _)| nup)
    }

    pub fn ndn(&self) -> Option<usize> {
        self.numbers.map(|(_, ndn)| ndn)
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn irrep(&self) -> &Representation {
        &self.irrep
    }

    pub fn group_action(&self) -> &GroupAction<B> {
        &self.action
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn representative_ups(&self) -> &[B] {
        self.ups.representatives()
    }

    /// First row belonging to the `up_index`-th up representative.
    pub fn offset(&self, up_index: usize) -> usize {
        self.offsets[up_index]
    }

    /// Index of the up representative `up`, `None` if `up` is not one.
    pub fn up_index(&self, up: B) -> Option<usize> {
        let index = self.ups.index(up)?;
        (self.ups.representative(index) == up).then_some(index)
    }

    /// Down patterns paired with the up representative `up`, empty if `up` is not one.
    pub fn downs_for(&self, up: B) -> Cow<'_, [B]> {
        let Some(up_index) = self.up_index(up) else {
            return Cow::Borrowed(&[]);
        };
        match self.blocks[up_index] {
            DnBlock::Dense => {
                if self.model == Model::TJ {
                    let holes = !up & self.full;
                    Cow::Owned(
                        self.dn_candidates
                            .iter()
                            .map(|&c| deposit(c, holes))
                            .collect(),
                    )
                } else {
                    Cow::Borrowed(&self.dn_candidates)
                }
            }
            DnBlock::Listed { start, len } => Cow::Borrowed(&self.dns_storage[start..start + len]),
        }
    }

    /// Norms of the states of the up representative `up`, empty if `up` is not one.
    pub fn norms_for(&self, up: B) -> Cow<'_, [f64]> {
        let Some(up_index) = self.up_index(up) else {
            return Cow::Borrowed(&[]);
        };
        match self.blocks[up_index] {
            DnBlock::Dense => Cow::Owned(vec![1.0; self.dn_candidates.len()]),
            DnBlock::Listed { start, len } => {
                Cow::Borrowed(&self.norms_storage[start..start + len])
            }
        }
    }

    /// Symmetries leaving the up pattern `up` unchanged.
    pub fn stabilizer_syms(&self, up: B) -> Vec<usize> {
        self.action.stabilizer_syms(up)
    }

    /// Fermionic sign of applying `sym` to `pattern`.
    pub fn fermi_sign_for_symmetry(&self, sym: usize, pattern: B) -> bool {
        self.action.fermi_sign(sym, pattern)
    }

    /// Row of the state whose representative is `(ups, dns)`, `None` if absent.
    pub fn index(&self, ups: B, dns: B) -> Option<usize> {
        self.locate(ups, dns).map(|loc| loc.row)
    }

    #[inline]
    fn dense_row(&self, up_index: usize, up: B, dn: B) -> Option<usize> {
        let local = if self.model == Model::TJ {
            self.dn_space.index(extract(dn, !up & self.full))?
        } else {
            self.dn_space.index(dn)?
        };
        Some(self.offsets[up_index] + local)
    }

    #[inline]
    fn conserves(&self, ups: B, dns: B) -> bool {
        match self.numbers {
            Some((nup, ndn)) => ups.popcnt() as usize == nup && dns.popcnt() as usize == ndn,
            None => true,
        }
    }
}

impl<B: BitPattern> Sector<B> for TwoSpeciesSymmetric<B> {
    fn model(&self) -> Model {
        self.model
    }

    fn nsites(&self) -> usize {
        self.nsites
    }

    fn size(&self) -> usize {
        self.size
    }

    fn n_outer(&self) -> usize {
        self.ups.len()
    }

    #[inline]
    fn visit<F: FnMut(usize, B, B, f64)>(&self, outer: usize, mut f: F) {
        let up = self.ups.representative(outer);
        let offset = self.offsets[outer];
        match self.blocks[outer] {
            DnBlock::Dense => {
                if self.model == Model::TJ {
                    let holes = !up & self.full;
                    for (j, &c) in self.dn_candidates.iter().enumerate() {
                        f(offset + j, up, deposit(c, holes), 1.0);
                    }
                } else {
                    for (j, &dn) in self.dn_candidates.iter().enumerate() {
                        f(offset + j, up, dn, 1.0);
                    }
                }
            }
            DnBlock::Listed { start, len } => {
                for j in 0..len {
                    f(
                        offset + j,
                        up,
                        self.dns_storage[start + j],
                        self.norms_storage[start + j],
                    );
                }
            }
        }
    }

    #[inline]
    fn locate(&self, ups: B, dns: B) -> Option<Located> {
        if !self.conserves(ups, dns) || (self.model == Model::TJ && ups & dns != B::ZERO) {
            return None;
        }
        let up_index = self.ups.index(ups)?;
        let syms = self.ups.syms(ups);
        let up_rep = self.ups.representative(up_index);
        match self.blocks[up_index] {
            DnBlock::Dense => {
                let sym = *syms.first()? as usize;
                let dn_rep = self.action.apply(sym, dns);
                let fermi =
                    self.action.fermi_sign(sym, ups) ^ self.action.fermi_sign(sym, dns);
                Some(Located {
                    row: self.dense_row(up_index, up_rep, dn_rep)?,
                    sym,
                    fermi,
                    norm: 1.0,
                })
            }
            DnBlock::Listed { start, len } => {
                let (mut dn_rep, mut sym) = (dns, *syms.first()? as usize);
                let mut first = true;
                for &s in syms {
                    let image = self.action.apply(s as usize, dns);
                    if first || image < dn_rep {
                        dn_rep = image;
                        sym = s as usize;
                        first = false;
                    }
                }
                let stored = &self.dns_storage[start..start + len];
                let j = stored.binary_search(&dn_rep).ok()?;
                let fermi =
                    self.action.fermi_sign(sym, ups) ^ self.action.fermi_sign(sym, dns);
                Some(Located {
                    row: self.offsets[up_index] + j,
                    sym,
                    fermi,
                    norm: self.norms_storage[start + j],
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::TwoSpecies;
    use crate::symmetries::PermutationGroup;

    fn sector_sizes(model: Model, nsites: usize, nup: usize, ndn: usize) -> Vec<usize> {
        let ctx = Context::quiet(0);
        let group = PermutationGroup::cyclic(nsites).unwrap();
        (0..nsites)
            .map(|k| {
                let irrep = Representation::momentum(group.clone(), k).unwrap();
                match model {
                    Model::TJ => TwoSpeciesSymmetric::<u16>::tj(&ctx, nsites, nup, ndn, &irrep),
                    _ => TwoSpeciesSymmetric::<u16>::electron(&ctx, nsites, nup, ndn, &irrep),
                }
                .unwrap()
                .size()
            })
            .collect()
    }

    #[test]
    fn test_sectors_partition_the_tj_basis() {
        let ctx = Context::quiet(0);
        for (nsites, nup, ndn) in [(4, 1, 1), (6, 2, 2), (6, 3, 3), (5, 2, 1)] {
            let total: usize = sector_sizes(Model::TJ, nsites, nup, ndn).iter().sum();
            let plain = TwoSpecies::<u16>::tj(&ctx, nsites, nup, ndn).unwrap();
            assert_eq!(total, plain.size(), "nsites={nsites} nup={nup} ndn={ndn}");
        }
    }

    #[test]
    fn test_sectors_partition_the_electron_basis() {
        let ctx = Context::quiet(0);
        for (nsites, nup, ndn) in [(4, 2, 2), (6, 3, 2), (4, 4, 4), (5, 0, 2)] {
            let total: usize = sector_sizes(Model::Electron, nsites, nup, ndn).iter().sum();
            let plain = TwoSpecies::<u16>::electron(&ctx, nsites, nup, ndn).unwrap();
            assert_eq!(total, plain.size(), "nsites={nsites} nup={nup} ndn={ndn}");
        }
    }

    #[test]
    fn test_every_stored_state_is_canonical_and_findable() {
        let ctx = Context::quiet(0);
        let group = PermutationGroup::cyclic(6).unwrap();
        let irrep = Representation::momentum(group, 2).unwrap();
        let basis = TwoSpeciesSymmetric::<u16>::tj(&ctx, 6, 2, 2, &irrep).unwrap();
        for (i, &up) in basis.representative_ups().iter().enumerate() {
            assert_eq!(basis.up_index(up), Some(i));
            let downs = basis.downs_for(up);
            let norms = basis.norms_for(up);
            assert_eq!(downs.len(), norms.len());
            for (j, &dn) in downs.iter().enumerate() {
                assert_eq!(up & dn, 0);
                assert_eq!(basis.index(up, dn), Some(basis.offset(i) + j));
                assert!(norms[j] > NORM_TOL);
                // every image of the state maps back to the same row
                for sym in 0..6 {
                    let (u, d) = (
                        basis.group_action().apply(sym, up),
                        basis.group_action().apply(sym, dn),
                    );
                    assert_eq!(basis.index(u, d), Some(basis.offset(i) + j));
                }
            }
        }
    }

    #[test]
    fn test_zero_norm_blocks_are_empty() {
        let ctx = Context::quiet(0);
        // two sites, one up and one down fermion on each site: the swap is even
        // on the pair, so the odd sector has no states
        let group = PermutationGroup::cyclic(2).unwrap();
        let odd = Representation::momentum(group, 1).unwrap();
        let basis = TwoSpeciesSymmetric::<u16>::electron(&ctx, 2, 2, 2, &odd).unwrap();
        assert_eq!(basis.size(), 0);
        assert_eq!(basis.representative_ups(), &[0b11]);
        assert!(basis.downs_for(0b11).is_empty());
        assert_eq!(basis.index(0b11, 0b11), None);
        assert_eq!(basis.stabilizer_syms(0b11), vec![0, 1]);
        assert!(basis.fermi_sign_for_symmetry(1, 0b11));
    }

    #[test]
    fn test_non_representatives_have_no_downs() {
        let ctx = Context::quiet(0);
        let irrep = Representation::trivial(PermutationGroup::cyclic(4).unwrap());
        let basis = TwoSpeciesSymmetric::<u16>::electron(&ctx, 4, 2, 1, &irrep).unwrap();
        assert_eq!(basis.representative_ups(), &[0b0011, 0b0101]);
        assert_eq!(basis.downs_for(0b0011).len(), 4);
        assert!(basis.downs_for(0b0110).is_empty());
        assert!(basis.norms_for(0b0110).is_empty());
        assert!(basis.downs_for(0b0001).is_empty());
        assert!(basis.norms_for(0b1111_0000).is_empty());
    }

    #[test]
    fn test_unrestricted_sectors_partition_all_states() {
        let ctx = Context::quiet(0);
        for nsites in [2, 3, 4, 5] {
            let group = PermutationGroup::cyclic(nsites).unwrap();
            let mut total = 0;
            for k in 0..nsites {
                let irrep = Representation::momentum(group.clone(), k).unwrap();
                let basis =
                    TwoSpeciesSymmetric::<u16>::electron_unrestricted(&ctx, nsites, &irrep).unwrap();
                assert_eq!(basis.nup(), None);
                total += basis.size();
            }
            assert_eq!(total, 1 << (2 * nsites), "nsites={nsites}");
        }
    }

    #[test]
    fn test_unrestricted_sector_contains_every_filling() {
        let ctx = Context::quiet(0);
        let irrep = Representation::trivial(PermutationGroup::cyclic(3).unwrap());
        let basis = TwoSpeciesSymmetric::<u16>::electron_unrestricted(&ctx, 3, &irrep).unwrap();
        for (up, dn) in [(0b000, 0b000), (0b001, 0b000), (0b010, 0b110), (0b111, 0b111)] {
            let row = basis.index(up, dn).unwrap();
            assert!(row < basis.size());
            let action = basis.group_action();
            for sym in 0..3 {
                assert_eq!(basis.index(action.apply(sym, up), action.apply(sym, dn)), Some(row));
            }
        }
    }
}
