//! Bases of many-body states.
//!
//! A basis (or "block") fixes the model, the number of sites, the conserved
//! particle numbers and optionally a symmetry sector. The closed set of
//! variants is [`BlockOf`]; [`Block`] additionally selects the integer width
//! once, from the number of sites, so that everything downstream is generic
//! over [`BitPattern`].
//!
//! Every variant implements the crate-internal [`Sector`] trait, the single
//! interface through which the operator-application engine enumerates input
//! rows and resolves output states to rows.

pub mod spinhalf;
pub mod two_species;
pub mod two_species_symmetric;

pub use spinhalf::{Spinhalf, SpinhalfSymmetric};
pub use two_species::TwoSpecies;
pub use two_species_symmetric::TwoSpeciesSymmetric;

use crate::bits::{BitPattern, Width};
use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::operators::Model;
use crate::symmetries::{GroupAction, PermutationGroup, Representation};

/// Row of the basis an output state resolves to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Located {
    pub row: usize,
    /// Symmetry mapping the output state onto its representative.
    pub sym: usize,
    /// Fermionic sign picked up by that symmetry.
    pub fermi: bool,
    /// Norm of the representative.
    pub norm: f64,
}

impl Located {
    #[inline]
    pub(crate) fn plain(row: usize) -> Self {
        Self {
            row,
            sym: 0,
            fermi: false,
            norm: 1.0,
        }
    }
}

/// Interface between bases and the operator-application engine.
///
/// Input rows are visited in groups: the "outer" index runs over up
/// representatives (or single rows for spin models), which is the axis
/// parallel loops split into contiguous chunks.
pub(crate) trait Sector<B: BitPattern>: Sync {
    fn model(&self) -> Model;
    fn nsites(&self) -> usize;
    fn size(&self) -> usize;
    fn n_outer(&self) -> usize;

    /// Calls `f(row, ups, dns, norm)` for every row of outer index `outer`.
    fn visit<F: FnMut(usize, B, B, f64)>(&self, outer: usize, f: F);

    /// Row of the state `(ups, dns)`, `None` if it is not part of the basis.
    fn locate(&self, ups: B, dns: B) -> Option<Located>;
}

/// The basis variants for a fixed integer width.
#[derive(Debug, Clone)]
pub enum BlockOf<B: BitPattern> {
    Spinhalf(Spinhalf<B>),
    SpinhalfSymmetric(SpinhalfSymmetric<B>),
    TwoSpecies(TwoSpecies<B>),
    TwoSpeciesSymmetric(TwoSpeciesSymmetric<B>),
}

impl<B: BitPattern> BlockOf<B> {
    pub fn size(&self) -> usize {
        match self {
            BlockOf::Spinhalf(b) => b.size(),
            BlockOf::SpinhalfSymmetric(b) => b.size(),
            BlockOf::TwoSpecies(b) => b.size(),
            BlockOf::TwoSpeciesSymmetric(b) => b.size(),
        }
    }

    pub fn nsites(&self) -> usize {
        match self {
            BlockOf::Spinhalf(b) => b.nsites(),
            BlockOf::SpinhalfSymmetric(b) => b.nsites(),
            BlockOf::TwoSpecies(b) => b.nsites(),
            BlockOf::TwoSpeciesSymmetric(b) => b.nsites(),
        }
    }

    pub fn model(&self) -> Model {
        match self {
            BlockOf::Spinhalf(_) | BlockOf::SpinhalfSymmetric(_) => Model::Spinhalf,
            BlockOf::TwoSpecies(b) => b.model(),
            BlockOf::TwoSpeciesSymmetric(b) => b.model(),
        }
    }

    pub fn irrep(&self) -> Option<&Representation> {
        match self {
            BlockOf::SpinhalfSymmetric(b) => Some(b.irrep()),
            BlockOf::TwoSpeciesSymmetric(b) => Some(b.irrep()),
            _ => None,
        }
    }
}

/// A basis together with its integer width.
#[derive(Debug, Clone)]
pub enum Block {
    U16(BlockOf<u16>),
    U32(BlockOf<u32>),
    U64(BlockOf<u64>),
}

/// Builds the same basis variant at whichever width `nsites` requires.
macro_rules! with_width {
    ($nsites:expr, |$b:ident| $build:expr) => {
        match Width::for_sites($nsites)? {
            Width::U16 => {
                type $b = u16;
                Block::U16($build)
            }
            Width::U32 => {
                type $b = u32;
                Block::U32($build)
            }
            Width::U64 => {
                type $b = u64;
                Block::U64($build)
            }
        }
    };
}

impl Block {
    /// Spin-1/2 basis, with fixed number of up spins if `nup` is given.
    pub fn spinhalf(ctx: &Context, nsites: usize, nup: Option<usize>) -> Result<Block> {
        Ok(with_width!(nsites, |W| BlockOf::Spinhalf(Spinhalf::<W>::new(
            ctx, nsites, nup
        )?)))
    }

    /// Spin-1/2 basis restricted to the sector of `irrep`.
    pub fn spinhalf_symmetric(
        ctx: &Context,
        nsites: usize,
        nup: Option<usize>,
        irrep: &Representation,
    ) -> Result<Block> {
        Ok(with_width!(nsites, |W| BlockOf::SpinhalfSymmetric(
            SpinhalfSymmetric::<W>::new(ctx, nsites, nup, irrep)?
        )))
    }

    pub fn tj(ctx: &Context, nsites: usize, nup: usize, ndn: usize) -> Result<Block> {
        Ok(with_width!(nsites, |W| BlockOf::TwoSpecies(TwoSpecies::<W>::tj(
            ctx, nsites, nup, ndn
        )?)))
    }

    pub fn tj_symmetric(
        ctx: &Context,
        nsites: usize,
        nup: usize,
        ndn: usize,
        irrep: &Representation,
    ) -> Result<Block> {
        Ok(with_width!(nsites, |W| BlockOf::TwoSpeciesSymmetric(
            TwoSpeciesSymmetric::<W>::tj(ctx, nsites, nup, ndn, irrep)?
        )))
    }

    pub fn electron(ctx: &Context, nsites: usize, nup: usize, ndn: usize) -> Result<Block> {
        Ok(with_width!(nsites, |W| BlockOf::TwoSpecies(
            TwoSpecies::<W>::electron(ctx, nsites, nup, ndn)?
        )))
    }

    /// Electron basis of all `4^n` states.
    pub fn electron_unrestricted(ctx: &Context, nsites: usize) -> Result<Block> {
        Ok(with_width!(nsites, |W| BlockOf::TwoSpecies(
            TwoSpecies::<W>::electron_unrestricted(ctx, nsites)?
        )))
    }

    pub fn electron_symmetric(
        ctx: &Context,
        nsites: usize,
        nup: usize,
        ndn: usize,
        irrep: &Representation,
    ) -> Result<Block> {
        Ok(with_width!(nsites, |W| BlockOf::TwoSpeciesSymmetric(
            TwoSpeciesSymmetric::<W>::electron(ctx, nsites, nup, ndn, irrep)?
        )))
    }

    /// Electron basis of all `4^n` states restricted to the sector of `irrep`.
    pub fn electron_symmetric_unrestricted(
        ctx: &Context,
        nsites: usize,
        irrep: &Representation,
    ) -> Result<Block> {
        Ok(with_width!(nsites, |W| BlockOf::TwoSpeciesSymmetric(
            TwoSpeciesSymmetric::<W>::electron_unrestricted(ctx, nsites, irrep)?
        )))
    }

    /// Dimension of the block; zero is a valid, empty block.
    pub fn size(&self) -> usize {
        match self {
            Block::U16(b) => b.size(),
            Block::U32(b) => b.size(),
            Block::U64(b) => b.size(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn nsites(&self) -> usize {
        match self {
            Block::U16(b) => b.nsites(),
            Block::U32(b) => b.nsites(),
            Block::U64(b) => b.nsites(),
        }
    }

    pub fn model(&self) -> Model {
        match self {
            Block::U16(b) => b.model(),
            Block::U32(b) => b.model(),
            Block::U64(b) => b.model(),
        }
    }

    pub fn irrep(&self) -> Option<&Representation> {
        match self {
            Block::U16(b) => b.irrep(),
            Block::U32(b) => b.irrep(),
            Block::U64(b) => b.irrep(),
        }
    }

    pub fn width(&self) -> Width {
        match self {
            Block::U16(_) => Width::U16,
            Block::U32(_) => Width::U32,
            Block::U64(_) => Width::U64,
        }
    }
}

/// Checks a particle number against the number of sites.
pub(crate) fn check_quantum_numbers(
    nsites: usize,
    nup: usize,
    ndn: usize,
    exclusive: bool,
) -> Result<()> {
    let reason = if nup > nsites {
        Some("nup exceeds the number of sites")
    } else if ndn > nsites {
        Some("ndn exceeds the number of sites")
    } else if exclusive && nup + ndn > nsites {
        Some("nup + ndn exceeds the number of sites")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ErrorKind::InvalidQuantumNumbers {
            nsites,
            nup,
            ndn,
            reason: reason.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}

/// Checks that a representation acts on `nsites` sites and builds its action.
pub(crate) fn symmetry_action<B: BitPattern>(
    nsites: usize,
    irrep: &Representation,
) -> Result<GroupAction<B>> {
    let group: &PermutationGroup = irrep.group();
    if group.nsites() != nsites {
        return Err(ErrorKind::SiteCountMismatch {
            expected: nsites,
            found: group.nsites(),
        }
        .into());
    }
    Ok(GroupAction::new(group))
}
