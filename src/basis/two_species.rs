//! Two-species bases without spatial symmetries (t-J and electron models).
//!
//! A state is a pair `(ups, dns)` of bit patterns. Rows are ordered up-major:
//! all down configurations of the first up pattern, then those of the second,
//! and so on. In the t-J model the down pattern never overlaps the up
//! pattern; it is stored compressed, as the pattern of the `ndn` occupied
//! positions among the `n - nup` sites left empty by the up spins.

use crate::basis::{Located, Sector, check_quantum_numbers};
use crate::bits::{BitPattern, deposit, extract, low_mask};
use crate::combinatorics::{Combinations, LinTable};
use crate::context::{Context, ctx_log};
use crate::error::{ErrorKind, Result};
use crate::operators::Model;

#[derive(Debug, Clone)]
enum Layout<B: BitPattern> {
    /// Fixed particle numbers; `dns` holds compressed patterns in the t-J model.
    Np {
        nup: usize,
        ndn: usize,
        ups: Vec<B>,
        dns: Vec<B>,
        up_table: LinTable<B>,
        dn_table: LinTable<B>,
    },
    /// All `2^n x 2^n` configurations.
    Unrestricted,
}

#[derive(Debug, Clone)]
pub struct TwoSpecies<B: BitPattern> {
    nsites: usize,
    model: Model,
    layout: Layout<B>,
    full: B,
}

impl<B: BitPattern> TwoSpecies<B> {
    /// t-J basis with `nup` up and `ndn` down spins and no double occupancy.
    pub fn tj(ctx: &Context, nsites: usize, nup: usize, ndn: usize) -> Result<Self> {
        Self::with_numbers(ctx, nsites, nup, ndn, Model::TJ)
    }

    /// Electron basis with `nup` up and `ndn` down fermions.
    pub fn electron(ctx: &Context, nsites: usize, nup: usize, ndn: usize) -> Result<Self> {
        Self::with_numbers(ctx, nsites, nup, ndn, Model::Electron)
    }

    /// Electron basis of all particle numbers.
    pub fn electron_unrestricted(ctx: &Context, nsites: usize) -> Result<Self> {
        check_width::<B>(nsites)?;
        let basis = Self {
            nsites,
            model: Model::Electron,
            layout: Layout::Unrestricted,
            full: low_mask(nsites),
        };
        ctx_log!(
            ctx,
            log::Level::Info,
            "Electron basis: nsites={nsites}, unrestricted filling, dimension={}",
            basis.size()
        );
        Ok(basis)
    }

    fn with_numbers(
        ctx: &Context,
        nsites: usize,
        nup: usize,
        ndn: usize,
        model: Model,
    ) -> Result<Self> {
        check_width::<B>(nsites)?;
        let exclusive = model == Model::TJ;
        check_quantum_numbers(nsites, nup, ndn, exclusive)?;
        let dn_sites = if exclusive { nsites - nup } else { nsites };
        let basis = Self {
            nsites,
            model,
            layout: Layout::Np {
                nup,
                ndn,
                ups: Combinations::new(nsites, nup).collect(),
                dns: Combinations::new(dn_sites, ndn).collect(),
                up_table: LinTable::try_new(nsites, nup)?,
                dn_table: LinTable::try_new(dn_sites, ndn)?,
            },
            full: low_mask(nsites),
        };
        ctx_log!(
            ctx,
            log::Level::Info,
            "{model} basis: nsites={nsites}, nup={nup}, ndn={ndn}, dimension={}",
            basis.size()
        );
        Ok(basis)
    }

    pub fn nsites(&self) -> usize {
        self.nsites
    }

    pub fn model(&self) -> Model {
        self.model
    }

    /// `(nup, ndn)`, `None` for unrestricted filling.
    pub fn particle_numbers(&self) -> Option<(usize, usize)> {
        match &self.layout {
            Layout::Np { nup, ndn, .. } => Some((*nup, *ndn)),
            Layout::Unrestricted => None,
        }
    }

    fn n_dns(&self) -> usize {
        match &self.layout {
            Layout::Np { dns, .. } => dns.len(),
            Layout::Unrestricted => 1usize << self.nsites,
        }
    }

    pub fn size(&self) -> usize {
        self.n_outer() * self.n_dns()
    }

    /// Row of `(ups, dns)`, `None` if the state is not part of the basis.
    #[inline]
    pub fn index(&self, ups: B, dns: B) -> Option<usize> {
        match &self.layout {
            Layout::Np {
                nup,
                ndn,
                dns: dn_list,
                up_table,
                dn_table,
                ..
            } => {
                if ups.popcnt() as usize != *nup
                    || dns.popcnt() as usize != *ndn
                    || (ups | dns) & !self.full != B::ZERO
                {
                    return None;
                }
                let up_index = up_table.index(ups);
                let dn_index = if self.model == Model::TJ {
                    if ups & dns != B::ZERO {
                        return None;
                    }
                    dn_table.index(extract(dns, !ups & self.full))
                } else {
                    dn_table.index(dns)
                };
                Some(up_index * dn_list.len() + dn_index)
            }
            Layout::Unrestricted => {
                if (ups | dns) & !self.full != B::ZERO {
                    return None;
                }
                Some((ups.to_usize() << self.nsites) | dns.to_usize())
            }
        }
    }

    /// State `(ups, dns)` at `row`.
    pub fn state(&self, row: usize) -> (B, B) {
        let n_dns = self.n_dns();
        let (outer, inner) = (row / n_dns, row % n_dns);
        let mut result = (B::ZERO, B::ZERO);
        self.visit_inner(outer, inner..inner + 1, |_, u, d| result = (u, d));
        result
    }

    #[inline]
    fn visit_inner<F: FnMut(usize, B, B)>(
        &self,
        outer: usize,
        range: std::ops::Range<usize>,
        mut f: F,
    ) {
        match &self.layout {
            Layout::Np { ups, dns, .. } => {
                let u = ups[outer];
                let offset = outer * dns.len();
                if self.model == Model::TJ {
                    let holes = !u & self.full;
                    for j in range {
                        f(offset + j, u, deposit(dns[j], holes));
                    }
                } else {
                    for j in range {
                        f(offset + j, u, dns[j]);
                    }
                }
            }
            Layout::Unrestricted => {
                let u = B::from_u64(outer as u64);
                let offset = outer << self.nsites;
                for j in range {
                    f(offset + j, u, B::from_u64(j as u64));
                }
            }
        }
    }
}

fn check_width<B: BitPattern>(nsites: usize) -> Result<()> {
    if nsites > B::MAX_SITES {
        return Err(ErrorKind::TooManySites {
            nsites,
            max: B::MAX_SITES,
        }
        .into());
    }
    Ok(())
}

impl<B: BitPattern> Sector<B> for TwoSpecies<B> {
    fn model(&self) -> Model {
        self.model
    }

    fn nsites(&self) -> usize {
        self.nsites
    }

    fn size(&self) -> usize {
        TwoSpecies::size(self)
    }

    fn n_outer(&self) -> usize {
        match &self.layout {
            Layout::Np { ups, .. } => ups.len(),
            Layout::Unrestricted => 1usize << self.nsites,
        }
    }

    #[inline]
    fn visit<F: FnMut(usize, B, B, f64)>(&self, outer: usize, mut f: F) {
        self.visit_inner(outer, 0..self.n_dns(), |row, u, d| f(row, u, d, 1.0));
    }

    #[inline]
    fn locate(&self, ups: B, dns: B) -> Option<Located> {
        self.index(ups, dns).map(Located::plain)
    }
}
