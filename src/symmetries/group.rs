//! Finite groups of site permutations.

use std::collections::HashMap;

use crate::error::{ErrorKind, Result};
use crate::symmetries::Permutation;

/// A validated permutation group with precomputed inverse and product tables.
///
/// Elements are addressed by their position in the list handed to
/// [`PermutationGroup::new`]; `inverse(i)` and `multiply(i, j)` are table
/// lookups returning such positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationGroup {
    nsites: usize,
    permutations: Vec<Permutation>,
    inverses: Vec<usize>,
    products: Vec<usize>,
}

impl PermutationGroup {
    /// Builds the group and checks every group axiom.
    ///
    /// # Arguments
    ///
    /// * `permutations`: the group elements, all acting on the same number of sites.
    ///
    /// # Returns
    ///
    /// The group, or an error naming the offending permutation if the list is
    /// empty, mixes site counts, contains duplicates, lacks the identity, lacks
    /// an inverse or is not closed under composition.
    pub fn new(permutations: Vec<Permutation>) -> Result<Self> {
        let Some(first) = permutations.first() else {
            return Err(ErrorKind::EmptyGroup.into());
        };
        let nsites = first.size();

        let mut position = HashMap::with_capacity(permutations.len());
        for (i, p) in permutations.iter().enumerate() {
            if p.size() != nsites {
                return Err(ErrorKind::SiteCountMismatch {
                    expected: nsites,
                    found: p.size(),
                }
                .into());
            }
            if position.insert(p.array().to_vec(), i).is_some() {
                return Err(ErrorKind::DuplicatePermutation {
                    permutation: p.to_string(),
                }
                .into());
            }
        }

        if !permutations.iter().any(Permutation::is_identity) {
            return Err(ErrorKind::MissingIdentity.into());
        }

        let mut inverses = Vec::with_capacity(permutations.len());
        for p in &permutations {
            match position.get(p.inverse().array()) {
                Some(&j) => inverses.push(j),
                None => {
                    return Err(ErrorKind::MissingInverse {
                        permutation: p.to_string(),
                    }
                    .into());
                }
            }
        }

        let n = permutations.len();
        let mut products = Vec::with_capacity(n * n);
        for p in &permutations {
            for q in &permutations {
                let pq = p * q;
                match position.get(pq.array()) {
                    Some(&k) => products.push(k),
                    None => {
                        return Err(ErrorKind::NotClosed {
                            first: p.to_string(),
                            second: q.to_string(),
                        }
                        .into());
                    }
                }
            }
        }

        Ok(Self {
            nsites,
            permutations,
            inverses,
            products,
        })
    }

    /// Cyclic translation group of a ring of `nsites` sites.
    pub fn cyclic(nsites: usize) -> Result<Self> {
        Self::new(
            (0..nsites.max(1))
                .map(|shift| Permutation::translation(nsites, shift))
                .collect(),
        )
    }

    pub fn nsites(&self) -> usize {
        self.nsites
    }

    pub fn size(&self) -> usize {
        self.permutations.len()
    }

    pub fn permutations(&self) -> &[Permutation] {
        &self.permutations
    }

    pub fn get(&self, sym: usize) -> &Permutation {
        &self.permutations[sym]
    }

    #[inline]
    pub fn inverse(&self, sym: usize) -> usize {
        self.inverses[sym]
    }

    /// Index of the product `s1 * s2` (`s2` acts first).
    #[inline]
    pub fn multiply(&self, s1: usize, s2: usize) -> usize {
        self.products[s1 * self.size() + s2]
    }

    pub fn identity(&self) -> usize {
        self.permutations
            .iter()
            .position(Permutation::is_identity)
            .unwrap_or(0)
    }

    /// The subgroup formed by the elements at `syms`, validated for closure.
    pub fn subgroup(&self, syms: &[usize]) -> Result<Self> {
        for &s in syms {
            if s >= self.size() {
                return Err(ErrorKind::InputError(format!(
                    "symmetry index {s} out of range for group of size {}",
                    self.size()
                ))
                .into());
            }
        }
        Self::new(syms.iter().map(|&s| self.permutations[s].clone()).collect())
    }
}
