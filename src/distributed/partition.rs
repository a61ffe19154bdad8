//! Ownership-partitioned two-coordinate state spaces.
//!
//! A distributed state is a pair `(major, minor)` of bit patterns. Each
//! process owns the majors whose hash maps to its rank and stores, for every
//! owned major in ascending order, all minors of the matching population in
//! ascending order. In an exclusive space (the t-J model) a minor must not
//! share a set bit with its major, and minors are ranked within the holes of
//! the major.

use std::collections::HashMap;

use crate::bits::{BitPattern, deposit, extract, low_mask};
use crate::combinatorics::{Combinations, LinTable};
use crate::distributed::owner;
use crate::error::Result;

/// Allowed population pairs of a two-coordinate space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PopulationPairs {
    pub major_bits: usize,
    pub minor_bits: usize,
    /// `(major popcount, minor popcount)`, each popcount appearing at most once per side.
    pub pairs: Vec<(usize, usize)>,
    /// Major and minor occupy the same sites and must be disjoint.
    pub exclusive: bool,
}

impl PopulationPairs {
    pub(crate) fn partner_of_major(&self, k: usize) -> Option<usize> {
        self.pairs.iter().find(|p| p.0 == k).map(|p| p.1)
    }

    pub(crate) fn contains<B: BitPattern>(&self, major: B, minor: B) -> bool {
        self.partner_of_major(major.popcnt() as usize) == Some(minor.popcnt() as usize)
            && !(self.exclusive && major & minor != B::ZERO)
    }

    /// Number of sites a minor of a major with `k_major` bits is ranked over.
    fn minor_sites(&self, k_major: usize) -> usize {
        if self.exclusive {
            self.minor_bits - k_major
        } else {
            self.minor_bits
        }
    }

    /// The same space seen with the roles of the coordinates exchanged.
    pub(crate) fn swapped(&self) -> Self {
        Self {
            major_bits: self.minor_bits,
            minor_bits: self.major_bits,
            pairs: self.pairs.iter().map(|&(a, b)| (b, a)).collect(),
            exclusive: self.exclusive,
        }
    }

    /// All admissible major patterns in ascending order.
    pub(crate) fn all_majors<B: BitPattern>(&self) -> Vec<B> {
        let mut majors: Vec<B> = self
            .pairs
            .iter()
            .flat_map(|&(k, _)| Combinations::<B>::new(self.major_bits, k))
            .collect();
        majors.sort_unstable();
        majors
    }

    /// Number of admissible pairs.
    pub(crate) fn dimension(&self) -> u64 {
        use crate::combinatorics::binomial;
        self.pairs
            .iter()
            .map(|&(a, b)| binomial(self.major_bits, a) * binomial(self.minor_sites(a), b))
            .sum()
    }
}

/// The part of a two-coordinate space owned by one process.
#[derive(Debug, Clone)]
pub(crate) struct Partition<B: BitPattern> {
    space: PopulationPairs,
    majors: Vec<B>,
    index: HashMap<B, usize>,
    offsets: Vec<usize>,
    /// Minor tables indexed by the popcount of the major.
    tables: Vec<Option<LinTable<B>>>,
}

impl<B: BitPattern> Partition<B> {
    pub(crate) fn new(space: PopulationPairs, rank: usize, nprocs: usize) -> Result<Self> {
        let mut tables = vec![None; space.major_bits + 1];
        for &(k_major, k_minor) in &space.pairs {
            tables[k_major] = Some(LinTable::try_new(space.minor_sites(k_major), k_minor)?);
        }
        let majors: Vec<B> = space
            .all_majors::<B>()
            .into_iter()
            .filter(|&m| owner(m, nprocs) == rank)
            .collect();
        let mut offsets = Vec::with_capacity(majors.len() + 1);
        let mut size = 0usize;
        for &m in &majors {
            offsets.push(size);
            if let Some(table) = &tables[m.popcnt() as usize] {
                size += table.size() as usize;
            }
        }
        offsets.push(size);
        let index = majors.iter().enumerate().map(|(i, &m)| (m, i)).collect();
        Ok(Self {
            space,
            majors,
            index,
            offsets,
            tables,
        })
    }

    pub(crate) fn space(&self) -> &PopulationPairs {
        &self.space
    }

    pub(crate) fn size(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub(crate) fn majors(&self) -> &[B] {
        &self.majors
    }

    pub(crate) fn offset(&self, i: usize) -> usize {
        self.offsets[i]
    }

    /// Minors paired with the `i`-th owned major, ascending.
    pub(crate) fn minors(&self, i: usize) -> Minors<B> {
        let major = self.majors[i];
        let k = major.popcnt() as usize;
        let combinations = match self.space.partner_of_major(k) {
            Some(k_minor) => Combinations::new(self.space.minor_sites(k), k_minor),
            None => Combinations::new(0, 1),
        };
        Minors {
            combinations,
            holes: self.holes(major),
        }
    }

    /// Sites a minor of `major` is deposited into, `None` if minors are stored as is.
    #[inline]
    fn holes(&self, major: B) -> Option<B> {
        self.space
            .exclusive
            .then(|| !major & low_mask::<B>(self.space.minor_bits))
    }

    /// Local position of `(major, minor)`, `None` if not stored here.
    #[inline]
    pub(crate) fn position(&self, major: B, minor: B) -> Option<usize> {
        let i = *self.index.get(&major)?;
        let table = self.tables.get(major.popcnt() as usize)?.as_ref()?;
        if minor.popcnt() as usize != table.k() || minor >> self.space.minor_bits as u32 != B::ZERO
        {
            return None;
        }
        let ranked = match self.holes(major) {
            Some(holes) if minor & !holes != B::ZERO => return None,
            Some(holes) => extract(minor, holes),
            None => minor,
        };
        Some(self.offsets[i] + table.index(ranked))
    }

    /// The pattern pair stored at local position `row`.
    pub(crate) fn pair(&self, row: usize) -> (B, B) {
        let i = self.offsets.partition_point(|&o| o <= row) - 1;
        let major = self.majors[i];
        let minor = self.tables[major.popcnt() as usize]
            .as_ref()
            .map(|t| t.unrank((row - self.offsets[i]) as u64))
            .unwrap_or(B::ZERO);
        match self.holes(major) {
            Some(holes) => (major, deposit(minor, holes)),
            None => (major, minor),
        }
    }
}

/// Iterator over the minors of one major.
#[derive(Debug, Clone)]
pub(crate) struct Minors<B: BitPattern> {
    combinations: Combinations<B>,
    holes: Option<B>,
}

impl<B: BitPattern> Iterator for Minors<B> {
    type Item = B;

    #[inline]
    fn next(&mut self) -> Option<B> {
        let ranked = self.combinations.next()?;
        Some(match self.holes {
            Some(holes) => deposit(ranked, holes),
            None => ranked,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.combinations.size_hint()
    }
}

/// Routing of a vector between the major-owned and the minor-owned layout.
///
/// Derived independently on every process from the ownership function, so no
/// indices travel with the data.
#[derive(Debug, Clone, Default)]
pub(crate) struct TransposePlan {
    /// Local indices of the major layout, grouped by destination rank.
    pub send_order: Vec<usize>,
    pub send_counts: Vec<usize>,
    /// Target indices in the minor layout, in the order data arrives.
    pub recv_map: Vec<usize>,
    pub recv_counts: Vec<usize>,
}

impl TransposePlan {
    pub(crate) fn new<B: BitPattern>(
        major: &Partition<B>,
        minor: &Partition<B>,
        nprocs: usize,
    ) -> Self {
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); nprocs];
        for i in 0..major.majors().len() {
            let offset = major.offset(i);
            for (j, b) in major.minors(i).enumerate() {
                buckets[owner(b, nprocs)].push(offset + j);
            }
        }
        let send_counts = buckets.iter().map(Vec::len).collect();
        let send_order = buckets.concat();

        // a process sends its elements ordered by major, then by minor
        let all_majors: Vec<B> = major.space().all_majors();
        let mut recv_map = Vec::with_capacity(minor.size());
        let mut recv_counts = vec![0usize; nprocs];
        for &a in &all_majors {
            let source = owner(a, nprocs);
            let Some(k_minor) = major.space().partner_of_major(a.popcnt() as usize) else {
                continue;
            };
            for &b in minor.majors() {
                if b.popcnt() as usize == k_minor {
                    if let Some(target) = minor.position(b, a) {
                        recv_map.push((source, target));
                    }
                }
            }
        }
        // stable sort keeps the per-source order
        recv_map.sort_by_key(|&(source, _)| source);
        for &(source, _) in &recv_map {
            recv_counts[source] += 1;
        }
        Self {
            send_order,
            send_counts,
            recv_map: recv_map.into_iter().map(|(_, target)| target).collect(),
            recv_counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn electron_space() -> PopulationPairs {
        PopulationPairs {
            major_bits: 4,
            minor_bits: 4,
            pairs: vec![(2, 1)],
            exclusive: false,
        }
    }

    #[test]
    fn test_partitions_cover_the_space() {
        let space = electron_space();
        let nprocs = 3;
        let total: usize = (0..nprocs)
            .map(|r| Partition::<u16>::new(space.clone(), r, nprocs).unwrap().size())
            .sum();
        assert_eq!(total as u64, space.dimension());
        assert_eq!(space.dimension(), 24);
    }

    #[test]
    fn test_position_and_pair_agree() {
        let space = PopulationPairs {
            major_bits: 3,
            minor_bits: 3,
            pairs: vec![(0, 2), (1, 1), (2, 0)],
            exclusive: false,
        };
        let partition = Partition::<u32>::new(space, 1, 2).unwrap();
        for row in 0..partition.size() {
            let (a, b) = partition.pair(row);
            assert_eq!(partition.position(a, b), Some(row));
        }
        assert_eq!(partition.position(0b1000, 0), None);
    }

    #[test]
    fn test_exclusive_space_keeps_minors_in_the_holes() {
        let space = PopulationPairs {
            major_bits: 5,
            minor_bits: 5,
            pairs: vec![(2, 2)],
            exclusive: true,
        };
        assert_eq!(space.dimension(), 30);
        let nprocs = 2;
        let mut total = 0;
        for rank in 0..nprocs {
            let partition = Partition::<u16>::new(space.clone(), rank, nprocs).unwrap();
            for i in 0..partition.majors().len() {
                let major = partition.majors()[i];
                let minors: Vec<u16> = partition.minors(i).collect();
                assert_eq!(minors.len(), 3);
                assert!(minors.windows(2).all(|w| w[0] < w[1]));
                for (j, &minor) in minors.iter().enumerate() {
                    assert_eq!(major & minor, 0);
                    let row = partition.offset(i) + j;
                    assert_eq!(partition.position(major, minor), Some(row));
                    assert_eq!(partition.pair(row), (major, minor));
                }
                assert_eq!(partition.position(major, major), None);
            }
            total += partition.size();
        }
        assert_eq!(total, 30);
        assert!(!space.contains(0b00011u16, 0b00110));
        assert!(space.contains(0b00011u16, 0b01100));
    }
}
