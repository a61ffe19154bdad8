//! Bases partitioned over the processes of a group.
//!
//! A distributed block stores every state as a pair of patterns and keeps two
//! layouts of the same space: the major layout, owned by the hash of the
//! first pattern, in which vectors live, and the transposed layout, owned by
//! the hash of the second pattern. For the electron and t-J models the pair
//! is `(ups, dns)`; in the t-J model the two patterns never overlap. For
//! spin-1/2 it is the prefix (the high `n/2` sites) and the postfix (the
//! remaining low sites) of the spin pattern.

use std::time::Instant;

use crate::basis::check_quantum_numbers;
use crate::bits::{BitPattern, low_mask};
use crate::context::{Context, ctx_log};
use crate::distributed::partition::{Partition, PopulationPairs, TransposePlan};
use crate::distributed::{Communicator, SizeStats};
use crate::error::{EdError, ErrorKind, Result};
use crate::operators::Model;

#[derive(Debug, Clone)]
pub struct DistributedBlock<B: BitPattern> {
    model: Model,
    nsites: usize,
    nup: usize,
    ndn: usize,
    rank: usize,
    nprocs: usize,
    dimension: u64,
    major: Partition<B>,
    minor: Partition<B>,
    plan: TransposePlan,
}

impl<B: BitPattern> DistributedBlock<B> {
    /// Spin-1/2 block with `nup` up spins, split into prefix and postfix.
    pub fn spinhalf<C: Communicator>(
        ctx: &Context,
        comm: &C,
        nsites: usize,
        nup: usize,
    ) -> Result<Self> {
        check_quantum_numbers(nsites, nup, 0, true)?;
        let prefix_bits = nsites / 2;
        let postfix_bits = nsites - prefix_bits;
        let low = nup.saturating_sub(postfix_bits);
        let high = nup.min(prefix_bits);
        let space = PopulationPairs {
            major_bits: prefix_bits,
            minor_bits: postfix_bits,
            pairs: (low..=high).map(|k| (k, nup - k)).collect(),
            exclusive: false,
        };
        Self::build(ctx, comm, Model::Spinhalf, nsites, nup, 0, space)
    }

    /// Electron block with `nup` up and `ndn` down electrons.
    pub fn electron<C: Communicator>(
        ctx: &Context,
        comm: &C,
        nsites: usize,
        nup: usize,
        ndn: usize,
    ) -> Result<Self> {
        check_quantum_numbers(nsites, nup, ndn, false)?;
        let space = PopulationPairs {
            major_bits: nsites,
            minor_bits: nsites,
            pairs: vec![(nup, ndn)],
            exclusive: false,
        };
        Self::build(ctx, comm, Model::Electron, nsites, nup, ndn, space)
    }

    /// t-J block with `nup` up and `ndn` down electrons and no doubly occupied site.
    pub fn tj<C: Communicator>(
        ctx: &Context,
        comm: &C,
        nsites: usize,
        nup: usize,
        ndn: usize,
    ) -> Result<Self> {
        check_quantum_numbers(nsites, nup, ndn, true)?;
        let space = PopulationPairs {
            major_bits: nsites,
            minor_bits: nsites,
            pairs: vec![(nup, ndn)],
            exclusive: true,
        };
        Self::build(ctx, comm, Model::TJ, nsites, nup, ndn, space)
    }

    fn build<C: Communicator>(
        ctx: &Context,
        comm: &C,
        model: Model,
        nsites: usize,
        nup: usize,
        ndn: usize,
        space: PopulationPairs,
    ) -> Result<Self> {
        if nsites > B::MAX_SITES {
            return Err(ErrorKind::TooManySites {
                nsites,
                max: B::MAX_SITES,
            }
            .into());
        }
        let start = Instant::now();
        let (rank, nprocs) = (comm.rank(), comm.size());
        let dimension = space.dimension();
        let minor = Partition::new(space.swapped(), rank, nprocs)?;
        let major = Partition::new(space, rank, nprocs)?;
        let plan = TransposePlan::new(&major, &minor, nprocs);

        let block = Self {
            model,
            nsites,
            nup,
            ndn,
            rank,
            nprocs,
            dimension,
            major,
            minor,
            plan,
        };
        let stats = block.size_stats(comm)?;
        let transposed = comm.sum(block.minor.size() as u64)?;
        for found in [stats.total, transposed] {
            if found != dimension {
                return Err(ErrorKind::DistributedSize {
                    expected: dimension,
                    found,
                }
                .into());
            }
        }
        if rank == 0 {
            ctx_log!(
                ctx,
                log::Level::Info,
                "Distributed {model} block: nsites={nsites}, nup={nup}, ndn={ndn}, processes={nprocs}, dimension={dimension}, local sizes in [{}, {}]",
                stats.min,
                stats.max
            );
        }
        ctx_log!(
            ctx,
            log::Level::Debug,
            "rank {rank}: {} local states, built in {:.3}s",
            block.major.size(),
            start.elapsed().as_secs_f64()
        );
        Ok(block)
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn nsites(&self) -> usize {
        self.nsites
    }

    pub fn nup(&self) -> usize {
        self.nup
    }

    pub fn ndn(&self) -> usize {
        self.ndn
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn nprocs(&self) -> usize {
        self.nprocs
    }

    /// Global dimension, identical on every process.
    pub fn dimension(&self) -> u64 {
        self.dimension
    }

    /// Number of states stored on this process in the major layout.
    pub fn local_size(&self) -> usize {
        self.major.size()
    }

    /// Number of states stored on this process in the transposed layout.
    pub fn transposed_size(&self) -> usize {
        self.minor.size()
    }

    /// Sum, minimum and maximum of the local sizes across the group.
    pub fn size_stats<C: Communicator>(&self, comm: &C) -> Result<SizeStats> {
        let local = self.major.size() as u64;
        Ok(SizeStats {
            total: comm.sum(local)?,
            min: comm.min(local)?,
            max: comm.max(local)?,
        })
    }

    /// The state `(ups, dns)` stored at local row `row` of the major layout.
    pub fn state(&self, row: usize) -> (B, B) {
        let (a, b) = self.major.pair(row);
        self.compose(a, b)
    }

    /// Local row of `(ups, dns)`, `None` if it is owned by another process.
    pub fn index(&self, ups: B, dns: B) -> Option<usize> {
        let (a, b) = self.decompose(ups, dns);
        self.major.position(a, b)
    }

    /// Rank owning `(ups, dns)` in the major layout.
    pub fn owner_of(&self, ups: B, dns: B) -> usize {
        super::owner(self.decompose(ups, dns).0, self.nprocs)
    }

    /// Physical patterns of a coordinate pair.
    #[inline]
    pub(crate) fn compose(&self, major: B, minor: B) -> (B, B) {
        match self.model {
            Model::Spinhalf => (
                (major << self.postfix_bits()) | minor,
                B::ZERO,
            ),
            _ => (major, minor),
        }
    }

    /// Coordinate pair of physical patterns.
    #[inline]
    pub(crate) fn decompose(&self, ups: B, dns: B) -> (B, B) {
        match self.model {
            Model::Spinhalf => (
                ups >> self.postfix_bits(),
                ups & low_mask::<B>(self.postfix_bits() as usize),
            ),
            _ => (ups, dns),
        }
    }

    #[inline]
    fn postfix_bits(&self) -> u32 {
        self.major.space().minor_bits as u32
    }

    pub(crate) fn major(&self) -> &Partition<B> {
        &self.major
    }

    pub(crate) fn minor(&self) -> &Partition<B> {
        &self.minor
    }

    /// Moves a vector from the major layout to the transposed layout.
    pub fn transpose<T, C>(&self, comm: &C, x: &[T]) -> Result<Vec<T>>
    where
        T: Copy + Send + 'static,
        C: Communicator,
    {
        check_len(self.major.size(), x.len())?;
        let send: Vec<T> = self.plan.send_order.iter().map(|&i| x[i]).collect();
        let (received, counts) = comm.all_to_all_v(&send, &self.plan.send_counts)?;
        check_counts(&self.plan.recv_counts, &counts)?;
        let mut y = received.clone();
        for (value, &target) in received.into_iter().zip(&self.plan.recv_map) {
            y[target] = value;
        }
        Ok(y)
    }

    /// Inverse of [`DistributedBlock::transpose`].
    pub fn transpose_reverse<T, C>(&self, comm: &C, xt: &[T]) -> Result<Vec<T>>
    where
        T: Copy + Send + 'static,
        C: Communicator,
    {
        check_len(self.minor.size(), xt.len())?;
        let send: Vec<T> = self.plan.recv_map.iter().map(|&j| xt[j]).collect();
        let (received, counts) = comm.all_to_all_v(&send, &self.plan.recv_counts)?;
        check_counts(&self.plan.send_counts, &counts)?;
        let mut y = received.clone();
        for (value, &target) in received.into_iter().zip(&self.plan.send_order) {
            y[target] = value;
        }
        Ok(y)
    }
}

fn check_len(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(ErrorKind::DimensionMismatch { expected, found }.into());
    }
    Ok(())
}

fn check_counts(expected: &[usize], found: &[usize]) -> Result<()> {
    if expected != found {
        return Err(EdError::from(ErrorKind::Communication(format!(
            "expected to receive {expected:?} elements per rank, received {found:?}"
        ))));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::ThreadCommunicator;

    #[test]
    fn test_single_process_layouts() {
        let ctx = Context::quiet(0);
        let comms = ThreadCommunicator::group(1);
        let block = DistributedBlock::<u16>::spinhalf(&ctx, &comms[0], 6, 3).unwrap();
        assert_eq!(block.dimension(), 20);
        assert_eq!(block.local_size(), 20);
        assert_eq!(block.transposed_size(), 20);
        for row in 0..block.local_size() {
            let (ups, dns) = block.state(row);
            assert_eq!(ups.count_ones(), 3);
            assert_eq!(dns, 0);
            assert_eq!(block.index(ups, dns), Some(row));
        }
    }

    #[test]
    fn test_tj_block_has_no_double_occupancy() {
        let ctx = Context::quiet(0);
        let comms = ThreadCommunicator::group(1);
        let block = DistributedBlock::<u16>::tj(&ctx, &comms[0], 5, 2, 2).unwrap();
        assert_eq!(block.dimension(), 30);
        assert_eq!(block.local_size(), 30);
        assert_eq!(block.transposed_size(), 30);
        for row in 0..block.local_size() {
            let (ups, dns) = block.state(row);
            assert_eq!(ups & dns, 0);
            assert_eq!(block.index(ups, dns), Some(row));
        }
        assert_eq!(block.index(0b00011, 0b00110), None);
    }

    #[test]
    fn test_transpose_round_trip_three_ranks() {
        let ctx = Context::quiet(42);
        let comms = ThreadCommunicator::group(3);
        std::thread::scope(|s| {
            for comm in comms {
                let ctx = ctx.clone();
                s.spawn(move || {
                    let block = DistributedBlock::<u32>::electron(&ctx, &comm, 5, 2, 3).unwrap();
                    let mut rng = ctx.rng_for_rank(comm.rank());
                    let x: Vec<f64> = ctx.random_vector(&mut rng, block.local_size());
                    let xt = block.transpose(&comm, &x).unwrap();
                    assert_eq!(xt.len(), block.transposed_size());
                    let back = block.transpose_reverse(&comm, &xt).unwrap();
                    assert_eq!(back, x);
                });
            }
        });
    }

    #[test]
    fn test_invalid_quantum_numbers() {
        let ctx = Context::quiet(0);
        let comms = ThreadCommunicator::group(1);
        assert!(DistributedBlock::<u16>::electron(&ctx, &comms[0], 4, 5, 0).is_err());
        assert!(DistributedBlock::<u16>::spinhalf(&ctx, &comms[0], 20, 2).is_err());
        assert!(DistributedBlock::<u16>::tj(&ctx, &comms[0], 4, 3, 2).is_err());
    }
}
