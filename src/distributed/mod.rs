//! Distributed-memory bases and operator application.
//!
//! A distributed block splits every state into two patterns and assigns each
//! state to the process that owns the hash of its first pattern. Vectors are
//! stored as local shards in that layout. Terms that move particles between
//! processes are applied through the transposed layout or through all-to-all
//! exchanges planned once per kernel and kept in a caller-owned [`PlanCache`].
//!
//! All communication goes through the [`Communicator`] trait. The in-process
//! [`ThreadCommunicator`] connects a group of threads and is what the tests
//! and single-node runs use.

pub mod apply;
pub mod block;
pub mod communicator;
pub(crate) mod partition;
pub mod plan;

pub use apply::matrix_vector;
pub use block::DistributedBlock;
pub use communicator::{Communicator, ThreadCommunicator};
pub use plan::{CommPlan, PlanCache};

use crate::bits::BitPattern;

/// Sum, minimum and maximum of the local sizes of a distributed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeStats {
    pub total: u64,
    pub min: u64,
    pub max: u64,
}

/// The splitmix64 finalizer, a fixed bijective mixing of 64-bit values.
#[inline]
pub fn mix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Rank owning `pattern` in a group of `nprocs` processes.
#[inline]
pub fn owner<B: BitPattern>(pattern: B, nprocs: usize) -> usize {
    (mix64(pattern.to_u64()) % nprocs.max(1) as u64) as usize
}
