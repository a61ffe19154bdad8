//! Operator application on distributed blocks.
//!
//! Kernels are sorted by which coordinate of the state they change:
//!
//! - kernels leaving the major pattern unchanged act within one process in
//!   the major layout;
//! - kernels leaving the minor pattern unchanged act within one process in
//!   the transposed layout, so the vector is transposed, acted on and
//!   transposed back;
//! - kernels changing both send every contribution to the owner of the
//!   target state in one all-to-all exchange per kernel. The per-destination
//!   counts of that exchange are cached by kernel signature.

use rayon::prelude::*;

use crate::apply::{Filler, VectorFiller, chunk_bounds};
use crate::bits::BitPattern;
use crate::context::{Context, ctx_log};
use crate::distributed::partition::Partition;
use crate::distributed::{CommPlan, Communicator, DistributedBlock, PlanCache, owner};
use crate::error::{EdError, ErrorKind, Result};
use crate::operators::{Kernel, OpSum, compile};
use crate::scalar::Coefficient;

/// `y = H x` on the local shards of a distributed block.
///
/// # Arguments
///
/// * `ctx`: run context used for progress messages.
/// * `ops`: the operator; it is compiled for the model of `block`.
/// * `block`: the distributed block of both `x` and `y`.
/// * `comm`: the communicator the block was built with.
/// * `cache`: communication plans of `block`, filled on first use.
/// * `x`: the local shard of the input vector in the major layout.
///
/// # Returns
///
/// The local shard of the output vector, or the first compilation or
/// communication error. Every process of the group must call this together.
pub fn matrix_vector<B, T, C>(
    ctx: &Context,
    ops: &OpSum,
    block: &DistributedBlock<B>,
    comm: &C,
    cache: &PlanCache,
    x: &[T],
) -> Result<Vec<T>>
where
    B: BitPattern,
    T: Coefficient,
    C: Communicator,
{
    if x.len() != block.local_size() {
        return Err(ErrorKind::DimensionMismatch {
            expected: block.local_size(),
            found: x.len(),
        }
        .into());
    }
    let kernels: Vec<Kernel<B, T>> = compile(&ops.resolve()?, block.model(), block.nsites())?;

    let mut local = Vec::new();
    let mut transposed = Vec::new();
    let mut mixed = Vec::new();
    for kernel in kernels {
        let (major_flip, minor_flip) = block.decompose(kernel.flip_up, kernel.flip_dn);
        if major_flip == B::ZERO {
            local.push(kernel);
        } else if minor_flip == B::ZERO {
            transposed.push(kernel);
        } else {
            mixed.push(kernel);
        }
    }
    ctx_log!(
        ctx,
        log::Level::Debug,
        "rank {}: {} local, {} transposed and {} exchanged kernels",
        block.rank(),
        local.len(),
        transposed.len(),
        mixed.len()
    );

    let mut y = apply_local(block, block.major(), false, &local, x);

    if !transposed.is_empty() {
        let xt = block.transpose(comm, x)?;
        let yt = apply_local(block, block.minor(), true, &transposed, &xt);
        let back = block.transpose_reverse(comm, &yt)?;
        for (yi, bi) in y.iter_mut().zip(back) {
            *yi += bi;
        }
    }

    for kernel in &mixed {
        exchange(block, comm, cache, kernel, x, &mut y)?;
    }
    Ok(y)
}

/// Applies kernels that keep the owning pattern of `partition` fixed.
fn apply_local<B: BitPattern, T: Coefficient>(
    block: &DistributedBlock<B>,
    partition: &Partition<B>,
    swapped: bool,
    kernels: &[Kernel<B, T>],
    x: &[T],
) -> Vec<T> {
    let physical = |owned: B, other: B| {
        if swapped {
            block.compose(other, owned)
        } else {
            block.compose(owned, other)
        }
    };
    let coordinates = |ups: B, dns: B| {
        let (a, b) = block.decompose(ups, dns);
        if swapped { (b, a) } else { (a, b) }
    };
    let chunks = chunk_bounds(partition.majors().len(), rayon::current_num_threads());
    let parts: Vec<Vec<T>> = chunks
        .into_par_iter()
        .map(|range| {
            let mut filler = VectorFiller::new(x, partition.size());
            for i in range {
                let owned = partition.majors()[i];
                let offset = partition.offset(i);
                for (j, other) in partition.minors(i).enumerate() {
                    let (ups, dns) = physical(owned, other);
                    for kernel in kernels {
                        let Some((ups_out, dns_out, sign)) = kernel.act(ups, dns) else {
                            continue;
                        };
                        let (owned_out, other_out) = coordinates(ups_out, dns_out);
                        let Some(row) = partition.position(owned_out, other_out) else {
                            continue;
                        };
                        let value = if sign { -kernel.coeff } else { kernel.coeff };
                        filler.fill(row, offset + j, value);
                    }
                }
            }
            filler.into_output()
        })
        .collect();

    let mut y = vec![T::zero(); partition.size()];
    for part in parts {
        for (yi, pi) in y.iter_mut().zip(part) {
            *yi += pi;
        }
    }
    y
}

/// Applies one kernel changing both patterns through an all-to-all exchange.
fn exchange<B, T, C>(
    block: &DistributedBlock<B>,
    comm: &C,
    cache: &PlanCache,
    kernel: &Kernel<B, T>,
    x: &[T],
    y: &mut [T],
) -> Result<()>
where
    B: BitPattern,
    T: Coefficient,
    C: Communicator,
{
    let partition = block.major();
    let nprocs = block.nprocs();
    let targets = |visit: &mut dyn FnMut(usize, B, B, T)| {
        for i in 0..partition.majors().len() {
            let offset = partition.offset(i);
            let major = partition.majors()[i];
            for (j, minor) in partition.minors(i).enumerate() {
                let (ups, dns) = block.compose(major, minor);
                let Some((ups_out, dns_out, sign)) = kernel.act(ups, dns) else {
                    continue;
                };
                let (a, b) = block.decompose(ups_out, dns_out);
                if !partition.space().contains(a, b) {
                    continue;
                }
                let value = if sign { -kernel.coeff } else { kernel.coeff };
                visit(owner(a, nprocs), a, b, value * x[offset + j]);
            }
        }
    };

    let plan = cache.get_or_build(kernel.signature(), || {
        let mut send_counts = vec![0usize; nprocs];
        targets(&mut |destination, _, _, _| send_counts[destination] += 1);
        Ok(CommPlan { send_counts })
    })?;

    let mut buckets: Vec<Vec<(B, B, T)>> = plan
        .send_counts
        .iter()
        .map(|&count| Vec::with_capacity(count))
        .collect();
    targets(&mut |destination, a, b, value| buckets[destination].push((a, b, value)));
    let send: Vec<(B, B, T)> = buckets.concat();
    let (received, _) = comm.all_to_all_v(&send, &plan.send_counts)?;

    for (a, b, value) in received {
        let row = partition.position(a, b).ok_or_else(|| {
            EdError::from(ErrorKind::Communication(format!(
                "rank {} received a state it does not own",
                block.rank()
            )))
        })?;
        y[row] += value;
    }
    Ok(())
}
