//! Integration tests for distributed blocks on a group of in-process ranks.
//!
//! Every test spawns one scoped thread per rank of a [`ThreadCommunicator`]
//! group. The distributed matrix-vector product is checked against the
//! serial engine on the full basis: each rank maps its local rows to the
//! serial basis through their bit patterns.

use anyhow::{Result, anyhow, ensure};
use lattice_ed::{
    Block, BlockOf, Model, OpSum,
    apply::matrix_vector as serial_matrix_vector,
    context::Context,
    distributed::{
        Communicator, DistributedBlock, PlanCache, ThreadCommunicator, matrix_vector, mix64,
    },
};

const NPROCS: usize = 3;

type Lookup = Box<dyn Fn(u16, u16) -> Option<usize> + Send + Sync>;

/// Deterministic vector entry attached to a basis state.
fn amplitude(ups: u16, dns: u16) -> f64 {
    let key = (ups as u64) | ((dns as u64) << 16);
    (mix64(key) % 1000) as f64 / 1000.0 - 0.5
}

fn heisenberg(nsites: usize) -> OpSum {
    let mut ops = OpSum::new();
    for i in 0..nsites {
        ops.add("SdotS", "J", &[i, (i + 1) % nsites]);
    }
    ops.set("J", 1.0);
    ops
}

/// Hubbard ring with an additional exchange, so that kernels changing both
/// species are present.
fn hubbard(nsites: usize) -> OpSum {
    let mut ops = OpSum::new();
    for i in 0..nsites {
        let bond = [i, (i + 1) % nsites];
        ops.add("Hop", "t", &bond);
        ops.add("SdotS", "J", &bond);
    }
    ops.add("HubbardU", "U", &[]);
    ops.set("t", 1.0).set("J", 0.4).set("U", 5.0);
    ops
}

fn tj(nsites: usize) -> OpSum {
    let mut ops = OpSum::new();
    for i in 0..nsites {
        let bond = [i, (i + 1) % nsites];
        ops.add("Hop", "t", &bond);
        ops.add("tJSdotS", "J", &bond);
    }
    ops.add("Hop", "t2", &[0, 2]);
    ops.set("t", 1.0).set("t2", -0.3).set("J", 0.4);
    ops
}

/// Serial reference `y = H x` and a lookup from a state to its serial row.
fn serial_reference(
    ctx: &Context,
    ops: &OpSum,
    model: Model,
    nsites: usize,
    nup: usize,
    ndn: usize,
) -> Result<(Vec<f64>, Lookup)> {
    let block = match model {
        Model::Spinhalf => Block::spinhalf(ctx, nsites, Some(nup))?,
        Model::TJ => Block::tj(ctx, nsites, nup, ndn)?,
        Model::Electron => Block::electron(ctx, nsites, nup, ndn)?,
    };
    let Block::U16(inner) = &block else {
        return Err(anyhow!("expected a 16-bit block for {nsites} sites"));
    };
    let x: Vec<f64> = match inner {
        BlockOf::Spinhalf(b) => (0..b.size()).map(|i| amplitude(b.state(i), 0)).collect(),
        BlockOf::TwoSpecies(b) => (0..b.size())
            .map(|i| {
                let (ups, dns) = b.state(i);
                amplitude(ups, dns)
            })
            .collect(),
        _ => return Err(anyhow!("unexpected symmetric block")),
    };
    let y = serial_matrix_vector(ops, &block, &block, &x)?;
    let lookup: Lookup = match inner {
        BlockOf::Spinhalf(b) => {
            let b = b.clone();
            Box::new(move |ups, _| b.index(ups))
        }
        BlockOf::TwoSpecies(b) => {
            let b = b.clone();
            Box::new(move |ups, dns| b.index(ups, dns))
        }
        _ => return Err(anyhow!("unexpected symmetric block")),
    };
    Ok((y, lookup))
}

/// Runs `body` on every rank and collects the first failure.
fn on_ranks<F>(body: F) -> Result<()>
where
    F: Fn(ThreadCommunicator) -> Result<()> + Sync,
{
    let comms = ThreadCommunicator::group(NPROCS);
    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let body = &body;
                s.spawn(move || body(comm))
            })
            .collect();
        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow!("a rank panicked"))??;
        }
        Ok(())
    })
}

fn check_against_serial(
    ops: &OpSum,
    model: Model,
    nsites: usize,
    nup: usize,
    ndn: usize,
) -> Result<()> {
    let ctx = Context::quiet(42);
    let (y_serial, lookup) = serial_reference(&ctx, ops, model, nsites, nup, ndn)?;
    on_ranks(|comm| {
        let block = match model {
            Model::Spinhalf => DistributedBlock::<u16>::spinhalf(&ctx, &comm, nsites, nup)?,
            Model::TJ => DistributedBlock::<u16>::tj(&ctx, &comm, nsites, nup, ndn)?,
            Model::Electron => DistributedBlock::<u16>::electron(&ctx, &comm, nsites, nup, ndn)?,
        };
        let stats = block.size_stats(&comm)?;
        ensure!(stats.total == y_serial.len() as u64, "partitions do not cover the basis");

        let x: Vec<f64> = (0..block.local_size())
            .map(|row| {
                let (ups, dns) = block.state(row);
                amplitude(ups, dns)
            })
            .collect();
        let cache = PlanCache::new();
        let y = matrix_vector(&ctx, ops, &block, &comm, &cache, &x)?;
        for (row, value) in y.iter().enumerate() {
            let (ups, dns) = block.state(row);
            ensure!(block.owner_of(ups, dns) == comm.rank());
            let serial_row =
                lookup(ups, dns).ok_or_else(|| anyhow!("state {ups:b}/{dns:b} not in serial basis"))?;
            ensure!(
                (value - y_serial[serial_row]).abs() < 1e-12,
                "rank {}: row {row} is {value} but serial gives {}",
                comm.rank(),
                y_serial[serial_row]
            );
        }

        let cached = cache.len();
        let again = matrix_vector(&ctx, ops, &block, &comm, &cache, &x)?;
        ensure!(cache.len() == cached, "second product built new plans");
        ensure!(again == y, "second product differs from the first");
        Ok(())
    })
}

#[test]
fn test_distributed_heisenberg_matches_serial() -> Result<()> {
    check_against_serial(&heisenberg(10), Model::Spinhalf, 10, 5, 0)
}

#[test]
fn test_distributed_hubbard_matches_serial() -> Result<()> {
    check_against_serial(&hubbard(6), Model::Electron, 6, 3, 2)
}

#[test]
fn test_distributed_tj_matches_serial() -> Result<()> {
    check_against_serial(&tj(7), Model::TJ, 7, 3, 2)
}

#[test]
fn test_distributed_tj_single_hole() -> Result<()> {
    check_against_serial(&tj(6), Model::TJ, 6, 3, 2)
}

#[test]
fn test_exchange_kernels_populate_plan_cache() -> Result<()> {
    let ctx = Context::quiet(42);
    let ops = hubbard(5);
    on_ranks(|comm| {
        let block = DistributedBlock::<u16>::electron(&ctx, &comm, 5, 2, 2)?;
        let cache = PlanCache::new();
        ensure!(cache.is_empty());
        let x = vec![1.0; block.local_size()];
        matrix_vector(&ctx, &ops, &block, &comm, &cache, &x)?;
        ensure!(!cache.is_empty(), "no plan cached for the exchange kernels");
        Ok(())
    })
}

#[test]
fn test_transpose_round_trip() -> Result<()> {
    let ctx = Context::quiet(42);
    on_ranks(|comm| {
        for block in [
            DistributedBlock::<u16>::spinhalf(&ctx, &comm, 9, 4)?,
            DistributedBlock::<u16>::electron(&ctx, &comm, 5, 3, 1)?,
            DistributedBlock::<u16>::tj(&ctx, &comm, 6, 2, 3)?,
        ] {
            let x: Vec<f64> = (0..block.local_size())
                .map(|row| {
                    let (ups, dns) = block.state(row);
                    amplitude(ups, dns)
                })
                .collect();
            let xt = block.transpose(&comm, &x)?;
            ensure!(xt.len() == block.transposed_size());
            let total: u64 = comm.sum(xt.len() as u64)?;
            ensure!(total == block.dimension(), "transposed layout loses states");
            ensure!(block.transpose_reverse(&comm, &xt)? == x);
        }
        Ok(())
    })
}

#[test]
fn test_local_shard_length_is_checked() -> Result<()> {
    let ctx = Context::quiet(42);
    let ops = heisenberg(6);
    on_ranks(|comm| {
        let block = DistributedBlock::<u16>::spinhalf(&ctx, &comm, 6, 3)?;
        let cache = PlanCache::new();
        let x = vec![0.0; block.local_size() + 1];
        ensure!(matrix_vector(&ctx, &ops, &block, &comm, &cache, &x).is_err());
        Ok(())
    })
}
