//! Census of the momentum sectors of a ring Hamiltonian.
//!
//! This executable splits the basis of a periodic chain into its
//! translation-momentum sectors and records, for every sector, the block
//! dimension and the first trace moments of the Hamiltonian. Since the
//! sectors partition the full basis, dimensions and moments must add up to
//! those of the unsymmetrized block, which is checked before the results are
//! written. Small sectors are additionally diagonalized densely.

use anyhow::{Context as _, Result, anyhow, ensure};
use clap::{Parser, ValueEnum};
use faer::{Mat, Side};
use lattice_ed::{Block, BlockOperator, Context, OpSum, PermutationGroup, Representation};
use num_complex::Complex64;
use serde::Serialize;
use std::path::PathBuf;

/// The lattice model of the chain.
#[derive(ValueEnum, Clone, Debug, Copy)]
enum ModelArg {
    /// Heisenberg chain, `J S_i·S_j`.
    Spinhalf,
    /// t-J chain, `-t` hopping plus `J (S_i·S_j - n_i n_j / 4)`.
    Tj,
    /// Hubbard chain, `-t` hopping plus on-site `U`.
    Electron,
}

/// Command-line arguments for the sector census.
#[derive(Parser, Debug)]
#[clap(
    name = "block-census",
    about = "Tabulates dimensions and trace moments of the momentum sectors of a ring."
)]
struct CensusArgs {
    #[clap(long, value_enum)]
    model: ModelArg,

    /// Number of sites of the ring.
    #[clap(long)]
    nsites: usize,

    /// Number of up spins (or up electrons).
    #[clap(long)]
    nup: usize,

    /// Number of down electrons; ignored for spin models.
    #[clap(long, default_value_t = 0)]
    ndn: usize,

    #[clap(long, default_value_t = 1.0)]
    t: f64,

    #[clap(long, default_value_t = 1.0)]
    j: f64,

    #[clap(long, default_value_t = 4.0)]
    u: f64,

    /// Sectors up to this dimension are diagonalized densely.
    #[clap(long, default_value_t = 400)]
    max_dense: usize,

    /// Path to the output CSV file where results will be written.
    #[clap(long, value_name = "PATH")]
    output: PathBuf,
}

/// A single row of the census CSV.
#[derive(Debug, Serialize)]
struct SectorRecord {
    /// Momentum index, `None` for the unsymmetrized block.
    k: Option<usize>,
    dimension: usize,
    /// `Tr H`.
    trace: f64,
    /// `Tr H²`.
    trace_squared: f64,
    /// Lowest eigenvalue, for sectors small enough to diagonalize.
    ground_energy: Option<f64>,
}

fn hamiltonian(args: &CensusArgs) -> OpSum {
    let mut ops = OpSum::new();
    for i in 0..args.nsites {
        let bond = [i, (i + 1) % args.nsites];
        match args.model {
            ModelArg::Spinhalf => {
                ops.add("SdotS", "J", &bond);
            }
            ModelArg::Tj => {
                ops.add("Hop", "T", &bond);
                ops.add("tJSdotS", "J", &bond);
            }
            ModelArg::Electron => {
                ops.add("Hop", "T", &bond);
            }
        }
    }
    if let ModelArg::Electron = args.model {
        ops.add("HubbardU", "U", &[]);
    }
    ops.set("T", args.t).set("J", args.j).set("U", args.u);
    ops
}

fn build_block(
    ctx: &Context,
    args: &CensusArgs,
    irrep: Option<&Representation>,
) -> lattice_ed::Result<Block> {
    match (args.model, irrep) {
        (ModelArg::Spinhalf, None) => Block::spinhalf(ctx, args.nsites, Some(args.nup)),
        (ModelArg::Spinhalf, Some(irrep)) => {
            Block::spinhalf_symmetric(ctx, args.nsites, Some(args.nup), irrep)
        }
        (ModelArg::Tj, None) => Block::tj(ctx, args.nsites, args.nup, args.ndn),
        (ModelArg::Tj, Some(irrep)) => {
            Block::tj_symmetric(ctx, args.nsites, args.nup, args.ndn, irrep)
        }
        (ModelArg::Electron, None) => Block::electron(ctx, args.nsites, args.nup, args.ndn),
        (ModelArg::Electron, Some(irrep)) => {
            Block::electron_symmetric(ctx, args.nsites, args.nup, args.ndn, irrep)
        }
    }
}

/// Dimension, trace moments and optional ground energy of `ops` on `block`.
fn census(ops: &OpSum, block: &Block, k: Option<usize>, max_dense: usize) -> Result<SectorRecord> {
    let operator = BlockOperator::<Complex64>::new(ops, block, block)?;
    let triplets = operator.triplets();
    let trace: f64 = triplets
        .iter()
        .filter(|t| t.row == t.col)
        .map(|t| t.val.re)
        .sum();
    let trace_squared: f64 = triplets.iter().map(|t| t.val.norm_sqr()).sum();

    let ground_energy = if block.is_empty() || block.size() > max_dense {
        None
    } else {
        let h: Mat<Complex64> = operator.dense_matrix();
        let evd = h
            .as_ref()
            .self_adjoint_eigen(Side::Upper)
            .map_err(|e| anyhow!("Eigendecomposition failed for sector {:?}: {:?}", k, e))?;
        let s = evd.S();
        (0..block.size()).map(|i| s[i].re).reduce(f64::min)
    };

    Ok(SectorRecord {
        k,
        dimension: block.size(),
        trace,
        trace_squared,
        ground_energy,
    })
}

/// The main entry point for the census.
fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .try_init()?;
    let args = CensusArgs::parse();
    log::info!(
        "Starting sector census for the {:?} ring with {} sites (nup={}, ndn={})",
        args.model,
        args.nsites,
        args.nup,
        args.ndn
    );

    let ctx = Context::default();
    let ops = hamiltonian(&args);
    let group = PermutationGroup::cyclic(args.nsites)?;

    let mut records = Vec::with_capacity(args.nsites + 1);
    for k in 0..args.nsites {
        let irrep = Representation::momentum(group.clone(), k)?;
        let block = build_block(&ctx, &args, Some(&irrep))
            .with_context(|| format!("building the sector k={k}"))?;
        let record = census(&ops, &block, Some(k), args.max_dense)?;
        log::info!(
            "k={k}: dimension {}, Tr H = {:.6}, Tr H^2 = {:.6}",
            record.dimension,
            record.trace,
            record.trace_squared
        );
        records.push(record);
    }

    let full = build_block(&ctx, &args, None)?;
    let total = census(&ops, &full, None, 0)?;
    let dimension: usize = records.iter().map(|r| r.dimension).sum();
    let trace: f64 = records.iter().map(|r| r.trace).sum();
    let trace_squared: f64 = records.iter().map(|r| r.trace_squared).sum();
    ensure!(
        dimension == total.dimension,
        "Sector dimensions add up to {dimension}, but the full block has dimension {}",
        total.dimension
    );
    let tolerance = 1e-8 * (1.0 + total.trace_squared);
    ensure!(
        (trace - total.trace).abs() < tolerance,
        "Sector traces add up to {trace}, but the full trace is {}",
        total.trace
    );
    ensure!(
        (trace_squared - total.trace_squared).abs() < tolerance,
        "Sector moments Tr H^2 add up to {trace_squared}, but the full value is {}",
        total.trace_squared
    );
    records.push(total);

    log::info!("Writing results to {:?}...", &args.output);
    let mut writer = csv::Writer::from_path(&args.output)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    log::info!("Census complete.");
    Ok(())
}
