//! Matrix-free operator application.
//!
//! A [`BlockOperator`] binds a term list to an input and an output [`Block`].
//! On construction the terms are validated and compiled into kernels for the
//! integer width of the blocks; applying the operator enumerates, for every
//! input row, the output rows each kernel maps it to and streams the
//! resulting matrix elements into a [`Filler`].
//!
//! For symmetric blocks every input row is an orbit representative `r` with
//! norm `N(r)`. A kernel maps it to some state `s`, which the output block
//! resolves to its representative `r'`, a symmetry `g` with `g(s) = r'` and
//! the fermionic sign of `g` on `s`. The matrix element is
//!
//! ```text
//! coeff · (-1)^(kernel sign ⊕ fermi sign of g) · χ(g) · N(r') / N(r)
//! ```
//!
//! with `χ` the characters of the output block. Contributions to states that
//! are not part of the output block are dropped.
//!
//! The free functions [`apply`], [`apply_par`], [`matrix_vector`],
//! [`dense_matrix`] and [`sparse_matrix`] cover the common one-shot uses.

pub mod filler;

pub use filler::{DenseFiller, Filler, ParallelFiller, TripletFiller, VectorFiller};

use std::ops::Range;
use std::time::Instant;

use faer::{
    Mat,
    sparse::{SparseColMat, Triplet},
    traits::ComplexField,
};
use rayon::prelude::*;

use crate::basis::{Block, BlockOf, Sector};
use crate::bits::BitPattern;
use crate::error::{EdError, ErrorKind, Result};
use crate::operators::{Kernel, OpSum, compile};
use crate::scalar::Coefficient;
use crate::symmetries::Representation;
use filler::{CountFiller, SliceFiller};

/// Contiguous chunks `[start, end)` splitting `0..len` into at most `nchunks` parts.
///
/// The boundaries depend only on the two arguments, so repeated passes over
/// the same range see identical chunks.
pub fn chunk_bounds(len: usize, nchunks: usize) -> Vec<Range<usize>> {
    let nchunks = nchunks.max(1).min(len.max(1));
    let base = len / nchunks;
    let extra = len % nchunks;
    let mut bounds = Vec::with_capacity(nchunks);
    let mut start = 0;
    for i in 0..nchunks {
        let end = start + base + usize::from(i < extra);
        bounds.push(start..end);
        start = end;
    }
    bounds
}

/// Kernels compiled for the width of the blocks they act on.
#[derive(Debug, Clone)]
enum KernelSet<T> {
    U16(Vec<Kernel<u16, T>>),
    U32(Vec<Kernel<u32, T>>),
    U64(Vec<Kernel<u64, T>>),
}

impl<T> KernelSet<T> {
    fn len(&self) -> usize {
        match self {
            KernelSet::U16(k) => k.len(),
            KernelSet::U32(k) => k.len(),
            KernelSet::U64(k) => k.len(),
        }
    }
}

/// A term list bound to an input and an output block.
#[derive(Debug, Clone)]
pub struct BlockOperator<'a, T> {
    block_in: &'a Block,
    block_out: &'a Block,
    kernels: KernelSet<T>,
    characters: Option<Vec<T>>,
}

impl<'a, T: Coefficient> BlockOperator<'a, T> {
    /// Validates and compiles `ops` for the pair of blocks.
    ///
    /// # Arguments
    ///
    /// * `ops`: the operator; named couplings must all have values.
    /// * `block_in`: block of the input vectors (columns).
    /// * `block_out`: block of the output vectors (rows).
    ///
    /// # Returns
    ///
    /// The bound operator, or the first validation error. Besides the term
    /// errors of [`compile`], the blocks must share model, site count and
    /// symmetry group, and a real `T` cannot carry complex characters.
    pub fn new(ops: &OpSum, block_in: &'a Block, block_out: &'a Block) -> Result<Self> {
        check_compatible(block_in, block_out)?;
        let terms = ops.resolve()?;
        let model = block_in.model();
        let nsites = block_in.nsites();
        let kernels = match block_in {
            Block::U16(_) => KernelSet::U16(compile(&terms, model, nsites)?),
            Block::U32(_) => KernelSet::U32(compile(&terms, model, nsites)?),
            Block::U64(_) => KernelSet::U64(compile(&terms, model, nsites)?),
        };
        let characters = block_out.irrep().map(characters_as::<T>).transpose()?;
        log::debug!(
            "bound {} terms ({} kernels) to blocks of dimension {} -> {}",
            terms.len(),
            kernels.len(),
            block_in.size(),
            block_out.size()
        );
        Ok(Self {
            block_in,
            block_out,
            kernels,
            characters,
        })
    }

    pub fn block_in(&self) -> &Block {
        self.block_in
    }

    pub fn block_out(&self) -> &Block {
        self.block_out
    }

    /// Number of compiled kernels after merging.
    pub fn n_kernels(&self) -> usize {
        self.kernels.len()
    }

    /// Number of outer iterations of the input block, the axis parallel loops split.
    fn n_outer(&self) -> usize {
        match self.block_in {
            Block::U16(b) => outer_len(b),
            Block::U32(b) => outer_len(b),
            Block::U64(b) => outer_len(b),
        }
    }

    /// Streams the matrix elements of input rows with outer index in `outer`.
    fn apply_range<F: Filler<T>>(&self, outer: Range<usize>, filler: &mut F) {
        let chars = self.characters.as_deref();
        let same = std::ptr::eq(self.block_in, self.block_out);
        match (&self.kernels, self.block_in, self.block_out) {
            (KernelSet::U16(k), Block::U16(bi), Block::U16(bo)) => {
                dispatch(k, chars, bi, bo, same, outer, filler)
            }
            (KernelSet::U32(k), Block::U32(bi), Block::U32(bo)) => {
                dispatch(k, chars, bi, bo, same, outer, filler)
            }
            (KernelSet::U64(k), Block::U64(bi), Block::U64(bo)) => {
                dispatch(k, chars, bi, bo, same, outer, filler)
            }
            // widths agree by construction
            _ => {}
        }
    }

    /// Sequential application over all input rows.
    pub fn apply<F: Filler<T>>(&self, filler: &mut F) {
        self.apply_range(0..self.n_outer(), filler);
    }

    /// Parallel application: one forked filler per contiguous chunk, joined in order.
    pub fn apply_par<F: ParallelFiller<T>>(&self, mut filler: F) -> F {
        let start = Instant::now();
        let chunks = chunk_bounds(self.n_outer(), rayon::current_num_threads());
        let forks: Vec<F> = chunks.iter().map(|_| filler.fork()).collect();
        let parts: Vec<F> = forks
            .into_par_iter()
            .zip(chunks.into_par_iter())
            .map(|(mut part, range)| {
                self.apply_range(range, &mut part);
                part
            })
            .collect();
        for part in parts {
            filler.join(part);
        }
        log::trace!("parallel apply took {:.3}s", start.elapsed().as_secs_f64());
        filler
    }

    /// `y = H x` for a vector `x` of the input block.
    pub fn matrix_vector(&self, x: &[T]) -> Result<Vec<T>> {
        if x.len() != self.block_in.size() {
            return Err(ErrorKind::DimensionMismatch {
                expected: self.block_in.size(),
                found: x.len(),
            }
            .into());
        }
        let filler = VectorFiller::new(x, self.block_out.size());
        Ok(self.apply_par(filler).into_output())
    }

    /// The full matrix as a dense `faer` matrix of shape `(dim_out, dim_in)`.
    pub fn dense_matrix(&self) -> Mat<T> {
        let filler = DenseFiller::new(self.block_out.size(), self.block_in.size());
        self.apply_par(filler).into_matrix()
    }

    /// The matrix as merged coordinate triplets, assembled in two passes.
    ///
    /// The first pass counts the contributions of every chunk, the second
    /// writes them into disjoint slices of one preallocated buffer. Duplicate
    /// positions are summed afterwards and the triplets come out sorted by
    /// column, then row.
    pub fn triplets(&self) -> Vec<Triplet<usize, usize, T>> {
        let chunks = chunk_bounds(self.n_outer(), rayon::current_num_threads());
        let counts: Vec<usize> = chunks
            .par_iter()
            .map(|range| {
                let mut counter = CountFiller::default();
                self.apply_range(range.clone(), &mut counter);
                counter.0
            })
            .collect();
        let total: usize = counts.iter().sum();
        let mut buffer: Vec<Triplet<usize, usize, T>> = (0..total)
            .map(|_| Triplet {
                row: 0,
                col: 0,
                val: T::zero(),
            })
            .collect();

        let mut slices = Vec::with_capacity(chunks.len());
        let mut rest = buffer.as_mut_slice();
        for &count in &counts {
            let (head, tail) = rest.split_at_mut(count);
            slices.push(head);
            rest = tail;
        }
        slices
            .into_par_iter()
            .zip(chunks.into_par_iter())
            .for_each(|(slots, range)| {
                let expected = slots.len();
                let mut writer = SliceFiller::new(slots);
                self.apply_range(range, &mut writer);
                debug_assert_eq!(writer.written(), expected);
            });

        merge_duplicates(buffer)
    }
}

impl<T: Coefficient + ComplexField> BlockOperator<'_, T> {
    /// The matrix as a compressed sparse column `faer` matrix.
    pub fn sparse_matrix(&self) -> Result<SparseColMat<usize, T>> {
        let triplets = self.triplets();
        SparseColMat::try_new_from_triplets(self.block_out.size(), self.block_in.size(), &triplets)
            .map_err(|e| {
                EdError::from(ErrorKind::InputError(format!(
                    "sparse matrix assembly failed: {e:?}"
                )))
            })
    }
}

/// Sorts triplets by (column, row) and sums entries at equal positions.
fn merge_duplicates<T: Coefficient>(
    mut triplets: Vec<Triplet<usize, usize, T>>,
) -> Vec<Triplet<usize, usize, T>> {
    triplets.sort_unstable_by_key(|t| (t.col, t.row));
    let mut merged: Vec<Triplet<usize, usize, T>> = Vec::with_capacity(triplets.len());
    for t in triplets {
        match merged.last_mut() {
            Some(last) if last.row == t.row && last.col == t.col => last.val += t.val,
            _ => merged.push(t),
        }
    }
    merged
}

fn outer_len<B: BitPattern>(block: &BlockOf<B>) -> usize {
    match block {
        BlockOf::Spinhalf(b) => b.n_outer(),
        BlockOf::SpinhalfSymmetric(b) => b.n_outer(),
        BlockOf::TwoSpecies(b) => b.n_outer(),
        BlockOf::TwoSpeciesSymmetric(b) => b.n_outer(),
    }
}

/// Checks that two blocks can be the input and output of one operator.
fn check_compatible(block_in: &Block, block_out: &Block) -> Result<()> {
    let reason = if block_in.model() != block_out.model() {
        Some(format!(
            "input block is a {} block but output block is a {} block",
            block_in.model(),
            block_out.model()
        ))
    } else if block_in.nsites() != block_out.nsites() {
        Some(format!(
            "input block has {} sites but output block has {}",
            block_in.nsites(),
            block_out.nsites()
        ))
    } else {
        match (block_in.irrep(), block_out.irrep()) {
            (None, None) => None,
            (Some(a), Some(b)) if a.group() == b.group() => None,
            (Some(_), Some(_)) => {
                Some("blocks are symmetric under different permutation groups".to_string())
            }
            _ => Some("only one of the blocks is symmetry-adapted".to_string()),
        }
    };
    match reason {
        Some(reason) => Err(ErrorKind::IncompatibleBlocks(reason).into()),
        None => Ok(()),
    }
}

/// Characters of `irrep` converted to the accumulation scalar.
fn characters_as<T: Coefficient>(irrep: &Representation) -> Result<Vec<T>> {
    (0..irrep.size())
        .map(|sym| {
            T::from_complex(irrep.character(sym))
                .ok_or_else(|| EdError::from(ErrorKind::ComplexRepresentation))
        })
        .collect()
}

/// Matches the variants of both blocks and runs the kernels on them.
fn dispatch<B, T, F>(
    kernels: &[Kernel<B, T>],
    characters: Option<&[T]>,
    block_in: &BlockOf<B>,
    block_out: &BlockOf<B>,
    same: bool,
    outer: Range<usize>,
    filler: &mut F,
) where
    B: BitPattern,
    T: Coefficient,
    F: Filler<T>,
{
    match (block_in, block_out) {
        (BlockOf::Spinhalf(i), BlockOf::Spinhalf(o)) => {
            run(kernels, None, i, o, same, outer, filler)
        }
        (BlockOf::SpinhalfSymmetric(i), BlockOf::SpinhalfSymmetric(o)) => {
            run(kernels, characters, i, o, same, outer, filler)
        }
        (BlockOf::TwoSpecies(i), BlockOf::TwoSpecies(o)) => {
            run(kernels, None, i, o, same, outer, filler)
        }
        (BlockOf::TwoSpeciesSymmetric(i), BlockOf::TwoSpeciesSymmetric(o)) => {
            run(kernels, characters, i, o, same, outer, filler)
        }
        // spin and two-species blocks never pair up, see `check_compatible`
        _ => {}
    }
}

/// The kernel loop over a range of outer indices.
///
/// When input and output are the same block, diagonal kernels are summed per
/// row and emitted as one contribution.
fn run<B, T, I, O, F>(
    kernels: &[Kernel<B, T>],
    characters: Option<&[T]>,
    input: &I,
    output: &O,
    same: bool,
    outer: Range<usize>,
    filler: &mut F,
) where
    B: BitPattern,
    T: Coefficient,
    I: Sector<B>,
    O: Sector<B>,
    F: Filler<T>,
{
    for o in outer {
        input.visit(o, |row_in, ups, dns, norm_in| {
            let mut diagonal = T::zero();
            for kernel in kernels {
                let Some((ups_out, dns_out, sign)) = kernel.act(ups, dns) else {
                    continue;
                };
                if same && kernel.is_diagonal() {
                    diagonal += if sign { -kernel.coeff } else { kernel.coeff };
                    continue;
                }
                let Some(loc) = output.locate(ups_out, dns_out) else {
                    continue;
                };
                let mut value = if sign ^ loc.fermi {
                    -kernel.coeff
                } else {
                    kernel.coeff
                };
                if let Some(chars) = characters {
                    value = value * chars[loc.sym] * T::from_real(loc.norm / norm_in);
                }
                filler.fill(loc.row, row_in, value);
            }
            if !diagonal.is_zero() {
                filler.fill(row_in, row_in, diagonal);
            }
        });
    }
}

/// Applies `ops` once, sequentially, streaming every matrix element into `filler`.
pub fn apply<T: Coefficient, F: Filler<T>>(
    ops: &OpSum,
    block_in: &Block,
    block_out: &Block,
    filler: &mut F,
) -> Result<()> {
    BlockOperator::<T>::new(ops, block_in, block_out)?.apply(filler);
    Ok(())
}

/// Parallel variant of [`apply`].
pub fn apply_par<T: Coefficient, F: ParallelFiller<T>>(
    ops: &OpSum,
    block_in: &Block,
    block_out: &Block,
    filler: F,
) -> Result<F> {
    Ok(BlockOperator::<T>::new(ops, block_in, block_out)?.apply_par(filler))
}

/// `y = H x`, with `x` living in `block_in` and `y` in `block_out`.
pub fn matrix_vector<T: Coefficient>(
    ops: &OpSum,
    block_in: &Block,
    block_out: &Block,
    x: &[T],
) -> Result<Vec<T>> {
    BlockOperator::new(ops, block_in, block_out)?.matrix_vector(x)
}

/// Dense matrix of `ops` on `block`.
pub fn dense_matrix<T: Coefficient>(ops: &OpSum, block: &Block) -> Result<Mat<T>> {
    Ok(BlockOperator::new(ops, block, block)?.dense_matrix())
}

/// Sparse matrix of `ops` on `block`.
pub fn sparse_matrix<T: Coefficient + ComplexField>(
    ops: &OpSum,
    block: &Block,
) -> Result<SparseColMat<usize, T>> {
    BlockOperator::new(ops, block, block)?.sparse_matrix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::symmetries::PermutationGroup;
    use num_complex::Complex64;

    fn heisenberg_ring(nsites: usize) -> OpSum {
        let mut ops = OpSum::new();
        for i in 0..nsites {
            ops.add("SdotS", "J", &[i, (i + 1) % nsites]);
        }
        ops.set("J", 1.0);
        ops
    }

    #[test]
    fn test_chunk_bounds() {
        assert_eq!(chunk_bounds(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(chunk_bounds(2, 8), vec![0..1, 1..2]);
        assert_eq!(chunk_bounds(0, 4), vec![0..0]);
        assert_eq!(chunk_bounds(5, 0), vec![0..5]);
    }

    #[test]
    fn test_two_site_heisenberg() {
        let ctx = Context::quiet(0);
        let block = Block::spinhalf(&ctx, 2, Some(1)).unwrap();
        let mut ops = OpSum::new();
        ops.add("SdotS", 1.0, &[0, 1]);
        let h: Mat<f64> = dense_matrix(&ops, &block).unwrap();
        assert_eq!(h[(0, 0)], -0.25);
        assert_eq!(h[(1, 1)], -0.25);
        assert_eq!(h[(0, 1)], 0.5);
        assert_eq!(h[(1, 0)], 0.5);
    }

    #[test]
    fn test_two_site_hopping() {
        let ctx = Context::quiet(0);
        let block = Block::electron(&ctx, 2, 1, 0).unwrap();
        let mut ops = OpSum::new();
        ops.add("Hop", 1.0, &[0, 1]);
        let h: Mat<f64> = dense_matrix(&ops, &block).unwrap();
        assert_eq!(h[(0, 1)], -1.0);
        assert_eq!(h[(1, 0)], -1.0);
        assert_eq!(h[(0, 0)], 0.0);
    }

    #[test]
    fn test_raising_operator_between_blocks() {
        let ctx = Context::quiet(0);
        let down = Block::spinhalf(&ctx, 3, Some(1)).unwrap();
        let up = Block::spinhalf(&ctx, 3, Some(2)).unwrap();
        let mut ops = OpSum::new();
        ops.add("S+", 1.0, &[2]);
        let op = BlockOperator::<f64>::new(&ops, &down, &up).unwrap();
        // rows of `down`: 001, 010, 100; rows of `up`: 011, 101, 110
        let y = op.matrix_vector(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(y, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_real_accumulation_rejects_complex_input() {
        let ctx = Context::quiet(0);
        let block = Block::spinhalf(&ctx, 3, None).unwrap();
        let mut ops = OpSum::new();
        ops.add("ScalarChirality", 1.0, &[0, 1, 2]);
        let err = dense_matrix::<f64>(&ops, &block).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Term of type \"ScalarChirality\" has a complex coefficient which cannot be accumulated into a real result."
        );
        assert!(dense_matrix::<Complex64>(&ops, &block).is_ok());

        let group = PermutationGroup::cyclic(4).unwrap();
        let irrep = Representation::momentum(group, 1).unwrap();
        let symmetric = Block::spinhalf_symmetric(&ctx, 4, Some(2), &irrep).unwrap();
        let err = dense_matrix::<f64>(&heisenberg_ring(4), &symmetric).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Block has a complex representation which cannot be accumulated into a real result."
        );
    }

    #[test]
    fn test_incompatible_blocks() {
        let ctx = Context::quiet(0);
        let a = Block::spinhalf(&ctx, 4, Some(2)).unwrap();
        let b = Block::spinhalf(&ctx, 5, Some(2)).unwrap();
        let err = BlockOperator::<f64>::new(&OpSum::new(), &a, &b).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Incompatible blocks: input block has 4 sites but output block has 5"
        );
        let c = Block::tj(&ctx, 4, 1, 1).unwrap();
        assert!(BlockOperator::<f64>::new(&OpSum::new(), &a, &c).is_err());
    }

    #[test]
    fn test_dimension_mismatch() {
        let ctx = Context::quiet(0);
        let block = Block::spinhalf(&ctx, 4, Some(2)).unwrap();
        let err = matrix_vector(&heisenberg_ring(4), &block, &block, &[1.0; 5]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: block has dimension 6 but vector has 5 rows."
        );
    }

    #[test]
    fn test_symmetric_blocks_are_hermitian() {
        let ctx = Context::quiet(0);
        let group = PermutationGroup::cyclic(6).unwrap();
        for k in 0..6 {
            let irrep = Representation::momentum(group.clone(), k).unwrap();
            let block = Block::spinhalf_symmetric(&ctx, 6, Some(3), &irrep).unwrap();
            let h: Mat<Complex64> = dense_matrix(&heisenberg_ring(6), &block).unwrap();
            for i in 0..h.nrows() {
                for j in 0..h.ncols() {
                    assert!((h[(i, j)] - h[(j, i)].conj()).norm() < 1e-12, "k={k}");
                }
            }
        }
    }

    #[test]
    fn test_triplets_match_dense_matrix() {
        let ctx = Context::quiet(0);
        let block = Block::tj(&ctx, 6, 2, 2).unwrap();
        let mut ops = OpSum::new();
        for i in 0..6 {
            let j = (i + 1) % 6;
            ops.add("Hop", "t", &[i, j]);
            ops.add("tJSdotS", "J", &[i, j]);
        }
        ops.set("t", 1.0).set("J", 0.4);
        let op = BlockOperator::<f64>::new(&ops, &block, &block).unwrap();
        let dense = op.dense_matrix();
        let triplets = op.triplets();
        let mut rebuilt = Mat::<f64>::zeros(block.size(), block.size());
        for t in &triplets {
            rebuilt[(t.row, t.col)] += t.val;
        }
        for i in 0..block.size() {
            for j in 0..block.size() {
                assert!((rebuilt[(i, j)] - dense[(i, j)]).abs() < 1e-14);
            }
        }
        assert!(
            triplets
                .windows(2)
                .all(|w| (w[0].col, w[0].row) < (w[1].col, w[1].row))
        );
    }
}
