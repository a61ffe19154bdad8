//! Accumulation callbacks for the operator-application engine.
//!
//! The engine never touches vectors or matrices itself. It streams every
//! nonzero contribution `(row_out, row_in, value)` into a [`Filler`], which
//! decides what accumulating means: a matrix-vector product, a dense matrix
//! or a list of sparse triplets.
//!
//! Parallel application needs fillers that can be split into independent
//! per-thread partial results and merged back afterwards, which is what
//! [`ParallelFiller`] adds.

use faer::{Mat, sparse::Triplet};

use crate::scalar::Coefficient;

/// Receives the nonzero matrix elements produced by the engine.
pub trait Filler<T> {
    fn fill(&mut self, row_out: usize, row_in: usize, value: T);
}

impl<T, F: FnMut(usize, usize, T)> Filler<T> for F {
    #[inline]
    fn fill(&mut self, row_out: usize, row_in: usize, value: T) {
        self(row_out, row_in, value)
    }
}

/// A filler that can be forked into empty per-thread copies and joined.
///
/// `join` is always called in chunk order, so fillers whose result depends on
/// the order of contributions (triplet lists) stay deterministic.
pub trait ParallelFiller<T>: Filler<T> + Send + Sized {
    fn fork(&self) -> Self;
    fn join(&mut self, other: Self);
}

/// Accumulates `y[row_out] += value * x[row_in]`.
#[derive(Debug, Clone)]
pub struct VectorFiller<'a, T> {
    input: &'a [T],
    output: Vec<T>,
}

impl<'a, T: Coefficient> VectorFiller<'a, T> {
    /// Starts from a zero output vector of dimension `dim_out`.
    pub fn new(input: &'a [T], dim_out: usize) -> Self {
        Self {
            input,
            output: vec![T::zero(); dim_out],
        }
    }

    pub fn into_output(self) -> Vec<T> {
        self.output
    }
}

impl<T: Coefficient> Filler<T> for VectorFiller<'_, T> {
    #[inline]
    fn fill(&mut self, row_out: usize, row_in: usize, value: T) {
        self.output[row_out] += value * self.input[row_in];
    }
}

impl<T: Coefficient> ParallelFiller<T> for VectorFiller<'_, T> {
    fn fork(&self) -> Self {
        Self::new(self.input, self.output.len())
    }

    fn join(&mut self, other: Self) {
        for (y, z) in self.output.iter_mut().zip(other.output) {
            *y += z;
        }
    }
}

/// Accumulates matrix elements into a dense `faer` matrix.
#[derive(Debug, Clone)]
pub struct DenseFiller<T> {
    matrix: Mat<T>,
}

impl<T: Coefficient> DenseFiller<T> {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            matrix: Mat::from_fn(nrows, ncols, |_, _| T::zero()),
        }
    }

    pub fn into_matrix(self) -> Mat<T> {
        self.matrix
    }
}

impl<T: Coefficient> Filler<T> for DenseFiller<T> {
    #[inline]
    fn fill(&mut self, row_out: usize, row_in: usize, value: T) {
        self.matrix[(row_out, row_in)] += value;
    }
}

impl<T: Coefficient> ParallelFiller<T> for DenseFiller<T> {
    fn fork(&self) -> Self {
        Self::new(self.matrix.nrows(), self.matrix.ncols())
    }

    fn join(&mut self, other: Self) {
        for j in 0..self.matrix.ncols() {
            for i in 0..self.matrix.nrows() {
                self.matrix[(i, j)] += other.matrix[(i, j)];
            }
        }
    }
}

/// Collects coordinate-format triplets, duplicates included.
#[derive(Debug, Clone, Default)]
pub struct TripletFiller<T> {
    triplets: Vec<Triplet<usize, usize, T>>,
}

impl<T> TripletFiller<T> {
    pub fn new() -> Self {
        Self {
            triplets: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.triplets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triplets.is_empty()
    }

    pub fn into_triplets(self) -> Vec<Triplet<usize, usize, T>> {
        self.triplets
    }
}

impl<T> Filler<T> for TripletFiller<T> {
    #[inline]
    fn fill(&mut self, row_out: usize, row_in: usize, value: T) {
        self.triplets.push(Triplet {
            row: row_out,
            col: row_in,
            val: value,
        });
    }
}

impl<T: Send> ParallelFiller<T> for TripletFiller<T> {
    fn fork(&self) -> Self {
        Self::new()
    }

    fn join(&mut self, other: Self) {
        self.triplets.extend(other.triplets);
    }
}

/// Counts contributions; the first pass of two-pass assembly.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CountFiller(pub usize);

impl<T> Filler<T> for CountFiller {
    #[inline]
    fn fill(&mut self, _row_out: usize, _row_in: usize, _value: T) {
        self.0 += 1;
    }
}

/// Writes contributions into a preallocated slice; the second pass.
pub(crate) struct SliceFiller<'a, T> {
    slots: &'a mut [Triplet<usize, usize, T>],
    position: usize,
}

impl<'a, T> SliceFiller<'a, T> {
    pub(crate) fn new(slots: &'a mut [Triplet<usize, usize, T>]) -> Self {
        Self { slots, position: 0 }
    }

    pub(crate) fn written(&self) -> usize {
        self.position
    }
}

impl<T> Filler<T> for SliceFiller<'_, T> {
    #[inline]
    fn fill(&mut self, row_out: usize, row_in: usize, value: T) {
        if let Some(slot) = self.slots.get_mut(self.position) {
            *slot = Triplet {
                row: row_out,
                col: row_in,
                val: value,
            };
        }
        self.position += 1;
    }
}
