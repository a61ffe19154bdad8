//! This module defines the linear-operator seam between the engine and callers.
//!
//! Iterative eigensolvers and time evolution, which live outside this crate,
//! never need the individual elements of a Hamiltonian. Their fundamental
//! operation is the matrix-vector product, so they can be written against any
//! object able to perform it.
//!
//! The [`LinearOperator`] trait formalizes this contract. It is implemented by
//! the matrix-free [`BlockOperator`] of the engine and by `faer`'s dense
//! matrices, so a small block can be checked against its explicit matrix by
//! swapping one operator for the other.

use faer::{Mat, MatMut, MatRef, prelude::Reborrow, traits::ComplexField};

use crate::apply::BlockOperator;
use crate::scalar::Coefficient;

/// Represents a linear operator that can be applied to a vector (or a matrix).
///
/// # Type Parameters
///
/// *   `T`: The scalar type, which must implement `ComplexField`. This trait from `faer`
///     provides the arithmetic for `f64` and its complex counterpart.
///
/// # Example
///
/// ```
/// use faer::{Mat, MatRef};
/// use faer::traits::ComplexField;
/// use lattice_ed::matrix::LinearOperator;
///
/// fn power_step<T: ComplexField>(operator: &impl LinearOperator<T>, v: MatRef<T>) -> Mat<T> {
///     assert_eq!(operator.ncols(), v.nrows());
///     operator.apply(v)
/// }
/// ```
pub trait LinearOperator<T: ComplexField> {
    /// Returns the number of rows of the operator.
    fn nrows(&self) -> usize;

    /// Returns the number of columns of the operator.
    fn ncols(&self) -> usize;

    /// Applies the linear operator to a matrix `rhs`, column by column.
    ///
    /// # Panics
    ///
    /// This method is expected to panic if the inner dimension of the operator does not match
    /// the number of rows of `rhs`.
    fn apply(&self, rhs: MatRef<'_, T>) -> Mat<T>;
}

impl<'a, T: ComplexField> LinearOperator<T> for MatRef<'a, T> {
    #[inline]
    fn nrows(&self) -> usize {
        self.nrows()
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.ncols()
    }

    #[inline]
    fn apply(&self, rhs: MatRef<'_, T>) -> Mat<T> {
        assert_eq!(
            self.ncols(),
            rhs.nrows(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            self.ncols(),
            rhs.nrows(),
        );
        self * rhs
    }
}

impl<'a, T: ComplexField> LinearOperator<T> for MatMut<'a, T> {
    #[inline]
    fn nrows(&self) -> usize {
        self.rb().nrows()
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.rb().ncols()
    }

    #[inline]
    fn apply(&self, rhs: MatRef<'_, T>) -> Mat<T> {
        self.rb().apply(rhs)
    }
}

impl<T: ComplexField> LinearOperator<T> for Mat<T> {
    #[inline]
    fn nrows(&self) -> usize {
        self.as_ref().nrows()
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.as_ref().ncols()
    }

    #[inline]
    fn apply(&self, rhs: MatRef<'_, T>) -> Mat<T> {
        self.as_ref().apply(rhs)
    }
}

/// Matrix-free application: every column of `rhs` is streamed through the engine.
impl<T: Coefficient + ComplexField> LinearOperator<T> for BlockOperator<'_, T> {
    #[inline]
    fn nrows(&self) -> usize {
        self.block_out().size()
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.block_in().size()
    }

    fn apply(&self, rhs: MatRef<'_, T>) -> Mat<T> {
        assert_eq!(
            self.ncols(),
            rhs.nrows(),
            "Dimension mismatch: operator columns ({}) do not match vector rows ({}).",
            self.ncols(),
            rhs.nrows(),
        );
        let columns: Vec<Vec<T>> = (0..rhs.ncols())
            .map(|j| {
                let x: Vec<T> = (0..rhs.nrows()).map(|i| rhs[(i, j)]).collect();
                let filler = crate::apply::VectorFiller::new(&x, self.nrows());
                self.apply_par(filler).into_output()
            })
            .collect();
        Mat::from_fn(self.nrows(), rhs.ncols(), |i, j| columns[j][i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::Block;
    use crate::context::Context;
    use crate::operators::OpSum;
    use faer::mat;

    #[test]
    fn test_linear_operator_for_mat() {
        let matrix: Mat<f64> = mat![[2.0, -1.0, 0.0], [-1.0, 2.0, -1.0], [0.0, -1.0, 2.0],];
        let vector: Mat<f64> = mat![[1.0], [2.0], [3.0]];
        let expected_result = &matrix * &vector;

        let operator: &dyn LinearOperator<f64> = &matrix;
        let result = operator.apply(vector.as_ref());

        assert_eq!(result, expected_result);
        assert_eq!(operator.nrows(), 3);
        assert_eq!(operator.ncols(), 3);
    }

    #[test]
    fn test_block_operator_matches_its_dense_matrix() {
        let ctx = Context::quiet(0);
        let block = Block::electron(&ctx, 4, 2, 1).unwrap();
        let mut ops = OpSum::new();
        for i in 0..4 {
            ops.add("Hop", 1.0, &[i, (i + 1) % 4]);
        }
        ops.add("HubbardU", 4.0, &[]);
        let operator = BlockOperator::<f64>::new(&ops, &block, &block).unwrap();
        let dense = operator.dense_matrix();

        let mut rng = ctx.rng();
        let x: Vec<f64> = ctx.random_vector(&mut rng, block.size());
        let rhs = Mat::from_fn(block.size(), 2, |i, j| x[i] * (j + 1) as f64);

        let matrix_free = LinearOperator::apply(&operator, rhs.as_ref());
        let explicit = LinearOperator::apply(&dense, rhs.as_ref());
        for i in 0..block.size() {
            for j in 0..2 {
                assert!((matrix_free[(i, j)] - explicit[(i, j)]).abs() < 1e-12);
            }
        }
    }

    #[test]
    #[should_panic(
        expected = "Dimension mismatch: operator columns (2) do not match vector rows (3)."
    )]
    fn test_dimension_mismatch_panic() {
        let matrix: Mat<f64> = mat![[1.0, 0.0], [0.0, 1.0]];
        let vector: Mat<f64> = mat![[1.0], [2.0], [3.0]];
        let operator: &dyn LinearOperator<f64> = &matrix;
        operator.apply(vector.as_ref());
    }
}
