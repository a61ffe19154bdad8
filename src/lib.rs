//! Bit-packed bases, symmetry reduction and matrix-free operator application
//! for exact diagonalization of quantum lattice models.
//!
//! The crate covers the computational core beneath an eigensolver: it
//! enumerates the many-body basis of spin-1/2, t-J and electron (Hubbard)
//! models as bit patterns, reduces it under a group of site permutations to
//! one symmetry sector, and applies sums of few-body operator terms without
//! storing a matrix. The same kernels can build a dense or sparse matrix, or
//! perform a matrix-vector product, depending on the [`apply::Filler`]
//! they stream into. A distributed variant partitions the basis over the
//! processes of a [`distributed::Communicator`] group.
//!
//! ## Layers
//!
//! - [`bits`] and [`combinatorics`]: fixed-width patterns, ranking of
//!   combinations ([`combinatorics::LinTable`]).
//! - [`symmetries`]: permutations, groups, representations and the orbit
//!   operations of a [`symmetries::GroupAction`].
//! - [`basis`]: the closed set of basis variants, wrapped by [`basis::Block`]
//!   which selects the integer width from the number of sites.
//! - [`operators`]: term lists ([`operators::OpSum`]) and their compilation
//!   into non-branching kernels.
//! - [`apply`]: the operator-application engine.
//! - [`distributed`]: partitioned bases, transposition and distributed
//!   application.
//!
//! ## Example Usage
//!
//! The ground-state sector of a 4-site Heisenberg ring at zero momentum:
//!
//! ```rust
//! use faer::Mat;
//! use lattice_ed::{Block, Context, OpSum, PermutationGroup, Representation, apply};
//!
//! let ctx = Context::quiet(42);
//! let group = PermutationGroup::cyclic(4).unwrap();
//! let irrep = Representation::momentum(group, 0).unwrap();
//! let block = Block::spinhalf_symmetric(&ctx, 4, Some(2), &irrep).unwrap();
//! assert_eq!(block.size(), 2);
//!
//! let mut ops = OpSum::new();
//! for i in 0..4 {
//!     ops.add("SdotS", "J", &[i, (i + 1) % 4]);
//! }
//! ops.set("J", 1.0);
//!
//! let h: Mat<f64> = apply::dense_matrix(&ops, &block).unwrap();
//! assert!((h[(0, 1)] - h[(1, 0)]).abs() < 1e-12);
//! ```

pub mod apply;
pub mod basis;
pub mod bits;
pub mod combinatorics;
pub mod context;
pub mod distributed;
pub mod error;
pub mod matrix;
pub mod operators;
pub mod scalar;
pub mod symmetries;

pub use apply::BlockOperator;
pub use basis::{Block, BlockOf};
pub use context::Context;
pub use error::{EdError, Result};
pub use operators::{Coupling, Model, OpSum, Term};
pub use symmetries::{Permutation, PermutationGroup, Representation};
