//! Permutation symmetries and orbit reduction.
//!
//! A lattice symmetry is a [`Permutation`] of sites; a finite set of them
//! forming a group is a [`PermutationGroup`]. A [`Representation`] assigns a
//! character to every element. The [`GroupAction`] applies symmetries to bit
//! patterns and answers orbit questions (representative, stabilizer, fermionic
//! sign), and the functions in [`norm`] compute the norm of symmetrized states.

pub mod action;
pub mod group;
pub mod norm;
pub mod permutation;
pub mod representation;
pub mod representatives;

pub use action::{GroupAction, fermi_sign_of_permutation};
pub use group::PermutationGroup;
pub use norm::{NORM_TOL, norm, norm_electron, norm_electron_subset, norm_fermionic};
pub use permutation::Permutation;
pub use representation::{Characters, Representation};
pub use representatives::{INVALID_INDEX, RawSpace, RepresentativeTable};
