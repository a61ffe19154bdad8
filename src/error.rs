//! This module defines the custom error types for the library.
//!
//! Every failure that can occur while building a basis, validating a symmetry
//! group, compiling an operator term list or exchanging data between processes
//! is collected into a single enum, wrapped by the public [`EdError`].
//!
//! Using the [`thiserror`] crate keeps the `Display` messages next to the
//! variants. The messages always name the offending value so that a failed
//! construction can be diagnosed from the error string alone.
use thiserror::Error;

/// Represents all possible errors raised by the exact-diagonalization core.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct EdError(#[from] ErrorKind);

/// Convenient alias used by every fallible operation of the crate.
pub type Result<T> = std::result::Result<T, EdError>;

/// Private enum containing the distinct kinds of errors.
#[derive(Error, Debug, PartialEq)]
pub(crate) enum ErrorKind {
    /// The array handed to a permutation is not a bijection of `0..n`.
    #[error("Invalid permutation {array:?}: {reason}")]
    InvalidPermutation { array: Vec<usize>, reason: String },

    #[error("A permutation group must contain at least one permutation.")]
    EmptyGroup,

    #[error("Site count mismatch: expected {expected} sites, found {found}.")]
    SiteCountMismatch { expected: usize, found: usize },

    #[error("Duplicate permutation {permutation} in permutation group.")]
    DuplicatePermutation { permutation: String },

    #[error("Permutation group does not contain the identity.")]
    MissingIdentity,

    #[error("Inverse of permutation {permutation} is not contained in the group.")]
    MissingInverse { permutation: String },

    /// Raised when the product of two group elements is not a group element.
    #[error("Permutation group is not closed: {first} * {second} is not contained in the group.")]
    NotClosed { first: String, second: String },

    #[error(
        "Representation size mismatch: group has {group} elements but {characters} characters were given."
    )]
    RepresentationSize { group: usize, characters: usize },

    #[error("Invalid character at symmetry {index}: {reason}")]
    InvalidCharacter { index: usize, reason: String },

    #[error("Invalid quantum numbers (nsites={nsites}, nup={nup}, ndn={ndn}): {reason}")]
    InvalidQuantumNumbers {
        nsites: usize,
        nup: usize,
        ndn: usize,
        reason: String,
    },

    #[error("Too many sites: {nsites} sites exceed the maximum of {max} supported sites.")]
    TooManySites { nsites: usize, max: usize },

    #[error("Unknown term type \"{tag}\". Known term types are: {known}")]
    UnknownTermType { tag: String, known: String },

    #[error("Term type \"{tag}\" is not supported for the {model} model.")]
    UnsupportedTerm { tag: String, model: String },

    #[error("Term of type \"{tag}\" must have exactly {expected} sites, got {found}.")]
    SiteArity {
        tag: String,
        expected: usize,
        found: usize,
    },

    #[error(
        "Term of type \"{tag}\" has site with index {site}, but indices must lie in [0, {nsites})."
    )]
    SiteOutOfRange {
        tag: String,
        site: usize,
        nsites: usize,
    },

    #[error("Term of type \"{tag}\" must have strictly disjoint sites, got {sites:?}.")]
    NonDisjointSites { tag: String, sites: Vec<usize> },

    #[error("Coupling \"{name}\" of term \"{tag}\" has not been assigned a numeric value.")]
    UndefinedCoupling { tag: String, name: String },

    #[error("Term of type \"{tag}\" has an invalid coupling: {reason}")]
    InvalidCoupling { tag: String, reason: String },

    /// A real accumulation was asked to consume a complex coefficient.
    #[error(
        "Term of type \"{tag}\" has a complex coefficient which cannot be accumulated into a real result."
    )]
    ComplexCoefficient { tag: String },

    #[error("Block has a complex representation which cannot be accumulated into a real result.")]
    ComplexRepresentation,

    #[error("Incompatible blocks: {0}")]
    IncompatibleBlocks(String),

    #[error("Dimension mismatch: block has dimension {expected} but vector has {found} rows.")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Communication failure: {0}")]
    Communication(String),

    /// The per-process sizes of a distributed basis do not add up.
    #[error("Distributed size mismatch: partitions hold {found} states but dimension is {expected}.")]
    DistributedSize { expected: u64, found: u64 },

    #[error("Invalid input parameter: {0}")]
    InputError(String),
}

// Compare the inner `ErrorKind` of two public errors.
impl PartialEq for EdError {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

// Unit tests to ensure error messages are formatted correctly.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_closed_message() {
        let error = EdError(ErrorKind::NotClosed {
            first: "[1, 2, 0]".to_string(),
            second: "[0, 2, 1]".to_string(),
        });
        let expected_message = "Permutation group is not closed: [1, 2, 0] * [0, 2, 1] is not contained in the group.";
        assert_eq!(error.to_string(), expected_message);
    }

    #[test]
    fn test_unknown_term_message() {
        let error = EdError(ErrorKind::UnknownTermType {
            tag: "Hopping".to_string(),
            known: "Hop, Hopup".to_string(),
        });
        let expected_message = "Unknown term type \"Hopping\". Known term types are: Hop, Hopup";
        assert_eq!(error.to_string(), expected_message);
    }

    #[test]
    fn test_complex_coefficient_message() {
        let error = EdError(ErrorKind::ComplexCoefficient {
            tag: "Exchange".to_string(),
        });
        let expected_message = "Term of type \"Exchange\" has a complex coefficient which cannot be accumulated into a real result.";
        assert_eq!(error.to_string(), expected_message);
    }

    #[test]
    fn test_quantum_numbers_message() {
        let error = EdError(ErrorKind::InvalidQuantumNumbers {
            nsites: 4,
            nup: 3,
            ndn: 2,
            reason: "nup + ndn exceeds the number of sites".to_string(),
        });
        let expected_message = "Invalid quantum numbers (nsites=4, nup=3, ndn=2): nup + ndn exceeds the number of sites";
        assert_eq!(error.to_string(), expected_message);
    }

    #[test]
    fn test_errors_compare_by_kind() {
        let a = EdError(ErrorKind::MissingIdentity);
        let b = EdError(ErrorKind::MissingIdentity);
        assert_eq!(a, b);
        assert_ne!(a, EdError(ErrorKind::EmptyGroup));
    }
}
