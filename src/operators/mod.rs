//! Operator terms and their compilation.
//!
//! Callers describe operators as an [`OpSum`] of [`Term`]s, each a type tag,
//! a coupling and a list of sites. Before a term list reaches the engine it is
//! validated and compiled into [`Kernel`]s by [`compile`].

pub mod compile;
pub mod kernel;
pub mod term;

pub use compile::{Model, TermType, compile, validate};
pub use kernel::Kernel;
pub use term::{Coupling, OpSum, Term};
