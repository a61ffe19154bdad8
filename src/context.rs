//! Explicit run context.
//!
//! Basis construction and the engines report progress through the [`log`]
//! facade, filtered by the verbosity carried here, and draw random numbers
//! from streams seeded here. Passing the context explicitly keeps every
//! computation reproducible without process-global state.

use log::LevelFilter;
use num_complex::Complex64;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::scalar::Coefficient;

#[derive(Debug, Clone)]
pub struct Context {
    seed: u64,
    verbosity: LevelFilter,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            seed: 42,
            verbosity: LevelFilter::Info,
        }
    }
}

impl Context {
    pub fn new(seed: u64, verbosity: LevelFilter) -> Self {
        Self { seed, verbosity }
    }

    /// A context that suppresses every message.
    pub fn quiet(seed: u64) -> Self {
        Self::new(seed, LevelFilter::Off)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn verbosity(&self) -> LevelFilter {
        self.verbosity
    }

    #[inline]
    pub(crate) fn enabled(&self, level: log::Level) -> bool {
        level <= self.verbosity
    }

    /// Random stream derived from the seed.
    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }

    /// Random stream decorrelated for one process of a distributed run.
    pub fn rng_for_rank(&self, rank: usize) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ crate::distributed::mix64(rank as u64 + 1))
    }

    /// Vector with entries drawn uniformly from `[-1, 1)` (real and imaginary parts).
    pub fn random_vector<T: Coefficient>(&self, rng: &mut StdRng, dim: usize) -> Vec<T> {
        (0..dim)
            .map(|_| {
                let re = rng.random_range(-1.0..1.0);
                if T::IS_COMPLEX {
                    let im = rng.random_range(-1.0..1.0);
                    T::from_complex(Complex64::new(re, im)).unwrap_or_else(|| T::from_real(re))
                } else {
                    T::from_real(re)
                }
            })
            .collect()
    }
}

/// Logs through the facade if the context lets the level pass.
macro_rules! ctx_log {
    ($ctx:expr, $level:expr, $($arg:tt)+) => {
        if $ctx.enabled($level) {
            log::log!($level, $($arg)+);
        }
    };
}

pub(crate) use ctx_log;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_vectors_are_reproducible() {
        let ctx = Context::quiet(7);
        let a: Vec<f64> = ctx.random_vector(&mut ctx.rng(), 10);
        let b: Vec<f64> = ctx.random_vector(&mut ctx.rng(), 10);
        assert_eq!(a, b);
        assert!(a.iter().all(|x| (-1.0..1.0).contains(x)));
        let c: Vec<f64> = ctx.random_vector(&mut ctx.rng_for_rank(1), 10);
        assert_ne!(a, c);
        let z: Vec<Complex64> = ctx.random_vector(&mut ctx.rng(), 3);
        assert!(z.iter().any(|v| v.im != 0.0));
    }

    #[test]
    fn test_verbosity_filter() {
        let ctx = Context::quiet(0);
        assert!(!ctx.enabled(log::Level::Error));
        let ctx = Context::new(0, LevelFilter::Info);
        assert!(ctx.enabled(log::Level::Info));
        assert!(!ctx.enabled(log::Level::Debug));
    }
}
