//! Operator terms and sums of terms.

use std::collections::HashMap;
use std::fmt;

use faer::Mat;
use num_complex::Complex64;

use crate::error::{ErrorKind, Result};

/// The coupling constant of a term.
#[derive(Debug, Clone)]
pub enum Coupling {
    /// A symbolic name, resolved through [`OpSum::resolve`].
    Name(String),
    Real(f64),
    Complex(Complex64),
    /// A matrix acting on the local space of the term's sites.
    Matrix(Mat<Complex64>),
}

impl Coupling {
    pub fn is_real(&self) -> bool {
        match self {
            Coupling::Name(_) => false,
            Coupling::Real(_) => true,
            Coupling::Complex(z) => z.im == 0.0,
            Coupling::Matrix(m) => (0..m.nrows())
                .all(|i| (0..m.ncols()).all(|j| m[(i, j)].im == 0.0)),
        }
    }
}

impl From<f64> for Coupling {
    fn from(value: f64) -> Self {
        Coupling::Real(value)
    }
}

impl From<Complex64> for Coupling {
    fn from(value: Complex64) -> Self {
        Coupling::Complex(value)
    }
}

impl From<&str> for Coupling {
    fn from(name: &str) -> Self {
        Coupling::Name(name.to_string())
    }
}

impl From<Mat<Complex64>> for Coupling {
    fn from(matrix: Mat<Complex64>) -> Self {
        Coupling::Matrix(matrix)
    }
}

impl fmt::Display for Coupling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coupling::Name(name) => write!(f, "{name}"),
            Coupling::Real(x) => write!(f, "{x}"),
            Coupling::Complex(z) => write!(f, "{z}"),
            Coupling::Matrix(m) => write!(f, "<{}x{} matrix>", m.nrows(), m.ncols()),
        }
    }
}

/// A single operator term: a type tag, a coupling and the sites it acts on.
#[derive(Debug, Clone)]
pub struct Term {
    pub tag: String,
    pub coupling: Coupling,
    pub sites: Vec<usize>,
}

impl Term {
    pub fn new(tag: impl Into<String>, coupling: impl Into<Coupling>, sites: &[usize]) -> Self {
        Self {
            tag: tag.into(),
            coupling: coupling.into(),
            sites: sites.to_vec(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} * {} {:?}", self.coupling, self.tag, self.sites)
    }
}

/// An ordered list of terms plus the values of named couplings.
#[derive(Debug, Clone, Default)]
pub struct OpSum {
    terms: Vec<Term>,
    constants: HashMap<String, Coupling>,
}

impl OpSum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, term: Term) -> &mut Self {
        self.terms.push(term);
        self
    }

    /// Appends `coupling * tag(sites)`.
    pub fn add(
        &mut self,
        tag: impl Into<String>,
        coupling: impl Into<Coupling>,
        sites: &[usize],
    ) -> &mut Self {
        self.push(Term::new(tag, coupling, sites))
    }

    /// Assigns a value to a named coupling.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Coupling>) -> &mut Self {
        self.constants.insert(name.into(), value.into());
        self
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The term list with every named coupling replaced by its value.
    pub fn resolve(&self) -> Result<Vec<Term>> {
        self.terms
            .iter()
            .map(|term| {
                let coupling = match &term.coupling {
                    Coupling::Name(name) => match self.constants.get(name) {
                        Some(Coupling::Name(_)) | None => {
                            return Err(ErrorKind::UndefinedCoupling {
                                tag: term.tag.clone(),
                                name: name.clone(),
                            }
                            .into());
                        }
                        Some(value) => value.clone(),
                    },
                    other => other.clone(),
                };
                Ok(Term {
                    tag: term.tag.clone(),
                    coupling,
                    sites: term.sites.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_named_couplings() {
        let mut ops = OpSum::new();
        ops.add("SdotS", "J", &[0, 1]).add("SdotS", 0.5, &[1, 2]);
        ops.set("J", 1.0);
        let terms = ops.resolve().unwrap();
        assert!(matches!(terms[0].coupling, Coupling::Real(x) if x == 1.0));
        assert!(matches!(terms[1].coupling, Coupling::Real(x) if x == 0.5));
    }

    #[test]
    fn test_undefined_coupling() {
        let mut ops = OpSum::new();
        ops.add("Hop", "t", &[0, 1]);
        let err = ops.resolve().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Coupling \"t\" of term \"Hop\" has not been assigned a numeric value."
        );
    }

    #[test]
    fn test_display() {
        let term = Term::new("Exchange", 1.5, &[2, 3]);
        assert_eq!(term.to_string(), "1.5 * Exchange [2, 3]");
        assert!(term.coupling.is_real());
        assert!(!Coupling::from(Complex64::new(0.0, 1.0)).is_real());
    }
}
