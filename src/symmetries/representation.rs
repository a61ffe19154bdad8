//! One-dimensional representations of permutation groups.

use num_complex::Complex64;

use crate::error::{ErrorKind, Result};
use crate::symmetries::PermutationGroup;

/// Tolerance used when validating characters.
const CHARACTER_TOL: f64 = 1e-10;

/// The characters assigned to the elements of a group.
#[derive(Debug, Clone, PartialEq)]
pub enum Characters {
    Real(Vec<f64>),
    Complex(Vec<Complex64>),
}

impl Characters {
    pub fn len(&self) -> usize {
        match self {
            Characters::Real(c) => c.len(),
            Characters::Complex(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, sym: usize) -> Complex64 {
        match self {
            Characters::Real(c) => Complex64::new(c[sym], 0.0),
            Characters::Complex(c) => c[sym],
        }
    }
}

/// A group together with a unit-modulus character for every element.
///
/// The characters must form a homomorphism, `χ(g h) = χ(g) χ(h)`, which is
/// checked on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Representation {
    group: PermutationGroup,
    characters: Characters,
}

impl Representation {
    pub fn new(group: PermutationGroup, characters: Characters) -> Result<Self> {
        if characters.len() != group.size() {
            return Err(ErrorKind::RepresentationSize {
                group: group.size(),
                characters: characters.len(),
            }
            .into());
        }
        let identity = group.identity();
        if (characters.get(identity) - Complex64::new(1.0, 0.0)).norm() > CHARACTER_TOL {
            return Err(ErrorKind::InvalidCharacter {
                index: identity,
                reason: format!(
                    "the identity must have character 1, got {}",
                    characters.get(identity)
                ),
            }
            .into());
        }
        for sym in 0..group.size() {
            let modulus = characters.get(sym).norm();
            if (modulus - 1.0).abs() > CHARACTER_TOL {
                return Err(ErrorKind::InvalidCharacter {
                    index: sym,
                    reason: format!("character has modulus {modulus}, expected 1"),
                }
                .into());
            }
        }
        for s1 in 0..group.size() {
            for s2 in 0..group.size() {
                let lhs = characters.get(group.multiply(s1, s2));
                let rhs = characters.get(s1) * characters.get(s2);
                if (lhs - rhs).norm() > CHARACTER_TOL {
                    return Err(ErrorKind::InvalidCharacter {
                        index: s1,
                        reason: format!(
                            "characters are not compatible with the group product of symmetries {s1} and {s2}"
                        ),
                    }
                    .into());
                }
            }
        }
        Ok(Self { group, characters })
    }

    /// All characters equal to one.
    pub fn trivial(group: PermutationGroup) -> Self {
        let characters = Characters::Real(vec![1.0; group.size()]);
        Self { group, characters }
    }

    /// Momentum representation `χ(T^n) = exp(2πi k n / L)` of the cyclic group
    /// returned by [`PermutationGroup::cyclic`].
    pub fn momentum(group: PermutationGroup, k: usize) -> Result<Self> {
        let l = group.size();
        let phases: Vec<Complex64> = (0..l)
            .map(|n| {
                let phi = 2.0 * std::f64::consts::PI * ((k * n) % l) as f64 / l as f64;
                Complex64::from_polar(1.0, phi)
            })
            .collect();
        if phases.iter().all(|c| c.im.abs() < CHARACTER_TOL) {
            let real = phases.iter().map(|c| c.re.round()).collect();
            Self::new(group, Characters::Real(real))
        } else {
            Self::new(group, Characters::Complex(phases))
        }
    }

    pub fn group(&self) -> &PermutationGroup {
        &self.group
    }

    pub fn characters(&self) -> &Characters {
        &self.characters
    }

    pub fn size(&self) -> usize {
        self.group.size()
    }

    #[inline]
    pub fn character(&self, sym: usize) -> Complex64 {
        self.characters.get(sym)
    }

    /// True if every character has a vanishing imaginary part.
    pub fn is_real(&self) -> bool {
        match &self.characters {
            Characters::Real(_) => true,
            Characters::Complex(c) => c.iter().all(|z| z.im.abs() < CHARACTER_TOL),
        }
    }

    /// Elementwise product of two representations of the same group.
    pub fn multiply(&self, other: &Representation) -> Result<Self> {
        if self.group != other.group {
            return Err(ErrorKind::InputError(
                "representations of different groups cannot be multiplied".to_string(),
            )
            .into());
        }
        let characters = match (&self.characters, &other.characters) {
            (Characters::Real(a), Characters::Real(b)) => {
                Characters::Real(a.iter().zip(b).map(|(x, y)| x * y).collect())
            }
            _ => Characters::Complex(
                (0..self.size())
                    .map(|s| self.character(s) * other.character(s))
                    .collect(),
            ),
        };
        Self::new(self.group.clone(), characters)
    }

    /// The representation restricted to the subgroup formed by `syms`.
    pub fn restrict(&self, syms: &[usize]) -> Result<Self> {
        let group = self.group.subgroup(syms)?;
        let characters = match &self.characters {
            Characters::Real(c) => Characters::Real(syms.iter().map(|&s| c[s]).collect()),
            Characters::Complex(c) => Characters::Complex(syms.iter().map(|&s| c[s]).collect()),
        };
        Self::new(group, characters)
    }
}
