//! Validation of terms and their compilation into kernels.

use std::fmt;
use std::str::FromStr;

use num_complex::Complex64;

use crate::bits::BitPattern;
use crate::error::{ErrorKind, Result};
use crate::operators::kernel::{Action, Kernel, Poly, Species, compile_poly};
use crate::operators::{Coupling, Term};
use crate::scalar::Coefficient;

/// The physical model a basis describes; decides which terms are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    Spinhalf,
    TJ,
    Electron,
}

impl Model {
    pub fn is_fermionic(self) -> bool {
        !matches!(self, Model::Spinhalf)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Model::Spinhalf => "Spinhalf",
            Model::TJ => "tJ",
            Model::Electron => "Electron",
        };
        write!(f, "{name}")
    }
}

/// Every term type tag understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermType {
    Sz,
    SPlus,
    SMinus,
    Cdagup,
    Cup,
    Cdagdn,
    Cdn,
    Ntot,
    Nup,
    Ndn,
    SdotS,
    Exchange,
    SzSz,
    Hop,
    Hopup,
    Hopdn,
    TJSzSz,
    TJSdotS,
    NtotNtot,
    ScalarChirality,
    HubbardU,
    Map,
}

const ALL_TYPES: [TermType; 22] = [
    TermType::Sz,
    TermType::SPlus,
    TermType::SMinus,
    TermType::Cdagup,
    TermType::Cup,
    TermType::Cdagdn,
    TermType::Cdn,
    TermType::Ntot,
    TermType::Nup,
    TermType::Ndn,
    TermType::SdotS,
    TermType::Exchange,
    TermType::SzSz,
    TermType::Hop,
    TermType::Hopup,
    TermType::Hopdn,
    TermType::TJSzSz,
    TermType::TJSdotS,
    TermType::NtotNtot,
    TermType::ScalarChirality,
    TermType::HubbardU,
    TermType::Map,
];

impl TermType {
    pub fn tag(self) -> &'static str {
        match self {
            TermType::Sz => "Sz",
            TermType::SPlus => "S+",
            TermType::SMinus => "S-",
            TermType::Cdagup => "Cdagup",
            TermType::Cup => "Cup",
            TermType::Cdagdn => "Cdagdn",
            TermType::Cdn => "Cdn",
            TermType::Ntot => "Ntot",
            TermType::Nup => "Nup",
            TermType::Ndn => "Ndn",
            TermType::SdotS => "SdotS",
            TermType::Exchange => "Exchange",
            TermType::SzSz => "SzSz",
            TermType::Hop => "Hop",
            TermType::Hopup => "Hopup",
            TermType::Hopdn => "Hopdn",
            TermType::TJSzSz => "tJSzSz",
            TermType::TJSdotS => "tJSdotS",
            TermType::NtotNtot => "NtotNtot",
            TermType::ScalarChirality => "ScalarChirality",
            TermType::HubbardU => "HubbardU",
            TermType::Map => "Map",
        }
    }

    /// Required number of sites, `None` for any positive number (`Map`).
    pub fn arity(self) -> Option<usize> {
        use TermType::*;
        match self {
            Sz | SPlus | SMinus | Cdagup | Cup | Cdagdn | Cdn | Ntot | Nup | Ndn => Some(1),
            SdotS | Exchange | SzSz | Hop | Hopup | Hopdn | TJSzSz | TJSdotS | NtotNtot => Some(2),
            ScalarChirality => Some(3),
            HubbardU => Some(0),
            Map => None,
        }
    }

    pub fn supports(self, model: Model) -> bool {
        use TermType::*;
        match self {
            Sz | SPlus | SMinus | SdotS | Exchange | SzSz | ScalarChirality => true,
            Map => model == Model::Spinhalf,
            HubbardU => model == Model::Electron,
            _ => model != Model::Spinhalf,
        }
    }
}

impl FromStr for TermType {
    type Err = crate::error::EdError;

    fn from_str(tag: &str) -> Result<Self> {
        ALL_TYPES
            .iter()
            .copied()
            .find(|t| t.tag() == tag)
            .ok_or_else(|| {
                let known: Vec<&str> = ALL_TYPES.iter().map(|t| t.tag()).collect();
                ErrorKind::UnknownTermType {
                    tag: tag.to_string(),
                    known: known.join(", "),
                }
                .into()
            })
    }
}

/// Checks a term against a model and a site count.
///
/// # Returns
///
/// The parsed type of the term, or an error naming the term's tag if the tag
/// is unknown, unsupported by `model`, the site list has the wrong length,
/// repeats a site or leaves `0..nsites`, or the coupling is missing or has
/// the wrong shape.
pub fn validate(term: &Term, model: Model, nsites: usize) -> Result<TermType> {
    let kind = TermType::from_str(&term.tag)?;
    if !kind.supports(model) {
        return Err(ErrorKind::UnsupportedTerm {
            tag: term.tag.clone(),
            model: model.to_string(),
        }
        .into());
    }
    match kind.arity() {
        Some(n) if term.sites.len() != n => {
            return Err(ErrorKind::SiteArity {
                tag: term.tag.clone(),
                expected: n,
                found: term.sites.len(),
            }
            .into());
        }
        None if term.sites.is_empty() => {
            return Err(ErrorKind::InputError(format!(
                "Term of type \"{}\" must have sites defined.",
                term.tag
            ))
            .into());
        }
        _ => {}
    }
    for &site in &term.sites {
        if site >= nsites {
            return Err(ErrorKind::SiteOutOfRange {
                tag: term.tag.clone(),
                site,
                nsites,
            }
            .into());
        }
    }
    for (i, a) in term.sites.iter().enumerate() {
        if term.sites[i + 1..].contains(a) {
            return Err(ErrorKind::NonDisjointSites {
                tag: term.tag.clone(),
                sites: term.sites.clone(),
            }
            .into());
        }
    }
    match (&term.coupling, kind) {
        (Coupling::Name(name), _) => Err(ErrorKind::UndefinedCoupling {
            tag: term.tag.clone(),
            name: name.clone(),
        }
        .into()),
        (Coupling::Matrix(m), TermType::Map) => {
            let dim = 1usize << term.sites.len();
            if m.nrows() != dim || m.ncols() != dim {
                Err(ErrorKind::InvalidCoupling {
                    tag: term.tag.clone(),
                    reason: format!(
                        "expected a {dim}x{dim} matrix, got {}x{}",
                        m.nrows(),
                        m.ncols()
                    ),
                }
                .into())
            } else {
                Ok(kind)
            }
        }
        (Coupling::Matrix(_), _) => Err(ErrorKind::InvalidCoupling {
            tag: term.tag.clone(),
            reason: "expected a scalar coupling, got a matrix".to_string(),
        }
        .into()),
        (_, TermType::Map) => Err(ErrorKind::InvalidCoupling {
            tag: term.tag.clone(),
            reason: "expected a matrix coupling, got a scalar".to_string(),
        }
        .into()),
        _ => Ok(kind),
    }
}

/// Site operators of one model, written as polynomials of ladder operators.
struct Local {
    model: Model,
}

impl Local {
    fn n(&self, i: usize, species: Species) -> Poly {
        Poly::op(i, species, Action::Number)
    }

    fn ntot(&self, i: usize) -> Poly {
        match self.model {
            Model::Spinhalf => self.n(i, Species::Up),
            _ => self.n(i, Species::Up) + self.n(i, Species::Dn),
        }
    }

    fn sz(&self, i: usize) -> Poly {
        match self.model {
            Model::Spinhalf => self.n(i, Species::Up) + Poly::real(-0.5),
            _ => self.n(i, Species::Up).scale_real(0.5) + self.n(i, Species::Dn).scale_real(-0.5),
        }
    }

    fn sp(&self, i: usize) -> Poly {
        match self.model {
            Model::Spinhalf => Poly::op(i, Species::Up, Action::Create),
            _ => &Poly::op(i, Species::Up, Action::Create) * &Poly::op(i, Species::Dn, Action::Annihilate),
        }
    }

    fn sm(&self, i: usize) -> Poly {
        match self.model {
            Model::Spinhalf => Poly::op(i, Species::Up, Action::Annihilate),
            _ => &Poly::op(i, Species::Dn, Action::Create) * &Poly::op(i, Species::Up, Action::Annihilate),
        }
    }

    fn hop(&self, i: usize, j: usize, species: Species, t: Complex64) -> Poly {
        let ij = &Poly::op(i, species, Action::Create) * &Poly::op(j, species, Action::Annihilate);
        let ji = &Poly::op(j, species, Action::Create) * &Poly::op(i, species, Action::Annihilate);
        ij.scale(-t) + ji.scale(-t.conj())
    }

    fn szsz(&self, i: usize, j: usize) -> Poly {
        &self.sz(i) * &self.sz(j)
    }

    fn exchange(&self, i: usize, j: usize, coupling: Complex64) -> Poly {
        (&self.sp(i) * &self.sm(j)).scale(coupling * 0.5)
            + (&self.sm(i) * &self.sp(j)).scale(coupling.conj() * 0.5)
    }

    fn sdots(&self, i: usize, j: usize) -> Poly {
        self.szsz(i, j)
            + (&self.sp(i) * &self.sm(j)).scale_real(0.5)
            + (&self.sm(i) * &self.sp(j)).scale_real(0.5)
    }

    fn nn(&self, i: usize, j: usize) -> Poly {
        &self.ntot(i) * &self.ntot(j)
    }

    fn chirality(&self, a: usize, b: usize, c: usize) -> Poly {
        let mut out = Poly::default();
        for (x, y, z) in [(a, b, c), (b, c, a), (c, a, b)] {
            let flip = (&self.sp(x) * &self.sm(y)) + (&self.sm(x) * &self.sp(y)).scale_real(-1.0);
            out = out + (&flip * &self.sz(z)).scale(Complex64::new(0.0, 0.5));
        }
        out
    }

    /// `|out⟩⟨in|` summed with the entries of `matrix`; bit `l` of the local
    /// index refers to `sites[l]`.
    fn map(&self, sites: &[usize], matrix: &faer::Mat<Complex64>) -> Poly {
        let mut out = Poly::default();
        for col in 0..matrix.ncols() {
            for row in 0..matrix.nrows() {
                let value = matrix[(row, col)];
                if value == Complex64::new(0.0, 0.0) {
                    continue;
                }
                let mut product = Poly::scalar(value);
                for (l, &site) in sites.iter().enumerate() {
                    let action = match ((col >> l) & 1, (row >> l) & 1) {
                        (0, 0) => Action::Hole,
                        (1, 1) => Action::Number,
                        (0, _) => Action::Create,
                        _ => Action::Annihilate,
                    };
                    product = &product * &Poly::op(site, Species::Up, action);
                }
                out = out + product;
            }
        }
        out
    }
}

fn scalar(coupling: &Coupling) -> Complex64 {
    match coupling {
        Coupling::Real(x) => Complex64::new(*x, 0.0),
        Coupling::Complex(z) => *z,
        _ => Complex64::new(0.0, 0.0),
    }
}

/// Expands a validated term into a polynomial of ladder operators.
fn expand(term: &Term, kind: TermType, model: Model, nsites: usize) -> Poly {
    let local = Local { model };
    let s = &term.sites;
    let c = scalar(&term.coupling);
    match kind {
        TermType::Sz => local.sz(s[0]).scale(c),
        TermType::SPlus => local.sp(s[0]).scale(c),
        TermType::SMinus => local.sm(s[0]).scale(c),
        TermType::Cdagup => Poly::op(s[0], Species::Up, Action::Create).scale(c),
        TermType::Cup => Poly::op(s[0], Species::Up, Action::Annihilate).scale(c),
        TermType::Cdagdn => Poly::op(s[0], Species::Dn, Action::Create).scale(c),
        TermType::Cdn => Poly::op(s[0], Species::Dn, Action::Annihilate).scale(c),
        TermType::Ntot => local.ntot(s[0]).scale(c),
        TermType::Nup => local.n(s[0], Species::Up).scale(c),
        TermType::Ndn => local.n(s[0], Species::Dn).scale(c),
        TermType::SdotS => local.sdots(s[0], s[1]).scale(c),
        TermType::Exchange => local.exchange(s[0], s[1], c),
        TermType::SzSz => local.szsz(s[0], s[1]).scale(c),
        TermType::Hop => {
            local.hop(s[0], s[1], Species::Up, c) + local.hop(s[0], s[1], Species::Dn, c)
        }
        TermType::Hopup => local.hop(s[0], s[1], Species::Up, c),
        TermType::Hopdn => local.hop(s[0], s[1], Species::Dn, c),
        TermType::TJSzSz => {
            (local.szsz(s[0], s[1]) + local.nn(s[0], s[1]).scale_real(-0.25)).scale(c)
        }
        TermType::TJSdotS => {
            (local.sdots(s[0], s[1]) + local.nn(s[0], s[1]).scale_real(-0.25)).scale(c)
        }
        TermType::NtotNtot => local.nn(s[0], s[1]).scale(c),
        TermType::ScalarChirality => local.chirality(s[0], s[1], s[2]).scale(c),
        TermType::HubbardU => (0..nsites)
            .map(|i| &local.n(i, Species::Up) * &local.n(i, Species::Dn))
            .fold(Poly::default(), |acc, p| acc + p)
            .scale(c),
        TermType::Map => match &term.coupling {
            Coupling::Matrix(m) => local.map(s, m),
            _ => Poly::default(),
        },
    }
}

/// Validates `terms` and compiles them into kernels with coefficients of type `T`.
///
/// # Arguments
///
/// * `terms`: resolved terms (no symbolic couplings).
/// * `model`: model of the basis the kernels will act on.
/// * `nsites`: number of sites of that basis.
///
/// # Returns
///
/// One list of kernels for all terms, or the first validation error. A real
/// `T` fails with the complex-coefficient error, naming the term, as soon as
/// one kernel of that term carries an imaginary part.
pub fn compile<B: BitPattern, T: Coefficient>(
    terms: &[Term],
    model: Model,
    nsites: usize,
) -> Result<Vec<Kernel<B, T>>> {
    if nsites > B::MAX_SITES {
        return Err(ErrorKind::TooManySites {
            nsites,
            max: B::MAX_SITES,
        }
        .into());
    }
    let mut kernels = Vec::new();
    for term in terms {
        let kind = validate(term, model, nsites)?;
        let poly = expand(term, kind, model, nsites);
        for kernel in compile_poly::<B>(&poly, nsites, model.is_fermionic()) {
            let coeff = T::from_complex(kernel.coeff).ok_or_else(|| ErrorKind::ComplexCoefficient {
                tag: term.tag.clone(),
            })?;
            kernels.push(kernel.with_coeff(coeff));
        }
    }
    log::debug!(
        "compiled {} terms into {} kernels for the {model} model",
        terms.len(),
        kernels.len()
    );
    Ok(kernels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tag_lists_known_types() {
        let term = Term::new("Hopping", 1.0, &[0, 1]);
        let err = validate(&term, Model::Electron, 4).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Unknown term type \"Hopping\". Known term types are: Sz, S+, S-"));
        assert!(message.contains("ScalarChirality"));
    }

    #[test]
    fn test_site_validation() {
        let err = validate(&Term::new("Hop", 1.0, &[0]), Model::TJ, 4).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Term of type \"Hop\" must have exactly 2 sites, got 1."
        );
        let err = validate(&Term::new("SzSz", 1.0, &[2, 2]), Model::Spinhalf, 4).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Term of type \"SzSz\" must have strictly disjoint sites, got [2, 2]."
        );
        let err = validate(&Term::new("Sz", 1.0, &[4]), Model::Spinhalf, 4).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Term of type \"Sz\" has site with index 4, but indices must lie in [0, 4)."
        );
        let err = validate(&Term::new("HubbardU", 1.0, &[]), Model::TJ, 4).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Term type \"HubbardU\" is not supported for the tJ model."
        );
    }

    #[test]
    fn test_coupling_validation() {
        let err = validate(&Term::new("Exchange", "J", &[0, 1]), Model::Spinhalf, 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Coupling \"J\" of term \"Exchange\" has not been assigned a numeric value."
        );
        let err = validate(&Term::new("Map", 1.0, &[0]), Model::Spinhalf, 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Term of type \"Map\" has an invalid coupling: expected a matrix coupling, got a scalar"
        );
        let m = faer::Mat::<Complex64>::zeros(2, 2);
        let err = validate(&Term::new("Map", m, &[0, 1]), Model::Spinhalf, 2).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Term of type \"Map\" has an invalid coupling: expected a 4x4 matrix, got 2x2"
        );
    }

    #[test]
    fn test_real_accumulation_rejects_complex_terms() {
        let terms = vec![Term::new("ScalarChirality", 1.0, &[0, 1, 2])];
        let err = compile::<u16, f64>(&terms, Model::Spinhalf, 3).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Term of type \"ScalarChirality\" has a complex coefficient which cannot be accumulated into a real result."
        );
        assert!(compile::<u16, Complex64>(&terms, Model::Spinhalf, 3).is_ok());
        let hop = vec![Term::new("Hop", Complex64::new(1.0, 0.5), &[0, 1])];
        assert!(compile::<u16, f64>(&hop, Model::Electron, 2).is_err());
        let real_hop = vec![Term::new("Hop", 1.0, &[0, 1])];
        assert_eq!(compile::<u16, f64>(&real_hop, Model::Electron, 2).unwrap().len(), 4);
    }

    #[test]
    fn test_heisenberg_bond_kernels() {
        let terms = vec![Term::new("SdotS", 1.0, &[0, 1])];
        let kernels = compile::<u16, f64>(&terms, Model::Spinhalf, 2).unwrap();
        // diagonal parts and two spin flips
        let flips = kernels.iter().filter(|k| !k.is_diagonal()).count();
        assert_eq!(flips, 2);
        let diagonal = |s: u16| -> f64 {
            kernels
                .iter()
                .filter(|k| k.is_diagonal())
                .filter_map(|k| k.act(s, 0).map(|_| k.coeff))
                .sum()
        };
        assert!((diagonal(0b00) - 0.25).abs() < 1e-14);
        assert!((diagonal(0b01) + 0.25).abs() < 1e-14);
        assert!((diagonal(0b11) - 0.25).abs() < 1e-14);
    }
}
