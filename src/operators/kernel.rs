//! Non-branching kernels.
//!
//! Every operator term is expanded into a sum of products of elementary
//! site operators (creation, annihilation, occupation and hole projectors),
//! each product acting on a basis state in exactly one way: it either
//! annihilates the state or maps it to a single output state with a sign.
//! Such a product is compiled into a [`Kernel`], a handful of bit masks that
//! decide applicability, produce the output pattern and the fermionic sign
//! with a few bit operations per state.

use std::collections::HashMap;
use std::ops::{Add, Mul};

use num_complex::Complex64;

use crate::bits::{BitPattern, low_mask};

/// Particle species of a two-species model. Spin-1/2 models only use `Up`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Species {
    Up,
    Dn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Create,
    Annihilate,
    /// Projector onto an occupied site.
    Number,
    /// Projector onto an empty site.
    Hole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ladder {
    pub site: usize,
    pub species: Species,
    pub action: Action,
}

/// A product of ladder operators; `ops[0]` is the leftmost factor.
#[derive(Debug, Clone)]
pub(crate) struct Monomial {
    pub coeff: Complex64,
    pub ops: Vec<Ladder>,
}

/// A linear combination of [`Monomial`]s.
#[derive(Debug, Clone, Default)]
pub(crate) struct Poly(pub Vec<Monomial>);

impl Poly {
    pub fn scalar(coeff: Complex64) -> Self {
        Poly(vec![Monomial {
            coeff,
            ops: Vec::new(),
        }])
    }

    pub fn real(coeff: f64) -> Self {
        Self::scalar(Complex64::new(coeff, 0.0))
    }

    pub fn op(site: usize, species: Species, action: Action) -> Self {
        Poly(vec![Monomial {
            coeff: Complex64::new(1.0, 0.0),
            ops: vec![Ladder {
                site,
                species,
                action,
            }],
        }])
    }

    pub fn scale(mut self, factor: Complex64) -> Self {
        for m in &mut self.0 {
            m.coeff *= factor;
        }
        self
    }

    pub fn scale_real(self, factor: f64) -> Self {
        self.scale(Complex64::new(factor, 0.0))
    }
}

impl Add for Poly {
    type Output = Poly;

    fn add(mut self, rhs: Poly) -> Poly {
        self.0.extend(rhs.0);
        self
    }
}

impl Mul for &Poly {
    type Output = Poly;

    fn mul(self, rhs: &Poly) -> Poly {
        let mut out = Vec::with_capacity(self.0.len() * rhs.0.len());
        for a in &self.0 {
            for b in &rhs.0 {
                let mut ops = a.ops.clone();
                ops.extend_from_slice(&b.ops);
                out.push(Monomial {
                    coeff: a.coeff * b.coeff,
                    ops,
                });
            }
        }
        Poly(out)
    }
}

/// A compiled non-branching action on a two-species pattern `(ups, dns)`.
///
/// The kernel applies to a state if `ups & check_up == req_up` and
/// `dns & check_dn == req_dn`. The output is `(ups ^ flip_up, dns ^ flip_dn)`
/// with coefficient `coeff`, negated if `(ups & sign_up) ^ (dns & sign_dn)`
/// has odd parity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kernel<B: BitPattern, T> {
    pub check_up: B,
    pub req_up: B,
    pub flip_up: B,
    pub check_dn: B,
    pub req_dn: B,
    pub flip_dn: B,
    pub sign_up: B,
    pub sign_dn: B,
    pub coeff: T,
}

impl<B: BitPattern, T: Copy> Kernel<B, T> {
    /// Output state and sign, `None` if the kernel annihilates the state.
    #[inline]
    pub fn act(&self, ups: B, dns: B) -> Option<(B, B, bool)> {
        if ups & self.check_up != self.req_up || dns & self.check_dn != self.req_dn {
            return None;
        }
        let sign = ((ups & self.sign_up).popcnt() + (dns & self.sign_dn).popcnt()) & 1 == 1;
        Some((ups ^ self.flip_up, dns ^ self.flip_dn, sign))
    }

    #[inline]
    pub fn is_diagonal(&self) -> bool {
        self.flip_up == B::ZERO && self.flip_dn == B::ZERO
    }

    /// Key identifying the action of the kernel independent of its coefficient.
    pub fn signature(&self) -> [u64; 8] {
        [
            self.check_up.to_u64(),
            self.req_up.to_u64(),
            self.flip_up.to_u64(),
            self.check_dn.to_u64(),
            self.req_dn.to_u64(),
            self.flip_dn.to_u64(),
            self.sign_up.to_u64(),
            self.sign_dn.to_u64(),
        ]
    }

    pub(crate) fn with_coeff<U>(&self, coeff: U) -> Kernel<B, U> {
        Kernel {
            check_up: self.check_up,
            req_up: self.req_up,
            flip_up: self.flip_up,
            check_dn: self.check_dn,
            req_dn: self.req_dn,
            flip_dn: self.flip_dn,
            sign_up: self.sign_up,
            sign_dn: self.sign_dn,
            coeff,
        }
    }
}

/// Compiles a monomial, `None` if it vanishes identically.
///
/// The operators are applied right to left. Each operator fixes the expected
/// occupation of its site before it acts, and each fermionic ladder operator
/// contributes the parity of the occupied sites below it (plus all up sites
/// for a down operator, since up operators are ordered first). Because every
/// earlier flip is known, these parities reduce to a fixed mask on the input
/// state and a constant sign, which is folded into the coefficient.
pub(crate) fn compile_monomial<B: BitPattern>(
    monomial: &Monomial,
    nsites: usize,
    fermionic: bool,
) -> Option<Kernel<B, Complex64>> {
    let full = low_mask::<B>(nsites);
    let mut k = Kernel {
        check_up: B::ZERO,
        req_up: B::ZERO,
        flip_up: B::ZERO,
        check_dn: B::ZERO,
        req_dn: B::ZERO,
        flip_dn: B::ZERO,
        sign_up: B::ZERO,
        sign_dn: B::ZERO,
        coeff: monomial.coeff,
    };
    let mut negate = false;

    for op in monomial.ops.iter().rev() {
        let bit = B::bit(op.site);
        let occupied_before = matches!(op.action, Action::Annihilate | Action::Number);
        let flips = matches!(op.action, Action::Create | Action::Annihilate);

        let (check, req, flip) = match op.species {
            Species::Up => (&mut k.check_up, &mut k.req_up, &mut k.flip_up),
            Species::Dn => (&mut k.check_dn, &mut k.req_dn, &mut k.flip_dn),
        };
        if *check & bit != B::ZERO {
            let current = (*req ^ *flip) & bit != B::ZERO;
            if current != occupied_before {
                return None;
            }
        } else {
            *check |= bit;
            if occupied_before {
                *req |= bit;
            }
        }

        if flips && fermionic {
            let below = low_mask::<B>(op.site);
            match op.species {
                Species::Up => {
                    k.sign_up ^= below;
                    negate ^= (k.flip_up & below).parity();
                }
                Species::Dn => {
                    k.sign_dn ^= below;
                    negate ^= (k.flip_dn & below).parity();
                    k.sign_up ^= full;
                    negate ^= (k.flip_up & full).parity();
                }
            }
        }
        if flips {
            match op.species {
                Species::Up => k.flip_up ^= bit,
                Species::Dn => k.flip_dn ^= bit,
            }
        }
    }

    if negate {
        k.coeff = -k.coeff;
    }
    Some(k)
}

/// Compiles a polynomial and merges kernels acting identically.
pub(crate) fn compile_poly<B: BitPattern>(
    poly: &Poly,
    nsites: usize,
    fermionic: bool,
) -> Vec<Kernel<B, Complex64>> {
    let mut merged: Vec<Kernel<B, Complex64>> = Vec::new();
    let mut position: HashMap<[u64; 8], usize> = HashMap::new();
    for monomial in &poly.0 {
        if monomial.coeff == Complex64::new(0.0, 0.0) {
            continue;
        }
        if let Some(kernel) = compile_monomial::<B>(monomial, nsites, fermionic) {
            match position.get(&kernel.signature()) {
                Some(&i) => merged[i].coeff += kernel.coeff,
                None => {
                    position.insert(kernel.signature(), merged.len());
                    merged.push(kernel);
                }
            }
        }
    }
    merged.retain(|k| k.coeff != Complex64::new(0.0, 0.0));
    merged
}
