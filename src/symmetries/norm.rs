//! Norms of symmetrized states.
//!
//! Projecting a representative `r` onto the sector of a representation with
//! characters `χ` gives a state whose squared norm is proportional to
//!
//! ```text
//! Σ_{g ∈ Stab(r)} χ(g) σ(g, r)
//! ```
//!
//! where `σ(g, r) = ±1` is the fermionic sign of `g` acting on `r` (always
//! `+1` for spins). The norm is the square root of the modulus of this sum.
//! It either vanishes or equals `sqrt(|Stab(r)|)`; representatives whose norm
//! falls below [`NORM_TOL`] do not exist in the sector.

use num_complex::Complex64;

use crate::bits::BitPattern;
use crate::symmetries::{GroupAction, Representation};

/// Norms below this value mark a representative as absent from a sector.
pub const NORM_TOL: f64 = 1e-6;

/// Norm of a spin (bosonic) representative.
pub fn norm<B: BitPattern>(state: B, action: &GroupAction<B>, irrep: &Representation) -> f64 {
    let mut amplitude = Complex64::new(0.0, 0.0);
    for sym in 0..action.n_symmetries() {
        if action.apply(sym, state) == state {
            amplitude += irrep.character(sym);
        }
    }
    amplitude.norm().sqrt()
}

/// Norm of a spinless-fermion representative.
pub fn norm_fermionic<B: BitPattern>(
    state: B,
    action: &GroupAction<B>,
    irrep: &Representation,
) -> f64 {
    let mut amplitude = Complex64::new(0.0, 0.0);
    for sym in 0..action.n_symmetries() {
        if action.apply(sym, state) == state {
            if action.fermi_sign(sym, state) {
                amplitude -= irrep.character(sym);
            } else {
                amplitude += irrep.character(sym);
            }
        }
    }
    amplitude.norm().sqrt()
}

/// Norm of a two-species representative `(ups, dns)`.
pub fn norm_electron<B: BitPattern>(
    ups: B,
    dns: B,
    action: &GroupAction<B>,
    irrep: &Representation,
) -> f64 {
    let syms: Vec<usize> = (0..action.n_symmetries()).collect();
    norm_electron_subset(ups, dns, action, irrep, &syms)
}

/// Two-species norm with the stabilizer search restricted to `syms`.
///
/// Used when `syms` already is the stabilizer of `ups`, so only the down
/// pattern needs to be checked.
pub fn norm_electron_subset<B: BitPattern>(
    ups: B,
    dns: B,
    action: &GroupAction<B>,
    irrep: &Representation,
    syms: &[usize],
) -> f64 {
    let mut amplitude = Complex64::new(0.0, 0.0);
    for &sym in syms {
        if action.apply(sym, ups) == ups && action.apply(sym, dns) == dns {
            let sign = action.fermi_sign(sym, ups) ^ action.fermi_sign(sym, dns);
            if sign {
                amplitude -= irrep.character(sym);
            } else {
                amplitude += irrep.character(sym);
            }
        }
    }
    amplitude.norm().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symmetries::{Characters, PermutationGroup};

    #[test]
    fn test_spin_norms_on_four_site_ring() {
        let group = PermutationGroup::cyclic(4).unwrap();
        let action = GroupAction::<u16>::new(&group);
        let k0 = Representation::trivial(group.clone());
        let k1 = Representation::momentum(group.clone(), 1).unwrap();
        let k2 = Representation::momentum(group, 2).unwrap();
        assert!((norm(0b0011u16, &action, &k0) - 1.0).abs() < 1e-12);
        assert!((norm(0b0101u16, &action, &k0) - 2f64.sqrt()).abs() < 1e-12);
        assert!((norm(0b0101u16, &action, &k2) - 2f64.sqrt()).abs() < 1e-12);
        // T^2 fixes 0101 but carries character -1 at k = π/2
        assert!(norm(0b0101u16, &action, &k1) < NORM_TOL);
        assert!((norm(0b1111u16, &action, &k0) - 2.0).abs() < 1e-12);
        assert!(norm(0b1111u16, &action, &k2) < NORM_TOL);
    }

    #[test]
    fn test_fermionic_sign_changes_norm() {
        let group = PermutationGroup::cyclic(2).unwrap();
        let action = GroupAction::<u16>::new(&group);
        let trivial = Representation::trivial(group.clone());
        let odd = Representation::new(group, Characters::Real(vec![1.0, -1.0])).unwrap();
        // exchanging two fermions is odd, the symmetric combination vanishes
        assert!(norm_fermionic(0b11u16, &action, &trivial) < NORM_TOL);
        assert!((norm_fermionic(0b11u16, &action, &odd) - 2f64.sqrt()).abs() < 1e-12);
        assert!((norm(0b11u16, &action, &trivial) - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_electron_norm_combines_both_species() {
        let group = PermutationGroup::cyclic(2).unwrap();
        let action = GroupAction::<u16>::new(&group);
        let trivial = Representation::trivial(group);
        // one fermion of each species on each site: both signs odd, product even
        assert!((norm_electron(0b11u16, 0b11u16, &action, &trivial) - 2f64.sqrt()).abs() < 1e-12);
        assert!(norm_electron(0b11u16, 0b00u16, &action, &trivial) < NORM_TOL);
        assert!((norm_electron_subset(0b11u16, 0b01u16, &action, &trivial, &[0, 1]) - 1.0).abs() < 1e-12);
    }
}
