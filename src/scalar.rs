//! Scalar types an operator can be accumulated into.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Neg};

use num_complex::Complex64;

/// A real or complex coefficient.
///
/// Matrix elements are computed as [`Complex64`] during term compilation and
/// converted once to the accumulation scalar; the conversion to `f64` refuses
/// any value with a non-zero imaginary part.
pub trait Coefficient:
    Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + AddAssign
    + Mul<Output = Self>
    + Neg<Output = Self>
{
    const IS_COMPLEX: bool;

    fn zero() -> Self;
    fn from_real(value: f64) -> Self;
    fn from_complex(value: Complex64) -> Option<Self>;
    fn to_complex(self) -> Complex64;

    #[inline]
    fn is_zero(self) -> bool {
        self == Self::zero()
    }

    #[inline]
    fn scale(self, factor: f64) -> Self {
        self * Self::from_real(factor)
    }
}

impl Coefficient for f64 {
    const IS_COMPLEX: bool = false;

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn from_real(value: f64) -> Self {
        value
    }

    #[inline]
    fn from_complex(value: Complex64) -> Option<Self> {
        (value.im == 0.0).then_some(value.re)
    }

    #[inline]
    fn to_complex(self) -> Complex64 {
        Complex64::new(self, 0.0)
    }
}

impl Coefficient for Complex64 {
    const IS_COMPLEX: bool = true;

    #[inline]
    fn zero() -> Self {
        Complex64::new(0.0, 0.0)
    }

    #[inline]
    fn from_real(value: f64) -> Self {
        Complex64::new(value, 0.0)
    }

    #[inline]
    fn from_complex(value: Complex64) -> Option<Self> {
        Some(value)
    }

    #[inline]
    fn to_complex(self) -> Complex64 {
        self
    }
}
