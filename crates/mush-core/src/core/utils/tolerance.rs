use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};

/// General-purpose tolerance for comparing lengths and matrix entries.
pub const DEFAULT_TOLERANCE: f64 = 1e-8;
/// Tolerance for quantities that should be exact up to round-off, such as rotation matrices.
pub const TIGHT_TOLERANCE: f64 = 1e-10;
/// Relative tolerance below which a determinant is treated as zero.
pub const SINGULARITY_TOLERANCE: f64 = 1e-10;
/// Maximum deviation from the nearest integer for a real matrix to count as integral.
pub const INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// Approximate equality with an explicit absolute tolerance.
///
/// Vectors and matrices compare entry by entry, so `tol` bounds the largest absolute
/// difference of any single component.
pub trait AlmostEqual {
    fn almost_equal(&self, other: &Self, tol: f64) -> bool;
}

impl AlmostEqual for f64 {
    #[inline]
    fn almost_equal(&self, other: &Self, tol: f64) -> bool {
        (self - other).abs() <= tol
    }
}

macro_rules! impl_almost_equal_for_matrix {
    ($($ty:ty),*) => {
        $(
            impl AlmostEqual for $ty {
                #[inline]
                fn almost_equal(&self, other: &Self, tol: f64) -> bool {
                    self.iter().zip(other.iter()).all(|(l, r)| (l - r).abs() <= tol)
                }
            }
        )*
    };
}

impl_almost_equal_for_matrix!(Vector2<f64>, Vector3<f64>, Matrix2<f64>, Matrix3<f64>);

#[inline]
pub fn almost_equal<T: AlmostEqual + ?Sized>(lhs: &T, rhs: &T, tol: f64) -> bool {
    lhs.almost_equal(rhs, tol)
}

#[inline]
pub fn almost_zero(value: f64, tol: f64) -> bool {
    value.abs() <= tol
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_within_tolerance_are_equal() {
        assert!(almost_equal(&1.0, &(1.0 + 1e-9), DEFAULT_TOLERANCE));
        assert!(!almost_equal(&1.0, &1.001, DEFAULT_TOLERANCE));
    }

    #[test]
    fn vectors_compare_componentwise() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = Vector3::new(1.0, 2.0 + 1e-11, 3.0);
        let c = Vector3::new(1.0, 2.0, 3.1);
        assert!(almost_equal(&a, &b, TIGHT_TOLERANCE));
        assert!(!almost_equal(&a, &c, TIGHT_TOLERANCE));
    }

    #[test]
    fn matrices_compare_componentwise() {
        let identity = Matrix3::<f64>::identity();
        let mut perturbed = identity;
        perturbed[(1, 2)] = 5e-9;
        assert!(almost_equal(&identity, &perturbed, DEFAULT_TOLERANCE));
        assert!(!almost_equal(&identity, &perturbed, TIGHT_TOLERANCE));
    }

    #[test]
    fn almost_zero_respects_sign() {
        assert!(almost_zero(-1e-12, TIGHT_TOLERANCE));
        assert!(!almost_zero(-1e-3, TIGHT_TOLERANCE));
    }
}
