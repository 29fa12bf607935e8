use crate::core::utils::integer::{self, IntMatrix3};
use crate::core::utils::tolerance::{DEFAULT_TOLERANCE, INTEGRALITY_TOLERANCE, SINGULARITY_TOLERANCE};
use crate::core::utils::voronoi;
use nalgebra::{Matrix3, Vector3};
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LatticeError {
    #[error("Lattice vectors are linearly dependent (determinant {determinant:e})")]
    Singular { determinant: f64 },

    #[error("Lattice must be right-handed")]
    LeftHanded,

    #[error("Integer transformation is singular (determinant {determinant})")]
    SingularTransformation { determinant: i64 },

    #[error("Lattices are not related by an integer transformation (max deviation {max_deviation:e})")]
    NotASuperlattice { max_deviation: f64 },

    #[error("Stack count must be at least 1, got {0}")]
    InvalidStackCount(i64),
}

/// A periodic lattice given by the column vectors `a`, `b` and `c`.
///
/// Lattices are immutable values. Every transformation produces a new lattice; the inverse of
/// the column matrix is computed once at construction since the vectors are guaranteed to be
/// linearly independent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lattice {
    column_vector_matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl Lattice {
    pub fn from_column_matrix(column_vector_matrix: Matrix3<f64>) -> Result<Self, LatticeError> {
        let determinant = column_vector_matrix.determinant();
        let scale: f64 = column_vector_matrix
            .column_iter()
            .map(|v| v.norm())
            .product();
        if !determinant.is_finite() || determinant.abs() <= SINGULARITY_TOLERANCE * scale {
            return Err(LatticeError::Singular { determinant });
        }
        let inverse = column_vector_matrix
            .try_inverse()
            .ok_or(LatticeError::Singular { determinant })?;
        Ok(Self {
            column_vector_matrix,
            inverse,
        })
    }

    pub fn from_vectors(
        a: &Vector3<f64>,
        b: &Vector3<f64>,
        c: &Vector3<f64>,
    ) -> Result<Self, LatticeError> {
        Self::from_column_matrix(Matrix3::from_columns(&[*a, *b, *c]))
    }

    #[inline]
    pub fn column_vector_matrix(&self) -> &Matrix3<f64> {
        &self.column_vector_matrix
    }

    #[inline]
    pub fn inverse_matrix(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    /// The lattice vector at `index` (0 = a, 1 = b, 2 = c).
    ///
    /// # Panics
    ///
    /// Panics if `index > 2`.
    #[inline]
    pub fn vector(&self, index: usize) -> Vector3<f64> {
        self.column_vector_matrix.column(index).into_owned()
    }

    #[inline]
    pub fn a(&self) -> Vector3<f64> {
        self.vector(0)
    }

    #[inline]
    pub fn b(&self) -> Vector3<f64> {
        self.vector(1)
    }

    #[inline]
    pub fn c(&self) -> Vector3<f64> {
        self.vector(2)
    }

    pub fn vectors(&self) -> [Vector3<f64>; 3] {
        [self.a(), self.b(), self.c()]
    }

    /// Signed cell volume.
    pub fn volume(&self) -> f64 {
        self.column_vector_matrix.determinant()
    }

    pub fn is_right_handed(&self) -> bool {
        self.volume() > 0.0
    }

    /// Reciprocal lattice with the crystallographic `2π` convention, `2π L⁻ᵀ`.
    pub fn reciprocal(&self) -> Lattice {
        let column_vector_matrix = self.inverse.transpose() * (2.0 * PI);
        Lattice {
            column_vector_matrix,
            inverse: self.column_vector_matrix.transpose() / (2.0 * PI),
        }
    }

    /// Unit normal of the ab-plane, `a × b` normalized.
    pub fn ab_normal(&self) -> Vector3<f64> {
        self.a().cross(&self.b()).normalize()
    }

    pub fn fractional(&self, cartesian: &Vector3<f64>) -> Vector3<f64> {
        self.inverse * cartesian
    }

    pub fn cartesian(&self, fractional: &Vector3<f64>) -> Vector3<f64> {
        self.column_vector_matrix * fractional
    }

    /// Folds a Cartesian point into the `[0, 1)` parallelepiped of this lattice.
    pub fn bring_within(&self, cartesian: &Vector3<f64>) -> Vector3<f64> {
        let fractional = self
            .fractional(cartesian)
            .map(|x| x - (x + DEFAULT_TOLERANCE).floor());
        self.cartesian(&fractional)
    }

    /// Folds a Cartesian point into the Wigner–Seitz cell of this lattice.
    pub fn bring_within_wigner_seitz(&self, cartesian: &Vector3<f64>) -> Vector3<f64> {
        voronoi::bring_within_voronoi(cartesian, &self.vectors(), DEFAULT_TOLERANCE)
    }

    /// Applies a Cartesian linear map (rotation, deformation) to every lattice vector.
    pub fn transformed(&self, transformation: &Matrix3<f64>) -> Result<Lattice, LatticeError> {
        Lattice::from_column_matrix(transformation * self.column_vector_matrix)
    }

    /// Whether both lattices generate the same set of points, i.e. they differ only by a
    /// unimodular change of basis.
    pub fn is_equivalent(&self, other: &Lattice) -> bool {
        let (change, deviation) = integer::round_to_integer(&(self.inverse * other.column_vector_matrix));
        deviation <= INTEGRALITY_TOLERANCE && integer::determinant(&change).abs() == 1
    }

    /// Integer coordinates of `other`'s vectors in this lattice, if they are integral.
    pub fn integer_coordinates_of(&self, other: &Lattice) -> Result<IntMatrix3, LatticeError> {
        let (transformation, max_deviation) =
            integer::round_to_integer(&(self.inverse * other.column_vector_matrix));
        if max_deviation > INTEGRALITY_TOLERANCE {
            return Err(LatticeError::NotASuperlattice { max_deviation });
        }
        Ok(transformation)
    }
}
