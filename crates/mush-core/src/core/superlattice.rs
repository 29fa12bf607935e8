use crate::core::models::lattice::{Lattice, LatticeError};
use crate::core::utils::integer::{self, IntMatrix3};

/// Builds `tiling_unit * transformation` as a new lattice.
pub fn make_superlattice(
    tiling_unit: &Lattice,
    transformation: &IntMatrix3,
) -> Result<Lattice, LatticeError> {
    let determinant = integer::determinant(transformation);
    if determinant == 0 {
        return Err(LatticeError::SingularTransformation { determinant });
    }
    Lattice::from_column_matrix(tiling_unit.column_vector_matrix() * integer::to_real(transformation))
}

/// Recovers the integer matrix `T` with `superlattice = tiling_unit * T`.
pub fn make_transformation_matrix_to_super(
    tiling_unit: &Lattice,
    superlattice: &Lattice,
) -> Result<IntMatrix3, LatticeError> {
    let transformation = tiling_unit.integer_coordinates_of(superlattice)?;
    let determinant = integer::determinant(&transformation);
    if determinant == 0 {
        return Err(LatticeError::SingularTransformation { determinant });
    }
    Ok(transformation)
}

/// Repeats the lattice `stacks` times along c, via `diag(1, 1, stacks)`.
pub fn make_stacked_lattice(tiling_unit: &Lattice, stacks: i64) -> Result<Lattice, LatticeError> {
    if stacks < 1 {
        return Err(LatticeError::InvalidStackCount(stacks));
    }
    make_superlattice(tiling_unit, &IntMatrix3::from_diagonal(&nalgebra::Vector3::new(1, 1, stacks)))
}
