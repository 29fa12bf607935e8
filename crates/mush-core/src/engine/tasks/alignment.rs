use crate::core::models::lattice::{Lattice, LatticeError};
use crate::core::utils::geometry;
use crate::core::utils::tolerance::{TIGHT_TOLERANCE, almost_equal};
use crate::engine::error::EngineError;
use nalgebra::{Matrix3, Vector3};

/// Orthonormal frame of a slab as columns: `â`, `n̂ × â` and the ab normal `n̂`.
///
/// The frame is right-handed and shares the handedness of `lattice`, which must itself be
/// right-handed.
pub fn slab_unit_vectors(lattice: &Lattice) -> Result<Matrix3<f64>, EngineError> {
    if !lattice.is_right_handed() {
        return Err(LatticeError::LeftHanded.into());
    }
    let first = lattice.a().normalize();
    let third = lattice.ab_normal();
    let second = third.cross(&first).normalize();
    let frame = Matrix3::from_columns(&[first, second, third]);

    let determinant = frame.determinant();
    if determinant * lattice.volume() <= 0.0 || !almost_equal(&determinant.abs(), &1.0, TIGHT_TOLERANCE) {
        return Err(EngineError::invariant(
            "alignment",
            format!("slab frame has determinant {}", determinant),
        ));
    }
    Ok(frame)
}

/// Rotation taking the slab frame of `lattice` onto the Cartesian axes.
pub fn make_alignment_matrix(lattice: &Lattice) -> Result<Matrix3<f64>, EngineError> {
    Ok(slab_unit_vectors(lattice)?.transpose())
}

/// The same lattice rotated so that `a` points along x and `b` lies in the xy-plane.
pub fn make_aligned_lattice(lattice: &Lattice) -> Result<Lattice, EngineError> {
    let aligned = lattice.transformed(&make_alignment_matrix(lattice)?)?;
    if !almost_equal(&aligned.ab_normal(), &Vector3::z(), TIGHT_TOLERANCE) {
        return Err(EngineError::invariant(
            "alignment",
            format!("aligned ab normal is {:?}", aligned.ab_normal()),
        ));
    }
    Ok(aligned)
}

/// Rotation by `degrees` about the ab normal of `lattice`, counter-clockwise when viewed
/// from the side the normal points to. Applies to column vectors.
pub fn make_twist_rotation_matrix(lattice: &Lattice, degrees: f64) -> Result<Matrix3<f64>, EngineError> {
    if !degrees.is_finite() {
        return Err(EngineError::InvalidAngle(degrees));
    }
    let frame = slab_unit_vectors(lattice)?;
    let about_z = geometry::rotation_from_axis_angle(&Vector3::z(), degrees).into_inner();
    Ok(frame * about_z * frame.transpose())
}

pub fn make_twisted_lattice(lattice: &Lattice, degrees: f64) -> Result<Lattice, EngineError> {
    let rotation = make_twist_rotation_matrix(lattice, degrees)?;
    Ok(lattice.transformed(&rotation)?)
}
