use nalgebra::{Matrix3, Rotation3, Unit, Vector3};

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

/// Signed angle in degrees from `from` to `to`, measured counter-clockwise when viewed from
/// the positive side of `normal`.
pub fn signed_angle_about(from: &Vector3<f64>, to: &Vector3<f64>, normal: &Vector3<f64>) -> f64 {
    let axis = normal.normalize();
    let sine = axis.dot(&from.cross(to));
    let cosine = from.dot(to);
    sine.atan2(cosine).to_degrees()
}

/// Splits a deformation `F` into a rotation `R` and a symmetric stretch `U` with `F = R U`.
///
/// With the singular value decomposition `F = W Σ Vᵀ`, the factors are `R = W Vᵀ` and
/// `U = V Σ Vᵀ`. Returns `None` if the decomposition does not converge.
pub fn polar_decomposition(deformation: &Matrix3<f64>) -> Option<(Matrix3<f64>, Matrix3<f64>)> {
    let svd = deformation.svd(true, true);
    let w = svd.u?;
    let v_t = svd.v_t?;
    let sigma = Matrix3::from_diagonal(&svd.singular_values);

    let rotation = w * v_t;
    let stretch = v_t.transpose() * sigma * v_t;
    Some((rotation, stretch))
}

/// Green–Lagrange strain `(Fᵀ F - I) / 2`.
pub fn green_lagrange_strain(deformation: &Matrix3<f64>) -> Matrix3<f64> {
    (deformation.transpose() * deformation - Matrix3::identity()) * 0.5
}
