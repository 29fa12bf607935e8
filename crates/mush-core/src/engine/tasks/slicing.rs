use crate::core::models::lattice::Lattice;
use crate::core::models::structure::Structure;
use crate::core::superlattice;
use crate::core::utils::integer::{self, IntMatrix3};
use crate::core::utils::tolerance::almost_equal;
use crate::engine::config::SliceConfig;
use crate::engine::error::EngineError;
use nalgebra::Vector3;
use tracing::{debug, info, instrument};

/// `|â · b̂|`: zero for an orthogonal ab basis, approaching one as the basis degenerates.
pub fn orthoscore(lattice: &Lattice) -> f64 {
    pair_orthoscore(&lattice.a(), &lattice.b())
}

fn pair_orthoscore(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    a.normalize().dot(&b.normalize()).abs()
}

/// Coefficients `(x, y)` of the projection of `v` onto the plane spanned by `a` and `b`.
fn in_plane_coefficients(a: &Vector3<f64>, b: &Vector3<f64>, v: &Vector3<f64>) -> (f64, f64) {
    let (aa, ab, bb) = (a.dot(a), a.dot(b), b.dot(b));
    let (av, bv) = (a.dot(v), b.dot(v));
    let det = aa * bb - ab * ab;
    ((bb * av - ab * bv) / det, (aa * bv - ab * av) / det)
}

/// Finds a lattice equivalent to `unit` whose ab-plane lies in the plane family `miller`.
///
/// Returns the new lattice together with the unimodular `U` such that `plane = unit * U`.
/// The column operations reduce the row `h` to `(0, 0, 1)`, so the first two columns of `U`
/// are lattice directions inside the plane and the third steps to the neighbouring plane.
/// `a` and `b` are swapped when needed so that the result has the handedness of `unit`
/// flipped to right-handed, and `c` is shortened toward the plane normal.
pub fn make_lattice_in_plane(
    unit: &Lattice,
    miller: &Vector3<i64>,
) -> Result<(Lattice, IntMatrix3), EngineError> {
    let divisor = integer::gcd(integer::gcd(miller.x, miller.y), miller.z);
    if divisor == 0 {
        return Err(EngineError::ZeroMillerIndices);
    }
    let mut row = [miller.x / divisor, miller.y / divisor, miller.z / divisor];
    let mut u = IntMatrix3::identity();

    for i in 0..2 {
        while row[i] != 0 {
            let q = row[2] / row[i];
            let step = u.column(i) * q;
            let reduced = u.column(2) - step;
            u.set_column(2, &reduced);
            row[2] -= q * row[i];
            u.swap_columns(i, 2);
            row.swap(i, 2);
        }
    }
    if row[2] < 0 {
        let negated = -u.column(2);
        u.set_column(2, &negated);
        row[2] = -row[2];
    }
    if row[2] != 1 {
        return Err(EngineError::invariant(
            "plane construction",
            format!("reduced Miller row ended at {:?}", row),
        ));
    }

    let sign = if unit.is_right_handed() { 1 } else { -1 };
    if integer::determinant(&u) * sign < 0 {
        u.swap_columns(0, 1);
    }

    let real = integer::to_real(&u);
    let columns = unit.column_vector_matrix() * real;
    let (a, b, c) = (
        columns.column(0).into_owned(),
        columns.column(1).into_owned(),
        columns.column(2).into_owned(),
    );
    let (x, y) = in_plane_coefficients(&a, &b, &c);
    let correction = u.column(0) * (x.round() as i64) + u.column(1) * (y.round() as i64);
    let shortened = u.column(2) - correction;
    u.set_column(2, &shortened);

    let plane = superlattice::make_superlattice(unit, &u)?;
    Ok((plane, u))
}

/// Greedily applies the in-plane unimodular candidate that most lowers the orthoscore.
///
/// Each round scans every candidate and keeps one only if it scores strictly lower than the
/// current best, so among equally good candidates the first enumerated wins. Rounds repeat
/// until nothing improves or the round budget runs out.
pub fn improve_ab_basis(lattice: &Lattice, config: &SliceConfig) -> Result<Lattice, EngineError> {
    let candidates = integer::in_plane_unimodular_matrices(config.max_unimodular_entry);
    let mut current = *lattice;

    for round in 0..config.max_reduction_rounds {
        let (a, b) = (current.a(), current.b());
        let initial = (None, pair_orthoscore(&a, &b));
        let (best, score) = candidates.iter().fold(initial, |(best, best_score), m| {
            let new_a = a * m[(0, 0)] as f64 + b * m[(1, 0)] as f64;
            let new_b = a * m[(0, 1)] as f64 + b * m[(1, 1)] as f64;
            let score = pair_orthoscore(&new_a, &new_b);
            if score < best_score {
                (Some(m), score)
            } else {
                (best, best_score)
            }
        });

        let Some(m) = best else {
            debug!(round, "No unimodular candidate improves the ab basis.");
            break;
        };
        debug!(round, orthoscore = score, "Improved ab basis.");
        current = superlattice::make_superlattice(&current, m)?;
    }
    Ok(current)
}

/// Slices `unit` so that its ab-plane exposes the `miller` plane, with a well-conditioned ab
/// basis.
#[instrument(skip_all, name = "slicing_task")]
pub fn make_sliced_lattice(
    unit: &Lattice,
    miller: &Vector3<i64>,
    config: &SliceConfig,
) -> Result<Lattice, EngineError> {
    let (plane, _) = make_lattice_in_plane(unit, miller)?;
    let sliced = improve_ab_basis(&plane, config)?;

    let alignment = plane.ab_normal().dot(&sliced.ab_normal()).abs();
    if !almost_equal(&alignment, &1.0, config.normal_tolerance) {
        return Err(EngineError::invariant(
            "slicing",
            format!("ab-plane normal tilted during basis improvement (|n·n'| = {})", alignment),
        ));
    }

    info!(
        miller = ?miller,
        initial_orthoscore = orthoscore(&plane),
        final_orthoscore = orthoscore(&sliced),
        "Sliced lattice."
    );
    Ok(sliced)
}

/// The structure re-expressed in its sliced lattice, with every site folded into the new cell.
pub fn make_sliced_structure(
    unit: &Structure,
    miller: &Vector3<i64>,
    config: &SliceConfig,
) -> Result<Structure, EngineError> {
    let sliced = make_sliced_lattice(unit.lattice(), miller, config)?;
    Ok(unit.with_lattice_keeping_cartesian(sliced).within())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::structure::Site;
    use nalgebra::{Matrix3, Point3};

    const TOLERANCE: f64 = 1e-8;

    fn orthorhombic() -> Lattice {
        Lattice::from_column_matrix(Matrix3::from_diagonal(&Vector3::new(3.0, 4.0, 8.0))).unwrap()
    }

    fn miller_battery() -> Vec<Vector3<i64>> {
        let mut millers = Vec::new();
        for i in [-1, 0, 2] {
            for j in [-2, 1, 3] {
                for k in [1, -4, 2] {
                    millers.push(Vector3::new(i, j, k));
                }
            }
        }
        millers
    }

    fn plane_normal(unit: &Lattice, miller: &Vector3<i64>) -> Vector3<f64> {
        let reciprocal = unit.reciprocal();
        reciprocal.cartesian(&miller.map(|x| x as f64)).normalize()
    }

    #[test]
    fn zero_miller_indices_are_rejected() {
        let result = make_sliced_lattice(&orthorhombic(), &Vector3::zeros(), &SliceConfig::default());
        assert!(matches!(result, Err(EngineError::ZeroMillerIndices)));
    }

    #[test]
    fn plane_lattice_vectors_lie_in_miller_plane() {
        let unit = orthorhombic();
        for miller in miller_battery() {
            let (plane, u) = make_lattice_in_plane(&unit, &miller).unwrap();
            let divisor = integer::gcd(integer::gcd(miller.x, miller.y), miller.z);
            let h = miller / divisor;
            assert_eq!(h.dot(&u.column(0).into_owned()), 0);
            assert_eq!(h.dot(&u.column(1).into_owned()), 0);
            assert_eq!(h.dot(&u.column(2).into_owned()), 1);
            assert_eq!(integer::determinant(&u).abs(), 1);
            assert!(plane.is_right_handed());
        }
    }

    #[test]
    fn already_orthogonal_basis_is_returned_unchanged() {
        let unit = orthorhombic();
        let sliced = make_sliced_lattice(&unit, &Vector3::new(0, 0, 1), &SliceConfig::default()).unwrap();
        assert_eq!(sliced, unit);
    }

    #[test]
    fn sliced_normals_are_parallel_to_plane_normals() {
        let unit = orthorhombic();
        for miller in miller_battery() {
            let (plane, _) = make_lattice_in_plane(&unit, &miller).unwrap();
            let sliced = make_sliced_lattice(&unit, &miller, &SliceConfig::default()).unwrap();

            let alignment = plane.ab_normal().dot(&sliced.ab_normal()).abs();
            assert!((alignment - 1.0).abs() < TOLERANCE, "miller {:?}", miller);

            let crystallographic = plane_normal(&unit, &miller).dot(&sliced.ab_normal()).abs();
            assert!((crystallographic - 1.0).abs() < TOLERANCE, "miller {:?}", miller);
        }
    }

    #[test]
    fn slicing_never_worsens_orthoscore() {
        let unit = orthorhombic();
        for miller in miller_battery() {
            let (plane, _) = make_lattice_in_plane(&unit, &miller).unwrap();
            let sliced = make_sliced_lattice(&unit, &miller, &SliceConfig::default()).unwrap();
            assert!(orthoscore(&sliced) <= orthoscore(&plane));
        }
    }

    #[test]
    fn sliced_lattices_are_right_handed_and_keep_volume() {
        let unit = orthorhombic();
        for miller in miller_battery() {
            let sliced = make_sliced_lattice(&unit, &miller, &SliceConfig::default()).unwrap();
            assert!(sliced.is_right_handed());
            assert!((sliced.volume() - unit.volume()).abs() < 1e-6);
            assert!(unit.is_equivalent(&sliced));
        }
    }

    #[test]
    fn non_coprime_indices_slice_like_their_primitive() {
        let unit = orthorhombic();
        let config = SliceConfig::default();
        let scaled = make_sliced_lattice(&unit, &Vector3::new(2, 0, 4), &config).unwrap();
        let primitive = make_sliced_lattice(&unit, &Vector3::new(1, 0, 2), &config).unwrap();
        assert_eq!(scaled, primitive);
    }

    #[test]
    fn skewed_hexagonal_basis_is_improved() {
        let half_root_three = 3.0f64.sqrt() / 2.0;
        let skewed = Lattice::from_vectors(
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(3.5, half_root_three, 0.0),
            &Vector3::new(0.0, 0.0, 5.0),
        )
        .unwrap();
        let sliced = make_sliced_lattice(&skewed, &Vector3::new(0, 0, 1), &SliceConfig::default()).unwrap();
        assert!((orthoscore(&sliced) - 0.5).abs() < TOLERANCE);
        assert!(skewed.is_equivalent(&sliced));
        assert_eq!(sliced.c(), skewed.c());
    }

    #[test]
    fn sliced_structure_keeps_sites_inside_new_cell() {
        let unit = Structure::new(
            orthorhombic(),
            vec![
                Site::new("Ga", Point3::new(0.0, 0.0, 0.0)),
                Site::new("N", Point3::new(1.5, 2.0, 3.0)),
            ],
        );
        let sliced = make_sliced_structure(&unit, &Vector3::new(1, 1, 0), &SliceConfig::default()).unwrap();
        assert_eq!(sliced.len(), 2);
        assert_eq!(sliced.sites()[1].label, "N");
        for f in sliced.fractional_coordinates() {
            assert!(f.iter().all(|&x| (-TOLERANCE..1.0).contains(&x)));
        }
    }
}
