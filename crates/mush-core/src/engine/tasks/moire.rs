use super::alignment;
use super::slab;
use crate::core::models::lattice::Lattice;
use crate::core::utils::tolerance::{DEFAULT_TOLERANCE, TIGHT_TOLERANCE, almost_zero};
use crate::core::utils::voronoi;
use crate::engine::config::{BrillouinZone, Layer};
use crate::engine::error::EngineError;
use nalgebra::{Matrix2, Matrix3, Vector3};
use tracing::{debug, info, instrument};

/// The exact moiré lattice of a twisted bilayer, together with the intermediate lattices
/// used to construct it.
///
/// Before anything else the input lattice is aligned into the xy-plane and made prismatic,
/// which breaks periodicity along c but keeps the slab thickness. The moiré lattice is in
/// general incommensurate with both layers; it serves as the target of the commensurate
/// approximation and is never an output structure by itself.
#[derive(Debug, Clone, PartialEq)]
pub struct MoireLattice {
    input_lattice: Lattice,
    input_degrees: f64,
    aligned_lattice: Lattice,
    rotated_lattice: Lattice,
    full_reciprocal_difference: Matrix2<f64>,
    zone_reciprocal_differences: [Matrix2<f64>; 2],
    moire_lattices: [Lattice; 2],
    brillouin_zone_overlap: [[bool; 2]; 2],
}

impl MoireLattice {
    #[instrument(skip_all, name = "moire_task")]
    pub fn new(lattice: &Lattice, degrees: f64) -> Result<Self, EngineError> {
        if !degrees.is_finite() {
            return Err(EngineError::InvalidAngle(degrees));
        }
        let aligned_lattice = slab::make_prismatic_lattice(&alignment::make_aligned_lattice(lattice)?)?;
        let rotated_lattice = alignment::make_twisted_lattice(&aligned_lattice, degrees)?;

        let reciprocal_aligned = aligned_lattice.reciprocal();
        let reciprocal_rotated = rotated_lattice.reciprocal();
        let full_reciprocal_difference = reciprocal_difference(&reciprocal_aligned, &reciprocal_rotated)?;
        if is_degenerate(&full_reciprocal_difference, &reciprocal_aligned) {
            return Err(EngineError::DegenerateMoire { degrees });
        }

        let zone_reciprocal_differences = [
            right_handed(bring_vectors_into_voronoi(&full_reciprocal_difference, &reciprocal_aligned)),
            right_handed(bring_vectors_into_voronoi(&full_reciprocal_difference, &reciprocal_rotated)),
        ];
        if zone_reciprocal_differences
            .iter()
            .any(|diff| is_degenerate(diff, &reciprocal_aligned))
        {
            return Err(EngineError::DegenerateMoire { degrees });
        }

        let c = aligned_lattice.c();
        let moire_lattices = [
            make_moire_lattice_from_reciprocal_difference(&zone_reciprocal_differences[0], &c, degrees)?,
            make_moire_lattice_from_reciprocal_difference(&zone_reciprocal_differences[1], &c, degrees)?,
        ];

        let overlap = |diff: &Matrix2<f64>, other_zone: &Lattice| -> [bool; 2] {
            let basis = [other_zone.a(), other_zone.b()];
            [0, 1].map(|i| {
                let k = Vector3::new(diff[(0, i)], diff[(1, i)], 0.0);
                voronoi::is_within_voronoi(&k, &basis, TIGHT_TOLERANCE)
            })
        };
        let brillouin_zone_overlap = [
            overlap(&zone_reciprocal_differences[0], &reciprocal_rotated),
            overlap(&zone_reciprocal_differences[1], &reciprocal_aligned),
        ];

        info!(
            degrees,
            aligned_moire_area = moire_lattices[0].a().cross(&moire_lattices[0].b()).norm(),
            "Constructed exact moiré lattice."
        );
        debug!(overlap = ?brillouin_zone_overlap, "Brillouin zone overlap of folded moiré vectors.");

        Ok(Self {
            input_lattice: *lattice,
            input_degrees: degrees,
            aligned_lattice,
            rotated_lattice,
            full_reciprocal_difference,
            zone_reciprocal_differences,
            moire_lattices,
            brillouin_zone_overlap,
        })
    }

    /// The lattice given at construction, not necessarily aligned.
    pub fn input_lattice(&self) -> &Lattice {
        &self.input_lattice
    }

    pub fn input_degrees(&self) -> f64 {
        self.input_degrees
    }

    /// The input lattice made prismatic and aligned with the xy-plane.
    pub fn aligned_lattice(&self) -> &Lattice {
        &self.aligned_lattice
    }

    /// The aligned lattice rotated about z by the input angle.
    pub fn rotated_lattice(&self) -> &Lattice {
        &self.rotated_lattice
    }

    pub fn real(&self, layer: Layer) -> &Lattice {
        match layer {
            Layer::Aligned => &self.aligned_lattice,
            Layer::Rotated => &self.rotated_lattice,
        }
    }

    pub fn reciprocal(&self, layer: Layer) -> Lattice {
        self.real(layer).reciprocal()
    }

    /// In-plane block of `K' - K`, before any folding.
    pub fn full_reciprocal_difference(&self) -> &Matrix2<f64> {
        &self.full_reciprocal_difference
    }

    /// The reciprocal difference folded into the first Brillouin zone of `zone`.
    pub fn reciprocal_difference(&self, zone: BrillouinZone) -> &Matrix2<f64> {
        &self.zone_reciprocal_differences[zone.index()]
    }

    /// Real-space moiré lattice built from the difference folded into `zone`. Both zones
    /// describe the same moiré periodicity with different lattice vectors.
    pub fn moire(&self, zone: BrillouinZone) -> &Lattice {
        &self.moire_lattices[zone.index()]
    }

    /// For each folded moiré reciprocal vector of `zone`, whether it also lies in the first
    /// Brillouin zone of the other layer.
    pub fn is_within_brillouin_zone_overlap(&self, zone: BrillouinZone) -> [bool; 2] {
        self.brillouin_zone_overlap[zone.index()]
    }
}

/// In-plane block of `rotated - aligned`. The c column and the z row must vanish since both
/// layers are prismatic and share the same normal.
fn reciprocal_difference(aligned: &Lattice, rotated: &Lattice) -> Result<Matrix2<f64>, EngineError> {
    let difference = rotated.column_vector_matrix() - aligned.column_vector_matrix();
    let out_of_plane = difference
        .column(2)
        .iter()
        .chain(difference.row(2).iter())
        .fold(0.0f64, |acc, x| acc.max(x.abs()));
    if !almost_zero(out_of_plane, DEFAULT_TOLERANCE) {
        return Err(EngineError::invariant(
            "moiré construction",
            format!("reciprocal difference leaves the plane by {:e}", out_of_plane),
        ));
    }
    Ok(difference.fixed_view::<2, 2>(0, 0).into_owned())
}

fn is_degenerate(diff: &Matrix2<f64>, reciprocal: &Lattice) -> bool {
    let scale = reciprocal.a().norm().min(reciprocal.b().norm());
    diff.column_iter()
        .any(|k| almost_zero(k.norm(), DEFAULT_TOLERANCE * scale))
        || almost_zero(diff.determinant(), DEFAULT_TOLERANCE * scale * scale)
}

/// Negates the second column if the pair is clockwise. The Voronoi cell is centrosymmetric,
/// so the negated vector stays folded.
fn right_handed(mut diff: Matrix2<f64>) -> Matrix2<f64> {
    if diff.determinant() < 0.0 {
        let flipped = -diff.column(1);
        diff.set_column(1, &flipped);
    }
    diff
}

/// Folds each column into the first Brillouin zone of a prismatic, aligned reciprocal lattice.
pub fn bring_vectors_into_voronoi(col_vectors: &Matrix2<f64>, reciprocal: &Lattice) -> Matrix2<f64> {
    let basis = [reciprocal.a(), reciprocal.b()];
    let mut folded = Matrix2::zeros();
    for i in 0..2 {
        let k = Vector3::new(col_vectors[(0, i)], col_vectors[(1, i)], 0.0);
        let within = voronoi::bring_within_voronoi(&k, &basis, DEFAULT_TOLERANCE);
        folded[(0, i)] = within[0];
        folded[(1, i)] = within[1];
    }
    folded
}

/// Real-space lattice whose in-plane reciprocal vectors are the columns of `diff`, with
/// `real_c` as its c vector.
pub fn make_moire_lattice_from_reciprocal_difference(
    diff: &Matrix2<f64>,
    real_c: &Vector3<f64>,
    degrees: f64,
) -> Result<Lattice, EngineError> {
    let mut reciprocal = Matrix3::identity();
    reciprocal.fixed_view_mut::<2, 2>(0, 0).copy_from(diff);
    let reciprocal =
        Lattice::from_column_matrix(reciprocal).map_err(|_| EngineError::DegenerateMoire { degrees })?;

    let real = reciprocal.reciprocal();
    Ok(Lattice::from_vectors(&real.a(), &real.b(), real_c)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::tolerance::almost_equal;

    const TOLERANCE: f64 = 1e-8;

    fn square() -> Lattice {
        Lattice::from_column_matrix(Matrix3::from_diagonal(&Vector3::new(2.0, 2.0, 8.0))).unwrap()
    }

    fn hexagonal() -> Lattice {
        let half_root_three = 3.0f64.sqrt() / 2.0;
        Lattice::from_vectors(
            &Vector3::new(2.5, 0.0, 0.0),
            &Vector3::new(-1.25, 2.5 * half_root_three, 0.0),
            &Vector3::new(0.0, 0.0, 6.7),
        )
        .unwrap()
    }

    #[test]
    fn zero_twist_has_no_moire_lattice() {
        assert!(matches!(
            MoireLattice::new(&square(), 0.0),
            Err(EngineError::DegenerateMoire { .. })
        ));
    }

    #[test]
    fn symmetric_twist_has_no_moire_lattice() {
        assert!(matches!(
            MoireLattice::new(&hexagonal(), 60.0),
            Err(EngineError::DegenerateMoire { .. })
        ));
        assert!(matches!(
            MoireLattice::new(&square(), 90.0),
            Err(EngineError::DegenerateMoire { .. })
        ));
    }

    #[test]
    fn layers_are_prismatic_and_aligned() {
        let tilted = Lattice::from_vectors(
            &Vector3::new(1.0, 2.0, 0.5),
            &Vector3::new(-1.5, 0.5, 1.0),
            &Vector3::new(0.7, -0.8, 4.0),
        )
        .unwrap();
        let moire = MoireLattice::new(&tilted, 3.0).unwrap();
        for layer in Layer::BOTH {
            let lattice = moire.real(layer);
            assert!(lattice.a()[2].abs() < TOLERANCE);
            assert!(lattice.b()[2].abs() < TOLERANCE);
            assert!(lattice.c()[0].abs() < TOLERANCE && lattice.c()[1].abs() < TOLERANCE);
        }
        assert_eq!(moire.input_lattice(), &tilted);
        assert_eq!(moire.input_degrees(), 3.0);
    }

    #[test]
    fn small_twist_of_square_lattice_has_expected_period() {
        let degrees = 2.0;
        let moire = MoireLattice::new(&square(), degrees).unwrap();
        let period = 2.0 / (2.0 * (degrees.to_radians() / 2.0).sin());
        for zone in BrillouinZone::BOTH {
            let lattice = moire.moire(zone);
            assert!((lattice.a().norm() - period).abs() < 1e-6);
            assert!((lattice.b().norm() - period).abs() < 1e-6);
            assert!(almost_equal(&lattice.c(), &moire.aligned_lattice().c(), TOLERANCE));
        }
    }

    #[test]
    fn both_zones_describe_the_same_moire_periodicity() {
        let moire = MoireLattice::new(&hexagonal(), 5.0).unwrap();
        let aligned = moire.moire(BrillouinZone::Aligned);
        let rotated = moire.moire(BrillouinZone::Rotated);
        assert!((aligned.volume().abs() - rotated.volume().abs()).abs() < 1e-6 * aligned.volume().abs());
        assert!(aligned.is_equivalent(rotated));
    }

    #[test]
    fn folded_differences_stay_in_their_zone() {
        let moire = MoireLattice::new(&hexagonal(), 22.0).unwrap();
        for zone in BrillouinZone::BOTH {
            let reciprocal = moire.reciprocal(zone.layer());
            let basis = [reciprocal.a(), reciprocal.b()];
            let diff = moire.reciprocal_difference(zone);
            for i in 0..2 {
                let k = Vector3::new(diff[(0, i)], diff[(1, i)], 0.0);
                assert!(voronoi::is_within_voronoi(&k, &basis, TOLERANCE));
            }
        }
    }

    #[test]
    fn small_twists_overlap_both_zones() {
        let moire = MoireLattice::new(&hexagonal(), 1.0).unwrap();
        assert_eq!(moire.is_within_brillouin_zone_overlap(BrillouinZone::Aligned), [true, true]);
        assert_eq!(moire.is_within_brillouin_zone_overlap(BrillouinZone::Rotated), [true, true]);
    }

    #[test]
    fn moire_lattices_are_right_handed() {
        for degrees in [-22.0, -3.0, 0.5, 5.0, 22.0, 37.0] {
            let moire = MoireLattice::new(&hexagonal(), degrees).unwrap();
            for zone in BrillouinZone::BOTH {
                assert!(moire.reciprocal_difference(zone).determinant() > 0.0);
                assert!(moire.moire(zone).is_right_handed());
            }
        }
    }

    #[test]
    fn moire_reciprocal_is_the_folded_difference() {
        let moire = MoireLattice::new(&square(), 5.0).unwrap();
        let lattice = moire.moire(BrillouinZone::Aligned);
        let reciprocal = lattice.reciprocal();
        let diff = moire.reciprocal_difference(BrillouinZone::Aligned);
        assert!(almost_equal(
            &reciprocal.column_vector_matrix().fixed_view::<2, 2>(0, 0).into_owned(),
            diff,
            TOLERANCE
        ));
    }
}
