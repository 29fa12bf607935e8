use super::moire::MoireLattice;
use crate::core::models::lattice::Lattice;
use crate::core::superlattice;
use crate::core::utils::geometry;
use crate::core::utils::integer::{self, IntMatrix3};
use crate::core::utils::tolerance::almost_equal;
use crate::engine::config::{BrillouinZone, Layer, TwistConfig};
use crate::engine::error::EngineError;
use itertools::Itertools;
use nalgebra::Matrix3;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Summary of a deformation `F` applied to a layer to make it commensurate.
#[derive(Debug, Clone, PartialEq)]
pub struct DeformationReport {
    pub deformation: Matrix3<f64>,
    /// `R` of the polar decomposition `F = R U`.
    pub rotation: Matrix3<f64>,
    /// `U` of the polar decomposition `F = R U`.
    pub strain: Matrix3<f64>,
    /// In-plane angle of `R`, in degrees.
    pub rotation_angle: f64,
    /// In-plane Green–Lagrange components `(E00, E11, E01)`.
    pub strain_metrics: [f64; 3],
    pub dilation_strain: f64,
    pub deviatoric_strain: f64,
}

impl DeformationReport {
    pub fn new(deformation: &Matrix3<f64>) -> Result<Self, EngineError> {
        let (rotation, strain) = geometry::polar_decomposition(deformation).ok_or_else(|| {
            EngineError::invariant("deformation report", "polar decomposition did not converge")
        })?;
        let green_lagrange = geometry::green_lagrange_strain(deformation);
        let (e00, e11, e01) = (green_lagrange[(0, 0)], green_lagrange[(1, 1)], green_lagrange[(0, 1)]);

        Ok(Self {
            deformation: *deformation,
            rotation,
            strain,
            rotation_angle: rotation[(1, 0)].atan2(rotation[(0, 0)]).to_degrees(),
            strain_metrics: [e00, e11, e01],
            dilation_strain: (e00 + e11) / 2.0,
            deviatoric_strain: (((e00 - e11) / 2.0).powi(2) + e01.powi(2)).sqrt(),
        })
    }

    /// Frobenius distance of the stretch from the identity; zero for a pure rotation.
    pub fn strain_error(&self) -> f64 {
        (self.strain - Matrix3::identity()).norm()
    }
}

/// A pair of integer transformations and the deformed layers that make them commensurate.
///
/// Both approximate lattices, expanded by their transformations, give the same
/// `approximate_moire_lattice`.
#[derive(Debug, Clone, PartialEq)]
pub struct Approximation {
    pub approximate_moire_lattice: Lattice,
    pub approximate_lattices: [Lattice; 2],
    pub transformations: [IntMatrix3; 2],
    pub deformations: [DeformationReport; 2],
}

impl Approximation {
    pub fn approximate_lattice(&self, layer: Layer) -> &Lattice {
        &self.approximate_lattices[layer.index()]
    }

    pub fn transformation(&self, layer: Layer) -> &IntMatrix3 {
        &self.transformations[layer.index()]
    }

    pub fn deformation(&self, layer: Layer) -> &DeformationReport {
        &self.deformations[layer.index()]
    }

    /// Bilayer lattice sites, `|det T_aligned| + |det T_rotated|`.
    pub fn lattice_sites(&self) -> usize {
        self.transformations
            .iter()
            .map(|t| integer::determinant(t).unsigned_abs() as usize)
            .sum()
    }
}

/// Rounded `layer⁻¹ target`, rejected if it needs entries beyond the configured bound.
fn rounded_transformation(
    layer: Layer,
    lattice: &Lattice,
    target: &Lattice,
    config: &TwistConfig,
) -> Result<IntMatrix3, EngineError> {
    let exact = lattice.inverse_matrix() * target.column_vector_matrix();
    let required = exact.amax().round() as i64;
    if required > config.max_transformation_entry {
        return Err(EngineError::NoApproximant {
            layer,
            max_entry: config.max_transformation_entry,
            required,
        });
    }
    Ok(integer::round_to_integer(&exact).0)
}

/// Orientation-preserving perturbations of the in-plane block of `rounded`, with the
/// unperturbed matrix first.
fn candidate_transformations(rounded: &IntMatrix3, radius: i64) -> Vec<IntMatrix3> {
    let offsets = integer::centered_offsets(radius);
    (0..4)
        .map(|_| offsets.iter().copied())
        .multi_cartesian_product()
        .map(|d| {
            let mut candidate = *rounded;
            candidate[(0, 0)] += d[0];
            candidate[(0, 1)] += d[1];
            candidate[(1, 0)] += d[2];
            candidate[(1, 1)] += d[3];
            candidate
        })
        .filter(|t| integer::determinant(t) > 0)
        .collect()
}

/// Average of both superlattices, and the deformation taking each onto it.
fn averaged_superlattice(
    aligned: &Matrix3<f64>,
    rotated: &Matrix3<f64>,
) -> Option<(Matrix3<f64>, [Matrix3<f64>; 2])> {
    let average = (aligned + rotated) / 2.0;
    let aligned_deformation = average * aligned.try_inverse()?;
    let rotated_deformation = average * rotated.try_inverse()?;
    Some((average, [aligned_deformation, rotated_deformation]))
}

fn score(lattices: &[Matrix3<f64>; 2], transformations: &[&IntMatrix3; 2]) -> f64 {
    let aligned = lattices[0] * integer::to_real(transformations[0]);
    let rotated = lattices[1] * integer::to_real(transformations[1]);
    match averaged_superlattice(&aligned, &rotated) {
        Some((_, deformations)) => deformations
            .iter()
            .map(|f| (f - Matrix3::identity()).norm())
            .sum(),
        None => f64::INFINITY,
    }
}

/// Finds integer transformations of both layers onto `target` and the smallest deformations
/// that make them coincide.
///
/// Each layer's transformation starts from the rounded `L⁻¹ target` and every in-plane entry
/// is perturbed by up to `config.candidate_radius`. All pairs are scored by the summed
/// distance of both deformations from the identity; the lowest score wins and ties go to the
/// pair enumerated first. The common superlattice is the average of both integer
/// superlattices, and each deformation is `S̄ T⁻¹ L⁻¹`.
#[instrument(skip_all, name = "approximant_search_task")]
pub fn approximate_commensurate(
    target: &Lattice,
    aligned: &Lattice,
    rotated: &Lattice,
    config: &TwistConfig,
) -> Result<Approximation, EngineError> {
    let layers = [aligned, rotated];
    let mut candidates: [Vec<IntMatrix3>; 2] = [Vec::new(), Vec::new()];
    for layer in Layer::BOTH {
        let rounded = rounded_transformation(layer, layers[layer.index()], target, config)?;
        let found = candidate_transformations(&rounded, config.candidate_radius);
        if found.is_empty() {
            return Err(EngineError::NoApproximant {
                layer,
                max_entry: config.max_transformation_entry,
                required: integer::max_abs_entry(&rounded),
            });
        }
        candidates[layer.index()] = found;
    }

    let lattice_matrices = [*aligned.column_vector_matrix(), *rotated.column_vector_matrix()];
    let pairs: Vec<[&IntMatrix3; 2]> = candidates[0]
        .iter()
        .cartesian_product(candidates[1].iter())
        .map(|(a, r)| [a, r])
        .collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = pairs.iter().enumerate();

    #[cfg(feature = "parallel")]
    let iterator = pairs.par_iter().enumerate();

    let best = iterator
        .map(|(index, pair)| (score(&lattice_matrices, pair), index))
        .min_by(|lhs, rhs| lhs.0.total_cmp(&rhs.0).then(lhs.1.cmp(&rhs.1)));

    let Some((best_score, best_index)) = best.filter(|(s, _)| s.is_finite()) else {
        return Err(EngineError::invariant(
            "approximant search",
            "no candidate pair produced an invertible superlattice",
        ));
    };
    debug!(
        pairs = pairs.len(),
        best_index,
        score = best_score,
        "Scored candidate transformation pairs."
    );

    let transformations = [*pairs[best_index][0], *pairs[best_index][1]];
    let superlattices = [
        superlattice::make_superlattice(aligned, &transformations[0])?,
        superlattice::make_superlattice(rotated, &transformations[1])?,
    ];
    let (average, deformations) = averaged_superlattice(
        superlattices[0].column_vector_matrix(),
        superlattices[1].column_vector_matrix(),
    )
    .ok_or_else(|| EngineError::invariant("approximant search", "superlattice is singular"))?;
    let approximate_moire_lattice = Lattice::from_column_matrix(average)?;

    let mut approximate_lattices = [*aligned, *rotated];
    for layer in Layer::BOTH {
        let i = layer.index();
        let inverse = integer::to_real(&transformations[i])
            .try_inverse()
            .ok_or_else(|| EngineError::invariant("approximant search", "transformation is singular"))?;
        approximate_lattices[i] = Lattice::from_column_matrix(average * inverse)?;
    }

    check_commensurate(&approximate_lattices, &transformations, config)?;

    Ok(Approximation {
        approximate_moire_lattice,
        approximate_lattices,
        transformations,
        deformations: [
            DeformationReport::new(&deformations[0])?,
            DeformationReport::new(&deformations[1])?,
        ],
    })
}

/// Both approximate lattices, expanded by their transformations, must share a and b.
fn check_commensurate(
    lattices: &[Lattice; 2],
    transformations: &[IntMatrix3; 2],
    config: &TwistConfig,
) -> Result<(), EngineError> {
    let aligned = superlattice::make_superlattice(&lattices[0], &transformations[0])?;
    let rotated = superlattice::make_superlattice(&lattices[1], &transformations[1])?;
    let coincide = almost_equal(&aligned.a(), &rotated.a(), config.commensurability_tolerance)
        && almost_equal(&aligned.b(), &rotated.b(), config.commensurability_tolerance);
    if !coincide {
        return Err(EngineError::invariant(
            "commensurate approximation",
            format!(
                "superlattices differ in ab: {:?} vs {:?}",
                aligned.column_vector_matrix(),
                rotated.column_vector_matrix()
            ),
        ));
    }
    Ok(())
}

/// Commensurate approximant of a twisted bilayer for one Brillouin zone.
///
/// Constructed once from a lattice and an angle; every field is computed eagerly. The
/// deliverables are the two approximate lattices, each paired with the integer
/// transformation onto the common approximate moiré lattice and the deformation that was
/// needed to get there.
#[derive(Debug, Clone, PartialEq)]
pub struct MoireApproximant {
    moire: MoireLattice,
    zone: BrillouinZone,
    approximation: Approximation,
}

impl MoireApproximant {
    pub fn new(lattice: &Lattice, degrees: f64, config: &TwistConfig) -> Result<Self, EngineError> {
        Self::from_moire(MoireLattice::new(lattice, degrees)?, config)
    }

    #[instrument(skip_all, name = "approximant_task")]
    pub fn from_moire(moire: MoireLattice, config: &TwistConfig) -> Result<Self, EngineError> {
        let zone = config.zone;
        let approximation = approximate_commensurate(
            moire.moire(zone),
            moire.aligned_lattice(),
            moire.rotated_lattice(),
            config,
        )?;
        info!(
            degrees = moire.input_degrees(),
            %zone,
            lattice_sites = approximation.lattice_sites(),
            aligned_strain = approximation.deformations[0].strain_error(),
            rotated_strain = approximation.deformations[1].strain_error(),
            "Found commensurate approximant."
        );
        Ok(Self {
            moire,
            zone,
            approximation,
        })
    }

    pub fn input_lattice(&self) -> &Lattice {
        self.moire.input_lattice()
    }

    pub fn input_degrees(&self) -> f64 {
        self.moire.input_degrees()
    }

    pub fn aligned_lattice(&self) -> &Lattice {
        self.moire.aligned_lattice()
    }

    pub fn rotated_lattice(&self) -> &Lattice {
        self.moire.rotated_lattice()
    }

    pub fn zone(&self) -> BrillouinZone {
        self.zone
    }

    /// The exact, generally incommensurate moiré lattice this approximant targets.
    pub fn moire_lattice(&self) -> &Lattice {
        self.moire.moire(self.zone)
    }

    pub fn moire(&self) -> &MoireLattice {
        &self.moire
    }

    pub fn approximation(&self) -> &Approximation {
        &self.approximation
    }

    pub fn approximate_moire_lattice(&self) -> &Lattice {
        &self.approximation.approximate_moire_lattice
    }

    pub fn approximate_lattices(&self) -> &[Lattice; 2] {
        &self.approximation.approximate_lattices
    }

    pub fn approximate_lattice(&self, layer: Layer) -> &Lattice {
        self.approximation.approximate_lattice(layer)
    }

    pub fn approximate_moire_integer_transformation(&self, layer: Layer) -> &IntMatrix3 {
        self.approximation.transformation(layer)
    }

    pub fn approximation_deformation(&self, layer: Layer) -> &DeformationReport {
        self.approximation.deformation(layer)
    }
}
