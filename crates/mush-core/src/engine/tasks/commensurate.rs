use super::approximant::{Approximation, DeformationReport, approximate_commensurate};
use super::moire::MoireLattice;
use crate::core::models::lattice::Lattice;
use crate::core::superlattice;
use crate::core::utils::integer::{self, IntMatrix3};
use crate::engine::config::{BrillouinZone, Layer, TwistConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{debug, info, instrument};

/// A commensurate approximant of an in-plane supercell of the exact moiré lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct SupercellApproximant {
    /// Index of the supercell, `det supercell`.
    pub size: i64,
    /// Hermite normal form taking the exact moiré lattice onto the targeted supercell.
    pub supercell: IntMatrix3,
    pub approximation: Approximation,
}

impl SupercellApproximant {
    pub fn lattice_sites(&self) -> usize {
        self.approximation.lattice_sites()
    }

    pub fn deformation(&self, layer: Layer) -> &DeformationReport {
        self.approximation.deformation(layer)
    }

    pub fn strain_error(&self, layer: Layer) -> f64 {
        self.deformation(layer).strain_error()
    }
}

/// Commensurate approximants of a twisted bilayer over growing supercells of the exact moiré
/// cell, for both Brillouin zones.
///
/// A supercell of the moiré cell can be matched with less strain than the cell itself. Sizes
/// are expanded one at a time through every 2D Hermite normal form of that index, and the
/// expansion stops at the first size where no supercell fits within `max_lattice_sites`.
/// The plain moiré cell (size 1) is always included, so `max_lattice_sites = 0` reduces to
/// a single approximant per zone.
#[derive(Debug, Clone)]
pub struct MoireApproximator {
    moire: MoireLattice,
    approximants: [Vec<SupercellApproximant>; 2],
}

impl MoireApproximator {
    pub fn new(
        lattice: &Lattice,
        degrees: f64,
        config: &TwistConfig,
        reporter: &ProgressReporter,
    ) -> Result<Self, EngineError> {
        let moire = MoireLattice::new(lattice, degrees)?;
        let mut approximants: [Vec<SupercellApproximant>; 2] = [Vec::new(), Vec::new()];
        for zone in BrillouinZone::BOTH {
            approximants[zone.index()] = expand_supercells(&moire, zone, config, reporter)?;
        }
        Ok(Self { moire, approximants })
    }

    pub fn moire(&self) -> &MoireLattice {
        &self.moire
    }

    /// Every approximant found for `zone`, ordered by size and then by Hermite normal form.
    pub fn approximants(&self, zone: BrillouinZone) -> &[SupercellApproximant] {
        &self.approximants[zone.index()]
    }

    /// The approximant with the least strain on `layer` for every size, in ascending size.
    pub fn best_of_each_size(&self, zone: BrillouinZone, layer: Layer) -> Vec<&SupercellApproximant> {
        let mut best: Vec<&SupercellApproximant> = Vec::new();
        for candidate in self.approximants(zone) {
            match best.last_mut() {
                Some(current) if current.size == candidate.size => {
                    if candidate.strain_error(layer) < current.strain_error(layer) {
                        *current = candidate;
                    }
                }
                _ => best.push(candidate),
            }
        }
        best
    }

    /// The smallest size whose strain on `layer` no larger size improves on by more than
    /// `error_tolerance`.
    pub fn best_smallest(
        &self,
        zone: BrillouinZone,
        layer: Layer,
        error_tolerance: f64,
    ) -> Option<&SupercellApproximant> {
        let best = self.best_of_each_size(zone, layer);
        best.iter()
            .enumerate()
            .find(|(i, candidate)| {
                let error = candidate.strain_error(layer);
                best[i + 1..]
                    .iter()
                    .all(|larger| larger.strain_error(layer) >= error - error_tolerance)
            })
            .map(|(_, candidate)| *candidate)
    }
}

#[instrument(skip_all, name = "supercell_expansion_task", fields(zone = %zone))]
fn expand_supercells(
    moire: &MoireLattice,
    zone: BrillouinZone,
    config: &TwistConfig,
    reporter: &ProgressReporter,
) -> Result<Vec<SupercellApproximant>, EngineError> {
    let target = moire.moire(zone);
    let (aligned, rotated) = (moire.aligned_lattice(), moire.rotated_lattice());

    reporter.report(Progress::PhaseStart {
        name: "Supercell Expansion",
    });

    let mut found = vec![SupercellApproximant {
        size: 1,
        supercell: IntMatrix3::identity(),
        approximation: approximate_commensurate(target, aligned, rotated, config)?,
    }];

    let mut size = 2;
    while config.max_lattice_sites > 0 {
        let forms = integer::hermite_normal_forms_2d(size);
        reporter.report(Progress::TaskStart {
            total_steps: forms.len() as u64,
        });

        let mut within_bound = 0usize;
        for supercell in forms {
            reporter.report(Progress::TaskIncrement);
            let supercell_target = superlattice::make_superlattice(target, &supercell)?;
            let approximation = match approximate_commensurate(&supercell_target, aligned, rotated, config) {
                Ok(approximation) => approximation,
                Err(e @ EngineError::NoApproximant { .. }) => {
                    debug!(size, error = %e, "Skipping supercell without approximant.");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if approximation.lattice_sites() <= config.max_lattice_sites {
                within_bound += 1;
                found.push(SupercellApproximant {
                    size,
                    supercell,
                    approximation,
                });
            }
        }
        reporter.report(Progress::TaskFinish);

        if within_bound == 0 {
            break;
        }
        reporter.report(Progress::Message(format!(
            "{} supercell(s) of size {} within {} lattice sites",
            within_bound, size, config.max_lattice_sites
        )));
        size += 1;
    }

    reporter.report(Progress::PhaseFinish);
    info!(
        approximants = found.len(),
        largest_size = found.last().map(|a| a.size).unwrap_or(1),
        "Expanded moiré supercells."
    );
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::tolerance::almost_equal;
    use crate::engine::config::TwistConfigBuilder;
    use crate::engine::tasks::approximant::MoireApproximant;
    use nalgebra::Vector3;
    use std::sync::Mutex;

    const TOLERANCE: f64 = 1e-8;
    const COMMENSURATE_HEXAGONAL_ANGLE: f64 = 21.786789;

    fn hexagonal() -> Lattice {
        let half_root_three = 3.0f64.sqrt() / 2.0;
        Lattice::from_vectors(
            &Vector3::new(2.5, 0.0, 0.0),
            &Vector3::new(-1.25, 2.5 * half_root_three, 0.0),
            &Vector3::new(0.0, 0.0, 6.7),
        )
        .unwrap()
    }

    fn expanded(degrees: f64, max_lattice_sites: usize) -> MoireApproximator {
        let config = TwistConfigBuilder::new()
            .max_lattice_sites(max_lattice_sites)
            .build()
            .unwrap();
        MoireApproximator::new(&hexagonal(), degrees, &config, &ProgressReporter::new()).unwrap()
    }

    #[test]
    fn without_expansion_only_the_moire_cell_is_approximated() {
        let approximator = expanded(5.0, 0);
        for zone in BrillouinZone::BOTH {
            let approximants = approximator.approximants(zone);
            assert_eq!(approximants.len(), 1);
            assert_eq!(approximants[0].size, 1);
            assert_eq!(approximants[0].supercell, IntMatrix3::identity());

            let config = TwistConfigBuilder::new().zone(zone).build().unwrap();
            let direct = MoireApproximant::new(&hexagonal(), 5.0, &config).unwrap();
            assert_eq!(&approximants[0].approximation, direct.approximation());
        }
    }

    #[test]
    fn expansion_respects_the_site_bound() {
        let max_lattice_sites = 60;
        let approximator = expanded(22.0, max_lattice_sites);
        for zone in BrillouinZone::BOTH {
            let approximants = approximator.approximants(zone);
            assert!(approximants.len() > 1);
            assert!(approximants.windows(2).all(|w| w[0].size <= w[1].size));
            for approximant in &approximants[1..] {
                assert!(approximant.lattice_sites() <= max_lattice_sites);
                assert_eq!(integer::determinant(&approximant.supercell), approximant.size);
            }
        }
    }

    #[test]
    fn every_supercell_approximant_is_commensurate() {
        let approximator = expanded(22.0, 60);
        for approximant in approximator.approximants(BrillouinZone::Aligned) {
            let approximation = &approximant.approximation;
            let aligned = superlattice::make_superlattice(
                approximation.approximate_lattice(Layer::Aligned),
                approximation.transformation(Layer::Aligned),
            )
            .unwrap();
            let rotated = superlattice::make_superlattice(
                approximation.approximate_lattice(Layer::Rotated),
                approximation.transformation(Layer::Rotated),
            )
            .unwrap();
            assert!(almost_equal(&aligned.a(), &rotated.a(), TOLERANCE));
            assert!(almost_equal(&aligned.b(), &rotated.b(), TOLERANCE));
        }
    }

    #[test]
    fn best_of_each_size_picks_least_strain() {
        let approximator = expanded(22.0, 60);
        let best = approximator.best_of_each_size(BrillouinZone::Aligned, Layer::Rotated);
        assert_eq!(best[0].size, 1);
        assert!(best.windows(2).all(|w| w[0].size < w[1].size));
        for chosen in &best {
            let lowest = approximator
                .approximants(BrillouinZone::Aligned)
                .iter()
                .filter(|a| a.size == chosen.size)
                .map(|a| a.strain_error(Layer::Rotated))
                .fold(f64::INFINITY, f64::min);
            assert_eq!(chosen.strain_error(Layer::Rotated), lowest);
        }
    }

    #[test]
    fn best_smallest_is_not_beaten_by_larger_sizes() {
        let approximator = expanded(22.0, 60);
        let tolerance = 1e-4;
        let chosen = approximator
            .best_smallest(BrillouinZone::Aligned, Layer::Aligned, tolerance)
            .unwrap();
        for larger in approximator.best_of_each_size(BrillouinZone::Aligned, Layer::Aligned) {
            if larger.size > chosen.size {
                assert!(larger.strain_error(Layer::Aligned) >= chosen.strain_error(Layer::Aligned) - tolerance);
            }
        }
    }

    #[test]
    fn commensurate_angle_prefers_the_moire_cell() {
        let approximator = expanded(COMMENSURATE_HEXAGONAL_ANGLE, 60);
        for layer in Layer::BOTH {
            let chosen = approximator
                .best_smallest(BrillouinZone::Aligned, layer, 1e-6)
                .unwrap();
            assert_eq!(chosen.size, 1);
            assert!(chosen.strain_error(layer) < 1e-5);
        }
    }

    #[test]
    fn expansion_reports_progress() {
        let phases = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::PhaseStart { name } = event {
                phases.lock().unwrap().push(name);
            }
        }));
        let config = TwistConfigBuilder::new().max_lattice_sites(30).build().unwrap();
        MoireApproximator::new(&hexagonal(), 22.0, &config, &reporter).unwrap();
        drop(reporter);
        assert_eq!(
            phases.into_inner().unwrap(),
            vec!["Supercell Expansion", "Supercell Expansion"]
        );
    }
}
