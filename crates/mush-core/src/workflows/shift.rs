use crate::core::matching::StructureMatcher;
use crate::core::models::structure::Structure;
use crate::engine::config::ShiftConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks::equivalence::{self, EquivalenceMap};
use crate::engine::tasks::shifting::{self, ShiftRecord};
use crate::engine::tasks::slab;
use nalgebra::Vector3;
use tracing::{info, instrument};

/// A slab shifted over a uniform in-plane grid, with every shift classified by equivalence.
///
/// The grid is generated twice, once directly and once folded into the Wigner–Seitz cell.
/// Both must agree on the records and on the equivalence classes, otherwise construction
/// fails with an invariant violation.
#[derive(Debug, Clone)]
pub struct Shifter {
    slab: Structure,
    a_max: usize,
    b_max: usize,
    cleavage_values: Vec<f64>,
    records: Vec<ShiftRecord>,
    shifts: Vec<Vector3<f64>>,
    wigner_seitz_shifts: Vec<Vector3<f64>>,
    shifted_structures: Vec<Structure>,
    wigner_seitz_shifted_structures: Vec<Structure>,
    cleaved_structures: Vec<Vec<Structure>>,
    equivalence_map: EquivalenceMap,
}

impl Shifter {
    #[instrument(skip_all, name = "shift_workflow")]
    pub fn new(
        slab: &Structure,
        config: &ShiftConfig,
        matcher: &StructureMatcher,
        reporter: &ProgressReporter,
    ) -> Result<Self, EngineError> {
        let (a_max, b_max) = (config.a_max, config.b_max);

        // === Phase 1: Shift grids ===
        reporter.report(Progress::PhaseStart { name: "Shift Grid" });
        let (shifts, records) = shifting::uniform_in_plane_shift_vectors(slab.lattice(), a_max, b_max)?;
        let (wigner_seitz_shifts, wigner_seitz_records) =
            shifting::uniform_in_plane_wigner_seitz_shift_vectors(slab.lattice(), a_max, b_max)?;
        if records != wigner_seitz_records {
            return Err(EngineError::invariant(
                "shift grid",
                "direct and Wigner-Seitz grids enumerate different records",
            ));
        }

        let shifted_structures = shifting::make_shifted_structures(slab, &shifts)?;
        let wigner_seitz_shifted_structures = shifting::make_shifted_structures(slab, &wigner_seitz_shifts)?;
        let cleaved_structures = shifted_structures
            .iter()
            .map(|shifted| slab::make_cleaved_structures(shifted, &config.cleavage_values))
            .collect::<Result<Vec<_>, _>>()?;
        reporter.report(Progress::PhaseFinish);

        // === Phase 2: Equivalence classification ===
        reporter.report(Progress::PhaseStart {
            name: "Equivalence Classification",
        });
        reporter.report(Progress::TaskStart { total_steps: 2 });
        let equivalence_map = equivalence::categorize_equivalently_shifted_structures(&shifted_structures, matcher);
        reporter.report(Progress::TaskIncrement);
        let wigner_seitz_map =
            equivalence::categorize_equivalently_shifted_structures(&wigner_seitz_shifted_structures, matcher);
        reporter.report(Progress::TaskIncrement);
        reporter.report(Progress::TaskFinish);

        if equivalence_map != wigner_seitz_map {
            return Err(EngineError::invariant(
                "shift equivalence",
                format!(
                    "direct grid has {} classes but Wigner-Seitz grid has {}",
                    equivalence_map.num_classes(),
                    wigner_seitz_map.num_classes()
                ),
            ));
        }
        reporter.report(Progress::PhaseFinish);

        info!(
            a_max,
            b_max,
            shifts = records.len(),
            classes = equivalence_map.num_classes(),
            cleavage_values = config.cleavage_values.len(),
            "Shifted slab over grid."
        );

        Ok(Self {
            slab: slab.clone(),
            a_max,
            b_max,
            cleavage_values: config.cleavage_values.clone(),
            records,
            shifts,
            wigner_seitz_shifts,
            shifted_structures,
            wigner_seitz_shifted_structures,
            cleaved_structures,
            equivalence_map,
        })
    }

    pub fn slab(&self) -> &Structure {
        &self.slab
    }

    /// Grid densities along a and b.
    pub fn grid_dims(&self) -> (usize, usize) {
        (self.a_max, self.b_max)
    }

    pub fn cleavage_values(&self) -> &[f64] {
        &self.cleavage_values
    }

    pub fn records(&self) -> &[ShiftRecord] {
        &self.records
    }

    pub fn shifts(&self) -> &[Vector3<f64>] {
        &self.shifts
    }

    pub fn wigner_seitz_shifts(&self) -> &[Vector3<f64>] {
        &self.wigner_seitz_shifts
    }

    pub fn shifted_structures(&self) -> &[Structure] {
        &self.shifted_structures
    }

    pub fn wigner_seitz_shifted_structures(&self) -> &[Structure] {
        &self.wigner_seitz_shifted_structures
    }

    /// Cleaved variants of each shifted structure, indexed `[shift][cleavage]`.
    pub fn cleaved_structures(&self) -> &[Vec<Structure>] {
        &self.cleaved_structures
    }

    pub fn equivalence_map(&self) -> &EquivalenceMap {
        &self.equivalence_map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::lattice::Lattice;
    use crate::core::models::structure::Site;
    use crate::engine::config::ShiftConfigBuilder;
    use nalgebra::{Matrix3, Point3};

    const TOLERANCE: f64 = 1e-9;

    fn square_slab() -> Structure {
        let lattice = Lattice::from_column_matrix(Matrix3::from_diagonal(&Vector3::new(2.0, 2.0, 9.0))).unwrap();
        Structure::new(lattice, vec![Site::new("Cu", Point3::origin())])
    }

    fn four_mm() -> Vec<Matrix3<f64>> {
        let mut operations = Vec::new();
        for (x, y) in [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)] {
            let rotation = Matrix3::new(x, -y, 0.0, y, x, 0.0, 0.0, 0.0, 1.0);
            let mirror = Matrix3::new(1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 1.0);
            operations.push(rotation);
            operations.push(rotation * mirror);
        }
        operations
    }

    fn shifter(a_max: usize, b_max: usize, cleavage_values: Vec<f64>) -> Shifter {
        let config = ShiftConfigBuilder::new()
            .a_max(a_max)
            .b_max(b_max)
            .cleavage_values(cleavage_values)
            .build()
            .unwrap();
        let matcher = StructureMatcher::default().with_point_operations(four_mm());
        Shifter::new(&square_slab(), &config, &matcher, &ProgressReporter::new()).unwrap()
    }

    #[test]
    fn square_slab_with_four_mm_has_six_shift_classes() {
        let shifter = shifter(4, 4, vec![0.0]);
        let map = shifter.equivalence_map();
        assert_eq!(map.len(), 16);
        assert_eq!(map.num_classes(), 6);

        let index = |i: usize, j: usize| i * 4 + j;
        assert!(map.are_equivalent(index(0, 1), index(1, 0)));
        assert!(map.are_equivalent(index(1, 1), index(3, 3)));
        assert!(map.are_equivalent(index(1, 2), index(3, 2)));
        assert!(!map.are_equivalent(index(0, 0), index(2, 2)));
        assert!(!map.are_equivalent(index(0, 2), index(1, 1)));
    }

    #[test]
    fn identity_only_matching_keeps_every_shift_distinct() {
        let config = ShiftConfigBuilder::new().a_max(3).b_max(3).build().unwrap();
        let shifter = Shifter::new(
            &square_slab(),
            &config,
            &StructureMatcher::default(),
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(shifter.equivalence_map().num_classes(), 9);
    }

    #[test]
    fn grid_is_row_major_with_matching_structures() {
        let shifter = shifter(3, 2, vec![0.0]);
        assert_eq!(shifter.grid_dims(), (3, 2));
        let indices: Vec<(usize, usize)> = shifter.records().iter().map(|r| (r.a_index, r.b_index)).collect();
        assert_eq!(indices, vec![(0, 0), (0, 1), (1, 0), (1, 1), (2, 0), (2, 1)]);
        assert_eq!(shifter.shifted_structures().len(), 6);
        assert_eq!(shifter.wigner_seitz_shifted_structures().len(), 6);

        let slab_c = shifter.slab().lattice().c();
        for (structure, shift) in shifter.shifted_structures().iter().zip(shifter.shifts()) {
            assert!(((structure.lattice().c() - slab_c) - shift).norm() < TOLERANCE);
        }
    }

    #[test]
    fn cleaved_variants_follow_the_cleavage_values() {
        let shifter = shifter(2, 2, vec![-0.5, 0.0, 1.0]);
        assert_eq!(shifter.cleavage_values(), &[-0.5, 0.0, 1.0]);
        assert_eq!(shifter.cleaved_structures().len(), 4);
        for (variants, shifted) in shifter.cleaved_structures().iter().zip(shifter.shifted_structures()) {
            assert_eq!(variants.len(), 3);
            assert!((variants[1].lattice().c() - shifted.lattice().c()).norm() < TOLERANCE);
            assert!((variants[2].lattice().c()[2] - shifted.lattice().c()[2] - 1.0).abs() < TOLERANCE);
        }
    }

    #[test]
    fn workflow_reports_both_phases() {
        let names = std::sync::Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::PhaseStart { name } = event {
                names.lock().unwrap().push(name);
            }
        }));
        let config = ShiftConfigBuilder::new().a_max(2).b_max(2).build().unwrap();
        Shifter::new(&square_slab(), &config, &StructureMatcher::default(), &reporter).unwrap();
        drop(reporter);
        assert_eq!(
            names.into_inner().unwrap(),
            vec!["Shift Grid", "Equivalence Classification"]
        );
    }
}
