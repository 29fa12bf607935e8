use crate::core::models::lattice::{Lattice, LatticeError};
use crate::core::models::structure::Structure;
use crate::core::utils::tolerance::DEFAULT_TOLERANCE;
use crate::core::utils::voronoi;
use crate::engine::error::EngineError;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use tracing::{debug, instrument};

/// One point of a uniform `a_max x b_max` grid over the ab-plane.
///
/// Two records are equal when their integer indices are; the fractional coordinates are
/// derived from the indices and the grid density.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShiftRecord {
    pub a_index: usize,
    pub b_index: usize,
    pub a_frac: f64,
    pub b_frac: f64,
}

impl ShiftRecord {
    pub fn new(a_index: usize, b_index: usize, a_max: usize, b_max: usize) -> Self {
        Self {
            a_index,
            b_index,
            a_frac: a_index as f64 / a_max as f64,
            b_frac: b_index as f64 / b_max as f64,
        }
    }
}

impl PartialEq for ShiftRecord {
    fn eq(&self, other: &Self) -> bool {
        self.a_index == other.a_index && self.b_index == other.b_index
    }
}

impl Eq for ShiftRecord {}

impl Hash for ShiftRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.a_index.hash(state);
        self.b_index.hash(state);
    }
}

fn shift_grid(
    lattice: &Lattice,
    a_max: usize,
    b_max: usize,
) -> Result<(Vec<Vector3<f64>>, Vec<ShiftRecord>), EngineError> {
    if a_max == 0 || b_max == 0 {
        return Err(EngineError::InvalidGridDensity { a_max, b_max });
    }
    let (a, b) = (lattice.a(), lattice.b());
    let records: Vec<ShiftRecord> = (0..a_max)
        .flat_map(|i| (0..b_max).map(move |j| ShiftRecord::new(i, j, a_max, b_max)))
        .collect();
    let vectors = records
        .iter()
        .map(|r| a * r.a_frac + b * r.b_frac)
        .collect();
    Ok((vectors, records))
}

/// Cartesian translations `i/a_max * a + j/b_max * b` over the grid, `a` index outermost.
#[instrument(skip_all, name = "shift_grid_task")]
pub fn uniform_in_plane_shift_vectors(
    lattice: &Lattice,
    a_max: usize,
    b_max: usize,
) -> Result<(Vec<Vector3<f64>>, Vec<ShiftRecord>), EngineError> {
    let grid = shift_grid(lattice, a_max, b_max)?;
    debug!(a_max, b_max, points = grid.0.len(), "Generated direct shift grid.");
    Ok(grid)
}

/// The same grid as [`uniform_in_plane_shift_vectors`], with every translation folded into
/// the Wigner–Seitz cell of the ab-sublattice.
#[instrument(skip_all, name = "wigner_seitz_shift_grid_task")]
pub fn uniform_in_plane_wigner_seitz_shift_vectors(
    lattice: &Lattice,
    a_max: usize,
    b_max: usize,
) -> Result<(Vec<Vector3<f64>>, Vec<ShiftRecord>), EngineError> {
    let (vectors, records) = shift_grid(lattice, a_max, b_max)?;
    let plane = [lattice.a(), lattice.b()];
    let folded: Vec<Vector3<f64>> = vectors
        .iter()
        .map(|v| voronoi::bring_within_voronoi(v, &plane, DEFAULT_TOLERANCE))
        .collect();
    let moved = vectors
        .iter()
        .zip(&folded)
        .filter(|(v, f)| (*v - *f).norm() > DEFAULT_TOLERANCE)
        .count();
    debug!(a_max, b_max, folded = moved, "Generated Wigner-Seitz shift grid.");
    Ok((folded, records))
}

/// Slabs whose periodic image above is displaced by each shift: `c` becomes `c + shift`
/// while every site keeps its Cartesian position.
pub fn make_shifted_structures(
    slab: &Structure,
    shifts: &[Vector3<f64>],
) -> Result<Vec<Structure>, EngineError> {
    let lattice = slab.lattice();
    if !lattice.is_right_handed() {
        return Err(LatticeError::LeftHanded.into());
    }
    shifts
        .iter()
        .map(|shift| {
            let shifted = Lattice::from_vectors(&lattice.a(), &lattice.b(), &(lattice.c() + shift))?;
            Ok(slab.with_lattice_keeping_cartesian(shifted))
        })
        .collect()
}
