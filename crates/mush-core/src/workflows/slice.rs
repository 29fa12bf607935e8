use crate::core::models::lattice::Lattice;
use crate::core::models::structure::Structure;
use crate::engine::config::SliceConfig;
use crate::engine::error::EngineError;
use crate::engine::tasks::{slab, slicing};
use nalgebra::Vector3;
use tracing::{info, instrument};

/// A primitive structure sliced along a Miller plane.
#[derive(Debug, Clone)]
pub struct Slicer {
    primitive: Structure,
    miller: Vector3<i64>,
    sliced_lattice: Lattice,
    sliced_structure: Structure,
    floored_structures: Vec<Structure>,
}

impl Slicer {
    #[instrument(skip_all, name = "slice_workflow")]
    pub fn new(primitive: &Structure, miller: &Vector3<i64>, config: &SliceConfig) -> Result<Self, EngineError> {
        let sliced_lattice = slicing::make_sliced_lattice(primitive.lattice(), miller, config)?;
        let sliced_structure = primitive
            .with_lattice_keeping_cartesian(sliced_lattice)
            .within();
        let floored_structures = slab::make_floored_structures(&sliced_structure)?;

        info!(
            miller = ?miller,
            sites = sliced_structure.len(),
            "Sliced primitive structure."
        );
        Ok(Self {
            primitive: primitive.clone(),
            miller: *miller,
            sliced_lattice,
            sliced_structure,
            floored_structures,
        })
    }

    pub fn primitive(&self) -> &Structure {
        &self.primitive
    }

    pub fn miller(&self) -> &Vector3<i64> {
        &self.miller
    }

    pub fn sliced_lattice(&self) -> &Lattice {
        &self.sliced_lattice
    }

    /// The primitive sites re-expressed in the sliced cell and folded into it.
    pub fn sliced_structure(&self) -> &Structure {
        &self.sliced_structure
    }

    /// One variant of the sliced structure per site, with that site moved to the origin.
    pub fn floored_structures(&self) -> &[Structure] {
        &self.floored_structures
    }
}
