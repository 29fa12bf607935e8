use thiserror::Error;

use super::config::{ConfigError, Layer};
use crate::core::models::lattice::LatticeError;
use crate::core::models::structure::StructureError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Lattice error: {source}")]
    Lattice {
        #[from]
        source: LatticeError,
    },

    #[error("Structure error: {source}")]
    Structure {
        #[from]
        source: StructureError,
    },

    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Miller indices must not all be zero")]
    ZeroMillerIndices,

    #[error("Shift grid densities must be positive, got {a_max}x{b_max}")]
    InvalidGridDensity { a_max: usize, b_max: usize },

    #[error("At least one cleavage value is required")]
    EmptyCleavageValues,

    #[error("Cleavage {value} would collapse a slab whose interplanar spacing is {spacing}")]
    InvalidCleavage { value: f64, spacing: f64 },

    #[error("At least one layer is required for stacking")]
    EmptyStack,

    #[error("Layer {index} does not share the ab vectors of the first layer")]
    IncompatibleLayers { index: usize },

    #[error("Twist angle must be finite, got {0}")]
    InvalidAngle(f64),

    #[error(
        "No commensurate approximant for the {layer} layer: entries up to {required} needed, search is bounded by {max_entry}"
    )]
    NoApproximant {
        layer: Layer,
        max_entry: i64,
        required: i64,
    },

    #[error("Twisting by {degrees} degrees reproduces the lattice, so there is no finite moiré cell")]
    DegenerateMoire { degrees: f64 },

    #[error("Internal invariant broken in {context}: {detail}")]
    InvariantViolation {
        context: &'static str,
        detail: String,
    },
}

impl EngineError {
    pub(crate) fn invariant(context: &'static str, detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            context,
            detail: detail.into(),
        }
    }

    /// Whether the operation failed because its bounded search found nothing acceptable.
    pub fn is_no_solution(&self) -> bool {
        matches!(self, Self::NoApproximant { .. } | Self::DegenerateMoire { .. })
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}
