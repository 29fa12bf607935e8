use crate::core::matching::{DEFAULT_SITE_TOLERANCE, StructureMatcher};
use crate::core::utils::tolerance::DEFAULT_TOLERANCE;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// One of the two layers of a twisted bilayer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// The unrotated layer, in the aligned frame.
    Aligned,
    /// The layer rotated by the twist angle about the plane normal.
    Rotated,
}

impl Layer {
    pub const BOTH: [Layer; 2] = [Layer::Aligned, Layer::Rotated];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Layer::Aligned => 0,
            Layer::Rotated => 1,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Aligned => write!(f, "aligned"),
            Layer::Rotated => write!(f, "rotated"),
        }
    }
}

/// The first Brillouin zone that moiré reciprocal vectors are folded into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrillouinZone {
    #[default]
    Aligned,
    Rotated,
}

impl BrillouinZone {
    pub const BOTH: [BrillouinZone; 2] = [BrillouinZone::Aligned, BrillouinZone::Rotated];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            BrillouinZone::Aligned => 0,
            BrillouinZone::Rotated => 1,
        }
    }

    /// The layer whose reciprocal lattice defines this zone.
    #[inline]
    pub fn layer(self) -> Layer {
        match self {
            BrillouinZone::Aligned => Layer::Aligned,
            BrillouinZone::Rotated => Layer::Rotated,
        }
    }
}

impl fmt::Display for BrillouinZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrillouinZone::Aligned => write!(f, "aligned"),
            BrillouinZone::Rotated => write!(f, "rotated"),
        }
    }
}

pub const DEFAULT_MAX_UNIMODULAR_ENTRY: i64 = 1;
pub const DEFAULT_MAX_REDUCTION_ROUNDS: usize = 32;
pub const DEFAULT_MAX_TRANSFORMATION_ENTRY: i64 = 4096;
pub const DEFAULT_CANDIDATE_RADIUS: i64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct SliceConfig {
    /// Entries of candidate unimodular matrices range over `[-max_unimodular_entry, max_unimodular_entry]`.
    pub max_unimodular_entry: i64,
    /// Upper bound on greedy improvement rounds.
    pub max_reduction_rounds: usize,
    /// Tolerance for the check that the plane normal survived the basis improvement.
    pub normal_tolerance: f64,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            max_unimodular_entry: DEFAULT_MAX_UNIMODULAR_ENTRY,
            max_reduction_rounds: DEFAULT_MAX_REDUCTION_ROUNDS,
            normal_tolerance: DEFAULT_TOLERANCE,
        }
    }
}

#[derive(Default)]
pub struct SliceConfigBuilder {
    max_unimodular_entry: Option<i64>,
    max_reduction_rounds: Option<usize>,
    normal_tolerance: Option<f64>,
}

impl SliceConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_unimodular_entry(mut self, entry: i64) -> Self {
        self.max_unimodular_entry = Some(entry);
        self
    }

    pub fn max_reduction_rounds(mut self, rounds: usize) -> Self {
        self.max_reduction_rounds = Some(rounds);
        self
    }

    pub fn normal_tolerance(mut self, tolerance: f64) -> Self {
        self.normal_tolerance = Some(tolerance);
        self
    }

    pub fn build(self) -> Result<SliceConfig, ConfigError> {
        let defaults = SliceConfig::default();
        let max_unimodular_entry = self
            .max_unimodular_entry
            .unwrap_or(defaults.max_unimodular_entry);
        if max_unimodular_entry < 1 {
            return Err(ConfigError::InvalidParameter {
                name: "max_unimodular_entry",
                reason: format!("must be at least 1, got {}", max_unimodular_entry),
            });
        }
        let normal_tolerance = self.normal_tolerance.unwrap_or(defaults.normal_tolerance);
        check_tolerance("normal_tolerance", normal_tolerance)?;

        Ok(SliceConfig {
            max_unimodular_entry,
            max_reduction_rounds: self
                .max_reduction_rounds
                .unwrap_or(defaults.max_reduction_rounds),
            normal_tolerance,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShiftConfig {
    pub a_max: usize,
    pub b_max: usize,
    pub cleavage_values: Vec<f64>,
}

#[derive(Default)]
pub struct ShiftConfigBuilder {
    a_max: Option<usize>,
    b_max: Option<usize>,
    cleavage_values: Option<Vec<f64>>,
}

impl ShiftConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn a_max(mut self, a_max: usize) -> Self {
        self.a_max = Some(a_max);
        self
    }

    pub fn b_max(mut self, b_max: usize) -> Self {
        self.b_max = Some(b_max);
        self
    }

    pub fn cleavage_values(mut self, values: Vec<f64>) -> Self {
        self.cleavage_values = Some(values);
        self
    }

    pub fn build(self) -> Result<ShiftConfig, ConfigError> {
        let a_max = self.a_max.ok_or(ConfigError::MissingParameter("a_max"))?;
        let b_max = self.b_max.ok_or(ConfigError::MissingParameter("b_max"))?;
        for (name, value) in [("a_max", a_max), ("b_max", b_max)] {
            if value == 0 {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: "grid density must be positive".to_string(),
                });
            }
        }
        let cleavage_values = self.cleavage_values.unwrap_or_else(|| vec![0.0]);
        if cleavage_values.is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "cleavage_values",
                reason: "at least one value is required".to_string(),
            });
        }
        Ok(ShiftConfig {
            a_max,
            b_max,
            cleavage_values,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TwistConfig {
    pub zone: BrillouinZone,
    /// Integer transformations with larger entries are reported as "no approximant".
    pub max_transformation_entry: i64,
    /// Each in-plane entry of the rounded transformation is perturbed by up to this much.
    pub candidate_radius: i64,
    /// Tolerance for the ab-coincidence of the two approximant superlattices.
    pub commensurability_tolerance: f64,
    /// Upper bound on bilayer lattice sites for the supercell expansion; 0 disables it.
    pub max_lattice_sites: usize,
    /// Minimum strain improvement for a larger supercell to beat a smaller one.
    pub error_tolerance: f64,
}

impl Default for TwistConfig {
    fn default() -> Self {
        Self {
            zone: BrillouinZone::Aligned,
            max_transformation_entry: DEFAULT_MAX_TRANSFORMATION_ENTRY,
            candidate_radius: DEFAULT_CANDIDATE_RADIUS,
            commensurability_tolerance: DEFAULT_TOLERANCE,
            max_lattice_sites: 0,
            error_tolerance: DEFAULT_TOLERANCE,
        }
    }
}

#[derive(Default)]
pub struct TwistConfigBuilder {
    zone: Option<BrillouinZone>,
    max_transformation_entry: Option<i64>,
    candidate_radius: Option<i64>,
    commensurability_tolerance: Option<f64>,
    max_lattice_sites: Option<usize>,
    error_tolerance: Option<f64>,
}

impl TwistConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zone(mut self, zone: BrillouinZone) -> Self {
        self.zone = Some(zone);
        self
    }

    pub fn max_transformation_entry(mut self, entry: i64) -> Self {
        self.max_transformation_entry = Some(entry);
        self
    }

    pub fn candidate_radius(mut self, radius: i64) -> Self {
        self.candidate_radius = Some(radius);
        self
    }

    pub fn commensurability_tolerance(mut self, tolerance: f64) -> Self {
        self.commensurability_tolerance = Some(tolerance);
        self
    }

    pub fn max_lattice_sites(mut self, sites: usize) -> Self {
        self.max_lattice_sites = Some(sites);
        self
    }

    pub fn error_tolerance(mut self, tolerance: f64) -> Self {
        self.error_tolerance = Some(tolerance);
        self
    }

    pub fn build(self) -> Result<TwistConfig, ConfigError> {
        let defaults = TwistConfig::default();
        let max_transformation_entry = self
            .max_transformation_entry
            .unwrap_or(defaults.max_transformation_entry);
        if max_transformation_entry < 1 {
            return Err(ConfigError::InvalidParameter {
                name: "max_transformation_entry",
                reason: format!("must be at least 1, got {}", max_transformation_entry),
            });
        }
        let candidate_radius = self.candidate_radius.unwrap_or(defaults.candidate_radius);
        if candidate_radius < 0 {
            return Err(ConfigError::InvalidParameter {
                name: "candidate_radius",
                reason: format!("must not be negative, got {}", candidate_radius),
            });
        }
        let commensurability_tolerance = self
            .commensurability_tolerance
            .unwrap_or(defaults.commensurability_tolerance);
        check_tolerance("commensurability_tolerance", commensurability_tolerance)?;
        let error_tolerance = self.error_tolerance.unwrap_or(defaults.error_tolerance);
        check_tolerance("error_tolerance", error_tolerance)?;

        Ok(TwistConfig {
            zone: self.zone.unwrap_or(defaults.zone),
            max_transformation_entry,
            candidate_radius,
            commensurability_tolerance,
            max_lattice_sites: self.max_lattice_sites.unwrap_or(defaults.max_lattice_sites),
            error_tolerance,
        })
    }
}

/// Settings for comparing shifted structures.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    pub site_tolerance: f64,
    /// Cartesian point operations tried on top of translations; empty means identity only.
    pub point_operations: Vec<Matrix3<f64>>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            site_tolerance: DEFAULT_SITE_TOLERANCE,
            point_operations: Vec::new(),
        }
    }
}

impl MatchConfig {
    pub fn matcher(&self) -> StructureMatcher {
        StructureMatcher::new(self.site_tolerance).with_point_operations(self.point_operations.clone())
    }
}

fn check_tolerance(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("tolerance must be a non-negative number, got {}", value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_builder_falls_back_to_defaults() {
        let config = SliceConfigBuilder::new().build().unwrap();
        assert_eq!(config, SliceConfig::default());
    }

    #[test]
    fn slice_builder_rejects_empty_candidate_range() {
        let result = SliceConfigBuilder::new().max_unimodular_entry(0).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter { name: "max_unimodular_entry", .. })
        ));
    }

    #[test]
    fn shift_builder_requires_grid_densities() {
        let result = ShiftConfigBuilder::new().a_max(4).build();
        assert_eq!(result, Err(ConfigError::MissingParameter("b_max")));
    }

    #[test]
    fn shift_builder_rejects_zero_density() {
        let result = ShiftConfigBuilder::new().a_max(0).b_max(3).build();
        assert!(matches!(result, Err(ConfigError::InvalidParameter { name: "a_max", .. })));
    }

    #[test]
    fn shift_builder_defaults_to_no_cleavage() {
        let config = ShiftConfigBuilder::new().a_max(3).b_max(5).build().unwrap();
        assert_eq!(config.cleavage_values, vec![0.0]);
    }

    #[test]
    fn twist_builder_applies_overrides() {
        let config = TwistConfigBuilder::new()
            .zone(BrillouinZone::Rotated)
            .candidate_radius(2)
            .max_lattice_sites(500)
            .build()
            .unwrap();
        assert_eq!(config.zone, BrillouinZone::Rotated);
        assert_eq!(config.candidate_radius, 2);
        assert_eq!(config.max_lattice_sites, 500);
        assert_eq!(config.max_transformation_entry, DEFAULT_MAX_TRANSFORMATION_ENTRY);
    }

    #[test]
    fn twist_builder_rejects_negative_tolerance() {
        let result = TwistConfigBuilder::new().error_tolerance(-1.0).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter { name: "error_tolerance", .. })
        ));
    }

    #[test]
    fn layer_indices_are_stable() {
        assert_eq!(Layer::Aligned.index(), 0);
        assert_eq!(Layer::Rotated.index(), 1);
        assert_eq!(Layer::Rotated.to_string(), "rotated");
    }

    #[test]
    fn default_match_config_uses_identity_only() {
        let matcher = MatchConfig::default().matcher();
        assert_eq!(matcher.point_operations().to_vec(), vec![Matrix3::<f64>::identity()]);
    }
}
