use crate::cli::ZoneArg;
use crate::error::{CliError, Result};
use multishifter::workflows::twist::SupercellSelection;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Lattice vectors in Å, one row per vector.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileLatticeConfig {
    pub a: [f64; 3],
    pub b: [f64; 3],
    pub c: [f64; 3],
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileSiteConfig {
    pub label: String,
    pub cartesian: [f64; 3],
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSliceConfig {
    pub miller: Option<[i64; 3]>,
    pub max_unimodular_entry: Option<i64>,
    pub max_reduction_rounds: Option<usize>,
    pub normal_tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileStackConfig {
    pub stacks: Option<i64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileShiftConfig {
    pub a_max: Option<usize>,
    pub b_max: Option<usize>,
    pub cleavage: Option<Vec<f64>>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileTwistConfig {
    pub angle: Option<f64>,
    pub zone: Option<ZoneArg>,
    pub max_transformation_entry: Option<i64>,
    pub candidate_radius: Option<i64>,
    pub commensurability_tolerance: Option<f64>,
    pub max_lattice_sites: Option<usize>,
    pub error_tolerance: Option<f64>,
    pub supercells: Option<SupercellSelection>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileMatchConfig {
    pub site_tolerance: Option<f64>,
    /// Cartesian point operations as row-major 3x3 matrices.
    pub point_operations: Option<Vec<[[f64; 3]; 3]>>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub lattice: Option<FileLatticeConfig>,
    #[serde(default)]
    pub sites: Vec<FileSiteConfig>,
    pub slice: Option<FileSliceConfig>,
    pub stack: Option<FileStackConfig>,
    pub shift: Option<FileShiftConfig>,
    pub twist: Option<FileTwistConfig>,
    #[serde(rename = "match")]
    pub matching: Option<FileMatchConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading job file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
