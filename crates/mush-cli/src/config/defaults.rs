use crate::cli::ZoneArg;
use multishifter::workflows::twist::SupercellSelection;

/// Fallbacks for job settings that neither the command line nor the job file provide.
pub struct DefaultsConfig {
    pub stacks: i64,
    pub a_max: usize,
    pub b_max: usize,
    pub cleavage: Vec<f64>,
    pub zone: ZoneArg,
    pub supercells: SupercellSelection,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            stacks: 1,
            a_max: 1,
            b_max: 1,
            cleavage: vec![0.0],
            zone: ZoneArg::Both,
            supercells: SupercellSelection::Best,
        }
    }
}
