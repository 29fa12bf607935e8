use multishifter::core::models::structure::Structure;
use multishifter::engine::config::{BrillouinZone, MatchConfig, ShiftConfig, SliceConfig, TwistConfig};
use multishifter::workflows::twist::SupercellSelection;
use nalgebra::Vector3;
use std::path::PathBuf;

pub struct SliceJob {
    pub structure: Structure,
    pub miller: Vector3<i64>,
    pub config: SliceConfig,
    pub output: Option<PathBuf>,
}

pub struct StackJob {
    pub structure: Structure,
    pub stacks: i64,
    pub output: Option<PathBuf>,
}

pub struct ShiftJob {
    pub structure: Structure,
    pub config: ShiftConfig,
    pub match_config: MatchConfig,
    pub output: Option<PathBuf>,
}

pub struct TwistJob {
    pub structure: Structure,
    pub degrees: f64,
    pub zones: Vec<BrillouinZone>,
    pub selection: SupercellSelection,
    pub config: TwistConfig,
    pub output: Option<PathBuf>,
}
