use crate::error::Result;
use multishifter::core::models::lattice::Lattice;
use multishifter::core::models::structure::Structure;
use multishifter::engine::config::{BrillouinZone, Layer};
use multishifter::engine::tasks::approximant::DeformationReport;
use multishifter::engine::tasks::commensurate::MoireApproximator;
use multishifter::workflows::shift::Shifter;
use multishifter::workflows::slice::Slicer;
use multishifter::workflows::twist::{MoireStructureReport, SupercellSelection, TwistedLayer};
use nalgebra::{Matrix3, Scalar, Vector3};
use serde::Serialize;
use std::path::Path;
use tracing::info;

fn rows<T: Scalar + Copy>(matrix: &Matrix3<T>) -> [[T; 3]; 3] {
    [0, 1, 2].map(|i| [0, 1, 2].map(|j| matrix[(i, j)]))
}

fn array(vector: &Vector3<f64>) -> [f64; 3] {
    [vector.x, vector.y, vector.z]
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct LatticeReport {
    pub volume: f64,
    pub a: [f64; 3],
    pub b: [f64; 3],
    pub c: [f64; 3],
}

impl From<&Lattice> for LatticeReport {
    fn from(lattice: &Lattice) -> Self {
        Self {
            volume: lattice.volume(),
            a: array(&lattice.a()),
            b: array(&lattice.b()),
            c: array(&lattice.c()),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct SiteReport {
    pub label: String,
    pub cartesian: [f64; 3],
    pub fractional: [f64; 3],
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct StructureReport {
    pub lattice: LatticeReport,
    pub sites: Vec<SiteReport>,
}

impl From<&Structure> for StructureReport {
    fn from(structure: &Structure) -> Self {
        let sites = structure
            .sites()
            .iter()
            .zip(structure.fractional_coordinates())
            .map(|(site, fractional)| SiteReport {
                label: site.label.clone(),
                cartesian: array(&site.position.coords),
                fractional: array(&fractional),
            })
            .collect();
        Self {
            lattice: structure.lattice().into(),
            sites,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct SliceReport {
    pub miller: [i64; 3],
    pub floored_structures: usize,
    pub primitive_lattice: LatticeReport,
    pub sliced_lattice: LatticeReport,
    pub sliced_structure: StructureReport,
}

impl From<&Slicer> for SliceReport {
    fn from(slicer: &Slicer) -> Self {
        let miller = slicer.miller();
        Self {
            miller: [miller.x, miller.y, miller.z],
            floored_structures: slicer.floored_structures().len(),
            primitive_lattice: slicer.primitive().lattice().into(),
            sliced_lattice: slicer.sliced_lattice().into(),
            sliced_structure: slicer.sliced_structure().into(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct StackReport {
    pub stacks: i64,
    pub structure: StructureReport,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ShiftEntry {
    pub index: usize,
    pub a_index: usize,
    pub b_index: usize,
    pub class: usize,
    pub shift: [f64; 3],
    pub wigner_seitz_shift: [f64; 3],
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ShiftReport {
    pub a_max: usize,
    pub b_max: usize,
    pub num_classes: usize,
    pub cleavage_values: Vec<f64>,
    /// Grid indices of each equivalence class.
    pub classes: Vec<Vec<usize>>,
    pub slab_lattice: LatticeReport,
    pub shifts: Vec<ShiftEntry>,
}

impl From<&Shifter> for ShiftReport {
    fn from(shifter: &Shifter) -> Self {
        let (a_max, b_max) = shifter.grid_dims();
        let map = shifter.equivalence_map();
        let shifts = shifter
            .records()
            .iter()
            .zip(shifter.shifts().iter().zip(shifter.wigner_seitz_shifts()))
            .enumerate()
            .map(|(index, (record, (shift, wigner_seitz_shift)))| ShiftEntry {
                index,
                a_index: record.a_index,
                b_index: record.b_index,
                class: map.class_index(index),
                shift: array(shift),
                wigner_seitz_shift: array(wigner_seitz_shift),
            })
            .collect();
        Self {
            a_max,
            b_max,
            num_classes: map.num_classes(),
            cleavage_values: shifter.cleavage_values().to_vec(),
            classes: map.classes().to_vec(),
            slab_lattice: shifter.slab().lattice().into(),
            shifts,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct DeformationEntry {
    pub strain_error: f64,
    pub rotation_angle: f64,
    pub dilation_strain: f64,
    pub deviatoric_strain: f64,
    pub strain_metrics: [f64; 3],
    pub deformation: [[f64; 3]; 3],
    pub strain: [[f64; 3]; 3],
}

impl From<&DeformationReport> for DeformationEntry {
    fn from(report: &DeformationReport) -> Self {
        Self {
            strain_error: report.strain_error(),
            rotation_angle: report.rotation_angle,
            dilation_strain: report.dilation_strain,
            deviatoric_strain: report.deviatoric_strain,
            strain_metrics: report.strain_metrics,
            deformation: rows(&report.deformation),
            strain: rows(&report.strain),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct LayerReport {
    pub layer: Layer,
    pub sites: usize,
    pub transformation: [[i64; 3]; 3],
    pub approximate_lattice: LatticeReport,
    pub deformation: DeformationEntry,
}

impl From<&TwistedLayer> for LayerReport {
    fn from(twisted: &TwistedLayer) -> Self {
        Self {
            layer: twisted.layer,
            sites: twisted.structure.len(),
            transformation: rows(&twisted.transformation),
            approximate_lattice: twisted.approximate_tiling_unit.lattice().into(),
            deformation: (&twisted.deformation).into(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ApproximantReport {
    pub size: i64,
    pub supercell: [[i64; 3]; 3],
    pub approximate_moire_lattice: LatticeReport,
    pub layers: Vec<LayerReport>,
    pub bilayer: StructureReport,
}

impl From<&MoireStructureReport> for ApproximantReport {
    fn from(report: &MoireStructureReport) -> Self {
        Self {
            size: report.size,
            supercell: rows::<i64>(&report.supercell),
            approximate_moire_lattice: (&report.approximate_moire_lattice).into(),
            layers: Layer::BOTH.iter().map(|&l| report.layer(l).into()).collect(),
            bilayer: (&report.bilayer).into(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ZoneReport {
    pub zone: BrillouinZone,
    /// Whether the folded moiré reciprocal vectors lie inside both zones.
    pub within_brillouin_zone_overlap: [bool; 2],
    pub moire_lattice: LatticeReport,
    pub approximants: Vec<ApproximantReport>,
}

impl ZoneReport {
    pub fn new(approximator: &MoireApproximator, zone: BrillouinZone, reports: &[MoireStructureReport]) -> Self {
        let moire = approximator.moire();
        Self {
            zone,
            within_brillouin_zone_overlap: moire.is_within_brillouin_zone_overlap(zone),
            moire_lattice: moire.moire(zone).into(),
            approximants: reports.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct TwistReport {
    pub degrees: f64,
    pub supercells: SupercellSelection,
    pub max_lattice_sites: usize,
    pub aligned_lattice: LatticeReport,
    pub rotated_lattice: LatticeReport,
    pub zones: Vec<ZoneReport>,
}

/// Serializes `report` as TOML into `output`, or prints it when no path is given.
pub fn write_report<T: Serialize>(report: &T, output: Option<&Path>) -> Result<()> {
    let text = toml::to_string_pretty(report)?;
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            info!("Report written to {:?}", path);
        }
        None => print!("{}", text),
    }
    Ok(())
}
