use crate::core::models::lattice::Lattice;
use crate::core::models::structure::Structure;
use crate::core::utils::integer::IntMatrix3;
use crate::engine::config::{BrillouinZone, Layer, TwistConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::tasks::approximant::DeformationReport;
use crate::engine::tasks::commensurate::{MoireApproximator, SupercellApproximant};
use crate::engine::tasks::slab;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, instrument};

/// Which supercell approximants to turn into structures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupercellSelection {
    /// The smallest supercell per layer that no larger one beats by more than the error tolerance.
    #[default]
    Best,
    /// The least strained supercell of every size.
    All,
}

impl fmt::Display for SupercellSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupercellSelection::Best => write!(f, "best"),
            SupercellSelection::All => write!(f, "all"),
        }
    }
}

/// One deformed layer of an approximant bilayer.
#[derive(Debug, Clone)]
pub struct TwistedLayer {
    pub layer: Layer,
    pub transformation: IntMatrix3,
    /// The slab re-expressed on the approximate lattice, keeping fractional coordinates.
    pub approximate_tiling_unit: Structure,
    /// The approximate tiling unit expanded to the approximate moiré cell.
    pub structure: Structure,
    pub deformation: DeformationReport,
}

#[derive(Debug, Clone)]
pub struct MoireStructureReport {
    pub zone: BrillouinZone,
    pub size: i64,
    pub supercell: IntMatrix3,
    pub approximate_moire_lattice: Lattice,
    pub layers: [TwistedLayer; 2],
    /// The rotated layer stacked on top of the aligned one.
    pub bilayer: Structure,
}

impl MoireStructureReport {
    pub fn layer(&self, layer: Layer) -> &TwistedLayer {
        &self.layers[layer.index()]
    }
}

/// Builds twisted bilayer structures from a slab and a twist angle.
///
/// The slab is placed onto the aligned and rotated lattices of the exact moiré construction
/// keeping its fractional coordinates. Each selected approximant then deforms both layers
/// onto their approximate lattices, expands them to the common moiré cell and stacks them.
#[derive(Debug, Clone)]
pub struct MoireStructureGenerator {
    slab: Structure,
    aligned_slab: Structure,
    rotated_slab: Structure,
    approximator: MoireApproximator,
    error_tolerance: f64,
}

impl MoireStructureGenerator {
    #[instrument(skip_all, name = "twist_workflow")]
    pub fn new(
        slab: &Structure,
        degrees: f64,
        config: &TwistConfig,
        reporter: &ProgressReporter,
    ) -> Result<Self, EngineError> {
        let approximator = MoireApproximator::new(slab.lattice(), degrees, config, reporter)?;
        let moire = approximator.moire();
        let aligned_slab = slab.with_lattice_keeping_fractional(*moire.aligned_lattice());
        let rotated_slab = slab.with_lattice_keeping_fractional(*moire.rotated_lattice());

        info!(degrees, sites = slab.len(), "Prepared twisted layers.");
        Ok(Self {
            slab: slab.clone(),
            aligned_slab,
            rotated_slab,
            approximator,
            error_tolerance: config.error_tolerance,
        })
    }

    pub fn slab(&self) -> &Structure {
        &self.slab
    }

    pub fn approximator(&self) -> &MoireApproximator {
        &self.approximator
    }

    /// The slab on the aligned (`Layer::Aligned`) or twisted (`Layer::Rotated`) lattice.
    pub fn layer_slab(&self, layer: Layer) -> &Structure {
        match layer {
            Layer::Aligned => &self.aligned_slab,
            Layer::Rotated => &self.rotated_slab,
        }
    }

    /// Structures for the approximants chosen by `selection` in `zone`, ordered by size.
    ///
    /// Selection runs per layer, and an approximant chosen for both layers is reported once.
    pub fn reports(
        &self,
        zone: BrillouinZone,
        selection: SupercellSelection,
    ) -> Result<Vec<MoireStructureReport>, EngineError> {
        let mut chosen: Vec<&SupercellApproximant> = Vec::new();
        for layer in Layer::BOTH {
            let candidates: Vec<&SupercellApproximant> = match selection {
                SupercellSelection::Best => self
                    .approximator
                    .best_smallest(zone, layer, self.error_tolerance)
                    .into_iter()
                    .collect(),
                SupercellSelection::All => self.approximator.best_of_each_size(zone, layer),
            };
            for candidate in candidates {
                let seen = chosen
                    .iter()
                    .any(|c| c.size == candidate.size && c.supercell == candidate.supercell);
                if !seen {
                    chosen.push(candidate);
                }
            }
        }
        chosen.sort_by_key(|c| c.size);

        chosen
            .into_iter()
            .map(|approximant| self.report(zone, approximant))
            .collect()
    }

    /// Deforms, expands and stacks both layers for one approximant.
    pub fn report(
        &self,
        zone: BrillouinZone,
        approximant: &SupercellApproximant,
    ) -> Result<MoireStructureReport, EngineError> {
        let approximation = &approximant.approximation;
        let make_layer = |layer: Layer| -> Result<TwistedLayer, EngineError> {
            let transformation = *approximation.transformation(layer);
            let approximate_tiling_unit = self
                .layer_slab(layer)
                .with_lattice_keeping_fractional(*approximation.approximate_lattice(layer));
            let structure = approximate_tiling_unit.superstructure(&transformation)?;
            Ok(TwistedLayer {
                layer,
                transformation,
                approximate_tiling_unit,
                structure,
                deformation: approximation.deformation(layer).clone(),
            })
        };
        let layers = [make_layer(Layer::Aligned)?, make_layer(Layer::Rotated)?];
        let bilayer = slab::make_stacked_layers(&[layers[0].structure.clone(), layers[1].structure.clone()])?;

        info!(
            %zone,
            size = approximant.size,
            sites = bilayer.len(),
            "Built moiré bilayer."
        );
        Ok(MoireStructureReport {
            zone,
            size: approximant.size,
            supercell: approximant.supercell,
            approximate_moire_lattice: approximation.approximate_moire_lattice,
            layers,
            bilayer,
        })
    }
}
