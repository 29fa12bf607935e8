use crate::core::models::lattice::Lattice;
use crate::core::models::structure::{Site, Structure};
use nalgebra::{Matrix3, Vector3};

pub const DEFAULT_SITE_TOLERANCE: f64 = 1e-5;

/// Decides whether two periodic structures are the same crystal.
///
/// Two structures match when, for one of the configured Cartesian point operations `R`, the
/// rotated lattice generates the same points as the reference lattice and some translation
/// carries every rotated site onto a site of the same label, up to lattice periodicity.
/// Only the identity is tried unless point operations are supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureMatcher {
    site_tolerance: f64,
    point_operations: Vec<Matrix3<f64>>,
}

impl Default for StructureMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_TOLERANCE)
    }
}

impl StructureMatcher {
    pub fn new(site_tolerance: f64) -> Self {
        Self {
            site_tolerance,
            point_operations: vec![Matrix3::identity()],
        }
    }

    pub fn with_point_operations(mut self, point_operations: Vec<Matrix3<f64>>) -> Self {
        if !point_operations.is_empty() {
            self.point_operations = point_operations;
        }
        self
    }

    pub fn site_tolerance(&self) -> f64 {
        self.site_tolerance
    }

    pub fn point_operations(&self) -> &[Matrix3<f64>] {
        &self.point_operations
    }

    pub fn is_equivalent(&self, reference: &Structure, other: &Structure) -> bool {
        if reference.len() != other.len() || !same_composition(reference.sites(), other.sites()) {
            return false;
        }
        self.point_operations
            .iter()
            .any(|op| self.matches_under_operation(reference, other, op))
    }

    fn matches_under_operation(
        &self,
        reference: &Structure,
        other: &Structure,
        operation: &Matrix3<f64>,
    ) -> bool {
        let lattice = reference.lattice();
        let Ok(rotated_lattice) = other.lattice().transformed(operation) else {
            return false;
        };
        if !lattice.is_equivalent(&rotated_lattice) {
            return false;
        }

        let rotated: Vec<(&str, Vector3<f64>)> = other
            .sites()
            .iter()
            .map(|s| (s.label.as_str(), operation * s.position.coords))
            .collect();

        let Some(anchor) = reference.sites().first() else {
            return true;
        };

        rotated
            .iter()
            .filter(|(label, _)| *label == anchor.label)
            .any(|(_, position)| {
                let translation = anchor.position.coords - position;
                rotated.iter().all(|(label, p)| {
                    self.has_periodic_image(lattice, reference.sites(), label, &(p + translation))
                })
            })
    }

    fn has_periodic_image(
        &self,
        lattice: &Lattice,
        sites: &[Site],
        label: &str,
        position: &Vector3<f64>,
    ) -> bool {
        sites.iter().filter(|s| s.label == label).any(|s| {
            let difference = lattice.bring_within_wigner_seitz(&(position - s.position.coords));
            difference.norm() <= self.site_tolerance
        })
    }
}

fn same_composition(lhs: &[Site], rhs: &[Site]) -> bool {
    let mut lhs: Vec<&str> = lhs.iter().map(|s| s.label.as_str()).collect();
    let mut rhs: Vec<&str> = rhs.iter().map(|s| s.label.as_str()).collect();
    lhs.sort_unstable();
    rhs.sort_unstable();
    lhs == rhs
}
