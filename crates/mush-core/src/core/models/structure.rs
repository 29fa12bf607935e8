use super::lattice::{Lattice, LatticeError};
use crate::core::superlattice;
use crate::core::utils::integer::{self, IntMatrix3};
use crate::core::utils::tolerance::DEFAULT_TOLERANCE;
use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StructureError {
    #[error("Lattice error: {0}")]
    Lattice(#[from] LatticeError),

    #[error("Superstructure should contain {expected} unit translations but {found} were found")]
    TranslationCountMismatch { expected: usize, found: usize },

    #[error("Site index {index} is out of range for a structure with {len} sites")]
    SiteIndexOutOfRange { index: usize, len: usize },
}

/// A labelled basis site at a Cartesian position.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub label: String,
    pub position: Point3<f64>,
}

impl Site {
    pub fn new(label: impl Into<String>, position: Point3<f64>) -> Self {
        Self {
            label: label.into(),
            position,
        }
    }
}

/// A periodic structure: a lattice plus a basis of labelled sites.
///
/// Site positions are Cartesian. Operations that change the lattice state explicitly whether
/// the Cartesian or the fractional coordinates are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    lattice: Lattice,
    sites: Vec<Site>,
}

impl Structure {
    pub fn new(lattice: Lattice, sites: Vec<Site>) -> Self {
        Self { lattice, sites }
    }

    #[inline]
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    #[inline]
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn fractional_coordinates(&self) -> Vec<Vector3<f64>> {
        self.sites
            .iter()
            .map(|s| self.lattice.fractional(&s.position.coords))
            .collect()
    }

    /// Replaces the lattice while leaving every site at its Cartesian position.
    pub fn with_lattice_keeping_cartesian(&self, lattice: Lattice) -> Structure {
        Structure::new(lattice, self.sites.clone())
    }

    /// Replaces the lattice and moves every site so its fractional coordinates are unchanged.
    pub fn with_lattice_keeping_fractional(&self, lattice: Lattice) -> Structure {
        let sites = self
            .sites
            .iter()
            .map(|s| {
                let fractional = self.lattice.fractional(&s.position.coords);
                Site::new(s.label.clone(), Point3::from(lattice.cartesian(&fractional)))
            })
            .collect();
        Structure::new(lattice, sites)
    }

    /// Translates every basis site by `shift`, leaving the lattice alone.
    pub fn translated(&self, shift: &Vector3<f64>) -> Structure {
        let sites = self
            .sites
            .iter()
            .map(|s| Site::new(s.label.clone(), s.position + shift))
            .collect();
        Structure::new(self.lattice, sites)
    }

    /// Folds every site into the unit cell.
    pub fn within(&self) -> Structure {
        let sites = self
            .sites
            .iter()
            .map(|s| {
                Site::new(
                    s.label.clone(),
                    Point3::from(self.lattice.bring_within(&s.position.coords)),
                )
            })
            .collect();
        Structure::new(self.lattice, sites)
    }

    pub fn site(&self, index: usize) -> Result<&Site, StructureError> {
        self.sites.get(index).ok_or(StructureError::SiteIndexOutOfRange {
            index,
            len: self.sites.len(),
        })
    }

    /// Tiles this structure into the superlattice `lattice * transformation`, placing one copy
    /// of every site per unit translation inside the supercell.
    pub fn superstructure(&self, transformation: &IntMatrix3) -> Result<Structure, StructureError> {
        let super_lattice = superlattice::make_superlattice(&self.lattice, transformation)?;
        let expected = integer::determinant(transformation).unsigned_abs() as usize;

        let real = integer::to_real(transformation);
        let corners: Vec<Vector3<f64>> = (0..8)
            .map(|i| {
                let corner = Vector3::new((i & 1) as f64, ((i >> 1) & 1) as f64, ((i >> 2) & 1) as f64);
                real * corner
            })
            .collect();
        let lower = |axis: usize| corners.iter().map(|v| v[axis]).fold(f64::INFINITY, f64::min).floor() as i64;
        let upper = |axis: usize| corners.iter().map(|v| v[axis]).fold(f64::NEG_INFINITY, f64::max).ceil() as i64;

        let mut translations = Vec::with_capacity(expected);
        for i in lower(0)..=upper(0) {
            for j in lower(1)..=upper(1) {
                for k in lower(2)..=upper(2) {
                    let unit_translation = Vector3::new(i as f64, j as f64, k as f64);
                    let cartesian = self.lattice.cartesian(&unit_translation);
                    let fractional = super_lattice.fractional(&cartesian);
                    let inside = fractional
                        .iter()
                        .all(|&x| x >= -DEFAULT_TOLERANCE && x < 1.0 - DEFAULT_TOLERANCE);
                    if inside {
                        translations.push(cartesian);
                    }
                }
            }
        }

        if translations.len() != expected {
            return Err(StructureError::TranslationCountMismatch {
                expected,
                found: translations.len(),
            });
        }

        let sites = self
            .sites
            .iter()
            .flat_map(|s| {
                translations.iter().map(move |t| {
                    let position = super_lattice.bring_within(&(s.position.coords + t));
                    Site::new(s.label.clone(), Point3::from(position))
                })
            })
            .collect();
        Ok(Structure::new(super_lattice, sites))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::tolerance::almost_equal;
    use nalgebra::Matrix3;

    const TOLERANCE: f64 = 1e-9;

    fn rocksalt_like() -> Structure {
        let lattice = Lattice::from_column_matrix(Matrix3::from_diagonal(&Vector3::new(2.0, 3.0, 4.0))).unwrap();
        Structure::new(
            lattice,
            vec![
                Site::new("Na", Point3::new(0.0, 0.0, 0.0)),
                Site::new("Cl", Point3::new(1.0, 1.5, 2.0)),
            ],
        )
    }

    #[test]
    fn translation_moves_sites_not_lattice() {
        let structure = rocksalt_like();
        let shifted = structure.translated(&Vector3::new(0.5, 0.0, 0.0));
        assert_eq!(shifted.lattice(), structure.lattice());
        assert!(almost_equal(
            &shifted.sites()[1].position.coords,
            &Vector3::new(1.5, 1.5, 2.0),
            TOLERANCE
        ));
    }

    #[test]
    fn within_folds_sites_into_cell() {
        let structure = rocksalt_like().translated(&Vector3::new(-0.5, 4.0, 9.0));
        let folded = structure.within();
        for f in folded.fractional_coordinates() {
            assert!(f.iter().all(|&x| (-TOLERANCE..1.0).contains(&x)));
        }
    }

    #[test]
    fn keeping_fractional_scales_positions() {
        let structure = rocksalt_like();
        let bigger = Lattice::from_column_matrix(Matrix3::from_diagonal(&Vector3::new(4.0, 6.0, 8.0))).unwrap();
        let scaled = structure.with_lattice_keeping_fractional(bigger);
        assert!(almost_equal(
            &scaled.sites()[1].position.coords,
            &Vector3::new(2.0, 3.0, 4.0),
            TOLERANCE
        ));
        let kept = structure.with_lattice_keeping_cartesian(bigger);
        assert_eq!(kept.sites(), structure.sites());
    }

    #[test]
    fn superstructure_contains_one_copy_per_unit_translation() {
        let structure = rocksalt_like();
        let transformation = IntMatrix3::new(1, 1, 0, -1, 1, 0, 0, 0, 3);
        let superstructure = structure.superstructure(&transformation).unwrap();
        assert_eq!(superstructure.len(), 2 * 6);
        assert_eq!(superstructure.sites().iter().filter(|s| s.label == "Na").count(), 6);
        assert!((superstructure.lattice().volume() - 6.0 * structure.lattice().volume()).abs() < TOLERANCE);
    }

    #[test]
    fn superstructure_rejects_singular_transformation() {
        let structure = rocksalt_like();
        let transformation = IntMatrix3::new(1, 2, 0, 2, 4, 0, 0, 0, 1);
        assert!(matches!(
            structure.superstructure(&transformation),
            Err(StructureError::Lattice(LatticeError::SingularTransformation { .. }))
        ));
    }

    #[test]
    fn site_lookup_reports_out_of_range() {
        let structure = rocksalt_like();
        assert!(structure.site(1).is_ok());
        assert_eq!(
            structure.site(5),
            Err(StructureError::SiteIndexOutOfRange { index: 5, len: 2 })
        );
    }
}
