use crate::core::models::lattice::{Lattice, LatticeError};
use crate::core::models::structure::{Site, Structure};
use crate::core::utils::integer::IntMatrix3;
use crate::core::utils::tolerance::{DEFAULT_TOLERANCE, almost_equal};
use crate::engine::error::EngineError;
use nalgebra::Vector3;
use tracing::debug;

/// Repeats a slab unit `stacks` times along c.
pub fn make_stacked_structure(unit: &Structure, stacks: i64) -> Result<Structure, EngineError> {
    if stacks < 1 {
        return Err(LatticeError::InvalidStackCount(stacks).into());
    }
    let transformation = IntMatrix3::from_diagonal(&Vector3::new(1, 1, stacks));
    Ok(unit.superstructure(&transformation)?)
}

/// Replaces c by its projection onto the ab-plane normal, giving a right prism over the ab
/// cell.
pub fn make_prismatic_lattice(lattice: &Lattice) -> Result<Lattice, EngineError> {
    let normal = lattice.ab_normal();
    let c = normal * lattice.c().dot(&normal);
    Ok(Lattice::from_vectors(&lattice.a(), &lattice.b(), &c)?)
}

/// Interplanar spacing along the ab normal, `c · n̂`.
pub fn interplanar_spacing(lattice: &Lattice) -> f64 {
    lattice.c().dot(&lattice.ab_normal())
}

/// Opens (positive values) or closes (negative values) the gap between periodic images of the
/// slab by moving c along the ab normal. Sites keep their Cartesian positions.
pub fn make_cleaved_structures(
    slab: &Structure,
    cleavage_values: &[f64],
) -> Result<Vec<Structure>, EngineError> {
    if cleavage_values.is_empty() {
        return Err(EngineError::EmptyCleavageValues);
    }
    let lattice = slab.lattice();
    if !lattice.is_right_handed() {
        return Err(LatticeError::LeftHanded.into());
    }
    let normal = lattice.ab_normal();
    let spacing = interplanar_spacing(lattice);

    cleavage_values
        .iter()
        .map(|&value| {
            if !value.is_finite() || spacing + value <= 0.0 {
                return Err(EngineError::InvalidCleavage { value, spacing });
            }
            let c = lattice.c() + normal * value;
            let cleaved = Lattice::from_vectors(&lattice.a(), &lattice.b(), &c)?;
            debug!(cleavage = value, "Cleaved slab.");
            Ok(slab.with_lattice_keeping_cartesian(cleaved))
        })
        .collect()
}

/// Translates every basis site by `shift` without folding and without touching the lattice.
pub fn make_translated_structure(structure: &Structure, shift: &Vector3<f64>) -> Structure {
    structure.translated(shift)
}

/// Stacks layers on top of each other along c.
///
/// Every layer must share the ab vectors of the first. The stacked c is the sum of all layer
/// c vectors, and the sites of each layer are lifted by the c vectors of the layers below it.
pub fn make_stacked_layers(layers: &[Structure]) -> Result<Structure, EngineError> {
    let (first, rest) = layers.split_first().ok_or(EngineError::EmptyStack)?;
    let bottom = first.lattice();

    let mut sites = first.sites().to_vec();
    let mut lift = Vector3::zeros();
    let mut previous_c = bottom.c();
    for (offset, layer) in rest.iter().enumerate() {
        let lattice = layer.lattice();
        let shares_ab = almost_equal(&lattice.a(), &bottom.a(), DEFAULT_TOLERANCE)
            && almost_equal(&lattice.b(), &bottom.b(), DEFAULT_TOLERANCE);
        if !shares_ab {
            return Err(EngineError::IncompatibleLayers { index: offset + 1 });
        }
        lift += previous_c;
        previous_c = lattice.c();
        sites.extend(
            layer
                .sites()
                .iter()
                .map(|s| Site::new(s.label.clone(), s.position + lift)),
        );
    }

    let c = layers.iter().map(|l| l.lattice().c()).sum::<Vector3<f64>>();
    let stacked = Lattice::from_vectors(&bottom.a(), &bottom.b(), &c)?;
    debug!(layers = layers.len(), sites = sites.len(), "Stacked layers.");
    Ok(Structure::new(stacked, sites))
}

/// Translates every site by `-site[index]` and folds back into the cell, so the chosen site
/// sits on the ab-plane at the origin.
pub fn make_floored_structure(structure: &Structure, index: usize) -> Result<Structure, EngineError> {
    let anchor = structure.site(index)?.position.coords;
    Ok(structure.translated(&-anchor).within())
}

/// One floored structure per site, in site order.
pub fn make_floored_structures(structure: &Structure) -> Result<Vec<Structure>, EngineError> {
    (0..structure.len())
        .map(|index| make_floored_structure(structure, index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::structure::StructureError;
    use nalgebra::{Matrix3, Point3};

    const TOLERANCE: f64 = 1e-9;

    fn tilted_slab() -> Structure {
        let lattice = Lattice::from_column_matrix(Matrix3::new(
            2.5, 1.25, 0.6, //
            0.0, 2.1, -0.4, //
            0.0, 0.0, 6.0,
        ))
        .unwrap();
        Structure::new(
            lattice,
            vec![
                Site::new("Mo", Point3::new(0.1, 0.2, 0.3)),
                Site::new("S", Point3::new(1.3, 0.9, 1.8)),
                Site::new("S", Point3::new(1.2, 1.0, 4.4)),
            ],
        )
    }

    #[test]
    fn stacking_multiplies_sites_and_scales_c() {
        let slab = tilted_slab();
        let stacked = make_stacked_structure(&slab, 3).unwrap();
        assert_eq!(stacked.len(), 9);
        assert_eq!(stacked.lattice().a(), slab.lattice().a());
        assert_eq!(stacked.lattice().b(), slab.lattice().b());
        assert!(almost_equal(&stacked.lattice().c(), &(slab.lattice().c() * 3.0), TOLERANCE));
    }

    #[test]
    fn stacking_zero_times_is_rejected() {
        let result = make_stacked_structure(&tilted_slab(), 0);
        assert!(matches!(
            result,
            Err(EngineError::Lattice { source: LatticeError::InvalidStackCount(0) })
        ));
    }

    #[test]
    fn prismatic_lattice_has_c_along_normal() {
        let lattice = *tilted_slab().lattice();
        let prism = make_prismatic_lattice(&lattice).unwrap();
        assert_eq!(prism.a(), lattice.a());
        assert_eq!(prism.b(), lattice.b());
        assert!(prism.c().cross(&lattice.ab_normal()).norm() < TOLERANCE);
        assert!((prism.volume() - lattice.volume()).abs() < 1e-8);
    }

    #[test]
    fn cleaving_changes_only_the_normal_extent() {
        let slab = tilted_slab();
        let values = [-0.5, 0.0, 1.5];
        let cleaved = make_cleaved_structures(&slab, &values).unwrap();
        assert_eq!(cleaved.len(), 3);

        let spacing = interplanar_spacing(slab.lattice());
        for (structure, value) in cleaved.iter().zip(values) {
            assert_eq!(structure.lattice().a(), slab.lattice().a());
            assert_eq!(structure.lattice().b(), slab.lattice().b());
            assert_eq!(structure.sites(), slab.sites());
            let new_spacing = interplanar_spacing(structure.lattice());
            assert!((new_spacing - (spacing + value)).abs() < TOLERANCE);
        }
        assert!(cleaved[0].lattice().c().norm() < slab.lattice().c().norm());
    }

    #[test]
    fn cleaving_through_the_slab_is_rejected() {
        let result = make_cleaved_structures(&tilted_slab(), &[-6.0]);
        assert!(matches!(result, Err(EngineError::InvalidCleavage { .. })));
        let result = make_cleaved_structures(&tilted_slab(), &[]);
        assert!(matches!(result, Err(EngineError::EmptyCleavageValues)));
    }

    #[test]
    fn floored_structure_puts_chosen_site_at_origin() {
        let slab = tilted_slab();
        let floored = make_floored_structures(&slab).unwrap();
        assert_eq!(floored.len(), slab.len());
        for (index, structure) in floored.iter().enumerate() {
            assert!(structure.sites()[index].position.coords.norm() < TOLERANCE);
            assert_eq!(structure.len(), slab.len());
        }
    }

    #[test]
    fn translation_keeps_lattice_and_does_not_fold() {
        let slab = tilted_slab();
        let shift = Vector3::new(10.0, 0.0, -1.0);
        let translated = make_translated_structure(&slab, &shift);
        assert_eq!(translated.lattice(), slab.lattice());
        for (moved, original) in translated.sites().iter().zip(slab.sites()) {
            assert!(almost_equal(&moved.position.coords, &(original.position.coords + shift), TOLERANCE));
        }
    }

    #[test]
    fn stacked_layers_sum_c_and_lift_sites() {
        let bottom = tilted_slab();
        let top_lattice =
            Lattice::from_vectors(&bottom.lattice().a(), &bottom.lattice().b(), &Vector3::new(0.0, 0.0, 3.0))
                .unwrap();
        let top = Structure::new(top_lattice, vec![Site::new("W", Point3::new(0.5, 0.5, 1.0))]);

        let stacked = make_stacked_layers(&[bottom.clone(), top]).unwrap();
        assert_eq!(stacked.len(), 4);
        assert!(almost_equal(
            &stacked.lattice().c(),
            &(bottom.lattice().c() + Vector3::new(0.0, 0.0, 3.0)),
            TOLERANCE
        ));
        assert_eq!(&stacked.sites()[..3], bottom.sites());
        let lifted = Point3::new(0.5, 0.5, 1.0) + bottom.lattice().c();
        assert!(almost_equal(&stacked.sites()[3].position.coords, &lifted.coords, TOLERANCE));
    }

    #[test]
    fn stacking_mismatched_layers_is_rejected() {
        let bottom = tilted_slab();
        let other = Structure::new(
            Lattice::from_column_matrix(Matrix3::from_diagonal(&Vector3::new(3.0, 3.0, 3.0))).unwrap(),
            Vec::new(),
        );
        assert!(matches!(
            make_stacked_layers(&[bottom, other]),
            Err(EngineError::IncompatibleLayers { index: 1 })
        ));
        assert!(matches!(make_stacked_layers(&[]), Err(EngineError::EmptyStack)));
    }

    #[test]
    fn flooring_unknown_site_fails() {
        let result = make_floored_structure(&tilted_slab(), 7);
        assert!(matches!(
            result,
            Err(EngineError::Structure { source: StructureError::SiteIndexOutOfRange { index: 7, len: 3 } })
        ));
    }
}
