use crate::core::matching::StructureMatcher;
use crate::core::models::structure::Structure;
use itertools::Itertools;
use std::ops::Index;
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A partition of `0..len` into classes of mutually equivalent indices.
///
/// Every index belongs to exactly one class and is a member of its own class. Classes are
/// ordered by their smallest member and list their members in ascending order, so two maps
/// describing the same partition compare equal regardless of how they were built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalenceMap {
    class_of: Vec<usize>,
    classes: Vec<Vec<usize>>,
}

impl EquivalenceMap {
    /// Builds the partition generated by the given equivalent pairs, closing it under
    /// symmetry and transitivity.
    pub fn from_pairs(len: usize, pairs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut parent: Vec<usize> = (0..len).collect();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for (i, j) in pairs {
            let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
            if ri != rj {
                let (low, high) = if ri < rj { (ri, rj) } else { (rj, ri) };
                parent[high] = low;
            }
        }

        let mut class_of = vec![0; len];
        let mut classes: Vec<Vec<usize>> = Vec::new();
        let mut class_of_root = vec![usize::MAX; len];
        for i in 0..len {
            let root = find(&mut parent, i);
            if class_of_root[root] == usize::MAX {
                class_of_root[root] = classes.len();
                classes.push(Vec::new());
            }
            let class = class_of_root[root];
            class_of[i] = class;
            classes[class].push(i);
        }
        Self { class_of, classes }
    }

    pub fn len(&self) -> usize {
        self.class_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.class_of.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> &[Vec<usize>] {
        &self.classes
    }

    pub fn class_index(&self, index: usize) -> usize {
        self.class_of[index]
    }

    /// All indices equivalent to `index`, including itself.
    pub fn equivalents(&self, index: usize) -> &[usize] {
        &self.classes[self.class_of[index]]
    }

    pub fn are_equivalent(&self, i: usize, j: usize) -> bool {
        self.class_of[i] == self.class_of[j]
    }

    /// The smallest index of every class.
    pub fn representatives(&self) -> Vec<usize> {
        self.classes.iter().map(|class| class[0]).collect()
    }
}

impl Index<usize> for EquivalenceMap {
    type Output = [usize];

    fn index(&self, index: usize) -> &Self::Output {
        self.equivalents(index)
    }
}

/// Partitions `items` by an equivalence predicate.
///
/// This is the quadratic cost center of the shift workflow: all `N (N - 1) / 2` pairs are
/// compared. Pairs are evaluated in parallel when the `parallel` feature is enabled, and the
/// resulting partition is independent of evaluation order.
pub fn categorize_equivalent<T, F>(items: &[T], are_equivalent: F) -> EquivalenceMap
where
    T: Sync,
    F: Fn(&T, &T) -> bool + Sync,
{
    let pairs: Vec<(usize, usize)> = (0..items.len()).tuple_combinations().collect();

    #[cfg(not(feature = "parallel"))]
    let iterator = pairs.iter();

    #[cfg(feature = "parallel")]
    let iterator = pairs.par_iter();

    let matches: Vec<(usize, usize)> = iterator
        .filter(|&&(i, j)| are_equivalent(&items[i], &items[j]))
        .copied()
        .collect();

    EquivalenceMap::from_pairs(items.len(), matches)
}

#[instrument(skip_all, name = "equivalence_task")]
pub fn categorize_equivalently_shifted_structures(
    shifted_structures: &[Structure],
    matcher: &StructureMatcher,
) -> EquivalenceMap {
    let map = categorize_equivalent(shifted_structures, |lhs, rhs| matcher.is_equivalent(lhs, rhs));
    info!(
        structures = shifted_structures.len(),
        classes = map.num_classes(),
        "Categorized shifted structures."
    );
    map
}
