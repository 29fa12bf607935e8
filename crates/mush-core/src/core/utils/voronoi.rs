//! Folding of points into the Voronoi (Wigner–Seitz) cell of a lattice spanned by two or
//! three basis vectors.
//!
//! The basis is reduced first so that a small, fixed window of neighbouring translations is
//! enough to find the closest lattice point. A two-vector basis folds only the in-plane part
//! of a point; any component normal to the plane is carried through untouched.

use itertools::Itertools;
use nalgebra::{DMatrix, DVector, Vector3};

const LLL_DELTA: f64 = 0.75;
const MAX_REDUCTION_STEPS: usize = 1000;
const SEARCH_RADIUS: i64 = 2;

/// Reduces a basis: Lagrange–Gauss for two vectors, LLL for three.
pub fn reduce_basis(basis: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
    match basis.len() {
        2 => gauss_reduce(basis[0], basis[1]).to_vec(),
        3 => lll_reduce(basis),
        _ => basis.to_vec(),
    }
}

fn gauss_reduce(mut u: Vector3<f64>, mut v: Vector3<f64>) -> [Vector3<f64>; 2] {
    for _ in 0..MAX_REDUCTION_STEPS {
        if u.norm_squared() > v.norm_squared() {
            std::mem::swap(&mut u, &mut v);
        }
        let mu = (u.dot(&v) / u.norm_squared()).round();
        if mu == 0.0 {
            break;
        }
        v -= u * mu;
    }
    [u, v]
}

fn gram_schmidt(basis: &[Vector3<f64>]) -> (Vec<Vector3<f64>>, Vec<Vec<f64>>) {
    let n = basis.len();
    let mut ortho: Vec<Vector3<f64>> = Vec::with_capacity(n);
    let mut mu = vec![vec![0.0; n]; n];
    for i in 0..n {
        let mut v = basis[i];
        for j in 0..i {
            mu[i][j] = basis[i].dot(&ortho[j]) / ortho[j].norm_squared();
            v -= ortho[j] * mu[i][j];
        }
        ortho.push(v);
    }
    (ortho, mu)
}

fn lll_reduce(basis: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
    let mut b = basis.to_vec();
    let n = b.len();
    let mut k = 1;
    let mut steps = 0;
    while k < n && steps < MAX_REDUCTION_STEPS {
        steps += 1;
        for j in (0..k).rev() {
            let (_, mu) = gram_schmidt(&b);
            let q = mu[k][j].round();
            if q != 0.0 {
                let shift = b[j] * q;
                b[k] -= shift;
            }
        }
        let (ortho, mu) = gram_schmidt(&b);
        let lovasz = (LLL_DELTA - mu[k][k - 1].powi(2)) * ortho[k - 1].norm_squared();
        if ortho[k].norm_squared() >= lovasz {
            k += 1;
        } else {
            b.swap(k, k - 1);
            k = (k - 1).max(1);
        }
    }
    b
}

/// Coefficients of the projection of `point` onto the span of `basis`.
fn span_coefficients(point: &Vector3<f64>, basis: &[Vector3<f64>]) -> Option<DVector<f64>> {
    let k = basis.len();
    let gram = DMatrix::from_fn(k, k, |i, j| basis[i].dot(&basis[j]));
    let rhs = DVector::from_fn(k, |i, _| basis[i].dot(point));
    gram.lu().solve(&rhs)
}

fn combine(basis: &[Vector3<f64>], coefficients: impl IntoIterator<Item = f64>) -> Vector3<f64> {
    basis
        .iter()
        .zip(coefficients)
        .fold(Vector3::zeros(), |acc, (v, x)| acc + v * x)
}

/// Folds `point` into the Voronoi cell around the origin of the lattice spanned by `basis`.
///
/// The first candidate is the representative inside the `[0, 1)` parallelepiped of the
/// reduced basis. Another translate replaces it only when it is shorter by more than `tol`,
/// so points on the cell boundary resolve deterministically. Returns `point` unchanged if the
/// basis is degenerate.
pub fn bring_within_voronoi(point: &Vector3<f64>, basis: &[Vector3<f64>], tol: f64) -> Vector3<f64> {
    let reduced = reduce_basis(basis);
    let Some(coefficients) = span_coefficients(point, &reduced) else {
        return *point;
    };

    let in_span = combine(&reduced, coefficients.iter().copied());
    let normal_part = point - in_span;
    let wrapped = coefficients.iter().map(|x| x - (x + tol).floor());
    let start = combine(&reduced, wrapped) + normal_part;

    let mut best = start;
    let mut best_norm = start.norm_squared();
    for offsets in (0..reduced.len())
        .map(|_| -SEARCH_RADIUS..=SEARCH_RADIUS)
        .multi_cartesian_product()
    {
        let candidate = start - combine(&reduced, offsets.into_iter().map(|n| n as f64));
        let norm = candidate.norm_squared();
        if norm < best_norm - tol {
            best = candidate;
            best_norm = norm;
        }
    }
    best
}

/// Whether `point` already lies in the Voronoi cell, i.e. folding leaves it unchanged.
pub fn is_within_voronoi(point: &Vector3<f64>, basis: &[Vector3<f64>], tol: f64) -> bool {
    let folded = bring_within_voronoi(point, basis, tol);
    folded.norm_squared() >= point.norm_squared() - tol
}
