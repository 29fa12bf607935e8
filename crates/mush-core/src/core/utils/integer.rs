use itertools::iproduct;
use nalgebra::Matrix3;

/// Integer 3x3 matrix mapping tiling-unit column vectors onto superlattice column vectors.
pub type IntMatrix3 = Matrix3<i64>;

pub fn determinant(m: &IntMatrix3) -> i64 {
    m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
        - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
        + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
}

#[inline]
pub fn to_real(m: &IntMatrix3) -> Matrix3<f64> {
    m.map(|x| x as f64)
}

/// Rounds every entry to the nearest integer and reports the largest deviation encountered.
pub fn round_to_integer(m: &Matrix3<f64>) -> (IntMatrix3, f64) {
    let rounded = m.map(|x| x.round());
    let deviation = (m - rounded).amax();
    (rounded.map(|x| x as i64), deviation)
}

pub fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

pub fn max_abs_entry(m: &IntMatrix3) -> i64 {
    m.iter().map(|x| x.abs()).max().unwrap_or(0)
}

/// Embeds a 2x2 block into the ab-subspace, leaving c untouched.
pub fn in_plane_matrix(m00: i64, m01: i64, m10: i64, m11: i64) -> IntMatrix3 {
    IntMatrix3::new(m00, m01, 0, m10, m11, 0, 0, 0, 1)
}

/// Orientation-preserving unimodular matrices acting only within the ab-subspace.
///
/// Entries of the 2x2 block range over `[-max_entry, max_entry]` and the result is ordered
/// lexicographically on `(m00, m01, m10, m11)`.
pub fn in_plane_unimodular_matrices(max_entry: i64) -> Vec<IntMatrix3> {
    let range = || -max_entry..=max_entry;
    iproduct!(range(), range(), range(), range())
        .filter(|&(m00, m01, m10, m11)| m00 * m11 - m01 * m10 == 1)
        .map(|(m00, m01, m10, m11)| in_plane_matrix(m00, m01, m10, m11))
        .collect()
}

/// Offsets `0, -1, 1, -2, 2, ...` up to `radius`, so that enumerating them in order visits
/// the unperturbed value first.
pub fn centered_offsets(radius: i64) -> Vec<i64> {
    let mut offsets = vec![0];
    for r in 1..=radius.max(0) {
        offsets.push(-r);
        offsets.push(r);
    }
    offsets
}

/// All two-dimensional Hermite normal forms of determinant `n`, embedded in 3x3 with c fixed.
///
/// Each form `[[a, b], [0, d]]` with `a * d = n` and `0 <= b < a` generates a distinct
/// in-plane sublattice of index `n`.
pub fn hermite_normal_forms_2d(n: i64) -> Vec<IntMatrix3> {
    if n < 1 {
        return Vec::new();
    }
    let mut forms = Vec::new();
    for a in (1..=n).filter(|a| n % a == 0) {
        let d = n / a;
        for b in 0..a {
            forms.push(in_plane_matrix(a, b, 0, d));
        }
    }
    forms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determinant_matches_hand_computation() {
        let m = IntMatrix3::new(2, 1, 0, -1, 3, 4, 0, 5, 1);
        assert_eq!(determinant(&m), 2 * (3 - 20) - (-1) + 0);
        assert_eq!(determinant(&IntMatrix3::identity()), 1);
    }

    #[test]
    fn round_to_integer_reports_deviation() {
        let m = Matrix3::new(1.0, 0.0, 0.0, 0.0, 2.0000001, 0.0, 0.0, 0.0, -3.0);
        let (rounded, deviation) = round_to_integer(&m);
        assert_eq!(rounded, IntMatrix3::new(1, 0, 0, 0, 2, 0, 0, 0, -3));
        assert!(deviation < 1e-6);
        assert!(deviation > 0.0);
    }

    #[test]
    fn gcd_ignores_signs() {
        assert_eq!(gcd(12, -18), 6);
        assert_eq!(gcd(0, 7), 7);
        assert_eq!(gcd(0, 0), 0);
    }

    #[test]
    fn unimodular_candidates_have_unit_determinant_and_fixed_c() {
        let candidates = in_plane_unimodular_matrices(1);
        assert!(!candidates.is_empty());
        assert!(candidates.contains(&IntMatrix3::identity()));
        for m in &candidates {
            assert_eq!(determinant(m), 1);
            assert_eq!(m[(2, 2)], 1);
            assert_eq!((m[(0, 2)], m[(1, 2)], m[(2, 0)], m[(2, 1)]), (0, 0, 0, 0));
        }
    }

    #[test]
    fn unimodular_candidates_are_lexicographically_ordered() {
        let candidates = in_plane_unimodular_matrices(2);
        let keys: Vec<_> = candidates
            .iter()
            .map(|m| (m[(0, 0)], m[(0, 1)], m[(1, 0)], m[(1, 1)]))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn centered_offsets_start_at_zero() {
        assert_eq!(centered_offsets(0), vec![0]);
        assert_eq!(centered_offsets(2), vec![0, -1, 1, -2, 2]);
    }

    #[test]
    fn hermite_normal_form_count_is_divisor_sum() {
        assert_eq!(hermite_normal_forms_2d(1).len(), 1);
        assert_eq!(hermite_normal_forms_2d(4).len(), 7);
        assert_eq!(hermite_normal_forms_2d(6).len(), 12);
        for h in hermite_normal_forms_2d(6) {
            assert_eq!(determinant(&h), 6);
        }
    }
}
