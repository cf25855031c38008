//! Small dense vector kernels.

use std::cmp::Ordering;

use super::compare::{equal, greater_than};

/// Dot product of two equal-length slices.
///
/// Extra components of the longer slice are ignored.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Lexicographic comparison with a tolerance.
///
/// Components within `epsilon` of each other are treated as equal and the
/// first differing component decides.
pub fn lex_compare(a: &[f64], b: &[f64], epsilon: f64) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        if equal(*x, *y, epsilon) {
            continue;
        }
        return if greater_than(*x, *y, epsilon) {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    Ordering::Equal
}

/// True when every component of `a` is within `epsilon` of `b`.
pub fn approx_equal(a: &[f64], b: &[f64], epsilon: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equal(*x, *y, epsilon))
}

/// Largest absolute component difference.
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}
