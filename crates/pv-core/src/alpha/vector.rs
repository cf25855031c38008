//! Slice-level helpers for alpha vectors.

use std::cmp::Ordering;

use pv_math::{equal, lex_compare};

/// True when every component of `candidate` is strictly below `other`.
///
/// No tolerance is applied, so equal vectors never dominate each other.
pub fn is_dominated(candidate: &[f64], other: &[f64]) -> bool {
    candidate.len() == other.len()
        && !candidate.is_empty()
        && candidate.iter().zip(other).all(|(c, o)| c < o)
}

/// Lexicographic preference used to break value ties.
pub fn is_lexicographically_better(a: &[f64], b: &[f64], epsilon: f64) -> bool {
    lex_compare(a, b, epsilon) == Ordering::Greater
}

/// Every component within `epsilon` of zero.
pub fn is_zero(alpha: &[f64], epsilon: f64) -> bool {
    alpha.iter().all(|&x| equal(x, 0.0, epsilon))
}

/// Standard basis vector e_i.
pub fn unit(n: usize, i: usize) -> Vec<f64> {
    let mut v = vec![0.0; n];
    if let Some(x) = v.get_mut(i) {
        *x = 1.0;
    }
    v
}
