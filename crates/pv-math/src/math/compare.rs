//! Tolerance-aware scalar comparisons.
//!
//! All value-function code compares reals through these helpers so that a
//! single epsilon governs what "equal", "greater", and "less" mean.

/// Smallest precision used when checking whether a vector is already
/// present in a list (epsilon-prune membership, exact duplicates).
pub const SMALLEST_PRECISION: f64 = 1e-12;

/// Fixed comparator tolerance used by the lexicographic list sort.
pub const SORT_PRECISION: f64 = 1e-15;

/// `|x - y| < epsilon`.
#[inline]
pub fn equal(x: f64, y: f64, epsilon: f64) -> bool {
    (x - y).abs() < epsilon
}

/// `x` exceeds `y` by at least `epsilon`.
#[inline]
pub fn greater_than(x: f64, y: f64, epsilon: f64) -> bool {
    y + epsilon <= x
}

/// `x` is below `y` by at least `epsilon`.
#[inline]
pub fn less_than(x: f64, y: f64, epsilon: f64) -> bool {
    x + epsilon <= y
}

/// Round `x` to `precision` decimal places.
pub fn round_to(x: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (x * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_is_strict_at_boundary() {
        assert!(equal(1.0, 1.0, 1e-9));
        assert!(equal(1.0, 1.0 + 5e-10, 1e-9));
        assert!(!equal(0.0, 0.5, 0.5));
    }

    #[test]
    fn test_greater_than_inclusive_margin() {
        assert!(greater_than(1.5, 1.0, 0.5));
        assert!(!greater_than(1.4, 1.0, 0.5));
        assert!(greater_than(0.0, f64::NEG_INFINITY, 1e-9));
    }

    #[test]
    fn test_less_than_mirrors_greater_than() {
        assert!(less_than(1.0, 1.5, 0.5));
        assert!(!less_than(1.0, 1.4, 0.5));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123_456, 3), 0.123);
        assert_eq!(round_to(-2.5e-4, 3), -0.0);
    }
}
