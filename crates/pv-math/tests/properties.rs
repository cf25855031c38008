//! Property-based tests for pv-math comparisons and LP engines.
//!
//! Uses proptest to check that both pivot rules agree and that reported
//! optima are feasible.

use proptest::prelude::*;
use pv_math::{
    dot, equal, greater_than, less_than, lex_compare, BlandSimplex, DantzigSimplex, LpEngine,
    LpProblem, LpStatus, ObjectiveSense, RowSense,
};
use std::cmp::Ordering;

/// Tolerance for objective agreement between engines.
const TOL: f64 = 1e-6;

/// Tolerance for constraint satisfaction of a returned point.
const FEAS_TOL: f64 = 1e-7;

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

/// max delta  s.t. sum x = 1, x.(others_k - alpha) + delta <= 0, x in [0,1].
fn region_problem(alpha: &[f64], others: &[Vec<f64>]) -> LpProblem {
    let n = alpha.len();
    let mut p = LpProblem::new("region", n + 1, ObjectiveSense::Maximize);
    p.set_objective(n, 1.0).unwrap();
    for c in 0..n {
        p.set_bounds(c, 0.0, 1.0).unwrap();
    }
    p.add_row((0..n).map(|c| (c, 1.0)).collect(), RowSense::Equal, 1.0)
        .unwrap();
    for other in others {
        let mut entries: Vec<(usize, f64)> =
            (0..n).map(|c| (c, other[c] - alpha[c])).collect();
        entries.push((n, 1.0));
        p.add_row(entries, RowSense::LessEqual, 0.0).unwrap();
    }
    p
}

fn vec_strategy(n: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-10.0..10.0f64, n)
}

// ============================================================================
// comparison properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// equal is symmetric.
    #[test]
    fn equal_symmetric(a in -1e3..1e3f64, b in -1e3..1e3f64, e in 1e-12..1.0f64) {
        prop_assert_eq!(equal(a, b, e), equal(b, a, e));
    }

    /// greater_than and less_than are mirror images.
    #[test]
    fn greater_less_mirror(a in -1e3..1e3f64, b in -1e3..1e3f64, e in 1e-12..1.0f64) {
        prop_assert_eq!(greater_than(a, b, e), less_than(b, a, e));
    }

    /// At most one of equal / greater / less holds for the same epsilon.
    #[test]
    fn trichotomy_exclusive(a in -1e3..1e3f64, b in -1e3..1e3f64, e in 1e-12..1.0f64) {
        let count = [equal(a, b, e), greater_than(a, b, e), less_than(a, b, e)]
            .iter()
            .filter(|x| **x)
            .count();
        prop_assert!(count <= 1);
    }

    /// lex_compare is antisymmetric.
    #[test]
    fn lex_compare_antisymmetric(a in vec_strategy(4), b in vec_strategy(4)) {
        prop_assert_eq!(lex_compare(&a, &b, 1e-9), lex_compare(&b, &a, 1e-9).reverse());
        prop_assert_eq!(lex_compare(&a, &a, 1e-9), Ordering::Equal);
    }
}

// ============================================================================
// simplex properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Dantzig and Bland agree on status and optimal objective.
    #[test]
    fn engines_agree(
        alpha in vec_strategy(3),
        others in prop::collection::vec(vec_strategy(3), 1..6),
    ) {
        let p = region_problem(&alpha, &others);
        let d = DantzigSimplex::default().solve(&p).unwrap();
        let b = BlandSimplex::default().solve(&p).unwrap();
        prop_assert_eq!(d.status, b.status);
        if d.status == LpStatus::Optimal {
            prop_assert!(approx_eq(d.objective_value, b.objective_value, TOL),
                "dantzig {} vs bland {}", d.objective_value, b.objective_value);
        }
    }

    /// An optimal region point is a belief and satisfies every row.
    #[test]
    fn optimal_point_is_feasible(
        alpha in vec_strategy(3),
        others in prop::collection::vec(vec_strategy(3), 1..6),
    ) {
        let p = region_problem(&alpha, &others);
        let sol = DantzigSimplex::default().solve(&p).unwrap();
        prop_assume!(sol.status == LpStatus::Optimal);
        let belief = &sol.x[..3];
        let total: f64 = belief.iter().sum();
        prop_assert!((total - 1.0).abs() < FEAS_TOL);
        prop_assert!(belief.iter().all(|x| *x >= -FEAS_TOL && *x <= 1.0 + FEAS_TOL));
        let delta = sol.x[3];
        for other in &others {
            let gap = dot(belief, other) - dot(belief, &alpha) + delta;
            prop_assert!(gap <= FEAS_TOL, "row violated by {}", gap);
        }
    }

    /// The region margin against a single vector is its best pointwise advantage.
    #[test]
    fn single_competitor_margin(alpha in vec_strategy(3), other in vec_strategy(3)) {
        let p = region_problem(&alpha, std::slice::from_ref(&other));
        let sol = BlandSimplex::default().solve(&p).unwrap();
        let best = alpha
            .iter()
            .zip(&other)
            .map(|(a, o)| a - o)
            .fold(f64::NEG_INFINITY, f64::max);
        prop_assume!(best.abs() > 1e-6);
        if best > 0.0 {
            prop_assert_eq!(sol.status, LpStatus::Optimal);
            prop_assert!(approx_eq(sol.objective_value, best, TOL));
        } else {
            prop_assert_eq!(sol.status, LpStatus::Infeasible);
        }
    }
}
