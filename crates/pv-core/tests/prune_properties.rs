//! Property-based tests for pruning invariants: the upper surface of a
//! vector set survives every purge, purging is idempotent, domination is
//! antisymmetric, and ties at a belief never displace the chosen vector.

use proptest::prelude::*;
use pv_config::{PurgeOption, RegionLp};
use pv_core::alpha::vector::is_dominated;
use pv_core::alpha::AlphaList;
use pv_core::logging::LogContext;
use pv_core::prune::{domination_check, PruneSettings, Pruner};
use pv_core::region::RegionOracle;
use pv_math::{LpEngineKind, SimplexOptions};

fn pruner(engine: LpEngineKind, formulation: RegionLp) -> Pruner {
    let ctx = LogContext::new("run-props");
    let oracle = RegionOracle::new(
        engine.build(SimplexOptions::default()),
        formulation,
        1e-9,
        ctx.clone(),
    );
    Pruner::new(oracle, PruneSettings::default(), Some(17), ctx)
}

fn to_list(vectors: &[Vec<f64>]) -> AlphaList {
    vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (v.clone(), i % 3))
        .collect()
}

fn upper_value(list: &AlphaList, belief: &[f64]) -> f64 {
    list.iter()
        .map(|n| n.value(belief))
        .fold(f64::NEG_INFINITY, f64::max)
}

fn normalize(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| w / total).collect()
}

/// Vector sets over three states with values on a coarse grid, so ties
/// and duplicates show up often.
fn vector_set() -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(
        prop::collection::vec((-20i32..20).prop_map(|v| f64::from(v) / 4.0), 3),
        1..12,
    )
}

fn beliefs() -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(
        prop::collection::vec(0.01f64..1.0, 3).prop_map(|w| normalize(&w)),
        1..8,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// LP pruning keeps the value of the set at every belief.
    #[test]
    fn prune_preserves_upper_surface(vectors in vector_set(), points in beliefs()) {
        let original = to_list(&vectors);
        let mut pruned = original.clone();
        pruner(LpEngineKind::Dantzig, RegionLp::New)
            .purge(&mut pruned, PurgeOption::Prune)
            .unwrap();

        prop_assert!(!pruned.is_empty());
        prop_assert!(pruned.len() <= original.len());
        for b in &points {
            let before = upper_value(&original, b);
            let after = upper_value(&pruned, b);
            prop_assert!((before - after).abs() < 1e-6, "{before} vs {after} at {b:?}");
        }
    }

    /// Both LP formulations and both engines agree on the surviving count.
    #[test]
    fn formulations_agree(vectors in vector_set()) {
        let mut counts = Vec::new();
        for engine in [LpEngineKind::Dantzig, LpEngineKind::Bland] {
            for formulation in [RegionLp::New, RegionLp::Old] {
                let mut list = to_list(&vectors);
                pruner(engine, formulation)
                    .purge(&mut list, PurgeOption::Prune)
                    .unwrap();
                counts.push(list.len());
            }
        }
        prop_assert!(counts.windows(2).all(|w| w[0] == w[1]), "{counts:?}");
    }

    /// A pruned set has nothing left to remove.
    #[test]
    fn prune_is_idempotent(vectors in vector_set()) {
        let mut p = pruner(LpEngineKind::Dantzig, RegionLp::New);
        let mut list = to_list(&vectors);
        p.purge(&mut list, PurgeOption::Prune).unwrap();
        let again = p.purge(&mut list, PurgeOption::Prune).unwrap();
        prop_assert_eq!(again, 0);
    }

    /// Domination removes only vectors some survivor dominates.
    #[test]
    fn domination_only_drops_dominated(vectors in vector_set()) {
        let original = to_list(&vectors);
        let mut list = original.clone();
        let removed = domination_check(&mut list);
        prop_assert_eq!(removed + list.len(), original.len());
        for node in original.iter() {
            let kept = list.contains(&node.alpha, 1e-12);
            let beaten = list
                .iter()
                .any(|k| k.alpha.iter().zip(&node.alpha).all(|(a, b)| a >= b));
            prop_assert!(kept || beaten);
        }
    }

    /// Epsilon pruning stays within the configured tolerance of the full set.
    #[test]
    fn epsilon_prune_is_close(vectors in vector_set(), points in beliefs()) {
        let original = to_list(&vectors);
        let mut pruned = original.clone();
        let mut p = pruner(LpEngineKind::Dantzig, RegionLp::New);
        let tolerance = p.settings.prune_epsilon;
        p.purge(&mut pruned, PurgeOption::EpsilonPrune).unwrap();

        prop_assert!(!pruned.is_empty());
        for b in &points {
            let gap = upper_value(&original, b) - upper_value(&pruned, b);
            prop_assert!(gap <= tolerance + 1e-6, "gap {gap} at {b:?}");
        }
    }

    /// No two vectors dominate each other, and nothing dominates itself.
    #[test]
    fn domination_is_antisymmetric(
        a in prop::collection::vec(-5i32..5, 3),
        b in prop::collection::vec(-5i32..5, 3),
    ) {
        let a: Vec<f64> = a.into_iter().map(f64::from).collect();
        let b: Vec<f64> = b.into_iter().map(f64::from).collect();
        prop_assert!(!(is_dominated(&a, &b) && is_dominated(&b, &a)));
        prop_assert!(!is_dominated(&a, &a));
    }

    /// Appending a tie that is not lexicographically larger leaves the best
    /// vector and its value unchanged.
    #[test]
    fn best_vector_ignores_smaller_ties(
        vectors in vector_set(),
        b in prop::collection::vec(0.05f64..1.0, 3).prop_map(|w| normalize(&w)),
    ) {
        let mut list = to_list(&vectors);
        let (best, value) = list.best_vector(&b, f64::NEG_INFINITY, 1e-9);
        let best = best.unwrap();
        let best_alpha = list.get(best).unwrap().alpha.clone();

        // Same value at b, smaller first component
        let shift = 0.25;
        let mut tied = best_alpha.clone();
        tied[0] -= shift / b[0];
        tied[1] += shift / b[1];
        list.append(best_alpha.clone(), 2);
        list.append(tied, 1);

        let (after, after_value) = list.best_vector(&b, f64::NEG_INFINITY, 1e-9);
        let after = after.unwrap();
        prop_assert_eq!(after.index(), best.index());
        prop_assert_eq!(&list.get(after).unwrap().alpha, &best_alpha);
        prop_assert!((after_value - value).abs() < 1e-9);
    }
}
