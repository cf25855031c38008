//! Epsilon pruning: drop vectors while the rest stays within `prune_epsilon`
//! of the original value function.

use pv_math::SMALLEST_PRECISION;

use crate::alpha::AlphaList;
use crate::region::RegionOracle;

use super::{Pruner, Result};

/// Check that `candidate` approximates `original` everywhere to within
/// `tolerance`. Returns the verdict and the largest margin seen.
pub fn is_epsilon_approximation(
    oracle: &mut RegionOracle,
    candidate: &AlphaList,
    original: &AlphaList,
    epsilon: f64,
    tolerance: f64,
) -> Result<(bool, f64)> {
    let mut max_diff = 0.0f64;
    for node in original.iter() {
        if candidate.contains(&node.alpha, SMALLEST_PRECISION) {
            continue;
        }
        if let Some(point) = oracle.find_region_point(&node.alpha, candidate, epsilon)? {
            max_diff = max_diff.max(point.margin);
            if point.margin > tolerance {
                return Ok((false, max_diff));
            }
        }
    }
    Ok((true, max_diff))
}

/// Greedily remove vectors whose loss keeps the value function within
/// `prune_epsilon`. Returns how many were removed.
pub fn epsilon_prune(pruner: &mut Pruner, list: &mut AlphaList) -> Result<usize> {
    if list.is_empty() {
        pruner.stats.epsilon_diff_of_last_prune = 0.0;
        return Ok(0);
    }
    let settings = pruner.settings;
    let original = list.clone();
    let before = list.len();
    let mut max_diff = 0.0f64;

    list.clear_marks();
    while let Some(mut node) = list.extract_unmarked() {
        node.mark = true;
        let (ok, diff) = is_epsilon_approximation(
            &mut pruner.oracle,
            list,
            &original,
            settings.epsilon,
            settings.prune_epsilon,
        )?;
        if ok {
            max_diff = max_diff.max(diff);
        } else {
            list.enqueue(node);
        }
    }
    list.clear_marks();
    pruner.stats.epsilon_diff_of_last_prune = max_diff;
    Ok(before - list.len())
}
