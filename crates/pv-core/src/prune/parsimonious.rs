//! Lark and White parsimonious pruning.

use crate::alpha::vector::unit;
use crate::alpha::AlphaList;
use crate::belief::random_belief;

use super::{PruneError, Pruner, Result};

/// Mark the best vector at `belief`, recording the belief as its witness.
fn mark_best(list: &mut AlphaList, belief: Vec<f64>, save_witness: bool, epsilon: f64) {
    let (best, _) = list.best_vector(&belief, f64::NEG_INFINITY, epsilon);
    if let Some(node) = best.and_then(|h| list.get_mut(h)) {
        if !node.mark {
            node.mark = true;
            if save_witness {
                node.witness = Some(belief);
            }
        }
    }
}

/// Reduce `list` to the vectors that are strictly best somewhere.
///
/// Returns how many vectors were removed.
pub fn normal_prune(pruner: &mut Pruner, list: &mut AlphaList) -> Result<usize> {
    let Some(n) = list.head().map(|node| node.alpha.len()) else {
        return Ok(0);
    };
    let before = list.len();
    let settings = pruner.settings;

    list.clear_marks();
    for i in 0..n {
        mark_best(list, unit(n, i), settings.use_witness_points, settings.alpha_epsilon);
    }
    for _ in 0..settings.prune_init_rand_points {
        let belief = random_belief(&mut pruner.rng, n);
        mark_best(list, belief, settings.use_witness_points, settings.alpha_epsilon);
    }
    let mut minimal = list.extract_marked();

    while let Some(candidate) = list.dequeue() {
        let found = pruner
            .oracle
            .find_region_point(&candidate.alpha, &minimal, settings.epsilon)?;
        let Some(point) = found else {
            continue;
        };
        list.enqueue(candidate);
        let mut best = list
            .remove_best_vector(&point.witness, settings.alpha_epsilon)
            .ok_or_else(|| PruneError::Invariant("no best vector in a non-empty pool".into()))?;
        if settings.use_witness_points {
            best.witness = Some(point.witness);
        }
        minimal.append_node(best);
    }

    minimal.action = list.action;
    minimal.observation = list.observation;
    *list = minimal;
    Ok(before - list.len())
}
