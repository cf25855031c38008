//! Pointwise domination.

use crate::alpha::vector::is_dominated;
use crate::alpha::AlphaList;

/// True when some member of `list` strictly dominates `candidate`.
pub fn is_pointwise_dominated(candidate: &[f64], list: &AlphaList) -> bool {
    list.iter().any(|node| is_dominated(candidate, &node.alpha))
}

/// Remove every vector that another member strictly dominates.
///
/// Returns the number of vectors removed. Lists shorter than two are left
/// alone.
pub fn domination_check(list: &mut AlphaList) -> usize {
    if list.len() < 2 {
        return 0;
    }
    list.clear_marks();
    for i in 0..list.len() {
        let reference = match list.node(i) {
            Some(node) if !node.mark => node.alpha.clone(),
            _ => continue,
        };
        list.mark_dominated(&reference);
    }
    list.remove_marked()
}
