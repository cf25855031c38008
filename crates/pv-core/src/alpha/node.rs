//! Alpha-vector nodes and their provenance links.

use serde::Serialize;

/// Weak reference to a node of a specific [`AlphaList`](super::AlphaList).
///
/// A handle only resolves against the list generation it was taken from.
/// Anything that shifts positions in that list starts a new generation, so
/// old handles fail their lookup instead of pointing at the wrong node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeHandle {
    pub(crate) generation: u32,
    pub(crate) index: u32,
}

impl NodeHandle {
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Position in the list at the time the handle was taken.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl std::fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.generation, self.index)
    }
}

/// Where a vector came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Provenance {
    /// Read from a file or built directly.
    #[default]
    Plain,
    /// Member of the projection set for one observation.
    Projection {
        obs: usize,
        /// Previous-epoch vector this was projected from. `None` for the
        /// reward-only vector of an impossible observation.
        prev_source: Option<NodeHandle>,
    },
    /// Sum of one vector from each operand of a cross-sum.
    CrossSum {
        first_source: NodeHandle,
        second_source: NodeHandle,
        obs_source: Vec<Option<NodeHandle>>,
    },
    /// Best projection per observation at a belief point.
    BeliefDerived { obs_source: Vec<Option<NodeHandle>> },
}

impl Provenance {
    /// Per-observation sources, for variants that carry them.
    pub fn obs_source(&self) -> Option<&[Option<NodeHandle>]> {
        match self {
            Provenance::CrossSum { obs_source, .. } | Provenance::BeliefDerived { obs_source } => {
                Some(obs_source)
            }
            _ => None,
        }
    }

    pub fn obs_source_mut(&mut self) -> Option<&mut Vec<Option<NodeHandle>>> {
        match self {
            Provenance::CrossSum { obs_source, .. } | Provenance::BeliefDerived { obs_source } => {
                Some(obs_source)
            }
            _ => None,
        }
    }
}

/// One alpha vector plus its bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaNode {
    pub alpha: Vec<f64>,
    pub action: usize,
    pub id: i64,
    /// Belief at which this vector was shown to be useful.
    pub witness: Option<Vec<f64>>,
    /// Scratch flag for mark/sweep passes.
    pub mark: bool,
    pub provenance: Provenance,
}

impl AlphaNode {
    pub fn new(alpha: Vec<f64>, action: usize) -> Self {
        AlphaNode {
            alpha,
            action,
            id: 0,
            witness: None,
            mark: false,
            provenance: Provenance::Plain,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Observation this node was projected for.
    pub fn observation(&self) -> Option<usize> {
        match self.provenance {
            Provenance::Projection { obs, .. } => Some(obs),
            _ => None,
        }
    }

    /// Value at a belief.
    pub fn value(&self, belief: &[f64]) -> f64 {
        pv_math::dot(&self.alpha, belief)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_defaults() {
        let node = AlphaNode::new(vec![1.0, 2.0], 3);
        assert_eq!(node.action, 3);
        assert!(!node.mark);
        assert_eq!(node.provenance, Provenance::Plain);
        assert_eq!(node.observation(), None);
        assert_eq!(node.value(&[0.5, 0.5]), 1.5);
    }

    #[test]
    fn test_obs_source_access() {
        let h = NodeHandle {
            generation: 1,
            index: 0,
        };
        let mut p = Provenance::BeliefDerived {
            obs_source: vec![Some(h), None],
        };
        assert_eq!(p.obs_source().map(|s| s.len()), Some(2));
        if let Some(slots) = p.obs_source_mut() {
            slots[1] = Some(h);
        }
        assert_eq!(p.obs_source().unwrap()[1], Some(h));
        assert!(Provenance::Plain.obs_source().is_none());
    }

    #[test]
    fn test_projection_observation() {
        let node = AlphaNode::new(vec![0.0], 0).with_provenance(Provenance::Projection {
            obs: 2,
            prev_source: None,
        });
        assert_eq!(node.observation(), Some(2));
    }
}
