//! Per-(action, observation) projections of the previous value function.

use pv_config::PurgeOption;

use crate::alpha::{AlphaList, AlphaNode, Provenance};
use crate::model::{ObservationSupport, PomdpModel};
use crate::prune::{Pruner, Result as PruneResult};

/// Projection sets indexed by `[action][observation]`.
#[derive(Debug, Clone)]
pub struct ProjectionTable {
    cells: Vec<Vec<AlphaList>>,
}

impl ProjectionTable {
    /// Project every vector of `prev` through each action and observation.
    ///
    /// For a possible observation z the projection of v is
    /// `γ Σ_{s'} P(s'|s,a) O(z|s',a) v[s'] + R(a,s)/|Z|`. An impossible
    /// observation gets the single vector `R(a,·)/|Z|` with no source.
    pub fn build(model: &dyn PomdpModel, support: &ObservationSupport, prev: &AlphaList) -> Self {
        let n = model.num_states();
        let num_obs = model.num_observations();
        let gamma = model.discount();
        let share = 1.0 / num_obs as f64;

        let mut cells = Vec::with_capacity(model.num_actions());
        for a in 0..model.num_actions() {
            let immediate: Vec<f64> = (0..n).map(|s| model.reward(a, s) * share).collect();
            let mut row = Vec::with_capacity(num_obs);
            for z in 0..num_obs {
                let mut projection = AlphaList::with_header(Some(a), Some(z));
                if !support.is_possible(a, z) {
                    projection.append_node(AlphaNode::new(immediate.clone(), a).with_provenance(
                        Provenance::Projection {
                            obs: z,
                            prev_source: None,
                        },
                    ));
                    row.push(projection);
                    continue;
                }
                for (handle, v) in prev.handles() {
                    let alpha: Vec<f64> = (0..n)
                        .map(|s| {
                            let future: f64 = model
                                .transitions(a, s)
                                .iter()
                                .map(|&(next, p)| p * model.observation(a, next, z) * v.alpha[next])
                                .sum();
                            gamma * future + immediate[s]
                        })
                        .collect();
                    projection.append_node(AlphaNode::new(alpha, v.action).with_provenance(
                        Provenance::Projection {
                            obs: z,
                            prev_source: Some(handle),
                        },
                    ));
                }
                row.push(projection);
            }
            cells.push(row);
        }
        ProjectionTable { cells }
    }

    pub fn num_actions(&self) -> usize {
        self.cells.len()
    }

    pub fn get(&self, action: usize, obs: usize) -> Option<&AlphaList> {
        self.cells.get(action).and_then(|row| row.get(obs))
    }

    /// All projection sets of one action, indexed by observation.
    pub fn for_action(&self, action: usize) -> &[AlphaList] {
        self.cells.get(action).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total vectors across every cell.
    pub fn total_vectors(&self) -> usize {
        self.cells.iter().flatten().map(AlphaList::len).sum()
    }

    /// Purge every projection set holding more than one vector.
    pub fn purge(&mut self, pruner: &mut Pruner, option: PurgeOption) -> PruneResult<usize> {
        let mut removed = 0;
        for projection in self.cells.iter_mut().flatten() {
            if projection.len() > 1 {
                removed += pruner.purge(projection, option)?;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DenseModel;
    use crate::test_utils::{pruner, stay_model, stay_spec};

    #[test]
    fn test_projection_values() {
        let model = stay_model();
        let support = ObservationSupport::compute(&model, 1e-9).unwrap();
        let mut prev = AlphaList::new();
        prev.append(vec![1.0, 0.0], 0);
        prev.append(vec![0.0, 1.0], 1);
        let table = ProjectionTable::build(&model, &support, &prev);

        let p = table.get(0, 0).unwrap();
        assert_eq!(p.action, Some(0));
        assert_eq!(p.observation, Some(0));
        assert_eq!(p.len(), 2);
        // v=[1,0], a=0, z=0: s=0 -> 0.9*1*1*1 + 0.5 ; s=1 -> 0 + 0
        let first = p.node(0).unwrap();
        assert!((first.alpha[0] - 1.4).abs() < 1e-12);
        assert!(first.alpha[1].abs() < 1e-12);
        assert_eq!(first.action, 0);
        match first.provenance {
            Provenance::Projection { obs, prev_source } => {
                assert_eq!(obs, 0);
                let source = prev.get(prev_source.unwrap()).unwrap();
                assert_eq!(source.alpha, vec![1.0, 0.0]);
            }
            _ => panic!("expected projection provenance"),
        }
        assert_eq!(p.node(1).unwrap().action, 1);
        assert_eq!(table.total_vectors(), 8);
        assert_eq!(table.for_action(1).len(), 2);
        assert!(table.for_action(5).is_empty());
    }

    #[test]
    fn test_impossible_observation_gets_reward_share() {
        let mut spec = stay_spec();
        // Action 1 always emits observation 0
        spec.observation_probs[1] = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let model = DenseModel::from_spec(&spec, false).unwrap();
        let support = ObservationSupport::compute(&model, 1e-9).unwrap();
        assert!(!support.is_possible(1, 1));

        let prev = AlphaList::zero(2, 0);
        let table = ProjectionTable::build(&model, &support, &prev);
        let p = table.get(1, 1).unwrap();
        assert_eq!(p.len(), 1);
        let node = p.node(0).unwrap();
        assert_eq!(node.alpha, vec![0.0, 0.5]);
        assert_eq!(node.action, 1);
        assert_eq!(
            node.provenance,
            Provenance::Projection {
                obs: 1,
                prev_source: None
            }
        );
    }

    #[test]
    fn test_purge_skips_singletons() {
        let model = stay_model();
        let support = ObservationSupport::compute(&model, 1e-9).unwrap();
        let prev = AlphaList::zero(2, 0);
        let mut table = ProjectionTable::build(&model, &support, &prev);
        let mut p = pruner();
        assert_eq!(table.purge(&mut p, PurgeOption::Prune).unwrap(), 0);
        assert_eq!(p.stats.purges, 0);
    }
}
