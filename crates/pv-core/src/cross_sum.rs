//! Cross-sums of alpha lists and observation-source bookkeeping.

use thiserror::Error;

use crate::alpha::{AlphaList, AlphaNode, NodeHandle, Provenance};
use crate::projection::ProjectionTable;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CrossSumError {
    #[error("observation {obs} filled by both cross-sum operands")]
    OverlappingSource { obs: usize },

    #[error("observation {obs} out of range for {num_obs} observations")]
    ObservationOutOfRange { obs: usize, num_obs: usize },

    #[error("vector lengths differ: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("handle {handle} does not resolve in projection ({action}, {obs})")]
    StaleHandle {
        handle: NodeHandle,
        action: usize,
        obs: usize,
    },
}

impl From<CrossSumError> for pv_common::Error {
    fn from(err: CrossSumError) -> Self {
        match err {
            CrossSumError::StaleHandle { .. } => pv_common::Error::StaleHandle(err.to_string()),
            CrossSumError::DimensionMismatch { left, right } => pv_common::Error::DimensionMismatch {
                expected: left,
                found: right,
            },
            other => pv_common::Error::Invariant(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrossSumError>;

/// Copy the observation slots `node` fills into `slots`.
fn merge_sources(
    slots: &mut [Option<NodeHandle>],
    node: &AlphaNode,
    handle: NodeHandle,
) -> Result<()> {
    let num_obs = slots.len();
    let mut fill = |obs: usize, source: NodeHandle| -> Result<()> {
        let slot = slots
            .get_mut(obs)
            .ok_or(CrossSumError::ObservationOutOfRange { obs, num_obs })?;
        if slot.is_some() {
            return Err(CrossSumError::OverlappingSource { obs });
        }
        *slot = Some(source);
        Ok(())
    };
    match &node.provenance {
        Provenance::Plain => Ok(()),
        Provenance::Projection { obs, .. } => fill(*obs, handle),
        Provenance::CrossSum { obs_source, .. } | Provenance::BeliefDerived { obs_source } => {
            for (obs, source) in obs_source.iter().enumerate() {
                if let Some(source) = source {
                    fill(obs, *source)?;
                }
            }
            Ok(())
        }
    }
}

/// Every pairwise sum of a vector from `a` and a vector from `b`.
///
/// The result has `a.len() * b.len()` nodes in row-major order, carries
/// `a`'s header action, and merges the observation sources of both
/// operands.
pub fn cross_sum(a: &AlphaList, b: &AlphaList, num_obs: usize) -> Result<AlphaList> {
    let mut result = AlphaList::with_header(a.action, None);
    for (ha, first) in a.handles() {
        for (hb, second) in b.handles() {
            if first.alpha.len() != second.alpha.len() {
                return Err(CrossSumError::DimensionMismatch {
                    left: first.alpha.len(),
                    right: second.alpha.len(),
                });
            }
            let mut obs_source = vec![None; num_obs];
            merge_sources(&mut obs_source, first, ha)?;
            merge_sources(&mut obs_source, second, hb)?;

            let alpha = first.alpha.iter().zip(&second.alpha).map(|(x, y)| x + y).collect();
            let action = a.action.unwrap_or(first.action);
            result.append_node(AlphaNode::new(alpha, action).with_provenance(
                Provenance::CrossSum {
                    first_source: ha,
                    second_source: hb,
                    obs_source,
                },
            ));
        }
    }
    Ok(result)
}

/// Point every observation slot of `list` at the previous-epoch vector
/// behind its projection node.
///
/// Slots of impossible observations end up empty.
pub fn relink_obs_sources(list: &mut AlphaList, table: &ProjectionTable) -> Result<()> {
    for node in list.iter_mut() {
        let action = node.action;
        let Some(slots) = node.provenance.obs_source_mut() else {
            continue;
        };
        for (obs, slot) in slots.iter_mut().enumerate() {
            let Some(handle) = *slot else {
                continue;
            };
            let source = table
                .get(action, obs)
                .and_then(|projection| projection.get(handle))
                .ok_or(CrossSumError::StaleHandle {
                    handle,
                    action,
                    obs,
                })?;
            *slot = match source.provenance {
                Provenance::Projection { prev_source, .. } => prev_source,
                _ => None,
            };
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObservationSupport;
    use crate::test_utils::{list, stay_model};

    fn projection(obs: usize, vectors: &[&[f64]]) -> AlphaList {
        let mut p = AlphaList::with_header(Some(1), Some(obs));
        for v in vectors {
            p.append_node(AlphaNode::new(v.to_vec(), 1).with_provenance(
                Provenance::Projection {
                    obs,
                    prev_source: None,
                },
            ));
        }
        p
    }

    #[test]
    fn test_cardinality_and_sums() {
        let a = projection(0, &[&[1.0, 0.0], &[0.0, 1.0]]);
        let b = projection(1, &[&[10.0, 10.0], &[20.0, 0.0], &[0.0, 20.0]]);
        let c = cross_sum(&a, &b, 2).unwrap();
        assert_eq!(c.len(), 6);
        assert_eq!(c.action, Some(1));
        assert_eq!(c.node(0).unwrap().alpha, vec![11.0, 10.0]);
        assert_eq!(c.node(5).unwrap().alpha, vec![0.0, 21.0]);
        assert!(c.iter().all(|n| n.action == 1));
    }

    #[test]
    fn test_sources_recorded() {
        let a = projection(0, &[&[1.0, 0.0], &[0.0, 1.0]]);
        let b = projection(1, &[&[5.0, 5.0]]);
        let c = cross_sum(&a, &b, 2).unwrap();
        let node = c.node(1).unwrap();
        match &node.provenance {
            Provenance::CrossSum {
                first_source,
                second_source,
                obs_source,
            } => {
                assert_eq!(a.get(*first_source).unwrap().alpha, vec![0.0, 1.0]);
                assert_eq!(b.get(*second_source).unwrap().alpha, vec![5.0, 5.0]);
                assert_eq!(obs_source[0], Some(*first_source));
                assert_eq!(obs_source[1], Some(*second_source));
            }
            other => panic!("unexpected provenance {other:?}"),
        }
    }

    #[test]
    fn test_nested_cross_sum_copies_slots() {
        let a = projection(0, &[&[1.0]]);
        let b = projection(1, &[&[2.0]]);
        let c = projection(2, &[&[3.0]]);
        let ab = cross_sum(&a, &b, 3).unwrap();
        let abc = cross_sum(&ab, &c, 3).unwrap();
        let node = abc.node(0).unwrap();
        assert_eq!(node.alpha, vec![6.0]);
        let slots = node.provenance.obs_source().unwrap();
        assert!(slots.iter().all(Option::is_some));
        assert_eq!(slots[0], a.handle_at(0));
        assert_eq!(slots[2], c.handle_at(0));
    }

    #[test]
    fn test_zero_operand_contributes_nothing() {
        let zero = AlphaList::zero(2, 0);
        let b = projection(1, &[&[1.0, 2.0], &[3.0, 4.0]]);
        let c = cross_sum(&zero, &b, 2).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.node(1).unwrap().alpha, vec![3.0, 4.0]);
        let slots = c.node(1).unwrap().provenance.obs_source().unwrap();
        assert_eq!(slots[0], None);
        assert_eq!(slots[1], b.handle_at(1));
    }

    #[test]
    fn test_overlap_is_error() {
        let a = projection(1, &[&[1.0]]);
        let b = projection(1, &[&[2.0]]);
        assert_eq!(
            cross_sum(&a, &b, 2).unwrap_err(),
            CrossSumError::OverlappingSource { obs: 1 }
        );
    }

    #[test]
    fn test_empty_operand_gives_empty_result() {
        let a = projection(0, &[&[1.0]]);
        let c = cross_sum(&a, &AlphaList::new(), 2).unwrap();
        assert!(c.is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = list(&[&[1.0, 2.0]]);
        let b = list(&[&[1.0]]);
        assert!(matches!(
            cross_sum(&a, &b, 1),
            Err(CrossSumError::DimensionMismatch { left: 2, right: 1 })
        ));
    }

    #[test]
    fn test_relink_maps_to_previous_epoch() {
        let model = stay_model();
        let support = ObservationSupport::compute(&model, 1e-9).unwrap();
        let mut prev = AlphaList::new();
        prev.append(vec![1.0, 0.0], 0);
        prev.append(vec![0.0, 1.0], 1);
        let table = ProjectionTable::build(&model, &support, &prev);

        let mut q = AlphaList::zero(2, 0);
        q.action = Some(0);
        for z in 0..2 {
            q = cross_sum(&q, table.get(0, z).unwrap(), 2).unwrap();
        }
        assert_eq!(q.len(), 4);
        relink_obs_sources(&mut q, &table).unwrap();

        // Last node picked the second vector for both observations
        let slots = q.node(3).unwrap().provenance.obs_source().unwrap().to_vec();
        for slot in slots {
            assert_eq!(prev.get(slot.unwrap()).unwrap().alpha, vec![0.0, 1.0]);
        }
    }

    #[test]
    fn test_relink_stale_handle() {
        let model = stay_model();
        let support = ObservationSupport::compute(&model, 1e-9).unwrap();
        let prev = AlphaList::zero(2, 0);
        let table = ProjectionTable::build(&model, &support, &prev);

        let mut other = AlphaList::new();
        let stale = other.append(vec![0.0, 0.0], 0);
        let mut q = AlphaList::with_header(Some(0), None);
        q.append_node(AlphaNode::new(vec![0.0, 0.0], 0).with_provenance(
            Provenance::BeliefDerived {
                obs_source: vec![Some(stale), None],
            },
        ));
        assert!(matches!(
            relink_obs_sources(&mut q, &table),
            Err(CrossSumError::StaleHandle { obs: 0, .. })
        ));
    }
}
