//! Belief points and belief-derived vectors.
//!
//! The `_q` helpers work on one action's projection sets (indexed by
//! observation) and build the Q-vector that is best at a given belief.

use rand::Rng;
use thiserror::Error;

use crate::alpha::vector::unit;
use crate::alpha::{AlphaList, AlphaNode, NodeHandle, Provenance};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BeliefError {
    #[error("every projection set is empty")]
    NoProjections,

    #[error("belief has {found} components, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

impl From<BeliefError> for pv_common::Error {
    fn from(err: BeliefError) -> Self {
        match err {
            BeliefError::NoProjections => pv_common::Error::Invariant(err.to_string()),
            BeliefError::DimensionMismatch { expected, found } => {
                pv_common::Error::DimensionMismatch { expected, found }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, BeliefError>;

/// Uniform sample from the probability simplex.
pub fn random_belief<R: Rng + ?Sized>(rng: &mut R, num_states: usize) -> Vec<f64> {
    let mut belief = vec![0.0; num_states];
    if num_states == 0 {
        return belief;
    }
    belief[0] = 1.0;
    for i in 1..num_states {
        // 1 - U keeps the draw in (0, 1] so the root is well defined
        let u: f64 = 1.0 - rng.random::<f64>();
        let x = 1.0 - u.powf(1.0 / i as f64);
        for b in belief.iter_mut().take(i) {
            *b *= 1.0 - x;
        }
        belief[i] = x;
    }
    belief
}

/// Corner `i` of the simplex.
pub fn simplex_corner(num_states: usize, i: usize) -> Vec<f64> {
    unit(num_states, i)
}

/// Caller-owned buffers for belief-derived vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct BeliefScratch {
    pub alpha: Vec<f64>,
    pub obs_source: Vec<Option<NodeHandle>>,
}

impl BeliefScratch {
    pub fn new(num_states: usize, num_observations: usize) -> Self {
        BeliefScratch {
            alpha: vec![0.0; num_states],
            obs_source: vec![None; num_observations],
        }
    }
}

/// Sum, over observations, of the projection vector that is best at `belief`.
///
/// Empty projection sets contribute nothing and leave their source slot empty.
pub fn best_alpha_for_belief_q(
    scratch: &mut BeliefScratch,
    belief: &[f64],
    projections: &[AlphaList],
    epsilon: f64,
) -> Result<()> {
    let n = scratch.alpha.len();
    if belief.len() != n {
        return Err(BeliefError::DimensionMismatch {
            expected: n,
            found: belief.len(),
        });
    }
    scratch.alpha.iter_mut().for_each(|x| *x = 0.0);
    scratch.obs_source.clear();
    scratch.obs_source.resize(projections.len(), None);

    let mut any = false;
    for (z, projection) in projections.iter().enumerate() {
        let (best, _) = projection.best_vector(belief, f64::NEG_INFINITY, epsilon);
        let Some(handle) = best else {
            continue;
        };
        let Some(node) = projection.get(handle) else {
            continue;
        };
        any = true;
        scratch.obs_source[z] = Some(handle);
        for (acc, x) in scratch.alpha.iter_mut().zip(&node.alpha) {
            *acc += x;
        }
    }
    if !any {
        return Err(BeliefError::NoProjections);
    }
    Ok(())
}

/// Value of the best Q-vector for one action at `belief`.
pub fn one_step_value(
    scratch: &mut BeliefScratch,
    belief: &[f64],
    projections: &[AlphaList],
    epsilon: f64,
) -> Result<f64> {
    best_alpha_for_belief_q(scratch, belief, projections, epsilon)?;
    Ok(pv_math::dot(&scratch.alpha, belief))
}

/// Add the best Q-vector at `belief` to `list` unless it is already there.
pub fn add_vector_at_belief_q(
    list: &mut AlphaList,
    belief: &[f64],
    projections: &[AlphaList],
    scratch: &mut BeliefScratch,
    save_witness: bool,
    epsilon: f64,
) -> Result<Option<NodeHandle>> {
    best_alpha_for_belief_q(scratch, belief, projections, epsilon)?;
    if list.contains(&scratch.alpha, epsilon) {
        return Ok(None);
    }
    let action = list
        .action
        .or_else(|| projections.iter().find_map(|p| p.action))
        .unwrap_or(0);
    let mut node = AlphaNode::new(scratch.alpha.clone(), action).with_provenance(
        Provenance::BeliefDerived {
            obs_source: scratch.obs_source.clone(),
        },
    );
    if save_witness {
        node.witness = Some(belief.to_vec());
    }
    Ok(Some(list.append_node(node)))
}

/// Seed `list` with the best Q-vector at every simplex corner.
pub fn init_with_simplex_corners_q(
    list: &mut AlphaList,
    projections: &[AlphaList],
    scratch: &mut BeliefScratch,
    save_witness: bool,
    epsilon: f64,
) -> Result<usize> {
    let n = scratch.alpha.len();
    let mut added = 0;
    for i in 0..n {
        let corner = simplex_corner(n, i);
        if add_vector_at_belief_q(list, &corner, projections, scratch, save_witness, epsilon)?
            .is_some()
        {
            added += 1;
        }
    }
    Ok(added)
}

/// Seed `list` with the best Q-vectors at `count` random beliefs.
pub fn init_with_random_points_q<R: Rng + ?Sized>(
    list: &mut AlphaList,
    count: usize,
    rng: &mut R,
    projections: &[AlphaList],
    scratch: &mut BeliefScratch,
    save_witness: bool,
    epsilon: f64,
) -> Result<usize> {
    let n = scratch.alpha.len();
    let mut added = 0;
    for _ in 0..count {
        let belief = random_belief(rng, n);
        if add_vector_at_belief_q(list, &belief, projections, scratch, save_witness, epsilon)?
            .is_some()
        {
            added += 1;
        }
    }
    Ok(added)
}
