//! Convergence tests between successive value functions.

use pv_config::{SolverParams, StopCriterion};

use crate::alpha::AlphaList;
use crate::region::{RegionOracle, Result};

/// Largest margin by which a vector of one list beats the other list,
/// taken over both directions.
///
/// Vectors with no winning region contribute zero.
pub fn bellman_error(
    oracle: &mut RegionOracle,
    prev: &AlphaList,
    cur: &AlphaList,
    epsilon: f64,
) -> Result<f64> {
    let mut max_diff = 0.0f64;
    for (from, against) in [(cur, prev), (prev, cur)] {
        for node in from.iter() {
            if let Some(point) = oracle.find_region_point(&node.alpha, against, epsilon)? {
                max_diff = max_diff.max(point.margin);
            }
        }
    }
    Ok(max_diff)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopSettings {
    pub criterion: StopCriterion,
    pub stop_delta: f64,
    pub alpha_epsilon: f64,
    pub epsilon: f64,
}

impl StopSettings {
    pub fn from_params(params: &SolverParams) -> Self {
        StopSettings {
            criterion: params.stop_criteria,
            stop_delta: params.stop_delta,
            alpha_epsilon: params.alpha_epsilon,
            epsilon: params.epsilon,
        }
    }
}

/// Outcome of one convergence test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopCheck {
    pub converged: bool,
    /// Bellman residual, when the criterion computes one.
    pub residual: Option<f64>,
}

/// Has value iteration converged from `prev` to `cur`?
pub fn check_convergence(
    settings: &StopSettings,
    oracle: &mut RegionOracle,
    prev: &AlphaList,
    cur: &AlphaList,
) -> Result<StopCheck> {
    let check = match settings.criterion {
        StopCriterion::Exact => StopCheck {
            converged: prev.same(cur, settings.alpha_epsilon),
            residual: None,
        },
        StopCriterion::Weak => StopCheck {
            converged: prev.similar(cur, settings.alpha_epsilon),
            residual: None,
        },
        StopCriterion::Bellman => {
            let residual = bellman_error(oracle, prev, cur, settings.epsilon)?;
            StopCheck {
                converged: residual < settings.stop_delta,
                residual: Some(residual),
            }
        }
    };
    Ok(check)
}
