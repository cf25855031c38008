//! POMDP model boundary.
//!
//! The solver reads a model only through [`PomdpModel`]. Rewards handed out by
//! the trait are already adjusted (costs negated, optional non-negative shift),
//! so the backup never has to know which convention the model file used.

pub mod dense;
pub mod file;

pub use dense::DenseModel;
pub use file::{load_model, ModelSpec};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or validating a model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("{what}: expected {expected} entries, found {found}")]
    Shape {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("{what} sums to {sum}, expected 1")]
    NotStochastic { what: String, sum: f64 },

    #[error("{what} has invalid probability {value}")]
    BadProbability { what: String, value: f64 },

    #[error("discount {0} is outside [0, 1]")]
    BadDiscount(f64),

    #[error("model must have at least one {0}")]
    Empty(&'static str),

    #[error("action {action} has no possible observation")]
    NoPossibleObservation { action: usize },
}

pub type Result<T> = std::result::Result<T, ModelError>;

impl From<ModelError> for pv_common::Error {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Io { source, .. } => pv_common::Error::Io(source),
            ModelError::NoPossibleObservation { action } => {
                pv_common::Error::NoPossibleObservation { action }
            }
            other => pv_common::Error::InvalidModel(other.to_string()),
        }
    }
}

/// Whether the model's immediate values are rewards or costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Reward,
    Cost,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Reward => write!(f, "reward"),
            ValueType::Cost => write!(f, "cost"),
        }
    }
}

/// How raw model values were turned into the rewards the solver maximizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardAdjustment {
    pub value_type: ValueType,
    /// Smallest reward after cost negation, before any shift.
    pub min_reward: f64,
    /// True when rewards were shifted by `-min_reward` to make them non-negative.
    pub shifted: bool,
}

impl RewardAdjustment {
    /// Derive the adjustment from raw model values.
    pub fn from_values(
        value_type: ValueType,
        raw: impl IntoIterator<Item = f64>,
        require_non_negative: bool,
    ) -> Self {
        let min_reward = raw
            .into_iter()
            .map(|r| Self::orient(value_type, r))
            .fold(f64::INFINITY, f64::min);
        let min_reward = if min_reward.is_finite() { min_reward } else { 0.0 };
        RewardAdjustment {
            value_type,
            min_reward,
            shifted: require_non_negative && min_reward < 0.0,
        }
    }

    fn orient(value_type: ValueType, raw: f64) -> f64 {
        match value_type {
            ValueType::Reward => raw,
            ValueType::Cost => -raw,
        }
    }

    /// The reward the solver sees for a raw model value.
    pub fn adjust(&self, raw: f64) -> f64 {
        let r = Self::orient(self.value_type, raw);
        if self.shifted {
            r - self.min_reward
        } else {
            r
        }
    }

    /// Offset that maps values computed with shifted rewards after `epochs`
    /// epochs back onto the model's own scale.
    pub fn value_scale_factor(&self, epochs: usize, discount: f64) -> f64 {
        if !self.shifted {
            return 0.0;
        }
        let n = epochs as f64;
        let factor = if discount == 1.0 {
            self.min_reward * n
        } else {
            let exponent = epochs.saturating_sub(1) as i32;
            self.min_reward * (1.0 - discount.powi(exponent)) / (1.0 - discount)
        };
        match self.value_type {
            ValueType::Reward => factor,
            ValueType::Cost => -factor,
        }
    }
}

/// Read-only view of a POMDP.
pub trait PomdpModel {
    fn num_states(&self) -> usize;
    fn num_actions(&self) -> usize;
    fn num_observations(&self) -> usize;
    fn discount(&self) -> f64;

    /// Non-zero entries of P(.|state, action) as `(next_state, probability)`.
    fn transitions(&self, action: usize, state: usize) -> &[(usize, f64)];

    /// O(obs | next_state, action).
    fn observation(&self, action: usize, next_state: usize, obs: usize) -> f64;

    /// Adjusted immediate reward R(action, state).
    fn reward(&self, action: usize, state: usize) -> f64;

    fn reward_adjustment(&self) -> RewardAdjustment;
}

/// Which (action, observation) pairs can actually occur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationSupport {
    possible: Vec<Vec<bool>>,
}

impl ObservationSupport {
    /// An observation is impossible for an action when every reachable
    /// successor state emits it with probability within `epsilon` of zero.
    pub fn compute(model: &dyn PomdpModel, epsilon: f64) -> Result<Self> {
        let n = model.num_states();
        let mut possible = Vec::with_capacity(model.num_actions());
        for a in 0..model.num_actions() {
            let mut reachable = vec![false; n];
            for s in 0..n {
                for &(next, p) in model.transitions(a, s) {
                    if p != 0.0 {
                        reachable[next] = true;
                    }
                }
            }
            let row: Vec<bool> = (0..model.num_observations())
                .map(|z| {
                    (0..n).any(|next| {
                        reachable[next]
                            && !pv_math::equal(model.observation(a, next, z), 0.0, epsilon)
                    })
                })
                .collect();
            if !row.iter().any(|&p| p) {
                return Err(ModelError::NoPossibleObservation { action: a });
            }
            possible.push(row);
        }
        Ok(ObservationSupport { possible })
    }

    pub fn is_possible(&self, action: usize, obs: usize) -> bool {
        self.possible
            .get(action)
            .and_then(|row| row.get(obs))
            .copied()
            .unwrap_or(false)
    }

    /// Number of possible observations for an action.
    pub fn count(&self, action: usize) -> usize {
        self.possible
            .get(action)
            .map(|row| row.iter().filter(|&&p| p).count())
            .unwrap_or(0)
    }
}
