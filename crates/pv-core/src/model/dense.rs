//! Dense in-memory model with sparse transition rows.

use super::{ModelError, ModelSpec, PomdpModel, Result, RewardAdjustment};

/// Row sums must be within this of 1.
pub const STOCHASTIC_TOLERANCE: f64 = 1e-6;

/// A fully materialized POMDP.
#[derive(Debug, Clone)]
pub struct DenseModel {
    num_states: usize,
    num_actions: usize,
    num_observations: usize,
    discount: f64,
    /// `[a][s]` -> non-zero `(s', p)` pairs.
    transitions: Vec<Vec<Vec<(usize, f64)>>>,
    /// Flat `[a][s'][z]`.
    observations: Vec<f64>,
    /// Flat `[a][s]`, adjusted.
    rewards: Vec<f64>,
    adjustment: RewardAdjustment,
    start: Option<Vec<f64>>,
}

impl DenseModel {
    /// Validate a parsed model file and build the solver view of it.
    pub fn from_spec(spec: &ModelSpec, require_non_negative: bool) -> Result<Self> {
        let (n, na, nz) = (spec.states, spec.actions, spec.observations);
        if n == 0 {
            return Err(ModelError::Empty("state"));
        }
        if na == 0 {
            return Err(ModelError::Empty("action"));
        }
        if nz == 0 {
            return Err(ModelError::Empty("observation"));
        }
        if !(0.0..=1.0).contains(&spec.discount) {
            return Err(ModelError::BadDiscount(spec.discount));
        }

        check_len("transitions", na, spec.transitions.len())?;
        check_len("observation_probs", na, spec.observation_probs.len())?;
        check_len("rewards", na, spec.rewards.len())?;

        let mut transitions = Vec::with_capacity(na);
        for (a, matrix) in spec.transitions.iter().enumerate() {
            check_len(&format!("transitions[{a}]"), n, matrix.len())?;
            let mut rows = Vec::with_capacity(n);
            for (s, row) in matrix.iter().enumerate() {
                let what = format!("transitions[{a}][{s}]");
                check_distribution(&what, n, row)?;
                rows.push(
                    row.iter()
                        .enumerate()
                        .filter(|&(_, &p)| p != 0.0)
                        .map(|(next, &p)| (next, p))
                        .collect(),
                );
            }
            transitions.push(rows);
        }

        let mut observations = Vec::with_capacity(na * n * nz);
        for (a, matrix) in spec.observation_probs.iter().enumerate() {
            check_len(&format!("observation_probs[{a}]"), n, matrix.len())?;
            for (next, row) in matrix.iter().enumerate() {
                check_distribution(&format!("observation_probs[{a}][{next}]"), nz, row)?;
                observations.extend_from_slice(row);
            }
        }

        for (a, row) in spec.rewards.iter().enumerate() {
            check_len(&format!("rewards[{a}]"), n, row.len())?;
            if let Some(bad) = row.iter().find(|r| !r.is_finite()) {
                return Err(ModelError::Parse {
                    path: String::new(),
                    message: format!("rewards[{a}] contains non-finite value {bad}"),
                });
            }
        }
        let raw: Vec<f64> = spec.rewards.iter().flatten().copied().collect();
        let adjustment =
            RewardAdjustment::from_values(spec.values, raw.iter().copied(), require_non_negative);
        let rewards = raw.iter().map(|&r| adjustment.adjust(r)).collect();

        if let Some(start) = &spec.start {
            check_distribution("start", n, start)?;
        }

        Ok(DenseModel {
            num_states: n,
            num_actions: na,
            num_observations: nz,
            discount: spec.discount,
            transitions,
            observations,
            rewards,
            adjustment,
            start: spec.start.clone(),
        })
    }

    /// Replace the model discount.
    pub fn with_discount(mut self, discount: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&discount) {
            return Err(ModelError::BadDiscount(discount));
        }
        self.discount = discount;
        Ok(self)
    }

    /// Initial belief from the model file, if any.
    pub fn start(&self) -> Option<&[f64]> {
        self.start.as_deref()
    }
}

fn check_len(what: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(ModelError::Shape {
            what: what.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

fn check_distribution(what: &str, len: usize, row: &[f64]) -> Result<()> {
    check_len(what, len, row.len())?;
    if let Some(&bad) = row.iter().find(|p| !p.is_finite() || **p < 0.0 || **p > 1.0) {
        return Err(ModelError::BadProbability {
            what: what.to_string(),
            value: bad,
        });
    }
    let sum: f64 = row.iter().sum();
    if (sum - 1.0).abs() > STOCHASTIC_TOLERANCE {
        return Err(ModelError::NotStochastic {
            what: what.to_string(),
            sum,
        });
    }
    Ok(())
}

impl PomdpModel for DenseModel {
    fn num_states(&self) -> usize {
        self.num_states
    }

    fn num_actions(&self) -> usize {
        self.num_actions
    }

    fn num_observations(&self) -> usize {
        self.num_observations
    }

    fn discount(&self) -> f64 {
        self.discount
    }

    fn transitions(&self, action: usize, state: usize) -> &[(usize, f64)] {
        &self.transitions[action][state]
    }

    fn observation(&self, action: usize, next_state: usize, obs: usize) -> f64 {
        self.observations[(action * self.num_states + next_state) * self.num_observations + obs]
    }

    fn reward(&self, action: usize, state: usize) -> f64 {
        self.rewards[action * self.num_states + state]
    }

    fn reward_adjustment(&self) -> RewardAdjustment {
        self.adjustment
    }
}
