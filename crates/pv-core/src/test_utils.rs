//! Shared fixtures for unit tests.

use pv_config::RegionLp;
use pv_math::{LpEngineKind, SimplexOptions};

use crate::alpha::AlphaList;
use crate::logging::LogContext;
use crate::model::{DenseModel, ModelSpec, ValueType};
use crate::prune::{PruneSettings, Pruner};
use crate::region::RegionOracle;

/// Assert that two floating point numbers are approximately equal.
#[macro_export]
macro_rules! assert_approx_eq {
    ($a:expr, $b:expr) => {
        $crate::assert_approx_eq!($a, $b, 1e-6_f64)
    };
    ($a:expr, $b:expr, $epsilon:expr) => {{
        let a: f64 = $a;
        let b: f64 = $b;
        let eps: f64 = $epsilon;
        let diff = (a - b).abs();
        assert!(
            diff <= eps,
            "values not approximately equal: {} vs {} (diff {} > {})",
            a,
            b,
            diff,
            eps
        );
    }};
}

pub fn test_context() -> LogContext {
    LogContext::new("run-test")
}

pub fn oracle(formulation: RegionLp) -> RegionOracle {
    RegionOracle::new(
        LpEngineKind::Dantzig.build(SimplexOptions::default()),
        formulation,
        1e-9,
        test_context(),
    )
}

/// Pruner with default settings and a fixed seed.
pub fn pruner() -> Pruner {
    Pruner::new(
        oracle(RegionLp::New),
        PruneSettings::default(),
        Some(11),
        test_context(),
    )
}

/// Build a list of action-0 vectors.
pub fn list(vectors: &[&[f64]]) -> AlphaList {
    vectors.iter().map(|v| (v.to_vec(), 0)).collect()
}

/// Two states, two actions. Action a pays 1 in state a, states never
/// change, and the observation reveals the state.
pub fn stay_spec() -> ModelSpec {
    ModelSpec {
        discount: 0.9,
        values: ValueType::Reward,
        states: 2,
        actions: 2,
        observations: 2,
        transitions: vec![
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        ],
        observation_probs: vec![
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        ],
        rewards: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        start: None,
    }
}

pub fn stay_model() -> DenseModel {
    DenseModel::from_spec(&stay_spec(), false).expect("fixture model is valid")
}

/// The classic tiger problem: listen (0), open left (1), open right (2).
pub fn tiger_spec() -> ModelSpec {
    let reset = vec![vec![0.5, 0.5], vec![0.5, 0.5]];
    let blind = vec![vec![0.5, 0.5], vec![0.5, 0.5]];
    ModelSpec {
        discount: 0.95,
        values: ValueType::Reward,
        states: 2,
        actions: 3,
        observations: 2,
        transitions: vec![
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            reset.clone(),
            reset,
        ],
        observation_probs: vec![
            vec![vec![0.85, 0.15], vec![0.15, 0.85]],
            blind.clone(),
            blind,
        ],
        rewards: vec![
            vec![-1.0, -1.0],
            vec![-100.0, 10.0],
            vec![10.0, -100.0],
        ],
        start: Some(vec![0.5, 0.5]),
    }
}

pub fn tiger_model() -> DenseModel {
    DenseModel::from_spec(&tiger_spec(), false).expect("fixture model is valid")
}
