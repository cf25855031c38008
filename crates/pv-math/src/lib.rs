//! POMDP value iteration math utilities.
//!
//! Tolerance-aware scalar comparisons, small vector kernels, and the
//! linear programming engines used by the region oracle.

pub mod lp;
pub mod math;

pub use lp::{
    BlandSimplex, DantzigSimplex, LpEngine, LpEngineKind, LpError, LpProblem, LpSolution,
    LpStatus, ObjectiveSense, RowSense, SimplexOptions, INFINITE_BOUND,
};
pub use math::compare::*;
pub use math::linalg::*;
