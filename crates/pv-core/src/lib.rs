//! POMDP Exact Value Iteration Core Library
//!
//! This library provides the solver behind the `pv-core` binary:
//! - Alpha-vector lists, their file format and provenance links
//! - The LP region oracle and the pruning algorithms built on it
//! - Projections, cross-sums and the incremental-pruning backup
//! - The epoch driver, convergence tests and policy graphs
//! - Exit codes and structured logging for the CLI
//!
//! The binary entry point is in `main.rs`.

pub mod alpha;
pub mod backup;
pub mod belief;
pub mod cross_sum;
pub mod exit_codes;
pub mod logging;
pub mod model;
pub mod policy_graph;
pub mod projection;
pub mod prune;
pub mod region;
pub mod solver;
pub mod stop;

pub use alpha::{AlphaList, AlphaNode, NodeHandle, Provenance};
pub use model::{DenseModel, PomdpModel};
pub use policy_graph::PolicyGraph;
pub use solver::{SolveFailure, SolveOutcome, Solver, StopReason};

// Shared fixtures for unit tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
