//! LP region oracle.
//!
//! Given a candidate vector and a reference list, find a belief where the
//! candidate beats every reference vector, together with the margin it wins
//! by. This is the only place pruning and the Bellman residual touch the LP
//! engine.

use std::path::PathBuf;

use pv_config::RegionLp;
use pv_math::lp::writer::write_lp_file;
use pv_math::{equal, LpEngine, LpError, LpProblem, LpStatus, ObjectiveSense, RowSense, INFINITE_BOUND};
use serde::Serialize;
use thiserror::Error;

use crate::alpha::vector::unit;
use crate::alpha::AlphaList;
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};

/// File the failing LP is written to before a fatal error.
pub const ABORT_LP_FILE: &str = "abort.lp";

#[derive(Debug, Error)]
pub enum RegionError {
    #[error("LP engine error: {0}")]
    Setup(#[from] LpError),

    #[error("LP solve ended with status {status}")]
    Fatal {
        status: LpStatus,
        dump_path: Option<PathBuf>,
    },

    #[error("vector has {found} components, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

impl From<RegionError> for pv_common::Error {
    fn from(err: RegionError) -> Self {
        match err {
            RegionError::Setup(e) => pv_common::Error::LpSetup(e.to_string()),
            RegionError::Fatal { status, dump_path } => pv_common::Error::LpFailure {
                status: status.to_string(),
                dump_path: dump_path.map(|p| p.display().to_string()),
            },
            RegionError::DimensionMismatch { expected, found } => {
                pv_common::Error::DimensionMismatch { expected, found }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, RegionError>;

/// A belief where a vector is strictly best, and by how much.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPoint {
    pub witness: Vec<f64>,
    pub margin: f64,
}

/// Counters kept across queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegionStats {
    pub queries: u64,
    pub lp_solves: u64,
    pub lp_iterations: u64,
    pub infeasible: u64,
    pub unbounded: u64,
    pub witnesses: u64,
}

/// Build the region LP for `alpha` against `list`.
///
/// Column layout: belief `x[0..N]`, then delta at column `N`. The new
/// formulation adds the split value variables `v1`, `v2` at `N+1` and `N+2`.
pub fn build_region_lp(
    formulation: RegionLp,
    alpha: &[f64],
    list: &AlphaList,
    sparse_epsilon: f64,
) -> Result<LpProblem> {
    let n = alpha.len();
    for node in list.iter() {
        if node.alpha.len() != n {
            return Err(RegionError::DimensionMismatch {
                expected: n,
                found: node.alpha.len(),
            });
        }
    }
    let delta = n;
    let simplex_row: Vec<(usize, f64)> = (0..n).map(|i| (i, 1.0)).collect();

    let problem = match formulation {
        RegionLp::New => {
            let (v1, v2) = (n + 1, n + 2);
            let mut lp = LpProblem::new("region", n + 3, ObjectiveSense::Maximize);
            for i in 0..n {
                lp.set_bounds(i, 0.0, 1.0)?;
            }
            lp.set_bounds(delta, 0.0, INFINITE_BOUND)?;
            lp.set_bounds(v1, 0.0, INFINITE_BOUND)?;
            lp.set_bounds(v2, 0.0, INFINITE_BOUND)?;
            lp.set_objective(delta, 1.0)?;

            lp.add_row(simplex_row, RowSense::Equal, 1.0)?;

            let mut value_row = sparse_entries(alpha, sparse_epsilon);
            value_row.push((v1, -1.0));
            value_row.push((v2, 1.0));
            lp.add_row(value_row, RowSense::Equal, 0.0)?;

            for node in list.iter() {
                let mut row = sparse_entries(&node.alpha, sparse_epsilon);
                row.push((delta, 1.0));
                row.push((v1, -1.0));
                row.push((v2, 1.0));
                lp.add_row(row, RowSense::LessEqual, 0.0)?;
            }
            lp
        }
        RegionLp::Old => {
            let mut lp = LpProblem::new("region", n + 1, ObjectiveSense::Maximize);
            for i in 0..n {
                lp.set_bounds(i, 0.0, 1.0)?;
            }
            lp.set_bounds(delta, 0.0, INFINITE_BOUND)?;
            lp.set_objective(delta, 1.0)?;

            lp.add_row(simplex_row, RowSense::Equal, 1.0)?;
            for node in list.iter() {
                let diff: Vec<f64> = node.alpha.iter().zip(alpha).map(|(o, a)| o - a).collect();
                let mut row = sparse_entries(&diff, sparse_epsilon);
                row.push((delta, 1.0));
                lp.add_row(row, RowSense::LessEqual, 0.0)?;
            }
            lp
        }
    };
    Ok(problem)
}

fn sparse_entries(values: &[f64], sparse_epsilon: f64) -> Vec<(usize, f64)> {
    values
        .iter()
        .enumerate()
        .filter(|&(_, &v)| !equal(v, 0.0, sparse_epsilon))
        .map(|(i, &v)| (i, v))
        .collect()
}

/// Region queries against one LP engine.
pub struct RegionOracle {
    engine: Box<dyn LpEngine>,
    formulation: RegionLp,
    sparse_epsilon: f64,
    dump_path: PathBuf,
    stats: RegionStats,
    ctx: LogContext,
}

impl RegionOracle {
    pub fn new(
        engine: Box<dyn LpEngine>,
        formulation: RegionLp,
        sparse_epsilon: f64,
        ctx: LogContext,
    ) -> Self {
        RegionOracle {
            engine,
            formulation,
            sparse_epsilon,
            dump_path: PathBuf::from(ABORT_LP_FILE),
            stats: RegionStats::default(),
            ctx,
        }
    }

    /// Where to write the failing LP.
    pub fn with_dump_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dump_path = path.into();
        self
    }

    pub fn stats(&self) -> RegionStats {
        self.stats
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Find a belief where `alpha` beats every vector of `list` by at least
    /// `epsilon`.
    ///
    /// An empty list yields the first simplex corner with an infinite margin
    /// and no LP solve.
    pub fn find_region_point(
        &mut self,
        alpha: &[f64],
        list: &AlphaList,
        epsilon: f64,
    ) -> Result<Option<RegionPoint>> {
        self.stats.queries += 1;
        let n = alpha.len();
        if list.is_empty() {
            self.stats.witnesses += 1;
            return Ok(Some(RegionPoint {
                witness: unit(n, 0),
                margin: f64::INFINITY,
            }));
        }

        let problem = build_region_lp(self.formulation, alpha, list, self.sparse_epsilon)?;
        let solution = self.engine.solve(&problem)?;
        self.stats.lp_solves += 1;
        self.stats.lp_iterations += solution.iterations as u64;

        match solution.status {
            LpStatus::Optimal => {}
            LpStatus::Infeasible => {
                self.stats.infeasible += 1;
                return Ok(None);
            }
            LpStatus::Unbounded => {
                self.stats.unbounded += 1;
                log_event!(
                    self.ctx,
                    WARN,
                    event_names::LP_UNBOUNDED,
                    Stage::Prune,
                    "region LP unbounded; treating as no region",
                    engine = self.engine.name(),
                    rows = problem.num_rows() as u64
                );
                return Ok(None);
            }
            status => {
                let dump_path = match write_lp_file(&problem, &self.dump_path) {
                    Ok(()) => {
                        log_event!(
                            self.ctx,
                            ERROR,
                            event_names::LP_ABORT_DUMPED,
                            Stage::Prune,
                            "failing LP written",
                            status = %status,
                            path = %self.dump_path.display()
                        );
                        Some(self.dump_path.clone())
                    }
                    Err(e) => {
                        log_event!(
                            self.ctx,
                            ERROR,
                            event_names::LP_ABORT_DUMPED,
                            Stage::Prune,
                            "could not write failing LP",
                            status = %status,
                            error = %e
                        );
                        None
                    }
                };
                return Err(RegionError::Fatal { status, dump_path });
            }
        }

        let (Some(witness), Some(&delta)) = (solution.x.get(..n), solution.x.get(n)) else {
            return Err(LpError::ShortSolution {
                expected: n + 1,
                found: solution.x.len(),
            }
            .into());
        };
        if solution.objective_value < epsilon || delta < epsilon {
            return Ok(None);
        }
        self.stats.witnesses += 1;
        Ok(Some(RegionPoint {
            witness: witness.to_vec(),
            margin: solution.objective_value,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{list, oracle};
    use pv_math::LpSolution;
    use std::cell::Cell;
    use std::rc::Rc;

    const EPS: f64 = 1e-9;

    /// Engine that always returns one status and counts calls.
    struct FixedEngine {
        status: LpStatus,
        calls: Rc<Cell<usize>>,
    }

    impl LpEngine for FixedEngine {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn solve(&self, problem: &LpProblem) -> std::result::Result<LpSolution, LpError> {
            self.calls.set(self.calls.get() + 1);
            Ok(LpSolution {
                status: self.status,
                objective_value: 0.0,
                x: vec![0.0; problem.num_cols()],
                iterations: 0,
            })
        }
    }

    #[test]
    fn test_empty_list_no_lp_call() {
        let calls = Rc::new(Cell::new(0));
        let mut o = RegionOracle::new(
            Box::new(FixedEngine {
                status: LpStatus::Optimal,
                calls: calls.clone(),
            }),
            RegionLp::New,
            EPS,
            LogContext::new("run-test"),
        );
        let point = o
            .find_region_point(&[0.3, 0.7, 0.1], &AlphaList::new(), EPS)
            .unwrap()
            .unwrap();
        assert_eq!(point.witness, vec![1.0, 0.0, 0.0]);
        assert!(point.margin.is_infinite());
        assert_eq!(calls.get(), 0);
        assert_eq!(o.stats().lp_solves, 0);
    }

    #[test]
    fn test_region_found_both_formulations() {
        for formulation in [RegionLp::New, RegionLp::Old] {
            let mut o = oracle(formulation);
            let refs = list(&[&[0.0, 1.0]]);
            let point = o.find_region_point(&[1.0, 0.0], &refs, EPS).unwrap().unwrap();
            assert!((point.margin - 1.0).abs() < 1e-6, "{formulation}: {}", point.margin);
            assert!((point.witness[0] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_no_region_when_dominated() {
        for formulation in [RegionLp::New, RegionLp::Old] {
            let mut o = oracle(formulation);
            let refs = list(&[&[1.0, 0.0], &[0.0, 1.0]]);
            assert!(o.find_region_point(&[0.4, 0.4], &refs, EPS).unwrap().is_none());
        }
    }

    #[test]
    fn test_no_region_for_duplicate() {
        let mut o = oracle(RegionLp::New);
        let refs = list(&[&[0.5, 0.5]]);
        assert!(o.find_region_point(&[0.5, 0.5], &refs, EPS).unwrap().is_none());
    }

    #[test]
    fn test_margin_in_middle() {
        // [0.6,0.6] beats both corners' vectors best at the uniform belief
        let mut o = oracle(RegionLp::New);
        let refs = list(&[&[1.0, 0.0], &[0.0, 1.0]]);
        let point = o.find_region_point(&[0.6, 0.6], &refs, EPS).unwrap().unwrap();
        assert!((point.margin - 0.1).abs() < 1e-6);
        assert!((point.witness[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_unbounded_counts_and_returns_none() {
        let calls = Rc::new(Cell::new(0));
        let mut o = RegionOracle::new(
            Box::new(FixedEngine {
                status: LpStatus::Unbounded,
                calls: calls.clone(),
            }),
            RegionLp::New,
            EPS,
            LogContext::new("run-test"),
        );
        let refs = list(&[&[0.0, 1.0]]);
        assert!(o.find_region_point(&[1.0, 0.0], &refs, EPS).unwrap().is_none());
        assert_eq!(o.stats().unbounded, 1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_fatal_status_dumps_lp() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("abort.lp");
        let mut o = RegionOracle::new(
            Box::new(FixedEngine {
                status: LpStatus::NumericalFailure,
                calls: Rc::new(Cell::new(0)),
            }),
            RegionLp::Old,
            EPS,
            LogContext::new("run-test"),
        )
        .with_dump_path(&dump);
        let refs = list(&[&[0.0, 1.0]]);
        let err = o.find_region_point(&[1.0, 0.0], &refs, EPS).unwrap_err();
        match err {
            RegionError::Fatal { status, dump_path } => {
                assert_eq!(status, LpStatus::NumericalFailure);
                assert_eq!(dump_path.as_deref(), Some(dump.as_path()));
            }
            other => panic!("unexpected {other:?}"),
        }
        let text = std::fs::read_to_string(&dump).unwrap();
        assert!(text.contains("Maximize"));
    }

    /// Engine that claims optimality but returns too few values.
    struct TruncatingEngine;

    impl LpEngine for TruncatingEngine {
        fn name(&self) -> &'static str {
            "truncating"
        }

        fn solve(&self, _problem: &LpProblem) -> std::result::Result<LpSolution, LpError> {
            Ok(LpSolution {
                status: LpStatus::Optimal,
                objective_value: 1.0,
                x: vec![0.5],
                iterations: 1,
            })
        }
    }

    #[test]
    fn test_short_solution_is_an_error() {
        let mut o = RegionOracle::new(
            Box::new(TruncatingEngine),
            RegionLp::New,
            EPS,
            LogContext::new("run-test"),
        );
        let refs = list(&[&[0.0, 1.0]]);
        let err = o.find_region_point(&[1.0, 0.0], &refs, EPS).unwrap_err();
        assert!(matches!(
            err,
            RegionError::Setup(LpError::ShortSolution { expected: 3, found: 1 })
        ));
        let unified: pv_common::Error = err.into();
        assert_eq!(unified.category(), pv_common::ErrorCategory::Lp);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut o = oracle(RegionLp::New);
        let refs = list(&[&[0.0, 1.0, 2.0]]);
        assert!(matches!(
            o.find_region_point(&[1.0, 0.0], &refs, EPS),
            Err(RegionError::DimensionMismatch { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn test_lp_shape() {
        let refs = list(&[&[0.0, 1.0], &[1.0, 0.0]]);
        let lp = build_region_lp(RegionLp::New, &[0.5, 0.5], &refs, EPS).unwrap();
        assert_eq!(lp.num_cols(), 5);
        assert_eq!(lp.num_rows(), 4);
        let lp = build_region_lp(RegionLp::Old, &[0.5, 0.5], &refs, EPS).unwrap();
        assert_eq!(lp.num_cols(), 3);
        assert_eq!(lp.num_rows(), 3);
    }

    #[test]
    fn test_sparse_entries_skip_zeros() {
        let refs = list(&[&[0.0, 1.0]]);
        let lp = build_region_lp(RegionLp::New, &[0.0, 0.0], &refs, EPS).unwrap();
        // Value row keeps only v1 and v2
        assert_eq!(lp.rows()[1].entries.len(), 2);
        // Reference row: one belief entry plus delta, v1, v2
        assert_eq!(lp.rows()[2].entries.len(), 4);
    }
}
