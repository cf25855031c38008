//! Linear programming boundary.
//!
//! Callers build an [`LpProblem`] column by column and row by row, then hand
//! it to any [`LpEngine`]. Engines report a [`LpStatus`] together with the
//! primal values; a non-optimal status is a normal outcome, while an
//! [`LpError`] means the problem itself was malformed.

mod simplex;
pub mod writer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use simplex::{BlandSimplex, DantzigSimplex, SimplexOptions};

/// Bound magnitude treated as infinite.
pub const INFINITE_BOUND: f64 = 1e24;

/// Bounds at or beyond this magnitude are not materialized as constraints.
pub(crate) const BOUND_CUTOFF: f64 = 1e20;

/// Objective direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveSense {
    Maximize,
    Minimize,
}

/// Row relation against the right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSense {
    LessEqual,
    Equal,
    GreaterEqual,
}

impl RowSense {
    pub fn as_symbol(&self) -> &'static str {
        match self {
            RowSense::LessEqual => "<=",
            RowSense::Equal => "=",
            RowSense::GreaterEqual => ">=",
        }
    }
}

/// Terminal status of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
    NumericalFailure,
}

impl std::fmt::Display for LpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LpStatus::Optimal => "optimal",
            LpStatus::Infeasible => "infeasible",
            LpStatus::Unbounded => "unbounded",
            LpStatus::IterationLimit => "iteration_limit",
            LpStatus::NumericalFailure => "numerical_failure",
        };
        write!(f, "{s}")
    }
}

/// Errors from problem construction or engine setup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LpError {
    #[error("column {col} out of range (problem has {num_cols} columns)")]
    ColumnOutOfRange { col: usize, num_cols: usize },

    #[error("solution has {found} values, expected at least {expected}")]
    ShortSolution { expected: usize, found: usize },

    #[error("invalid bounds for column {col}: lower {lower} > upper {upper}")]
    InvalidBounds { col: usize, lower: f64, upper: f64 },

    #[error("non-finite {what} in LP problem")]
    NonFinite { what: &'static str },
}

/// One constraint row in sparse form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpRow {
    pub entries: Vec<(usize, f64)>,
    pub sense: RowSense,
    pub rhs: f64,
}

/// A bounded linear program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpProblem {
    pub name: String,
    pub sense: ObjectiveSense,
    objective: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    rows: Vec<LpRow>,
}

impl LpProblem {
    /// New problem with `num_cols` columns bounded to `[0, INFINITE_BOUND]`.
    pub fn new(name: impl Into<String>, num_cols: usize, sense: ObjectiveSense) -> Self {
        Self {
            name: name.into(),
            sense,
            objective: vec![0.0; num_cols],
            lower: vec![0.0; num_cols],
            upper: vec![INFINITE_BOUND; num_cols],
            rows: Vec::new(),
        }
    }

    pub fn num_cols(&self) -> usize {
        self.objective.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn objective(&self) -> &[f64] {
        &self.objective
    }

    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    pub fn rows(&self) -> &[LpRow] {
        &self.rows
    }

    fn check_col(&self, col: usize) -> Result<(), LpError> {
        if col >= self.num_cols() {
            return Err(LpError::ColumnOutOfRange {
                col,
                num_cols: self.num_cols(),
            });
        }
        Ok(())
    }

    pub fn set_objective(&mut self, col: usize, coef: f64) -> Result<(), LpError> {
        self.check_col(col)?;
        if !coef.is_finite() {
            return Err(LpError::NonFinite { what: "objective" });
        }
        self.objective[col] = coef;
        Ok(())
    }

    /// Set column bounds. Use `-INFINITE_BOUND` / `INFINITE_BOUND` for open ends.
    pub fn set_bounds(&mut self, col: usize, lower: f64, upper: f64) -> Result<(), LpError> {
        self.check_col(col)?;
        if lower.is_nan() || upper.is_nan() {
            return Err(LpError::NonFinite { what: "bound" });
        }
        if lower > upper {
            return Err(LpError::InvalidBounds { col, lower, upper });
        }
        self.lower[col] = lower;
        self.upper[col] = upper;
        Ok(())
    }

    /// Append a row and return its index. Zero entries are kept as given.
    pub fn add_row(
        &mut self,
        entries: Vec<(usize, f64)>,
        sense: RowSense,
        rhs: f64,
    ) -> Result<usize, LpError> {
        for &(col, value) in &entries {
            self.check_col(col)?;
            if !value.is_finite() {
                return Err(LpError::NonFinite { what: "coefficient" });
            }
        }
        if !rhs.is_finite() {
            return Err(LpError::NonFinite { what: "rhs" });
        }
        self.rows.push(LpRow {
            entries,
            sense,
            rhs,
        });
        Ok(self.rows.len() - 1)
    }

    /// Number of stored (structurally non-zero) matrix entries.
    pub fn num_nonzeros(&self) -> usize {
        self.rows.iter().map(|r| r.entries.len()).sum()
    }
}

/// Result of a solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpSolution {
    pub status: LpStatus,
    pub objective_value: f64,
    pub x: Vec<f64>,
    pub iterations: usize,
}

impl LpSolution {
    pub(crate) fn without_point(status: LpStatus, num_cols: usize, iterations: usize) -> Self {
        Self {
            status,
            objective_value: 0.0,
            x: vec![0.0; num_cols],
            iterations,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == LpStatus::Optimal
    }
}

/// A linear programming engine.
pub trait LpEngine {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    fn solve(&self, problem: &LpProblem) -> Result<LpSolution, LpError>;
}

/// Engine selection for configuration files and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LpEngineKind {
    /// Largest reduced cost, falling back to Bland's rule on stalls.
    #[default]
    Dantzig,
    /// Bland's smallest-index rule throughout.
    Bland,
}

impl LpEngineKind {
    pub fn build(self, options: SimplexOptions) -> Box<dyn LpEngine> {
        match self {
            LpEngineKind::Dantzig => Box::new(DantzigSimplex::new(options)),
            LpEngineKind::Bland => Box::new(BlandSimplex::new(options)),
        }
    }
}

impl std::fmt::Display for LpEngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LpEngineKind::Dantzig => write!(f, "dantzig"),
            LpEngineKind::Bland => write!(f, "bland"),
        }
    }
}

impl std::str::FromStr for LpEngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dantzig" => Ok(LpEngineKind::Dantzig),
            "bland" => Ok(LpEngineKind::Bland),
            other => Err(format!("unknown LP engine '{other}' (expected dantzig or bland)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_problem_defaults() {
        let p = LpProblem::new("t", 3, ObjectiveSense::Maximize);
        assert_eq!(p.num_cols(), 3);
        assert_eq!(p.num_rows(), 0);
        assert_eq!(p.lower_bounds(), &[0.0, 0.0, 0.0]);
        assert_eq!(p.upper_bounds()[2], INFINITE_BOUND);
    }

    #[test]
    fn test_add_row_rejects_bad_column() {
        let mut p = LpProblem::new("t", 2, ObjectiveSense::Maximize);
        let err = p
            .add_row(vec![(2, 1.0)], RowSense::LessEqual, 0.0)
            .unwrap_err();
        assert!(matches!(err, LpError::ColumnOutOfRange { col: 2, .. }));
    }

    #[test]
    fn test_set_bounds_rejects_inverted() {
        let mut p = LpProblem::new("t", 1, ObjectiveSense::Minimize);
        assert!(matches!(
            p.set_bounds(0, 2.0, 1.0),
            Err(LpError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!("Bland".parse::<LpEngineKind>().unwrap(), LpEngineKind::Bland);
        assert!("simplex".parse::<LpEngineKind>().is_err());
        assert_eq!(LpEngineKind::default().to_string(), "dantzig");
    }
}
