//! Dense two-phase tableau simplex.
//!
//! Column bounds are folded into the tableau: finite lower bounds shift the
//! variable, finite upper bounds become explicit rows, and free columns are
//! split into a positive and a negative part. Phase one drives artificial
//! variables to zero; phase two optimizes the real objective over the
//! non-artificial columns.

use serde::{Deserialize, Serialize};

use super::{
    LpEngine, LpError, LpProblem, LpSolution, LpStatus, ObjectiveSense, RowSense, BOUND_CUTOFF,
};

/// Tuning knobs shared by both pivot rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimplexOptions {
    /// Pivot and reduced-cost tolerance.
    pub tolerance: f64,
    /// Relative residual accepted at the end of phase one.
    pub feasibility_tolerance: f64,
    /// Pivot budget per solve; 0 picks a size-dependent limit.
    pub max_iterations: usize,
    /// Consecutive degenerate pivots before Dantzig falls back to Bland.
    pub degenerate_limit: usize,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            feasibility_tolerance: 1e-9,
            max_iterations: 0,
            degenerate_limit: 50,
        }
    }
}

impl SimplexOptions {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self.feasibility_tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Largest reduced cost entering rule.
#[derive(Debug, Clone, Default)]
pub struct DantzigSimplex {
    options: SimplexOptions,
}

impl DantzigSimplex {
    pub fn new(options: SimplexOptions) -> Self {
        Self { options }
    }
}

impl LpEngine for DantzigSimplex {
    fn name(&self) -> &'static str {
        "dantzig"
    }

    fn solve(&self, problem: &LpProblem) -> Result<LpSolution, LpError> {
        solve_with_rule(problem, &self.options, PivotRule::Dantzig)
    }
}

/// Smallest-index entering and leaving rule. Never cycles, usually slower.
#[derive(Debug, Clone, Default)]
pub struct BlandSimplex {
    options: SimplexOptions,
}

impl BlandSimplex {
    pub fn new(options: SimplexOptions) -> Self {
        Self { options }
    }
}

impl LpEngine for BlandSimplex {
    fn name(&self) -> &'static str {
        "bland"
    }

    fn solve(&self, problem: &LpProblem) -> Result<LpSolution, LpError> {
        solve_with_rule(problem, &self.options, PivotRule::Bland)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PivotRule {
    Dantzig,
    Bland,
}

/// How an original column is recovered from tableau variables.
#[derive(Debug, Clone, Copy)]
enum ColumnMap {
    Shifted { lower: f64, var: usize },
    Mirrored { upper: f64, var: usize },
    Split { pos: usize, neg: usize },
}

struct StandardForm {
    rows: Vec<Vec<f64>>,
    rhs: Vec<f64>,
    senses: Vec<RowSense>,
    cost: Vec<f64>,
    map: Vec<ColumnMap>,
    num_vars: usize,
}

fn standardize(problem: &LpProblem) -> StandardForm {
    let lower = problem.lower_bounds();
    let upper = problem.upper_bounds();
    let mut map = Vec::with_capacity(problem.num_cols());
    let mut num_vars = 0;
    let mut upper_rows = Vec::new();

    for col in 0..problem.num_cols() {
        let lo_finite = lower[col] > -BOUND_CUTOFF;
        let hi_finite = upper[col] < BOUND_CUTOFF;
        if lo_finite {
            map.push(ColumnMap::Shifted {
                lower: lower[col],
                var: num_vars,
            });
            if hi_finite {
                upper_rows.push((num_vars, upper[col] - lower[col]));
            }
            num_vars += 1;
        } else if hi_finite {
            map.push(ColumnMap::Mirrored {
                upper: upper[col],
                var: num_vars,
            });
            num_vars += 1;
        } else {
            map.push(ColumnMap::Split {
                pos: num_vars,
                neg: num_vars + 1,
            });
            num_vars += 2;
        }
    }

    let sign = match problem.sense {
        ObjectiveSense::Maximize => 1.0,
        ObjectiveSense::Minimize => -1.0,
    };
    let mut cost = vec![0.0; num_vars];
    for (col, &c) in problem.objective().iter().enumerate() {
        let c = sign * c;
        match map[col] {
            ColumnMap::Shifted { var, .. } => cost[var] += c,
            ColumnMap::Mirrored { var, .. } => cost[var] -= c,
            ColumnMap::Split { pos, neg } => {
                cost[pos] += c;
                cost[neg] -= c;
            }
        }
    }

    let mut rows = Vec::with_capacity(problem.num_rows() + upper_rows.len());
    let mut rhs = Vec::with_capacity(rows.capacity());
    let mut senses = Vec::with_capacity(rows.capacity());

    for row in problem.rows() {
        let mut dense = vec![0.0; num_vars];
        let mut b = row.rhs;
        for &(col, value) in &row.entries {
            match map[col] {
                ColumnMap::Shifted { lower, var } => {
                    dense[var] += value;
                    b -= value * lower;
                }
                ColumnMap::Mirrored { upper, var } => {
                    dense[var] -= value;
                    b -= value * upper;
                }
                ColumnMap::Split { pos, neg } => {
                    dense[pos] += value;
                    dense[neg] -= value;
                }
            }
        }
        rows.push(dense);
        rhs.push(b);
        senses.push(row.sense);
    }

    for (var, width) in upper_rows {
        let mut dense = vec![0.0; num_vars];
        dense[var] = 1.0;
        rows.push(dense);
        rhs.push(width);
        senses.push(RowSense::LessEqual);
    }

    for i in 0..rows.len() {
        if rhs[i] < 0.0 {
            rhs[i] = -rhs[i];
            for v in rows[i].iter_mut() {
                *v = -*v;
            }
            senses[i] = match senses[i] {
                RowSense::LessEqual => RowSense::GreaterEqual,
                RowSense::GreaterEqual => RowSense::LessEqual,
                RowSense::Equal => RowSense::Equal,
            };
        }
    }

    StandardForm {
        rows,
        rhs,
        senses,
        cost,
        map,
        num_vars,
    }
}

struct Tableau {
    t: Vec<Vec<f64>>,
    basis: Vec<usize>,
    num_cols: usize,
    artificial_start: usize,
}

enum PhaseOutcome {
    Optimal,
    Unbounded,
    IterationLimit,
    NumericalFailure,
}

impl Tableau {
    fn build(form: &StandardForm) -> Self {
        let m = form.rows.len();
        let num_slacks = form
            .senses
            .iter()
            .filter(|s| **s != RowSense::Equal)
            .count();
        let num_artificials = form
            .senses
            .iter()
            .filter(|s| **s != RowSense::LessEqual)
            .count();
        let artificial_start = form.num_vars + num_slacks;
        let num_cols = artificial_start + num_artificials;

        let mut t = vec![vec![0.0; num_cols + 1]; m];
        let mut basis = vec![0; m];
        let mut next_slack = form.num_vars;
        let mut next_artificial = artificial_start;

        for i in 0..m {
            t[i][..form.num_vars].copy_from_slice(&form.rows[i]);
            t[i][num_cols] = form.rhs[i];
            match form.senses[i] {
                RowSense::LessEqual => {
                    t[i][next_slack] = 1.0;
                    basis[i] = next_slack;
                    next_slack += 1;
                }
                RowSense::GreaterEqual => {
                    t[i][next_slack] = -1.0;
                    next_slack += 1;
                    t[i][next_artificial] = 1.0;
                    basis[i] = next_artificial;
                    next_artificial += 1;
                }
                RowSense::Equal => {
                    t[i][next_artificial] = 1.0;
                    basis[i] = next_artificial;
                    next_artificial += 1;
                }
            }
        }

        Self {
            t,
            basis,
            num_cols,
            artificial_start,
        }
    }

    fn rhs(&self, row: usize) -> f64 {
        self.t[row][self.num_cols]
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let p = self.t[row][col];
        for v in self.t[row].iter_mut() {
            *v /= p;
        }
        let pivot_row = self.t[row].clone();
        for (i, r) in self.t.iter_mut().enumerate() {
            if i == row {
                continue;
            }
            let factor = r[col];
            if factor != 0.0 {
                for (v, pv) in r.iter_mut().zip(&pivot_row) {
                    *v -= factor * pv;
                }
                r[col] = 0.0;
            }
        }
        self.basis[row] = col;
    }

    fn reduced_cost(&self, cost: &[f64], col: usize) -> f64 {
        let mut d = cost[col];
        for (i, &b) in self.basis.iter().enumerate() {
            let cb = cost[b];
            if cb != 0.0 {
                d -= cb * self.t[i][col];
            }
        }
        d
    }

    fn optimize(
        &mut self,
        cost: &[f64],
        allowed_cols: usize,
        rule: PivotRule,
        options: &SimplexOptions,
        iterations: &mut usize,
        max_iterations: usize,
    ) -> PhaseOutcome {
        let tol = options.tolerance;
        let mut degenerate_streak = 0usize;

        loop {
            let use_bland =
                rule == PivotRule::Bland || degenerate_streak >= options.degenerate_limit;

            let mut entering = None;
            let mut best = tol;
            for col in 0..allowed_cols {
                if self.basis.contains(&col) {
                    continue;
                }
                let d = self.reduced_cost(cost, col);
                if d > best {
                    entering = Some(col);
                    if use_bland {
                        break;
                    }
                    best = d;
                }
            }
            let Some(col) = entering else {
                return PhaseOutcome::Optimal;
            };

            let mut leaving: Option<(usize, f64)> = None;
            for row in 0..self.t.len() {
                let a = self.t[row][col];
                if a <= tol {
                    continue;
                }
                let ratio = self.rhs(row).max(0.0) / a;
                leaving = match leaving {
                    None => Some((row, ratio)),
                    Some((r, best_ratio)) => {
                        if ratio < best_ratio - tol
                            || (ratio <= best_ratio + tol && self.basis[row] < self.basis[r])
                        {
                            Some((row, ratio))
                        } else {
                            Some((r, best_ratio))
                        }
                    }
                };
            }
            let Some((row, step)) = leaving else {
                return PhaseOutcome::Unbounded;
            };

            if *iterations >= max_iterations {
                return PhaseOutcome::IterationLimit;
            }
            if step <= tol {
                degenerate_streak += 1;
            } else {
                degenerate_streak = 0;
            }

            self.pivot(row, col);
            *iterations += 1;

            if self.t.iter().any(|r| !r[self.num_cols].is_finite()) {
                return PhaseOutcome::NumericalFailure;
            }
        }
    }
}

fn solve_with_rule(
    problem: &LpProblem,
    options: &SimplexOptions,
    rule: PivotRule,
) -> Result<LpSolution, LpError> {
    let n = problem.num_cols();
    if problem.objective().iter().any(|c| !c.is_finite()) {
        return Err(LpError::NonFinite { what: "objective" });
    }

    let form = standardize(problem);
    let mut tableau = Tableau::build(&form);
    let m = tableau.t.len();
    let max_iterations = if options.max_iterations == 0 {
        50 * (m + tableau.num_cols) + 1000
    } else {
        options.max_iterations
    };
    let mut iterations = 0usize;

    let status_only = |status: LpStatus, iterations: usize| -> Result<LpSolution, LpError> {
        Ok(LpSolution::without_point(status, n, iterations))
    };

    // Phase one.
    if tableau.artificial_start < tableau.num_cols {
        let mut phase1_cost = vec![0.0; tableau.num_cols];
        for c in phase1_cost.iter_mut().skip(tableau.artificial_start) {
            *c = -1.0;
        }
        match tableau.optimize(
            &phase1_cost,
            tableau.num_cols,
            rule,
            options,
            &mut iterations,
            max_iterations,
        ) {
            PhaseOutcome::Optimal => {}
            PhaseOutcome::IterationLimit => return status_only(LpStatus::IterationLimit, iterations),
            PhaseOutcome::Unbounded | PhaseOutcome::NumericalFailure => {
                return status_only(LpStatus::NumericalFailure, iterations)
            }
        }

        let residual: f64 = (0..m)
            .filter(|&i| tableau.basis[i] >= tableau.artificial_start)
            .map(|i| tableau.rhs(i).abs())
            .sum();
        let scale = 1.0 + form.rhs.iter().fold(0.0f64, |acc, b| acc.max(b.abs()));
        if residual > options.feasibility_tolerance * scale {
            return status_only(LpStatus::Infeasible, iterations);
        }

        // Drive zero-valued artificials out of the basis where a real column can replace them.
        for row in 0..m {
            if tableau.basis[row] < tableau.artificial_start {
                continue;
            }
            let replacement = (0..tableau.artificial_start)
                .find(|&c| tableau.t[row][c].abs() > options.tolerance);
            if let Some(col) = replacement {
                tableau.pivot(row, col);
            }
        }
    }

    // Phase two.
    let mut phase2_cost = vec![0.0; tableau.num_cols];
    phase2_cost[..form.num_vars].copy_from_slice(&form.cost);
    let allowed = tableau.artificial_start;
    match tableau.optimize(
        &phase2_cost,
        allowed,
        rule,
        options,
        &mut iterations,
        max_iterations,
    ) {
        PhaseOutcome::Optimal => {}
        PhaseOutcome::Unbounded => return status_only(LpStatus::Unbounded, iterations),
        PhaseOutcome::IterationLimit => return status_only(LpStatus::IterationLimit, iterations),
        PhaseOutcome::NumericalFailure => {
            return status_only(LpStatus::NumericalFailure, iterations)
        }
    }

    let mut y = vec![0.0; form.num_vars];
    for (row, &b) in tableau.basis.iter().enumerate() {
        if b < form.num_vars {
            y[b] = tableau.rhs(row).max(0.0);
        }
    }
    let x: Vec<f64> = form
        .map
        .iter()
        .map(|m| match *m {
            ColumnMap::Shifted { lower, var } => lower + y[var],
            ColumnMap::Mirrored { upper, var } => upper - y[var],
            ColumnMap::Split { pos, neg } => y[pos] - y[neg],
        })
        .collect();
    let objective_value = problem
        .objective()
        .iter()
        .zip(&x)
        .map(|(c, v)| c * v)
        .sum();

    if x.iter().any(|v| !v.is_finite()) {
        return status_only(LpStatus::NumericalFailure, iterations);
    }

    Ok(LpSolution {
        status: LpStatus::Optimal,
        objective_value,
        x,
        iterations,
    })
}
