//! CPLEX LP text output, used to dump problems that an engine could not solve.

use std::fmt::Write as _;
use std::io;
use std::path::Path;

use super::{LpProblem, ObjectiveSense, BOUND_CUTOFF};

fn term(out: &mut String, first: &mut bool, coef: f64, col: usize) {
    if *first {
        let _ = write!(out, " {coef} x{col}");
        *first = false;
    } else if coef < 0.0 {
        let _ = write!(out, " - {} x{col}", -coef);
    } else {
        let _ = write!(out, " + {coef} x{col}");
    }
}

/// Render `problem` in CPLEX LP format.
pub fn to_lp_string(problem: &LpProblem) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\\ Problem: {}", problem.name);
    let _ = writeln!(
        out,
        "{}",
        match problem.sense {
            ObjectiveSense::Maximize => "Maximize",
            ObjectiveSense::Minimize => "Minimize",
        }
    );

    out.push_str(" obj:");
    let mut first = true;
    for (col, &c) in problem.objective().iter().enumerate() {
        if c != 0.0 {
            term(&mut out, &mut first, c, col);
        }
    }
    if first {
        out.push_str(" 0 x0");
    }
    out.push('\n');

    out.push_str("Subject To\n");
    for (i, row) in problem.rows().iter().enumerate() {
        let _ = write!(out, " c{i}:");
        let mut first = true;
        for &(col, v) in &row.entries {
            term(&mut out, &mut first, v, col);
        }
        if first {
            out.push_str(" 0 x0");
        }
        let _ = writeln!(out, " {} {}", row.sense.as_symbol(), row.rhs);
    }

    out.push_str("Bounds\n");
    for col in 0..problem.num_cols() {
        let lo = problem.lower_bounds()[col];
        let hi = problem.upper_bounds()[col];
        let lo_open = lo <= -BOUND_CUTOFF;
        let hi_open = hi >= BOUND_CUTOFF;
        match (lo_open, hi_open) {
            (true, true) => {
                let _ = writeln!(out, " x{col} free");
            }
            (true, false) => {
                let _ = writeln!(out, " -inf <= x{col} <= {hi}");
            }
            (false, true) => {
                let _ = writeln!(out, " x{col} >= {lo}");
            }
            (false, false) => {
                let _ = writeln!(out, " {lo} <= x{col} <= {hi}");
            }
        }
    }
    out.push_str("End\n");
    out
}

/// Write `problem` to `path` in CPLEX LP format.
pub fn write_lp_file(problem: &LpProblem, path: &Path) -> io::Result<()> {
    std::fs::write(path, to_lp_string(problem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp::{RowSense, INFINITE_BOUND};

    #[test]
    fn test_lp_text_sections() {
        let mut p = LpProblem::new("region", 3, ObjectiveSense::Maximize);
        p.set_objective(2, 1.0).unwrap();
        p.set_bounds(0, 0.0, 1.0).unwrap();
        p.set_bounds(1, 0.0, 1.0).unwrap();
        p.add_row(vec![(0, 1.0), (1, 1.0)], RowSense::Equal, 1.0)
            .unwrap();
        p.add_row(vec![(0, 0.5), (1, -0.5), (2, 1.0)], RowSense::LessEqual, 0.0)
            .unwrap();

        let text = to_lp_string(&p);
        assert!(text.starts_with("\\ Problem: region\nMaximize\n obj: 1 x2\n"));
        assert!(text.contains(" c0: 1 x0 + 1 x1 = 1\n"));
        assert!(text.contains(" c1: 0.5 x0 - 0.5 x1 + 1 x2 <= 0\n"));
        assert!(text.contains(" 0 <= x0 <= 1\n"));
        assert!(text.contains(" x2 >= 0\n"));
        assert!(text.ends_with("End\n"));
    }

    #[test]
    fn test_free_bounds() {
        let mut p = LpProblem::new("free", 1, ObjectiveSense::Minimize);
        p.set_bounds(0, -INFINITE_BOUND, INFINITE_BOUND).unwrap();
        let text = to_lp_string(&p);
        assert!(text.contains("Minimize\n obj: 0 x0\n"));
        assert!(text.contains(" x0 free\n"));
    }

    #[test]
    fn test_write_lp_file() {
        let dir = std::env::temp_dir().join(format!("pv-math-lp-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("abort.lp");
        let p = LpProblem::new("dump", 1, ObjectiveSense::Maximize);
        write_lp_file(&p, &path).unwrap();
        let read = std::fs::read_to_string(&path).unwrap();
        assert!(read.contains("Problem: dump"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
