//! Criterion benchmarks for the `pv-math` simplex engines.
//!
//! Region-style problems dominate solve time during pruning, so that is the
//! shape measured here.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pv_math::{BlandSimplex, DantzigSimplex, LpEngine, LpProblem, ObjectiveSense, RowSense};

fn region_problem(states: usize, competitors: usize) -> LpProblem {
    let mut p = LpProblem::new("bench", states + 1, ObjectiveSense::Maximize);
    p.set_objective(states, 1.0).unwrap();
    for c in 0..states {
        p.set_bounds(c, 0.0, 1.0).unwrap();
    }
    p.add_row((0..states).map(|c| (c, 1.0)).collect(), RowSense::Equal, 1.0)
        .unwrap();
    for k in 0..competitors {
        let mut entries: Vec<(usize, f64)> = (0..states)
            .map(|c| (c, (((k * 31 + c * 17) % 23) as f64 / 23.0) - 0.5))
            .collect();
        entries.push((states, 1.0));
        p.add_row(entries, RowSense::LessEqual, 0.0).unwrap();
    }
    p
}

fn bench_region_lp(c: &mut Criterion) {
    let mut group = c.benchmark_group("region_lp");

    for (states, competitors) in [(2, 8), (4, 32), (8, 64), (16, 128)] {
        let problem = region_problem(states, competitors);
        let label = format!("{states}x{competitors}");

        group.bench_with_input(BenchmarkId::new("dantzig", &label), &problem, |b, p| {
            let engine = DantzigSimplex::default();
            b.iter(|| black_box(engine.solve(black_box(p))));
        });

        group.bench_with_input(BenchmarkId::new("bland", &label), &problem, |b, p| {
            let engine = BlandSimplex::default();
            b.iter(|| black_box(engine.solve(black_box(p))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_region_lp);
criterion_main!(benches);
