//! Benchmarks for one [`Solver`]'s hill-climbing iteration: tournament
//! selection, neighbour generation, and the tiered pretest/sample/full
//! evaluation cascade.

use criterion::{criterion_group, criterion_main, Criterion};

use symreg_core::config::{CodeSettings, Config, ConstSettings, FitParams, Metric};
use symreg_core::dataset::Dataset;
use symreg_core::hillclimb::Solver;

fn config(pop_size: u32) -> Config {
    Config {
        random_seed: 42,
        num_threads: 1,
        population_size: pop_size,
        transformation: 0,
        clip_min: 0.0,
        clip_max: 0.0,
        init_const_settings: ConstSettings {
            min: -4.0,
            max: 4.0,
            predefined_prob: 0.0,
            predefined_set: vec![],
        },
        code_settings: CodeSettings {
            input_size: 2,
            const_size: 4,
            min_code_size: 2,
            max_code_size: 12,
        },
    }
}

fn fit_params(iter_limit: u64) -> FitParams {
    FitParams {
        time_limit_ms: 0,
        verbose: 0,
        tournament: 3,
        metric: Metric::Mse,
        pretest_size: 4,
        sample_size: 8,
        neighbours_count: 8,
        alpha: 0.05,
        beta: 0.0,
        iter_limit,
        const_settings: ConstSettings {
            min: -4.0,
            max: 4.0,
            predefined_prob: 0.0,
            predefined_set: vec![],
        },
        instruction_probs: symreg_core::instructions::ADVANCED_MATH.to_vec(),
        feature_probs: None,
        cw0: 1.0,
        cw1: 1.0,
    }
}

fn dataset(rows: usize) -> Dataset<f64> {
    let mut x = Vec::with_capacity(rows * 2);
    let mut y = Vec::with_capacity(rows);
    for i in 0..rows {
        let a = i as f64 * 0.01;
        let b = (i as f64 * 0.07).cos();
        x.push(a);
        x.push(b);
        y.push(2.0 * a + 0.5 * b);
    }
    Dataset::from_rows(&x, &y, rows, 2, None, 7)
}

fn bench_solver_iterations(c: &mut Criterion) {
    let data = dataset(1024);
    let fp = fit_params(2_000);

    let mut group = c.benchmark_group("solver");
    group.sample_size(10);
    group.bench_function("fit_2000_iterations", |b| {
        b.iter(|| {
            let mut solver: Solver<f64> = Solver::new(config(8), 123);
            solver.fit(&data, &fp, |_, _| {})
        })
    });
    group.finish();
}

criterion_group!(benches, bench_solver_iterations);
criterion_main!(benches);
