//! The facade: owns one [`crate::hillclimb::Solver`] per worker thread and
//! exposes the `fit`/`predict`/model-introspection operations the FFI
//! surface calls into.

use crate::code::Scalar;
use crate::config::{Config, FitParams};
use crate::correlation::xicor;
use crate::dataset::Dataset;
use crate::error::{SymRegError, SymRegResult};
use crate::format::{format_infix, format_numpy};
use crate::hillclimb::{EvaluatedCode, Solver};
use crate::rand::RandomEngine;
use crate::validation::validate_fit_shapes;

/// A trained program in a caller-friendly shape: its score, the infix and
/// external-codegen renderings, and the constants it actually uses.
#[derive(Debug, Clone)]
pub struct MathModel {
    pub score: f64,
    pub partial_score: f64,
    pub expression: String,
    pub generated_code: String,
    pub used_constants: Vec<f64>,
}

/// Owns `config.num_threads` independent [`Solver`]s, each seeded
/// deterministically from `config.random_seed` by drawing one `u64` per
/// solver from a single `RandomEngine` — mirroring `CreateSolver`'s
/// per-thread seeding.
pub struct Engine<T: Scalar> {
    config: Config,
    solvers: Vec<Solver<T>>,
}

impl<T: Scalar> Engine<T> {
    pub fn new(config: Config) -> Self {
        let mut re = RandomEngine::new();
        re.seed(config.random_seed);
        let solvers = (0..config.num_threads.max(1))
            .map(|_| Solver::new(config.clone(), re.next_u64()))
            .collect();
        Engine { config, solvers }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fits every solver's population against `(x, y[, sample_weight])`
    /// concurrently, with no shared mutable state across solvers. `x` is
    /// row-major, `rows * cols` long; `cols` must equal
    /// `config.code_settings.input_size`.
    pub fn fit(
        &mut self,
        x: &[f64],
        y: &[f64],
        rows: usize,
        cols: usize,
        mut fit_params: FitParams,
        sample_weight: Option<&[f64]>,
    ) -> SymRegResult<f64> {
        validate_fit_shapes(
            rows,
            cols,
            self.config.code_settings.input_size as usize,
            sample_weight.map(|w| w.len()),
        )?;

        if fit_params.feature_probs.is_none() {
            let mut probs = Vec::with_capacity(cols);
            for c in 0..cols {
                let column: Vec<f64> = (0..rows).map(|r| x[r * cols + c]).collect();
                probs.push(xicor(&column, &y[..rows]).max(0.0001));
            }
            fit_params.feature_probs = Some(probs);
        }

        let dataset: Dataset<T> =
            Dataset::from_rows(x, y, rows, cols, sample_weight, self.config.random_seed);

        let results: Vec<f64> = rayon::scope(|scope| {
            let (tx, rx) = std::sync::mpsc::channel();
            for solver in self.solvers.iter_mut() {
                let tx = tx.clone();
                let dataset = &dataset;
                let fp = &fit_params;
                scope.spawn(move |_| {
                    let score = solver.fit(dataset, fp, |_, _| {});
                    tx.send(score).expect("channel send failed");
                });
            }
            drop(tx);
            rx.into_iter().collect()
        });

        results.into_iter().reduce(f64::min).ok_or(SymRegError::EmptyResult)
    }

    /// Predicts `rows` targets for `(x)`, using either the single best
    /// solver (`id == None`) or a specific population member
    /// (`id = thread_id * population_size + within_population_id`).
    pub fn predict(
        &mut self,
        x: &[f64],
        rows: usize,
        cols: usize,
        id: Option<u64>,
    ) -> SymRegResult<Vec<f64>> {
        validate_fit_shapes(rows, cols, self.config.code_settings.input_size as usize, None)?;

        let y_zeros = vec![0.0; rows];
        let dataset: Dataset<T> =
            Dataset::from_rows(x, &y_zeros, rows, cols, None, self.config.random_seed);

        let pop_size = self.config.population_size as usize;
        let mut out = Vec::with_capacity(dataset.batch_count() * crate::constants::BATCH);

        match id {
            None => {
                let best_idx = self
                    .solvers
                    .iter()
                    .enumerate()
                    .min_by(|a, b| a.1.best().score[3].partial_cmp(&b.1.best().score[3]).unwrap())
                    .map(|(i, _)| i)
                    .ok_or(SymRegError::EmptyResult)?;
                let solver = &mut self.solvers[best_idx];
                for batch in 0..dataset.batch_count() {
                    out.extend(solver.predict_best(&dataset, batch).iter().map(|v| v.to_f64()));
                }
            }
            Some(id) => {
                let thread_id = (id as usize) / pop_size;
                let within_id = (id as usize) % pop_size;
                let solver = self
                    .solvers
                    .get_mut(thread_id)
                    .ok_or(SymRegError::UnknownModelId { id })?;
                for batch in 0..dataset.batch_count() {
                    out.extend(
                        solver
                            .predict_by_index(&dataset, within_id, batch)
                            .iter()
                            .map(|v| v.to_f64()),
                    );
                }
            }
        }

        out.truncate(rows);
        Ok(out)
    }

    pub fn get_best_model(&self) -> SymRegResult<MathModel> {
        let best = self
            .solvers
            .iter()
            .min_by(|a, b| a.best().score[3].partial_cmp(&b.best().score[3]).unwrap())
            .ok_or(SymRegError::EmptyResult)?;
        Ok(self.describe(best.best()))
    }

    pub fn get_model_by_id(&self, id: u64) -> SymRegResult<MathModel> {
        let pop_size = self.config.population_size as usize;
        let thread_id = (id as usize) / pop_size;
        let within_id = (id as usize) % pop_size;
        let solver = self
            .solvers
            .get(thread_id)
            .ok_or(SymRegError::UnknownModelId { id })?;
        let hc = solver
            .population()
            .get(within_id)
            .ok_or(SymRegError::UnknownModelId { id })?;
        Ok(self.describe(hc.best()))
    }

    fn describe(&self, evc: &EvaluatedCode<T>) -> MathModel {
        let used_constants: Vec<f64> = evc
            .code
            .used_const
            .iter()
            .map(|&idx| evc.code.constants[idx as usize].to_f64())
            .collect();
        MathModel {
            score: evc.score[3],
            partial_score: evc.score[2],
            expression: format_infix(&evc.code),
            generated_code: format_numpy(&evc.code),
            used_constants,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CodeSettings, ConstSettings, Metric};
    use crate::instructions::InstructionId;

    fn config() -> Config {
        Config {
            random_seed: 1,
            num_threads: 2,
            population_size: 2,
            transformation: 0,
            clip_min: 0.0,
            clip_max: 0.0,
            init_const_settings: ConstSettings {
                min: -2.0,
                max: 2.0,
                predefined_prob: 0.0,
                predefined_set: vec![],
            },
            code_settings: CodeSettings {
                input_size: 2,
                const_size: 4,
                min_code_size: 2,
                max_code_size: 6,
            },
        }
    }

    fn fit_params() -> FitParams {
        FitParams {
            time_limit_ms: 0,
            verbose: 0,
            tournament: 2,
            metric: Metric::Mse,
            pretest_size: 2,
            sample_size: 4,
            neighbours_count: 4,
            alpha: 0.1,
            beta: 0.0,
            iter_limit: 100,
            const_settings: ConstSettings {
                min: -2.0,
                max: 2.0,
                predefined_prob: 0.0,
                predefined_set: vec![],
            },
            instruction_probs: vec![(InstructionId::Add, 1.0), (InstructionId::Mul, 1.0)],
            feature_probs: None,
            cw0: 1.0,
            cw1: 1.0,
        }
    }

    #[test]
    fn fit_rejects_column_mismatch() {
        let mut engine: Engine<f64> = Engine::new(config());
        let x = vec![0.0; 40];
        let y = vec![0.0; 10];
        let err = engine.fit(&x, &y, 10, 3, fit_params(), None);
        assert!(err.is_err());
    }

    #[test]
    fn fit_and_predict_round_trip() {
        let mut engine: Engine<f64> = Engine::new(config());
        let n = 64;
        let mut x = Vec::with_capacity(n * 2);
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let a = i as f64 * 0.1;
            let b = (i as f64).cos();
            x.push(a);
            x.push(b);
            y.push(a + b);
        }
        engine.fit(&x, &y, n, 2, fit_params(), None).unwrap();
        let pred = engine.predict(&x, n, 2, None).unwrap();
        assert_eq!(pred.len(), n);
        let model = engine.get_best_model().unwrap();
        assert!(model.score.is_finite());
    }
}
