//! The machine: executes one [`Code`] against one batch of a [`Dataset`],
//! applies the output transform/clip, and folds the result into a loss.
//!
//! Only instructions marked `used` by [`Code::recompute_used`] are
//! evaluated — dead instructions never touch the scratch memory.

use crate::code::{Code, Scalar};
use crate::config::Metric;
use crate::constants::BATCH;
use crate::dataset::Dataset;
use crate::instructions::eval_scalar;
use crate::loss::{batch_loss, ResultAccumulator};

/// Output transform applied before clipping and loss computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    None,
    Sigmoid,
    Affine01,
    Round,
}

impl Transform {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Transform::Sigmoid,
            2 => Transform::Affine01,
            3 => Transform::Round,
            _ => Transform::None,
        }
    }
}

#[inline]
fn apply_transform(x: f64, t: Transform) -> f64 {
    match t {
        Transform::None => x,
        Transform::Sigmoid => {
            let c = x.clamp(-20.0, 20.0);
            1.0 / (1.0 + (-c).exp())
        }
        Transform::Affine01 => (0.25 * x + 0.5).clamp(0.0, 1.0),
        Transform::Round => x.round(),
    }
}

#[inline]
fn apply_clip(x: f64, clip_min: f64, clip_max: f64) -> f64 {
    if clip_min < clip_max {
        x.clamp(clip_min, clip_max)
    } else {
        x
    }
}

/// Reusable scratch memory: one `BATCH`-wide slot per instruction. Kept
/// separate from [`Code`] so a solver can reuse a single allocation across
/// every candidate it evaluates.
pub struct Memory {
    slots: Vec<f64>,
    max_code_size: usize,
}

impl Memory {
    pub fn new(max_code_size: usize) -> Self {
        Memory {
            slots: vec![0.0; max_code_size * BATCH],
            max_code_size,
        }
    }

    #[inline]
    fn slot(&self, idx: usize) -> &[f64] {
        &self.slots[idx * BATCH..(idx + 1) * BATCH]
    }

    #[inline]
    fn slot_mut(&mut self, idx: usize) -> &mut [f64] {
        &mut self.slots[idx * BATCH..(idx + 1) * BATCH]
    }
}

pub struct Processor {
    memory: Memory,
}

impl Processor {
    pub fn new(max_code_size: usize) -> Self {
        Processor {
            memory: Memory::new(max_code_size),
        }
    }

    /// Runs every live instruction of `code` over batch `batch_idx`,
    /// leaving results in the internal scratch memory.
    fn execute<T: Scalar>(&mut self, code: &Code<T>, dataset: &Dataset<T>, batch_idx: usize) {
        let code_start = code.code_start() as usize;
        let code_size = code.size() as usize;

        for local in 0..code_size {
            if !code.instr(local).used {
                continue;
            }
            let instr = *code.instr(local);
            let arity = instr.arity();

            let mut lane_a = [0.0f64; BATCH];
            let mut lane_b = [0.0f64; BATCH];
            for lane in 0..BATCH {
                lane_a[lane] = self.read_operand(code, dataset, instr.operands[0], batch_idx, lane, code_start);
                lane_b[lane] = if arity > 1 {
                    self.read_operand(code, dataset, instr.operands[1], batch_idx, lane, code_start)
                } else {
                    0.0
                };
            }
            let out = self.memory.slot_mut(local);
            for lane in 0..BATCH {
                out[lane] = eval_scalar(instr.opcode, lane_a[lane], lane_b[lane]);
            }
        }
    }

    #[inline]
    fn read_operand<T: Scalar>(
        &self,
        code: &Code<T>,
        dataset: &Dataset<T>,
        operand: crate::code::Operand,
        batch_idx: usize,
        lane: usize,
        code_start: usize,
    ) -> f64 {
        if operand.is_constant {
            code.constants[operand.index as usize].to_f64()
        } else if (operand.index as usize) < code_start {
            dataset.batch_x(operand.index as usize, batch_idx)[lane].to_f64()
        } else {
            self.memory.slot(operand.index as usize - code_start)[lane]
        }
    }

    /// Output lanes of `code`'s last instruction over batch `batch_idx`,
    /// after `execute` has populated scratch memory.
    fn raw_output<T: Scalar>(&self, code: &Code<T>) -> [f64; BATCH] {
        let out_idx = code.size() as usize - 1;
        let mut out = [0.0; BATCH];
        out.copy_from_slice(self.memory.slot(out_idx));
        out
    }

    /// Predicts one batch: execute, transform, clip. Does not touch loss.
    pub fn predict_batch<T: Scalar>(
        &mut self,
        code: &Code<T>,
        dataset: &Dataset<T>,
        batch_idx: usize,
        transform: Transform,
        clip_min: f64,
        clip_max: f64,
    ) -> [f64; BATCH] {
        self.execute(code, dataset, batch_idx);
        let raw = self.raw_output(code);
        let mut out = [0.0; BATCH];
        for lane in 0..BATCH {
            out[lane] = apply_clip(apply_transform(raw[lane], transform), clip_min, clip_max);
        }
        out
    }

    /// Predicts and scores one batch against `dataset`'s target column.
    /// `Metric::LogitApprox` bypasses the configured transform/clip entirely
    /// and scores the raw, un-squashed output directly (per spec Design Note
    /// (d)); every other metric gets the configured transform and clip.
    #[allow(clippy::too_many_arguments)]
    pub fn score_batch<T: Scalar>(
        &mut self,
        code: &Code<T>,
        dataset: &Dataset<T>,
        batch_idx: usize,
        transform: Transform,
        clip_min: f64,
        clip_max: f64,
        metric: Metric,
        class_weights: (f64, f64),
    ) -> f64 {
        self.execute(code, dataset, batch_idx);
        let raw = self.raw_output(code);
        let mut pred = [0.0; BATCH];
        if metric == Metric::LogitApprox {
            pred = raw;
        } else {
            for lane in 0..BATCH {
                pred[lane] = apply_clip(apply_transform(raw[lane], transform), clip_min, clip_max);
            }
        }

        let actual: Vec<f64> = dataset
            .batch_y(batch_idx)
            .iter()
            .map(|v| v.to_f64())
            .collect();
        let weight: Option<Vec<f64>> = dataset
            .batch_weight(batch_idx)
            .map(|w| w.iter().map(|v| v.to_f64()).collect());

        batch_loss(metric, &pred, &actual, weight.as_deref(), class_weights)
    }

    /// Scores `code` over every batch index yielded by `batches`, folding
    /// the results into a [`ResultAccumulator`]. Used both for a full pass
    /// (`0..dataset.batch_count()`) and for pretest/sample tiers, which pass
    /// a restricted subset of batch indices.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate<T: Scalar>(
        &mut self,
        code: &Code<T>,
        dataset: &Dataset<T>,
        batches: impl IntoIterator<Item = usize>,
        transform: Transform,
        clip_min: f64,
        clip_max: f64,
        metric: Metric,
        class_weights: (f64, f64),
    ) -> ResultAccumulator {
        let mut acc = ResultAccumulator::new();
        for batch_idx in batches {
            let score = self.score_batch(code, dataset, batch_idx, transform, clip_min, clip_max, metric, class_weights);
            acc.push(batch_idx, score);
        }
        acc
    }
}
