//! Loss kernels and the per-evaluation score accumulator.
//!
//! Every kernel is non-finite-safe: instead of letting a bad prediction
//! propagate `NaN`/`inf` through the search (which would poison comparisons
//! and tournament selection), a non-finite term is replaced by
//! [`LARGE_FLOAT`] so the candidate is simply scored very badly.

use crate::config::Metric;
use crate::constants::LARGE_FLOAT;

#[inline(always)]
fn safe(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        LARGE_FLOAT
    }
}

/// Per-batch loss, called once per live batch with `BATCH`-wide lanes.
/// `weight` is `None` when the caller has no per-row sample weights.
/// `class_weights` is `(cw0, cw1)`, applied only by [`Metric::LogLoss`] and
/// [`Metric::LogitApprox`] — every other metric ignores it.
///
/// For [`Metric::LogitApprox`], `pred` must be the *raw, un-squashed* model
/// output (the processor bypasses the configured output transform for this
/// metric, per spec); every other metric receives an already
/// transformed/clipped prediction.
pub fn batch_loss(
    metric: Metric,
    pred: &[f64],
    actual: &[f64],
    weight: Option<&[f64]>,
    class_weights: (f64, f64),
) -> f64 {
    match metric {
        Metric::Mse => mse(pred, actual, weight),
        Metric::Mae => mae(pred, actual, weight),
        Metric::Msle => msle(pred, actual, weight),
        Metric::PseudoKendall => pseudo_kendall(pred, actual, weight),
        Metric::LogLoss => log_loss(pred, actual, weight, class_weights),
        Metric::LogitApprox => logit_approx(pred, actual, weight, class_weights),
    }
}

/// Per-batch reduction: unweighted terms divide by lane count (`BATCH`),
/// matching spec.md's literal `scoreSum/(count*BATCH)` contract one batch at
/// a time. Weighted terms (`LogLoss`, `LogitApprox`, and any metric given
/// sample weights) instead divide by `Σw` for that batch, so that a batch's
/// score is a proper weighted average of its own rows rather than being
/// deflated by whatever weight total happens to land in that batch — see
/// [`ResultAccumulator::mean`] for how this composes across batches.
fn weighted_mean(terms: &[f64], weight: Option<&[f64]>) -> f64 {
    match weight {
        None => terms.iter().sum::<f64>() / terms.len() as f64,
        Some(w) => {
            let wsum: f64 = w.iter().sum();
            if wsum <= 0.0 {
                return LARGE_FLOAT;
            }
            let num: f64 = terms.iter().zip(w.iter()).map(|(t, w)| t * w).sum();
            num / wsum
        }
    }
}

fn mse(pred: &[f64], actual: &[f64], weight: Option<&[f64]>) -> f64 {
    let terms: Vec<f64> = pred
        .iter()
        .zip(actual)
        .map(|(p, a)| safe((p - a) * (p - a)))
        .collect();
    weighted_mean(&terms, weight)
}

fn mae(pred: &[f64], actual: &[f64], weight: Option<&[f64]>) -> f64 {
    let terms: Vec<f64> = pred
        .iter()
        .zip(actual)
        .map(|(p, a)| safe((p - a).abs()))
        .collect();
    weighted_mean(&terms, weight)
}

fn msle(pred: &[f64], actual: &[f64], weight: Option<&[f64]>) -> f64 {
    let terms: Vec<f64> = pred
        .iter()
        .zip(actual)
        .map(|(p, a)| {
            if *p <= -1.0 || *a <= -1.0 {
                return LARGE_FLOAT;
            }
            let d = (1.0 + p).ln() - (1.0 + a).ln();
            safe(d * d)
        })
        .collect();
    weighted_mean(&terms, weight)
}

/// Pairwise sign agreement between predicted and actual differences,
/// normalised to `2/(n*(n-1))` exactly as the reference engine's
/// `ComputePseudoKendall`, then folded into a loss via `1 - |agreement|` per
/// spec: both perfect concordance and perfect discordance score `0`, since
/// the search only cares about rank *agreement* in magnitude, not sign.
fn pseudo_kendall(pred: &[f64], actual: &[f64], weight: Option<&[f64]>) -> f64 {
    let n = pred.len();
    let mut err = 0.0;
    for j in 1..n {
        for i in 0..j {
            let w = match weight {
                Some(w) => w[i] * w[j],
                None => 1.0,
            };
            let t = (actual[i] - actual[j]) * (pred[i] - pred[j]);
            let term = if t != 0.0 {
                t / t.abs()
            } else if actual[i] - actual[j] == 0.0 {
                1.0
            } else {
                0.0
            };
            err += w * term;
        }
    }
    let pair_count = (n * (n.saturating_sub(1))) as f64 / 2.0;
    if pair_count <= 0.0 {
        return LARGE_FLOAT;
    }
    let agreement = err / pair_count;
    safe(1.0 - agreement.abs())
}

/// Class weight for one row: `cw1` when `actual` is (within epsilon of) the
/// positive class, `cw0` otherwise.
#[inline]
fn class_weight_for(actual: f64, class_weights: (f64, f64)) -> f64 {
    const CLASS_EPS: f64 = 1e-9;
    if actual > 1.0 - CLASS_EPS {
        class_weights.1
    } else {
        class_weights.0
    }
}

fn combine_weights(actual: &[f64], weight: Option<&[f64]>, class_weights: (f64, f64)) -> Vec<f64> {
    actual
        .iter()
        .enumerate()
        .map(|(i, &a)| {
            let sw = weight.map(|w| w[i]).unwrap_or(1.0);
            sw * class_weight_for(a, class_weights)
        })
        .collect()
}

fn log_loss(pred: &[f64], actual: &[f64], weight: Option<&[f64]>, class_weights: (f64, f64)) -> f64 {
    const EPS: f64 = 1e-12;
    let combined = combine_weights(actual, weight, class_weights);
    let terms: Vec<f64> = pred
        .iter()
        .zip(actual)
        .map(|(p, a)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            safe(-(a * p.ln() + (1.0 - a) * (1.0 - p).ln()))
        })
        .collect();
    weighted_mean(&terms, Some(&combined))
}

/// Rational/polynomial-stable approximation of binary cross-entropy applied
/// directly to an un-squashed logit `y`, i.e. `softplus(-y)` for the
/// positive class and `softplus(y)` for the negative one, computed via the
/// numerically stable `max(y,0) + ln(1+exp(-|y|))` form on `y` clamped to
/// `[-5, 5]` rather than by literally forming `sigmoid(y)` first (which is
/// the failure mode this metric exists to avoid: `sigmoid` saturates to
/// exactly `0.0`/`1.0` in floating point well before `|y| = 20`, turning
/// `ln(pred)` into `-inf` for confidently-wrong predictions).
fn logit_approx(raw: &[f64], actual: &[f64], weight: Option<&[f64]>, class_weights: (f64, f64)) -> f64 {
    let combined = combine_weights(actual, weight, class_weights);
    let terms: Vec<f64> = raw
        .iter()
        .zip(actual)
        .map(|(y, a)| {
            let yc = y.clamp(-5.0, 5.0);
            // softplus(x) = max(x,0) + ln(1+exp(-|x|)); loss(y,1)=softplus(-y), loss(y,0)=softplus(y)
            let sign = if *a > 0.5 { -yc } else { yc };
            safe(sign.max(0.0) + (-sign.abs()).exp().ln_1p())
        })
        .collect();
    weighted_mean(&terms, Some(&combined))
}

/// Accumulates per-batch scores across a full evaluation pass, tracking the
/// worst-scoring batches so the tiered search can re-use them as the next
/// pretest baseline (spec Open Question (b): ties broken by batch index).
#[derive(Debug, Clone)]
pub struct ResultAccumulator {
    score_sum: f64,
    count: usize,
    batches: Vec<(usize, f64)>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        ResultAccumulator {
            score_sum: 0.0,
            count: 0,
            batches: Vec::new(),
        }
    }

    pub fn push(&mut self, batch_index: usize, score: f64) {
        self.score_sum += score;
        self.count += 1;
        self.batches.push((batch_index, score));
    }

    /// Mean of the pushed per-batch scores, i.e. `scoreSum / count`. For
    /// unweighted metrics each per-batch score is already `batchSum/BATCH`
    /// (see [`weighted_mean`]), so this is exactly spec.md's
    /// `scoreSum/(count*BATCH)`. For metrics evaluated with class or sample
    /// weights, each per-batch score is instead `batchSum/Σw` for that
    /// batch's own weights, and this accumulator averages those per-batch
    /// weighted means rather than re-deriving a single dataset-wide
    /// `Σw`-normalised mean — the intended reading of §4.E's weighting
    /// note, since a global `scoreSum/(count*BATCH)` would let batches with
    /// unusually large weight totals dominate disproportionately.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            LARGE_FLOAT
        } else {
            self.score_sum / self.count as f64
        }
    }

    /// The `n` worst-scoring batches, highest score first, ties broken by
    /// ascending batch index.
    pub fn n_worst(&self, n: usize) -> Vec<(usize, f64)> {
        let mut sorted = self.batches.clone();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then(a.0.cmp(&b.0)));
        sorted.truncate(n);
        sorted
    }
}

impl Default for ResultAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
