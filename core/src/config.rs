//! Configuration structs shared by every layer of the engine.
//!
//! These are the safe, owned Rust counterparts of the `solver_params`/
//! `fit_params` C structs in the public FFI contract; `symreg-ffi` converts
//! the raw structs into these before calling into `symreg-core`.

use serde::{Deserialize, Serialize};

use crate::instructions::{InstructionId, INSTRUCTION_TABLE};

/// Shape and size limits of every [`crate::Code`] produced by one solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CodeSettings {
    pub input_size: u32,
    pub const_size: u32,
    pub min_code_size: u32,
    pub max_code_size: u32,
}

impl CodeSettings {
    pub fn max_memory_size(&self) -> u32 {
        self.input_size + self.max_code_size
    }

    /// Index base at which instruction outputs begin (operands `>= code_start`
    /// reference an earlier instruction's output rather than a raw column).
    pub fn code_start(&self) -> u32 {
        self.input_size
    }
}

/// Bounds and predefined-value pool used when drawing or mutating a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstSettings {
    pub min: f64,
    pub max: f64,
    pub predefined_prob: f64,
    pub predefined_set: Vec<f64>,
}

impl ConstSettings {
    pub fn uses_predefined(&self) -> bool {
        self.predefined_prob > 0.0 && !self.predefined_set.is_empty()
    }
}

/// Engine-lifetime configuration: fixed at `CreateEngine`-equivalent time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub random_seed: u64,
    pub num_threads: u32,
    pub population_size: u32,
    pub transformation: u32,
    pub clip_min: f64,
    pub clip_max: f64,
    pub init_const_settings: ConstSettings,
    pub code_settings: CodeSettings,
}

/// Which loss is minimised; mirrors the `metric` field of `fit_params`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Mse,
    Mae,
    Msle,
    PseudoKendall,
    LogLoss,
    LogitApprox,
}

impl Metric {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Metric::Mse),
            1 => Some(Metric::Mae),
            2 => Some(Metric::Msle),
            3 => Some(Metric::PseudoKendall),
            4 => Some(Metric::LogLoss),
            20 => Some(Metric::LogitApprox),
            _ => None,
        }
    }
}

/// Per-`fit` call configuration: stopping criteria, acceptance slack,
/// instruction/feature weighting and the loss to minimise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    pub time_limit_ms: u32,
    pub verbose: u32,
    pub tournament: u32,
    pub metric: Metric,
    pub pretest_size: u32,
    pub sample_size: u32,
    pub neighbours_count: u32,
    pub alpha: f64,
    /// Reserved: present in the public surface, unused in the search loop
    /// (spec Open Question (c)).
    pub beta: f64,
    pub iter_limit: u64,
    pub const_settings: ConstSettings,
    pub instruction_probs: Vec<(InstructionId, f64)>,
    /// `None` means "derive from Xicor"; `Some` is a dense per-column weight.
    pub feature_probs: Option<Vec<f64>>,
    pub cw0: f64,
    pub cw1: f64,
}

impl FitParams {
    /// Parse an instruction bundle string: a bundle name (`"simple"`,
    /// `"math"`, `"fuzzy"`) or a `"name prob; name prob; ..."` list.
    pub fn parse_instruction_set(spec: &str) -> Vec<(InstructionId, f64)> {
        match spec {
            "simple" => crate::instructions::BASIC_MATH.to_vec(),
            "math" => crate::instructions::ADVANCED_MATH.to_vec(),
            "fuzzy" => crate::instructions::FUZZY_MATH.to_vec(),
            custom => {
                let mut out = Vec::new();
                for entry in custom.split(';') {
                    let entry = entry.trim();
                    if entry.is_empty() {
                        continue;
                    }
                    let mut parts = entry.split_whitespace();
                    let (Some(name), Some(prob_str)) = (parts.next(), parts.next()) else {
                        log::warn!("malformed instruction entry: {entry:?}");
                        continue;
                    };
                    let Ok(mut prob) = prob_str.parse::<f64>() else {
                        log::warn!("malformed probability in entry: {entry:?}");
                        continue;
                    };
                    if prob < 0.0 {
                        log::warn!("instruction probability < 0 for {name}");
                        prob = 0.0;
                    }
                    match INSTRUCTION_TABLE.iter().find(|info| info.name == name) {
                        Some(info) => out.push((info.id, prob)),
                        None => log::warn!("unknown instruction {name:?}"),
                    }
                }
                out
            }
        }
    }

    /// Parse a `"p; p; ..."` per-feature-weight string, or `None` for `"xicor"`.
    pub fn parse_feature_probs(spec: &str, count: u32) -> Option<Vec<f64>> {
        if spec == "xicor" {
            return None;
        }
        let mut probs = vec![1.0; count as usize];
        for (i, entry) in spec.split(';').enumerate() {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            if i >= probs.len() {
                log::warn!("feature probability index {i} exceeds feature count {count}");
                break;
            }
            match entry.parse::<f64>() {
                Ok(p) if p >= 0.0 => probs[i] = p,
                Ok(_) => {
                    log::warn!("feature probability < 0 at index {i}");
                    probs[i] = 0.0;
                }
                Err(_) => log::warn!("malformed feature probability at index {i}: {entry:?}"),
            }
        }
        Some(probs)
    }
}
