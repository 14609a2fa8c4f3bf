//! `#[repr(C)]` mirrors of the public configuration structs, plus the
//! conversions into the safe, owned types `symreg-core` actually consumes.
//!
//! These structs are the ABI boundary: every field is a plain scalar or a
//! raw pointer/length pair, matching `original_source/Hroch/Inteface.h`'s
//! `solver_params`/`fit_params`/`math_model`.

use std::ffi::CStr;
use std::os::raw::{c_char, c_double};

use symreg_core::config::{CodeSettings, Config, ConstSettings, FitParams, Metric};
use symreg_core::error::{SymRegError, SymRegResult};

/// Engine-lifetime configuration. Mirrors `solver_params`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CSolverParams {
    pub random_seed: u64,
    pub num_threads: u32,
    /// `1` = f32, `2` = f64.
    pub precision: u32,
    pub pop_size: u32,
    pub transformation: u32,
    pub clip_min: c_double,
    pub clip_max: c_double,
    pub input_size: u32,
    pub const_size: u32,
    pub min_code_size: u32,
    pub max_code_size: u32,
    pub init_const_min: c_double,
    pub init_const_max: c_double,
    pub init_predefined_const_prob: c_double,
    pub init_predefined_const_set: *const c_double,
    pub init_predefined_const_count: u32,
}

/// `1` selects the `f32` engine, `2` selects `f64`; anything else is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    F32,
    F64,
}

impl CSolverParams {
    /// Safety: `init_predefined_const_set` must either be null (with
    /// `init_predefined_const_count == 0`) or point to at least
    /// `init_predefined_const_count` valid, initialized `f64`s.
    pub unsafe fn to_config(&self) -> SymRegResult<(Config, Precision)> {
        let precision = match self.precision {
            1 => Precision::F32,
            2 => Precision::F64,
            other => return Err(SymRegError::InvalidConfig(format!("unknown precision code {other}"))),
        };
        let predefined_set = unsafe { slice_or_empty(self.init_predefined_const_set, self.init_predefined_const_count) }.to_vec();

        let config = Config {
            random_seed: self.random_seed,
            num_threads: self.num_threads,
            population_size: self.pop_size,
            transformation: self.transformation,
            clip_min: self.clip_min,
            clip_max: self.clip_max,
            init_const_settings: ConstSettings {
                min: self.init_const_min,
                max: self.init_const_max,
                predefined_prob: self.init_predefined_const_prob,
                predefined_set,
            },
            code_settings: CodeSettings {
                input_size: self.input_size,
                const_size: self.const_size,
                min_code_size: self.min_code_size,
                max_code_size: self.max_code_size,
            },
        };
        Ok((config, precision))
    }
}

/// Per-`fit` call configuration. Mirrors `fit_params`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CFitParams {
    pub time_limit_ms: u32,
    pub verbose: u32,
    pub pop_sel: u32,
    pub metric: u32,
    pub pretest_size: u32,
    pub sample_size: u32,
    pub neighbours_count: u32,
    pub alpha: c_double,
    pub beta: c_double,
    pub iter_limit: u64,
    pub const_min: c_double,
    pub const_max: c_double,
    pub predefined_const_prob: c_double,
    pub predefined_const_set: *const c_double,
    pub predefined_const_count: u32,
    /// Null-terminated bundle name (`"simple"`/`"math"`/`"fuzzy"`) or
    /// `"name prob; name prob; ..."` list. May be null for `"simple"`.
    pub instruction_set: *const c_char,
    /// Null-terminated `"xicor"` or `"p; p; ..."` list. May be null for `"xicor"`.
    pub feature_probs: *const c_char,
    pub cw0: c_double,
    pub cw1: c_double,
}

impl CFitParams {
    /// Safety: `predefined_const_set` must be valid for
    /// `predefined_const_count` reads; `instruction_set` and `feature_probs`
    /// must either be null or point to a NUL-terminated, valid-UTF8 string.
    pub unsafe fn to_fit_params(&self, input_size: u32) -> SymRegResult<FitParams> {
        let metric = Metric::from_code(self.metric)
            .ok_or_else(|| SymRegError::InvalidConfig(format!("unknown metric code {}", self.metric)))?;
        let predefined_set = unsafe { slice_or_empty(self.predefined_const_set, self.predefined_const_count) }.to_vec();

        let instruction_spec = unsafe { cstr_or_default(self.instruction_set, "simple") }?;
        let feature_spec = unsafe { cstr_or_default(self.feature_probs, "xicor") }?;

        Ok(FitParams {
            time_limit_ms: self.time_limit_ms,
            verbose: self.verbose,
            tournament: self.pop_sel,
            metric,
            pretest_size: self.pretest_size,
            sample_size: self.sample_size,
            neighbours_count: self.neighbours_count,
            alpha: self.alpha,
            beta: self.beta,
            iter_limit: self.iter_limit,
            const_settings: ConstSettings {
                min: self.const_min,
                max: self.const_max,
                predefined_prob: self.predefined_const_prob,
                predefined_set,
            },
            instruction_probs: FitParams::parse_instruction_set(&instruction_spec),
            feature_probs: FitParams::parse_feature_probs(&feature_spec, input_size),
            cw0: self.cw0,
            cw1: self.cw1,
        })
    }
}

/// `Predict`'s selector: `id == u64::MAX` asks for the engine-wide best;
/// any other value is `thread_id * pop_size + within_population_id`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CPredictParams {
    pub id: u64,
}

/// An introspectable trained model. Mirrors `math_model`. Ownership of the
/// two string pointers and the constants array transfers to the caller;
/// release them with [`crate::abi::FreeModel`].
#[repr(C)]
pub struct CMathModel {
    pub id: u64,
    pub score: c_double,
    pub partial_score: c_double,
    pub str_representation: *mut c_char,
    pub str_code_representation: *mut c_char,
    pub used_constants: *mut c_double,
    pub used_constants_len: u32,
}

impl Default for CMathModel {
    fn default() -> Self {
        CMathModel {
            id: 0,
            score: 0.0,
            partial_score: 0.0,
            str_representation: std::ptr::null_mut(),
            str_code_representation: std::ptr::null_mut(),
            used_constants: std::ptr::null_mut(),
            used_constants_len: 0,
        }
    }
}

unsafe fn slice_or_empty<'a>(ptr: *const c_double, len: u32) -> &'a [f64] {
    if ptr.is_null() || len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(ptr, len as usize) }
    }
}

unsafe fn cstr_or_default(ptr: *const c_char, default: &str) -> SymRegResult<String> {
    if ptr.is_null() {
        return Ok(default.to_string());
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_string)
        .map_err(|_| SymRegError::InvalidConfig("string argument is not valid UTF-8".to_string()))
}
