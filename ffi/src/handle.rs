//! The opaque handle behind every `*mut SolverHandle` the C surface passes
//! around. One handle owns exactly one precision's [`Engine`]; which
//! variant is live is fixed for the handle's whole lifetime by
//! `solver_params.precision`.

use symreg_core::config::Config;
use symreg_core::engine::{Engine, MathModel};
use symreg_core::error::SymRegResult;

use crate::ffi_types::Precision;

pub enum SolverHandle {
    F32(Engine<f32>),
    F64(Engine<f64>),
}

impl SolverHandle {
    pub fn new(config: Config, precision: Precision) -> Self {
        match precision {
            Precision::F32 => SolverHandle::F32(Engine::new(config)),
            Precision::F64 => SolverHandle::F64(Engine::new(config)),
        }
    }

    pub fn get_best_model(&self) -> SymRegResult<MathModel> {
        match self {
            SolverHandle::F32(e) => e.get_best_model(),
            SolverHandle::F64(e) => e.get_best_model(),
        }
    }

    pub fn get_model_by_id(&self, id: u64) -> SymRegResult<MathModel> {
        match self {
            SolverHandle::F32(e) => e.get_model_by_id(id),
            SolverHandle::F64(e) => e.get_model_by_id(id),
        }
    }
}
