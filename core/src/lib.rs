//! symreg-core: the symbolic-regression search engine.
//!
//! Given a feature matrix `X` and a target vector `y`, searches the space of
//! short straight-line arithmetic programs ("codes") for one that minimises a
//! configured loss against `y`. The engine owns the byte-code program
//! representation, the batched evaluator and loss kernels, the population of
//! hill-climbers driving the tiered stochastic local search, and the
//! mutation/initialization operators that produce neighbours.

pub mod code;
pub mod config;
pub mod constants;
pub mod correlation;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod format;
pub mod hillclimb;
pub mod init;
pub mod instructions;
pub mod loss;
pub mod mutation;
pub mod processor;
pub mod rand;
pub mod validation;

pub use code::{Code, Instruction, Operand};
pub use config::{CodeSettings, Config, ConstSettings, FitParams};
pub use engine::{Engine, MathModel};
pub use error::{SymRegError, SymRegResult};
pub use hillclimb::{EvaluatedCode, HillClimber, Solver};
