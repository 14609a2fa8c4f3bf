//! Error types for the search engine.
//!
//! Numeric failures (a batch loss going non-finite) are never surfaced as
//! errors: the loss kernels absorb them into the `LARGE_FLOAT` sentinel and
//! the search simply treats the candidate as very bad. `SymRegError` is
//! reserved for configuration failures at the public boundary, mirroring
//! the split the reference engine draws between `IsFinite`-gated kernels and
//! the `int` return codes of its C entry points.

use thiserror::Error;

/// Errors returned at the public boundary of the engine (construction,
/// `fit`, `predict`). Never returned from inside the search loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SymRegError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("dataset has {rows} rows, need at least {min}")]
    TooFewRows { rows: usize, min: usize },

    #[error("column count mismatch: solver configured for {expected} inputs, data has {actual}")]
    ColumnMismatch { expected: u32, actual: u32 },

    #[error("sample weight length {got} does not match row count {rows}")]
    SampleWeightMismatch { got: usize, rows: usize },

    #[error("fit produced no usable model")]
    EmptyResult,

    #[error("model id {id} is out of range")]
    UnknownModelId { id: u64 },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error at {context}: {detail}")]
    Parse { context: String, detail: String },
}

pub type SymRegResult<T> = Result<T, SymRegError>;
