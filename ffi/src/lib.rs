//! C-ABI boundary for the symbolic regression search engine.
//!
//! This crate is the only place raw pointers, `#[repr(C)]` layouts, and
//! `extern "C"` functions appear; everything else in the workspace is
//! ordinary safe Rust. `symreg-core` does all of the numeric work.

pub mod abi;
pub mod csv;
pub mod ffi_types;
pub mod handle;

pub use abi::*;
pub use ffi_types::{CFitParams, CMathModel, CPredictParams, CSolverParams, Precision};
pub use handle::SolverHandle;
