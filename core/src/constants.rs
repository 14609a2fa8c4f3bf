//! Compile-time tunables shared across the engine.

/// Lane width of one evaluation batch. Chosen so that `BATCH * size_of::<f64>()`
/// is a multiple of [`ALIGN`], matching the reference engine's default.
pub const BATCH: usize = 64;

/// Byte alignment required of every batch's base pointer, for auto-vectorisation.
pub const ALIGN: usize = 32;

/// Sentinel used in place of a non-finite score, so one poisoned batch never
/// propagates `NaN`/`inf` into candidate selection.
pub const LARGE_FLOAT: f64 = 1.0e30;

/// Upper bound on the number of distinct opcodes; the processor's dispatch
/// table is sized against this at compile time.
pub const INSTRUCTIONS_COUNT_LIMIT: usize = 64;
