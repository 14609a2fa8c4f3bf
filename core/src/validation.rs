//! Fluent input validation for `Engine::fit`/`Engine::predict` entry points.

use crate::error::{SymRegError, SymRegResult};

pub struct ValidationBuilder {
    errors: Vec<String>,
}

impl Default for ValidationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationBuilder {
    pub fn new() -> Self {
        ValidationBuilder { errors: Vec::new() }
    }

    pub fn check_min_rows(&mut self, rows: usize, min: usize) -> &mut Self {
        if rows < min {
            self.errors
                .push(format!("need at least {min} rows, got {rows}"));
        }
        self
    }

    pub fn check_column_count(&mut self, expected: usize, actual: usize) -> &mut Self {
        if expected != actual {
            self.errors
                .push(format!("column mismatch: expected {expected}, got {actual}"));
        }
        self
    }

    pub fn check_sample_weight_len(&mut self, len: Option<usize>, rows: usize) -> &mut Self {
        if let Some(len) = len {
            if len != rows {
                self.errors
                    .push(format!("sample_weight has {len} entries, expected {rows}"));
            }
        }
        self
    }

    pub fn check_finite_slice(&mut self, values: &[f64], name: &str) -> &mut Self {
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            self.errors
                .push(format!("{name}[{i}] is not finite: {}", values[i]));
        }
        self
    }

    pub fn build(&self) -> SymRegResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(SymRegError::InvalidConfig(self.errors.join("; ")))
        }
    }
}

/// Validates a fit/predict call's shape: row count, column count and
/// optional sample-weight length, collapsing every violation into a single
/// [`SymRegError`].
pub fn validate_fit_shapes(
    rows: usize,
    cols: usize,
    expected_cols: usize,
    sample_weight_len: Option<usize>,
) -> SymRegResult<()> {
    ValidationBuilder::new()
        .check_min_rows(rows, 4)
        .check_column_count(expected_cols, cols)
        .check_sample_weight_len(sample_weight_len, rows)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_too_few_rows() {
        let err = validate_fit_shapes(2, 3, 3, None);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_column_mismatch() {
        let err = validate_fit_shapes(10, 2, 3, None);
        assert!(err.is_err());
    }

    #[test]
    fn accepts_well_formed_input() {
        assert!(validate_fit_shapes(10, 3, 3, Some(10)).is_ok());
    }

    #[test]
    fn rejects_sample_weight_length_mismatch() {
        assert!(validate_fit_shapes(10, 3, 3, Some(5)).is_err());
    }
}
