//! Error types for the regional dynamics model.

use rf_core::RfError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid routing fraction {from} -> {to}: {what}")]
    InvalidRouting {
        from: usize,
        to: usize,
        what: &'static str,
    },

    #[error("Region {region} has invalid capacity {value}")]
    InvalidCapacity { region: usize, value: f64 },

    #[error("Invalid completion rate: {what}")]
    InvalidCompletion { what: &'static str },

    #[error("Invalid demand: {what}")]
    InvalidDemand { what: &'static str },

    #[error("Degenerate linearization: {what}")]
    Degenerate { what: &'static str },

    #[error(transparent)]
    Core(#[from] RfError),
}

pub type ModelResult<T> = Result<T, ModelError>;
