//! Error types for actuation and control.

use thiserror::Error;

pub type ControlResult<T> = Result<T, ControlError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Input {value} for actuator '{actuator}' is outside [{lower}, {upper}]")]
    OutOfBounds {
        actuator: String,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error("Signal plan for '{actuator}' changes the cycle length ({expected} s -> {actual} s)")]
    CycleChanged {
        actuator: String,
        expected: f64,
        actual: f64,
    },

    #[error("Actuator edge {edge} is not part of the network")]
    UnknownEdge { edge: String },

    #[error("Controller {controller} failed: {what}")]
    Solve {
        controller: &'static str,
        what: String,
    },

    #[error("Scripted controller failure at cycle {cycle}")]
    Scripted { cycle: usize },
}
