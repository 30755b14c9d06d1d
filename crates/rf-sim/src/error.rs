//! Error types for engine sessions and the control loop.

use std::fmt;

use thiserror::Error;

/// Step of a control cycle, used to report where a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopStage {
    Init,
    Stepping,
    Aggregating,
    Linearizing,
    Deciding,
    Actuating,
    Logging,
    Finalizing,
}

impl fmt::Display for LoopStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopStage::Init => "init",
            LoopStage::Stepping => "stepping",
            LoopStage::Aggregating => "aggregating",
            LoopStage::Linearizing => "linearizing",
            LoopStage::Deciding => "deciding",
            LoopStage::Actuating => "actuating",
            LoopStage::Logging => "logging",
            LoopStage::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

/// Errors encountered while driving a simulation engine.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Engine error: {message}")]
    Engine { message: String },

    #[error("Engine session is closed")]
    EngineClosed,

    #[error("Network error: {0}")]
    Network(#[from] rf_network::NetworkError),

    #[error("Model error: {0}")]
    Model(#[from] rf_model::ModelError),

    #[error("Control error: {0}")]
    Control(#[from] rf_controls::ControlError),

    #[error("Cycle {cycle} failed while {stage}: {source}")]
    CycleFailed {
        cycle: usize,
        stage: LoopStage,
        #[source]
        source: Box<SimError>,
    },
}

pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    /// Attach the cycle and stage a failure happened in.
    pub fn at(self, cycle: usize, stage: LoopStage) -> Self {
        match self {
            already @ SimError::CycleFailed { .. } => already,
            other => SimError::CycleFailed {
                cycle,
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, unwrapping `CycleFailed`.
    pub fn root(&self) -> &SimError {
        match self {
            SimError::CycleFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<rf_core::RfError> for SimError {
    fn from(e: rf_core::RfError) -> Self {
        SimError::Engine {
            message: e.to_string(),
        }
    }
}
