//! Error types for the rf-app service layer.

use std::path::PathBuf;

use rf_sim::{LoopStage, SimError};

/// Application error, one variant per failure class of a run.
///
/// Configuration and fit failures happen before the engine starts; engine
/// and controller failures carry the cycle and stage they happened in.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to read task file: {path}")]
    TaskFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("MFD fit failed: {0}")]
    Fit(String),

    #[error("Engine runtime error{}: {message}", failed_at(.cycle, .stage))]
    EngineRuntime {
        cycle: Option<usize>,
        stage: Option<LoopStage>,
        message: String,
    },

    #[error("Controller error{}: {message}", failed_at(.cycle, .stage))]
    Controller {
        cycle: Option<usize>,
        stage: Option<LoopStage>,
        message: String,
    },

    #[error("Results error: {0}")]
    Results(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

fn failed_at(cycle: &Option<usize>, stage: &Option<LoopStage>) -> String {
    match (cycle, stage) {
        (Some(c), Some(s)) => format!(" in cycle {c} while {s}"),
        (Some(c), None) => format!(" in cycle {c}"),
        _ => String::new(),
    }
}

impl AppError {
    /// Cycle a runtime failure happened in, if any.
    pub fn cycle(&self) -> Option<usize> {
        match self {
            AppError::EngineRuntime { cycle, .. } | AppError::Controller { cycle, .. } => *cycle,
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<LoopStage> {
        match self {
            AppError::EngineRuntime { stage, .. } | AppError::Controller { stage, .. } => *stage,
            _ => None,
        }
    }
}

impl From<rf_project::ProjectError> for AppError {
    fn from(err: rf_project::ProjectError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<rf_project::ValidationError> for AppError {
    fn from(err: rf_project::ValidationError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<rf_network::NetworkError> for AppError {
    fn from(err: rf_network::NetworkError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<rf_model::ModelError> for AppError {
    fn from(err: rf_model::ModelError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<rf_controls::ControlError> for AppError {
    fn from(err: rf_controls::ControlError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<rf_mfd::MfdError> for AppError {
    fn from(err: rf_mfd::MfdError) -> Self {
        AppError::Fit(err.to_string())
    }
}

impl From<rf_results::ResultsError> for AppError {
    fn from(err: rf_results::ResultsError) -> Self {
        match err {
            rf_results::ResultsError::RunNotFound { run_id } => AppError::RunNotFound(run_id),
            other => AppError::Results(other.to_string()),
        }
    }
}

impl From<SimError> for AppError {
    fn from(err: SimError) -> Self {
        let (cycle, stage) = match &err {
            SimError::CycleFailed { cycle, stage, .. } => (Some(*cycle), Some(*stage)),
            _ => (None, None),
        };
        let root = err.root();
        let message = root.to_string();
        match root {
            SimError::Control(_) if cycle.is_some() => AppError::Controller {
                cycle,
                stage,
                message,
            },
            SimError::Engine { .. } | SimError::EngineClosed => AppError::EngineRuntime {
                cycle,
                stage,
                message,
            },
            _ if cycle.is_none() => AppError::Configuration(message),
            _ => AppError::EngineRuntime {
                cycle,
                stage,
                message,
            },
        }
    }
}
