//! rf-results: result bundles, trip metrics and the on-disk run store.

pub mod hash;
pub mod metrics;
pub mod store;
pub mod types;

pub use hash::compute_run_id;
pub use metrics::{SummaryMetrics, TripRecord};
pub use store::{RunStore, StagedRun};
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("Invalid path: {message}")]
    InvalidPath { message: String },

    #[error("Invalid run id: {0}")]
    InvalidRunId(String),

    #[error("Malformed table {file}: {message}")]
    MalformedTable { file: String, message: String },

    #[error("Inconsistent result bundle: {what}")]
    Inconsistent { what: String },
}
