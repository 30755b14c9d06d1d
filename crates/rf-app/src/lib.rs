//! Shared application service layer for regioflow.
//!
//! Turns a task file into a finished, persisted control run: load and
//! validate the task, partition the network, fit regional MFDs, build the
//! linear model and actuators, drive the control loop and store the results.

pub mod assemble;
pub mod error;
pub mod progress;
pub mod query;
pub mod run_service;
pub mod task_service;

pub use assemble::{TaskRuntime, assemble_task};
pub use error::{AppError, AppResult};
pub use progress::{ControlProgress, RunProgressEvent, RunStage};
pub use query::{RegionSample, RunSummary, actuator_series, get_run_summary, region_series};
pub use run_service::{
    RunOptions, RunRequest, RunResponse, RunTimingSummary, ensure_run, ensure_run_with_progress,
    list_runs, load_run, run_id_for,
};
pub use task_service::{TaskSummary, load_task, summarize_task};
