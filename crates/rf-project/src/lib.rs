//! rf-project: task file format, validation and external data loading.

pub mod migrate;
pub mod resolve;
pub mod schema;
pub mod validate;

use std::path::Path;

pub use migrate::{LATEST_VERSION, migrate_to_latest};
pub use resolve::resolve_sources;
pub use schema::*;
pub use validate::{ValidationError, validate_task};

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Migration error: {what}")]
    Migration { what: String },

    #[error("Cannot load {path}: {message}")]
    ExternalData { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn base_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

fn finish(mut task: TaskConfig, path: &Path) -> ProjectResult<TaskConfig> {
    task = migrate_to_latest(task)?;
    resolve_sources(&mut task, base_dir(path))?;
    validate_task(&task)?;
    Ok(task)
}

/// Load a task file. External label, sample and demand files are read
/// relative to the task file's directory.
pub fn load_yaml(path: &Path) -> ProjectResult<TaskConfig> {
    let content = std::fs::read_to_string(path)?;
    let task: TaskConfig = serde_yaml::from_str(&content)?;
    finish(task, path)
}

pub fn save_yaml(path: &Path, task: &TaskConfig) -> ProjectResult<()> {
    validate_task(task)?;
    let content = serde_yaml::to_string(task)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &Path) -> ProjectResult<TaskConfig> {
    let content = std::fs::read_to_string(path)?;
    let task: TaskConfig = serde_json::from_str(&content)?;
    finish(task, path)
}

pub fn save_json(path: &Path, task: &TaskConfig) -> ProjectResult<()> {
    validate_task(task)?;
    let content = serde_json::to_string_pretty(task)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load by extension: `.json` as JSON, anything else as YAML.
pub fn load_task(path: &Path) -> ProjectResult<TaskConfig> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_json(path),
        _ => load_yaml(path),
    }
}
