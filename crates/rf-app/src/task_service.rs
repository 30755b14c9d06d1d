//! Task loading and introspection.

use std::path::Path;

use rf_project::{LabelsDef, TaskConfig};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary {
    pub name: String,
    pub edge_count: usize,
    pub region_count: usize,
    pub actuator_count: usize,
    pub actuator_class: &'static str,
    pub controller: String,
    pub cycle_count: usize,
}

/// Load and validate a YAML or JSON task file.
pub fn load_task(path: &Path) -> AppResult<TaskConfig> {
    if !path.exists() {
        return Err(AppError::TaskFileRead {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        });
    }
    Ok(rf_project::load_task(path)?)
}

pub fn summarize_task(task: &TaskConfig) -> TaskSummary {
    let region_count = task
        .regions
        .labels
        .inline()
        .map_or(0, LabelsDef::n_regions);
    let control = &task.control;
    let cycle_count = if control.cycle_s > 0.0 {
        ((control.end_s - control.begin_s) / control.cycle_s + 1e-9).floor().max(0.0) as usize
    } else {
        0
    };
    TaskSummary {
        name: task.name.clone(),
        edge_count: task.network.edges.len(),
        region_count,
        actuator_count: task.actuators.placements.len(),
        actuator_class: task.actuators.class.name(),
        controller: task.controller.name().to_string(),
        cycle_count,
    }
}
