//! Schema migration framework.

use crate::ProjectError;
use crate::schema::TaskConfig;

pub const LATEST_VERSION: u32 = 1;

pub fn migrate_to_latest(mut task: TaskConfig) -> Result<TaskConfig, ProjectError> {
    while task.schema_version < LATEST_VERSION {
        task = migrate_one_version(task)?;
    }
    Ok(task)
}

fn migrate_one_version(task: TaskConfig) -> Result<TaskConfig, ProjectError> {
    match task.schema_version {
        0 => migrate_v0_to_v1(task),
        v => Err(ProjectError::Migration {
            what: format!("No migration path from version {v}"),
        }),
    }
}

/// Version 0 files stored the error weights for density+flow output as a
/// single per-region list; version 1 needs one weight per output row.
fn migrate_v0_to_v1(mut task: TaskConfig) -> Result<TaskConfig, ProjectError> {
    if task.control.output == rf_mfd::OutputKind::DensityFlow
        && let Some(weights) = &mut task.control.error_weights
    {
        let doubled: Vec<f64> = weights.iter().chain(weights.iter()).copied().collect();
        *weights = doubled;
    }
    task.schema_version = 1;
    Ok(task)
}

#[cfg(test)]
mod tests {
    #[test]
    fn latest_version_is_positive() {
        assert!(super::LATEST_VERSION >= 1);
    }
}
