//! Loading of externally stored labels, MFD samples and demand.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::schema::{Source, TaskConfig};
use crate::{ProjectError, ProjectResult};

fn load_source<T: DeserializeOwned>(source: &mut Source<T>, base: &Path) -> ProjectResult<()> {
    let Source::File { path } = source else {
        return Ok(());
    };
    let full = base.join(path.as_str());
    let content = std::fs::read_to_string(&full).map_err(|e| ProjectError::ExternalData {
        path: full.display().to_string(),
        message: e.to_string(),
    })?;
    let value: T = serde_json::from_str(&content).map_err(|e| ProjectError::ExternalData {
        path: full.display().to_string(),
        message: e.to_string(),
    })?;
    *source = Source::Inline(value);
    Ok(())
}

/// Replace every file-backed source with its parsed JSON content.
pub fn resolve_sources(task: &mut TaskConfig, base: &Path) -> ProjectResult<()> {
    load_source(&mut task.regions.labels, base)?;
    if let Some(samples) = &mut task.mfd.samples {
        load_source(samples, base)?;
    }
    if let Some(od) = &mut task.demand.od {
        load_source(od, base)?;
    }
    Ok(())
}
