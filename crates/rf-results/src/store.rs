//! Run storage API.
//!
//! Layout under the store root:
//!
//! ```text
//! <run_id>/manifest.json
//! <run_id>/summary.json
//! <run_id>/{density,flow,inputs,region_inputs,prediction,error}.csv
//! .<run_id>.partial/      staging directory of a run in progress
//! ```
//!
//! A run only appears under its id once [`StagedRun::commit`] renames the
//! staging directory; a dropped, uncommitted stage is removed.

use std::fs;
use std::path::{Path, PathBuf};

use csv::{Reader, Writer};
use serde::Serialize;
use tracing::{debug, warn};

use crate::metrics::SummaryMetrics;
use crate::types::{ResultBundle, RunManifest};
use crate::{ResultsError, ResultsResult};

const MANIFEST: &str = "manifest.json";
const SUMMARY: &str = "summary.json";
const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Clone)]
pub struct RunStore {
    root_dir: PathBuf,
}

impl RunStore {
    pub fn new(root_dir: PathBuf) -> ResultsResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    /// Store next to a task file, under `.regioflow/runs`.
    pub fn for_task(task_path: &Path) -> ResultsResult<Self> {
        let task_dir = task_path.parent().ok_or_else(|| ResultsError::InvalidPath {
            message: "task path has no parent directory".to_string(),
        })?;
        Self::new(task_dir.join(".regioflow").join("runs"))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root_dir.join(run_id)
    }

    fn staging_dir(&self, run_id: &str) -> PathBuf {
        self.root_dir.join(format!(".{run_id}{PARTIAL_SUFFIX}"))
    }

    fn check_id(run_id: &str) -> ResultsResult<()> {
        let bad = run_id.is_empty()
            || run_id.starts_with('.')
            || run_id.contains(['/', '\\'])
            || run_id.contains("..");
        if bad {
            return Err(ResultsError::InvalidRunId(run_id.to_string()));
        }
        Ok(())
    }

    pub fn has_run(&self, run_id: &str) -> bool {
        self.run_dir(run_id).join(MANIFEST).exists()
    }

    /// Open a staging directory for `run_id`, replacing a stale one.
    pub fn stage_run(&self, run_id: &str) -> ResultsResult<StagedRun> {
        Self::check_id(run_id)?;
        let staging = self.staging_dir(run_id);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;
        debug!(run_id, path = %staging.display(), "staging run");
        Ok(StagedRun {
            run_id: run_id.to_string(),
            staging,
            final_dir: self.run_dir(run_id),
            committed: false,
        })
    }

    /// Write a complete run in one go.
    pub fn save_run(&self, manifest: &RunManifest, bundle: &ResultBundle) -> ResultsResult<PathBuf> {
        let staged = self.stage_run(&manifest.run_id)?;
        staged.write_bundle(bundle)?;
        staged.commit(manifest)
    }

    pub fn load_manifest(&self, run_id: &str) -> ResultsResult<RunManifest> {
        let manifest_path = self.run_dir(run_id).join(MANIFEST);

        if !manifest_path.exists() {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }

        let content = fs::read_to_string(manifest_path)?;
        let manifest = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    pub fn load_bundle(&self, run_id: &str) -> ResultsResult<ResultBundle> {
        if !self.has_run(run_id) {
            return Err(ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        let dir = self.run_dir(run_id);

        let density = read_table(&dir, "density")?;
        let flow = read_table(&dir, "flow")?;
        let inputs = read_table(&dir, "inputs")?;
        let region_inputs = read_table(&dir, "region_inputs")?;
        let prediction = read_table(&dir, "prediction")?;
        let error = read_table(&dir, "error")?;

        for table in [&flow, &inputs, &region_inputs, &prediction, &error] {
            if table.time != density.time {
                return Err(ResultsError::MalformedTable {
                    file: format!("{}.csv", table.name),
                    message: "time column differs from density.csv".to_string(),
                });
            }
        }

        let summary: SummaryMetrics = serde_json::from_str(&fs::read_to_string(dir.join(SUMMARY))?)?;

        let bundle = ResultBundle {
            n_regions: density.columns.len(),
            time_s: density.time,
            density: density.rows,
            flow: flow.rows,
            actuator_names: inputs.columns,
            inputs: inputs.rows,
            region_inputs: region_inputs.rows,
            prediction: prediction.rows,
            error: error.rows.into_iter().filter_map(|r| r.first().copied()).collect(),
            summary,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    /// Committed runs, oldest timestamp first.
    pub fn list_runs(&self) -> ResultsResult<Vec<RunManifest>> {
        let mut runs = Vec::new();

        if !self.root_dir.exists() {
            return Ok(runs);
        }

        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            let run_id = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_dir()
                && !run_id.starts_with('.')
                && let Ok(manifest) = self.load_manifest(&run_id)
            {
                runs.push(manifest);
            }
        }

        runs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.run_id.cmp(&b.run_id)));
        Ok(runs)
    }

    pub fn delete_run(&self, run_id: &str) -> ResultsResult<()> {
        Self::check_id(run_id)?;
        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            fs::remove_dir_all(run_dir)?;
        }
        Ok(())
    }

    /// Remove staging directories left behind by interrupted processes.
    pub fn discard_partial_runs(&self) -> ResultsResult<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX) && entry.path().is_dir() {
                fs::remove_dir_all(entry.path())?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// A run being written. Dropped without `commit`, its files are removed.
#[derive(Debug)]
pub struct StagedRun {
    run_id: String,
    staging: PathBuf,
    final_dir: PathBuf,
    committed: bool,
}

impl StagedRun {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.staging
    }

    pub fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> ResultsResult<()> {
        fs::write(self.staging.join(file_name), serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    pub fn write_bundle(&self, bundle: &ResultBundle) -> ResultsResult<()> {
        bundle.validate()?;
        let regions: Vec<String> = (0..bundle.n_regions).map(|r| format!("region_{r}")).collect();

        write_table(&self.staging, "density", &regions, &bundle.time_s, &bundle.density)?;
        write_table(&self.staging, "flow", &regions, &bundle.time_s, &bundle.flow)?;
        write_table(
            &self.staging,
            "inputs",
            &bundle.actuator_names,
            &bundle.time_s,
            &bundle.inputs,
        )?;
        write_table(
            &self.staging,
            "region_inputs",
            &regions,
            &bundle.time_s,
            &bundle.region_inputs,
        )?;
        write_table(&self.staging, "prediction", &regions, &bundle.time_s, &bundle.prediction)?;

        let error_rows: Vec<Vec<f64>> = bundle.error.iter().map(|&e| vec![e]).collect();
        write_table(
            &self.staging,
            "error",
            &["error".to_string()],
            &bundle.time_s,
            &error_rows,
        )?;

        self.write_json(SUMMARY, &bundle.summary)
    }

    /// Write the manifest and move the run into place, replacing an older
    /// run with the same id.
    pub fn commit(mut self, manifest: &RunManifest) -> ResultsResult<PathBuf> {
        if manifest.run_id != self.run_id {
            return Err(ResultsError::InvalidRunId(manifest.run_id.clone()));
        }
        self.write_json(MANIFEST, manifest)?;
        if self.final_dir.exists() {
            fs::remove_dir_all(&self.final_dir)?;
        }
        fs::rename(&self.staging, &self.final_dir)?;
        self.committed = true;
        Ok(self.final_dir.clone())
    }

    /// Remove the staged files now instead of on drop.
    pub fn discard(mut self) -> ResultsResult<()> {
        self.committed = true;
        if self.staging.exists() {
            fs::remove_dir_all(&self.staging)?;
        }
        Ok(())
    }
}

impl Drop for StagedRun {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.staging) {
            warn!(run_id = %self.run_id, error = %e, "failed to remove partial run");
        } else {
            warn!(run_id = %self.run_id, "discarded partial run");
        }
    }
}

fn write_table(
    dir: &Path,
    name: &str,
    columns: &[String],
    time: &[f64],
    rows: &[Vec<f64>],
) -> ResultsResult<()> {
    let mut writer = Writer::from_path(dir.join(format!("{name}.csv")))?;
    writer.write_record(std::iter::once("time_s").chain(columns.iter().map(String::as_str)))?;
    for (t, row) in time.iter().zip(rows) {
        writer.write_record(std::iter::once(t.to_string()).chain(row.iter().map(f64::to_string)))?;
    }
    writer.flush()?;
    Ok(())
}

struct Table {
    name: &'static str,
    columns: Vec<String>,
    time: Vec<f64>,
    rows: Vec<Vec<f64>>,
}

fn read_table(dir: &Path, name: &'static str) -> ResultsResult<Table> {
    let file = format!("{name}.csv");
    let malformed = |message: String| ResultsError::MalformedTable {
        file: file.clone(),
        message,
    };

    let mut reader = Reader::from_path(dir.join(&file))?;
    let header = reader.headers()?.clone();
    if header.get(0) != Some("time_s") {
        return Err(malformed("first column must be time_s".to_string()));
    }
    let columns: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

    let mut time = Vec::new();
    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let values = record
            .iter()
            .map(|field| field.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| malformed(format!("row {line}: {e}")))?;
        let Some((&t, rest)) = values.split_first() else {
            return Err(malformed(format!("row {line} is empty")));
        };
        time.push(t);
        rows.push(rest.to_vec());
    }

    Ok(Table {
        name,
        columns,
        time,
        rows,
    })
}
