//! Run execution and caching service.

use std::path::Path;
use std::time::Instant;

use rf_controls::Controller;
use rf_project::TaskConfig;
use rf_results::{ResultBundle, RunManifest, RunStore, StagedRun};
use rf_sim::{
    ControlLoop, CycleReport, EngineSession, REGIONAL_ENGINE_VERSION, RegionalEngine,
};
use tracing::{error, info, warn};

use crate::assemble::{self, TaskRuntime};
use crate::error::AppResult;
use crate::progress::{ControlProgress, RunProgressEvent, RunStage};
use crate::task_service;

/// Options for running tasks.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub use_cache: bool,
    /// Folded into the run id so results of older builds are not reused.
    pub version: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Request to execute a task.
pub struct RunRequest<'a> {
    pub task_path: &'a Path,
    pub options: RunOptions,
}

#[derive(Debug, Clone, Default)]
pub struct RunTimingSummary {
    pub assemble_time_s: f64,
    pub control_time_s: f64,
    pub save_time_s: f64,
    pub load_cache_time_s: f64,
    pub total_time_s: f64,
    pub cycles: usize,
}

#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    pub manifest: RunManifest,
    pub loaded_from_cache: bool,
    pub timing: RunTimingSummary,
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    stage: RunStage,
    started: Instant,
    message: Option<String>,
    control: Option<ControlProgress>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent {
            stage,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
            message,
            control,
        });
    }
}

/// Content hash of the task together with the service and engine versions.
pub fn run_id_for(task: &TaskConfig, options: &RunOptions) -> AppResult<String> {
    let version = format!("{}+{}", options.version, REGIONAL_ENGINE_VERSION);
    Ok(rf_results::compute_run_id(task, &version)?)
}

/// Execute or load a run based on request.
pub fn ensure_run(request: &RunRequest) -> AppResult<RunResponse> {
    ensure_run_with_progress(request, None)
}

/// Execute or load a run and stream progress events.
///
/// A failed run leaves no directory under its id: the staged output is
/// discarded and the engine torn down before the error is returned.
pub fn ensure_run_with_progress(
    request: &RunRequest,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<RunResponse> {
    let started = Instant::now();
    let mut timing = RunTimingSummary::default();

    emit_progress(
        &mut progress_cb,
        RunStage::LoadingTask,
        started,
        Some("Loading task".to_string()),
        None,
    );
    let task = task_service::load_task(request.task_path)?;

    emit_progress(
        &mut progress_cb,
        RunStage::CheckingCache,
        started,
        Some("Checking run cache".to_string()),
        None,
    );
    let run_id = run_id_for(&task, &request.options)?;
    let store = RunStore::for_task(request.task_path)?;
    let stale = store.discard_partial_runs()?;
    if stale > 0 {
        warn!(stale, "removed partial output of interrupted runs");
    }

    if request.options.use_cache && store.has_run(&run_id) {
        emit_progress(
            &mut progress_cb,
            RunStage::LoadingCachedResult,
            started,
            Some("Loading cached run".to_string()),
            None,
        );
        let load_started = Instant::now();
        let manifest = store.load_manifest(&run_id)?;
        timing.load_cache_time_s = load_started.elapsed().as_secs_f64();
        timing.cycles = manifest.n_cycles;
        timing.total_time_s = started.elapsed().as_secs_f64();
        emit_progress(
            &mut progress_cb,
            RunStage::Completed,
            started,
            Some("Loaded cached run".to_string()),
            None,
        );
        return Ok(RunResponse {
            run_id,
            manifest,
            loaded_from_cache: true,
            timing,
        });
    }

    info!(run_id = %run_id, task = %task.name, controller = task.controller.name(), "run started");
    let manifest = match execute_task(
        &task,
        &store,
        &run_id,
        &mut progress_cb,
        started,
        &mut timing,
    ) {
        Ok(manifest) => manifest,
        Err(err) => {
            error!(run_id = %run_id, cycle = ?err.cycle(), stage = ?err.stage(), %err, "run aborted");
            return Err(err);
        }
    };
    timing.total_time_s = started.elapsed().as_secs_f64();
    info!(run_id = %run_id, total_time_s = timing.total_time_s, "run finished");

    emit_progress(
        &mut progress_cb,
        RunStage::Completed,
        started,
        Some("Run completed".to_string()),
        None,
    );
    Ok(RunResponse {
        run_id,
        manifest,
        loaded_from_cache: false,
        timing,
    })
}

/// Assemble, run and persist one task.
fn execute_task(
    task: &TaskConfig,
    store: &RunStore,
    run_id: &str,
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    started: Instant,
    timing: &mut RunTimingSummary,
) -> AppResult<RunManifest> {
    let assemble_started = Instant::now();
    emit_progress(
        progress_cb,
        RunStage::FittingMfd,
        started,
        Some("Preparing MFD samples".to_string()),
        None,
    );
    let runtime = assemble::assemble_task(task, || {
        emit_progress(
            progress_cb,
            RunStage::Calibrating,
            started,
            Some("Collecting MFD samples on the built-in engine".to_string()),
            None,
        )
    })?;
    emit_progress(
        progress_cb,
        RunStage::BuildingModel,
        started,
        Some(format!(
            "{} regions, {} actuators",
            runtime.partition.n_regions(),
            runtime.group.len()
        )),
        None,
    );
    let controller = Controller::from_spec(&task.controller, task.control.seed)?;
    timing.assemble_time_s = assemble_started.elapsed().as_secs_f64();

    // Output is staged from here on; dropping `staged` on any error below
    // removes it.
    let staged = store.stage_run(run_id)?;
    staged.write_json("task.json", task)?;

    let control_started = Instant::now();
    let (bundle, engine_version) =
        run_control(task, &runtime, controller, progress_cb, started)?;
    timing.control_time_s = control_started.elapsed().as_secs_f64();
    timing.cycles = bundle.n_rows();

    emit_progress(
        progress_cb,
        RunStage::SavingResults,
        started,
        Some("Saving results".to_string()),
        None,
    );
    let save_started = Instant::now();
    let manifest = RunManifest::now(
        run_id.to_string(),
        task.name.clone(),
        task.controller.name(),
        &bundle,
        task.control.cycle_s,
        engine_version,
    );
    persist(staged, &manifest, &bundle)?;
    timing.save_time_s = save_started.elapsed().as_secs_f64();
    Ok(manifest)
}

fn run_control(
    task: &TaskConfig,
    runtime: &TaskRuntime,
    controller: Controller,
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    started: Instant,
) -> AppResult<(ResultBundle, String)> {
    let engine = RegionalEngine::new(
        runtime.network.clone(),
        &runtime.partition,
        runtime.demand.clone(),
        assemble::engine_config(task),
    )?;
    let session = EngineSession::open(engine, runtime.partition.n_regions())?;
    let engine_version = session.version()?;

    let control = ControlLoop::new(
        &runtime.partition,
        &runtime.model,
        &runtime.group,
        &runtime.demand,
        controller,
        runtime.loop_config.clone(),
    )?;

    emit_progress(
        progress_cb,
        RunStage::RunningControl,
        started,
        Some(format!("{} cycles", runtime.loop_config.clock.n_cycles())),
        None,
    );
    let mut on_cycle = |report: CycleReport| {
        emit_progress(
            progress_cb,
            RunStage::RunningControl,
            started,
            None,
            Some(ControlProgress::from(&report)),
        );
    };
    let bundle = control.run_with_progress(session, Some(&mut on_cycle))?;
    Ok((bundle, engine_version))
}

fn persist(staged: StagedRun, manifest: &RunManifest, bundle: &ResultBundle) -> AppResult<()> {
    staged.write_bundle(bundle)?;
    staged.commit(manifest)?;
    Ok(())
}

/// Runs stored next to a task file, most recent first.
pub fn list_runs(task_path: &Path) -> AppResult<Vec<RunManifest>> {
    let store = RunStore::for_task(task_path)?;
    let mut runs = store.list_runs()?;
    runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(runs)
}

pub fn load_run(task_path: &Path, run_id: &str) -> AppResult<(RunManifest, ResultBundle)> {
    let store = RunStore::for_task(task_path)?;
    let manifest = store.load_manifest(run_id)?;
    let bundle = store.load_bundle(run_id)?;
    Ok((manifest, bundle))
}
