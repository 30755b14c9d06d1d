mod common;

use common::{ring_task, write_task};
use rf_app::{
    RunOptions, RunProgressEvent, RunRequest, RunStage, TaskSummary, ensure_run_with_progress,
    summarize_task,
};
use rf_controls::ControllerSpec;

fn collect_events(request: &RunRequest<'_>) -> (rf_app::RunResponse, Vec<RunProgressEvent>) {
    let mut events = Vec::new();
    let response = ensure_run_with_progress(request, Some(&mut |event| events.push(event)))
        .expect("run with progress should succeed");
    (response, events)
}

#[test]
fn stages_and_cycles_are_reported_in_order() {
    let path = write_task("progress_stages", &ring_task(ControllerSpec::Random));
    let request = RunRequest {
        task_path: &path,
        options: RunOptions {
            use_cache: false,
            ..RunOptions::default()
        },
    };

    let (response, events) = collect_events(&request);
    assert!(!response.loaded_from_cache);
    assert_eq!(response.timing.cycles, 10);
    assert!(response.timing.total_time_s > 0.0);

    let stages: Vec<RunStage> = events.iter().map(|e| e.stage).collect();
    let position = |stage| stages.iter().position(|s| *s == stage).unwrap();
    assert_eq!(stages.first(), Some(&RunStage::LoadingTask));
    assert_eq!(stages.last(), Some(&RunStage::Completed));
    assert!(position(RunStage::FittingMfd) < position(RunStage::BuildingModel));
    assert!(position(RunStage::BuildingModel) < position(RunStage::RunningControl));
    assert!(position(RunStage::RunningControl) < position(RunStage::SavingResults));
    assert!(!stages.contains(&RunStage::Calibrating));

    let cycles: Vec<_> = events.iter().filter_map(|e| e.control.clone()).collect();
    assert_eq!(cycles.len(), 10);
    for (k, progress) in cycles.iter().enumerate() {
        assert_eq!(progress.cycle, k);
        assert_eq!(progress.n_cycles, 10);
        assert_eq!(progress.sim_time_s, 90.0 * (k + 1) as f64);
    }
    assert_eq!(cycles.last().map(|c| c.fraction_complete), Some(1.0));

    let wall: Vec<f64> = events.iter().map(|e| e.elapsed_wall_s).collect();
    assert!(wall.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn cached_run_skips_control() {
    let path = write_task("progress_cached", &ring_task(ControllerSpec::NoControl));
    let request = RunRequest {
        task_path: &path,
        options: RunOptions::default(),
    };
    collect_events(&request);
    let (response, events) = collect_events(&request);

    assert!(response.loaded_from_cache);
    assert!(events.iter().any(|e| e.stage == RunStage::LoadingCachedResult));
    assert!(events.iter().all(|e| e.stage != RunStage::RunningControl));
}

#[test]
fn task_summary_counts() {
    let summary = summarize_task(&ring_task(ControllerSpec::NoControl));
    assert_eq!(
        summary,
        TaskSummary {
            name: "Two-region ring, perimeter signals".to_string(),
            edge_count: 4,
            region_count: 2,
            actuator_count: 3,
            actuator_class: "traffic_light",
            controller: "no_control".to_string(),
            cycle_count: 10,
        }
    );
}
