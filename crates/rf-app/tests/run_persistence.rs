mod common;

use common::{init_tracing, ring_task, write_task};
use rf_app::{RunOptions, RunRequest, ensure_run, get_run_summary, list_runs, load_run};
use rf_controls::{ControllerSpec, MpcConfig};
use rf_results::RunStore;

#[test]
fn no_control_run_persists_next_to_task() {
    init_tracing();
    let path = write_task("no_control_persist", &ring_task(ControllerSpec::NoControl));
    let request = RunRequest {
        task_path: &path,
        options: RunOptions::default(),
    };

    let response = ensure_run(&request).expect("run failed");
    assert!(!response.loaded_from_cache);
    assert_eq!(response.manifest.n_cycles, 10);
    assert_eq!(response.manifest.controller, "no_control");

    let runs = list_runs(&path).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, response.run_id);

    let (manifest, bundle) = load_run(&path, &response.run_id).unwrap();
    assert_eq!(manifest, response.manifest);
    assert_eq!(bundle.n_rows(), 10);
    assert!(bundle.inputs.iter().flatten().all(|&u| u == 0.0));

    let summary = get_run_summary(&bundle).unwrap();
    assert_eq!(summary.time_range, (90.0, 900.0));
    assert_eq!(summary.region_count, 2);
    assert_eq!(summary.actuator_count, 3);

    let store = RunStore::for_task(&path).unwrap();
    assert!(store.run_dir(&response.run_id).join("task.json").exists());
}

#[test]
fn second_run_is_served_from_cache() {
    let path = write_task(
        "mpc_cache",
        &ring_task(ControllerSpec::Mpc(MpcConfig::default())),
    );
    let request = RunRequest {
        task_path: &path,
        options: RunOptions::default(),
    };

    let first = ensure_run(&request).unwrap();
    let second = ensure_run(&request).unwrap();
    assert!(!first.loaded_from_cache);
    assert!(second.loaded_from_cache);
    assert_eq!(first.run_id, second.run_id);

    let (_, bundle) = load_run(&path, &first.run_id).unwrap();
    for row in &bundle.inputs {
        assert!(row.iter().all(|u| (0.6..=1.0).contains(u)), "{row:?}");
    }
}

#[test]
fn changing_the_task_changes_the_run_id() {
    let options = RunOptions::default();
    let a = ring_task(ControllerSpec::NoControl);
    let mut b = a.clone();
    b.control.seed += 1;
    assert_ne!(
        rf_app::run_id_for(&a, &options).unwrap(),
        rf_app::run_id_for(&b, &options).unwrap()
    );
    assert_eq!(
        rf_app::run_id_for(&a, &options).unwrap(),
        rf_app::run_id_for(&a.clone(), &options).unwrap()
    );
}

#[test]
fn unknown_run_is_reported() {
    let path = write_task("unknown_run", &ring_task(ControllerSpec::NoControl));
    assert!(matches!(
        load_run(&path, "deadbeef"),
        Err(rf_app::AppError::RunNotFound(_))
    ));
}
