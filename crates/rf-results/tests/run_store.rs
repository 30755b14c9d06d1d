use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rf_results::*;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}_{nanos}"))
}

fn sample_bundle() -> ResultBundle {
    let mut bundle = ResultBundle::new(2, vec!["tls_a".into(), "tls_b".into(), "tls_c".into()]);
    for k in 0..3 {
        let t = 90.0 * (k + 1) as f64;
        bundle.time_s.push(t);
        bundle.density.push(vec![10.0 + k as f64, 20.5 - k as f64 * 0.25]);
        bundle.flow.push(vec![400.0, 0.1 + 0.2]);
        bundle.inputs.push(vec![0.6, 0.75, 1.0]);
        bundle.region_inputs.push(vec![0.675, 1.0]);
        bundle.prediction.push(vec![10.5, 20.0]);
        bundle.error.push(1.0 / 3.0 + k as f64);
    }
    bundle.summary = SummaryMetrics {
        vehicle_count: 12,
        mean_travel_time_min: 4.5,
        ..SummaryMetrics::default()
    };
    bundle
}

fn manifest(run_id: &str, bundle: &ResultBundle) -> RunManifest {
    RunManifest {
        run_id: run_id.to_string(),
        task_name: "grid".to_string(),
        timestamp: "2026-02-26T00:00:00+00:00".to_string(),
        controller: "mpc".to_string(),
        n_regions: bundle.n_regions,
        n_cycles: bundle.n_rows(),
        cycle_s: 90.0,
        engine_version: "regional-0.1".to_string(),
    }
}

#[test]
fn save_list_load_roundtrip() {
    let root = unique_temp_dir("rf_results_roundtrip");
    let store = RunStore::new(root.clone()).unwrap();
    let bundle = sample_bundle();

    let dir = store.save_run(&manifest("run-1", &bundle), &bundle).unwrap();
    assert_eq!(dir, root.join("run-1"));
    assert!(store.has_run("run-1"));

    let runs = store.list_runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].controller, "mpc");

    let loaded = store.load_bundle("run-1").unwrap();
    assert_eq!(loaded, bundle);

    store.delete_run("run-1").unwrap();
    assert!(!store.has_run("run-1"));
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn dropped_stage_leaves_no_run() {
    let root = unique_temp_dir("rf_results_drop");
    let store = RunStore::new(root.clone()).unwrap();

    {
        let staged = store.stage_run("aborted").unwrap();
        staged.write_json("task.json", &vec![1, 2, 3]).unwrap();
        assert!(staged.path().join("task.json").exists());
    }

    assert!(!store.has_run("aborted"));
    assert!(!root.join("aborted").exists());
    assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn commit_replaces_existing_run() {
    let root = unique_temp_dir("rf_results_replace");
    let store = RunStore::new(root.clone()).unwrap();
    let mut bundle = sample_bundle();
    store.save_run(&manifest("same", &bundle), &bundle).unwrap();

    bundle.error = vec![0.0; bundle.n_rows()];
    store.save_run(&manifest("same", &bundle), &bundle).unwrap();

    assert_eq!(store.load_bundle("same").unwrap().error, vec![0.0; 3]);
    assert_eq!(store.list_runs().unwrap().len(), 1);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn missing_and_invalid_runs() {
    let root = unique_temp_dir("rf_results_missing");
    let store = RunStore::new(root.clone()).unwrap();

    assert!(matches!(
        store.load_manifest("nope"),
        Err(ResultsError::RunNotFound { .. })
    ));
    assert!(matches!(
        store.stage_run("../escape"),
        Err(ResultsError::InvalidRunId(_))
    ));
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn stale_partials_are_cleaned() {
    let root = unique_temp_dir("rf_results_stale");
    let store = RunStore::new(root.clone()).unwrap();
    fs::create_dir_all(root.join(".crashed.partial")).unwrap();

    assert_eq!(store.discard_partial_runs().unwrap(), 1);
    assert!(store.list_runs().unwrap().is_empty());
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn run_ids_follow_task_content() {
    let a = compute_run_id(&("grid", 42u64), "0.1.0").unwrap();
    let b = compute_run_id(&("grid", 43u64), "0.1.0").unwrap();
    assert_ne!(a, b);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}
