mod common;

use common::line_task;
use rf_project::*;

#[test]
fn roundtrip_yaml_line_task() {
    let task = line_task();
    validate_task(&task).unwrap();

    let path = std::env::temp_dir().join("rf_project_roundtrip_line.yaml");
    save_yaml(&path, &task).unwrap();
    let loaded = load_yaml(&path).unwrap();
    assert_eq!(task, loaded);
}

#[test]
fn roundtrip_json_line_task() {
    let task = line_task();
    let path = std::env::temp_dir().join("rf_project_roundtrip_line.json");
    save_json(&path, &task).unwrap();
    let loaded = load_task(&path).unwrap();
    assert_eq!(task, loaded);
}

#[test]
fn save_refuses_invalid_task() {
    let mut task = line_task();
    task.control.cycle_s = 0.0;
    let path = std::env::temp_dir().join("rf_project_invalid.yaml");
    assert!(matches!(
        save_yaml(&path, &task),
        Err(ProjectError::Validation(ValidationError::InvalidValue { .. }))
    ));
}

#[test]
fn version_zero_files_are_migrated() {
    let mut task = line_task();
    task.schema_version = 0;
    task.control.error_weights = Some(vec![1.0, 0.5]);

    let migrated = migrate_to_latest(task).unwrap();
    assert_eq!(migrated.schema_version, LATEST_VERSION);
    assert_eq!(migrated.control.error_weights, Some(vec![1.0, 0.5, 1.0, 0.5]));
    validate_task(&migrated).unwrap();
}

#[test]
fn newer_versions_are_rejected() {
    let mut task = line_task();
    task.schema_version = LATEST_VERSION + 1;
    assert_eq!(
        validate_task(&task),
        Err(ValidationError::UnsupportedVersion {
            version: LATEST_VERSION + 1
        })
    );
}
