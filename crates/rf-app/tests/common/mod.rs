//! Self-contained task files in per-test temp directories.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rf_controls::ControllerSpec;
use rf_project::{ConstantDemand, TaskConfig};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// The bundled ring task with a steady demand over the whole horizon.
pub fn ring_task(controller: ControllerSpec) -> TaskConfig {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../tasks/two_region_ring.yaml");
    let mut task = rf_project::load_yaml(&path).unwrap();
    task.demand.od = None;
    task.demand.constant = Some(ConstantDemand {
        rates: vec![vec![0.0, 0.4], vec![0.3, 0.0]],
        slots: 900,
    });
    task.controller = controller;
    task
}

/// Write `task` to a fresh directory named after the test.
pub fn write_task(test_name: &str, task: &TaskConfig) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rf_app_{test_name}"));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).unwrap();
    }
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("task.yaml");
    rf_project::save_yaml(&path, task).unwrap();
    path
}
