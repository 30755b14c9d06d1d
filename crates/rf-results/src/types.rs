//! Result data types.

use serde::{Deserialize, Serialize};

use crate::metrics::SummaryMetrics;
use crate::{ResultsError, ResultsResult};

pub type RunId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub task_name: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub controller: String,
    pub n_regions: usize,
    pub n_cycles: usize,
    pub cycle_s: f64,
    pub engine_version: String,
}

impl RunManifest {
    /// Manifest stamped with the current time.
    pub fn now(
        run_id: RunId,
        task_name: impl Into<String>,
        controller: impl Into<String>,
        bundle: &ResultBundle,
        cycle_s: f64,
        engine_version: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            task_name: task_name.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            controller: controller.into(),
            n_regions: bundle.n_regions,
            n_cycles: bundle.n_rows(),
            cycle_s,
            engine_version: engine_version.into(),
        }
    }
}

/// Everything a finished control run produced.
///
/// Every table has one row per control cycle, aligned with `time_s`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    pub n_regions: usize,
    /// Simulation time at the end of each cycle.
    pub time_s: Vec<f64>,
    /// Observed region densities (veh/km), one column per region.
    pub density: Vec<Vec<f64>>,
    /// Observed region flows (veh/h), one column per region.
    pub flow: Vec<Vec<f64>>,
    pub actuator_names: Vec<String>,
    /// Applied input per actuator, columns keyed by `actuator_names`.
    pub inputs: Vec<Vec<f64>>,
    /// Region-level effective input.
    pub region_inputs: Vec<Vec<f64>>,
    /// One-step model prediction of the next region densities.
    pub prediction: Vec<Vec<f64>>,
    /// Tracking error `(y - r)' W (y - r)` per cycle.
    pub error: Vec<f64>,
    pub summary: SummaryMetrics,
}

impl ResultBundle {
    pub fn new(n_regions: usize, actuator_names: Vec<String>) -> Self {
        Self {
            n_regions,
            actuator_names,
            ..Self::default()
        }
    }

    pub fn n_rows(&self) -> usize {
        self.time_s.len()
    }

    /// Check that every table has `n_rows` rows of the right width.
    pub fn validate(&self) -> ResultsResult<()> {
        let n = self.n_rows();
        let tables: [(&str, &Vec<Vec<f64>>, usize); 5] = [
            ("density", &self.density, self.n_regions),
            ("flow", &self.flow, self.n_regions),
            ("inputs", &self.inputs, self.actuator_names.len()),
            ("region_inputs", &self.region_inputs, self.n_regions),
            ("prediction", &self.prediction, self.n_regions),
        ];
        for (name, rows, width) in tables {
            if rows.len() != n {
                return Err(ResultsError::Inconsistent {
                    what: format!("{name} has {} rows, expected {n}", rows.len()),
                });
            }
            if let Some(bad) = rows.iter().position(|r| r.len() != width) {
                return Err(ResultsError::Inconsistent {
                    what: format!("{name} row {bad} has {} columns, expected {width}", rows[bad].len()),
                });
            }
        }
        if self.error.len() != n {
            return Err(ResultsError::Inconsistent {
                what: format!("error has {} rows, expected {n}", self.error.len()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_catches_ragged_tables() {
        let mut bundle = ResultBundle::new(2, vec!["a".into()]);
        bundle.time_s = vec![60.0];
        bundle.density = vec![vec![1.0, 2.0]];
        bundle.flow = vec![vec![1.0, 2.0]];
        bundle.inputs = vec![vec![0.8]];
        bundle.region_inputs = vec![vec![0.8, 0.8]];
        bundle.prediction = vec![vec![1.0, 2.0]];
        bundle.error = vec![0.5];
        assert!(bundle.validate().is_ok());

        bundle.flow = vec![vec![1.0]];
        assert!(matches!(bundle.validate(), Err(ResultsError::Inconsistent { .. })));
    }
}
