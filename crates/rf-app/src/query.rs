//! Query helpers for loaded result bundles.

use rf_results::ResultBundle;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub time_range: (f64, f64),
    pub cycle_count: usize,
    pub region_count: usize,
    pub actuator_count: usize,
    pub total_error: f64,
    pub vehicle_count: usize,
}

/// One row of a region's time series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionSample {
    pub time_s: f64,
    pub density: f64,
    pub flow: f64,
}

pub fn get_run_summary(bundle: &ResultBundle) -> AppResult<RunSummary> {
    let (Some(&first), Some(&last)) = (bundle.time_s.first(), bundle.time_s.last()) else {
        return Err(AppError::Results("run has no recorded cycles".to_string()));
    };
    Ok(RunSummary {
        time_range: (first, last),
        cycle_count: bundle.n_rows(),
        region_count: bundle.n_regions,
        actuator_count: bundle.actuator_names.len(),
        total_error: bundle.error.iter().sum(),
        vehicle_count: bundle.summary.vehicle_count,
    })
}

pub fn region_series(bundle: &ResultBundle, region: usize) -> AppResult<Vec<RegionSample>> {
    if region >= bundle.n_regions {
        return Err(AppError::Results(format!(
            "region {region} out of range ({} regions)",
            bundle.n_regions
        )));
    }
    Ok(bundle
        .time_s
        .iter()
        .zip(bundle.density.iter().zip(&bundle.flow))
        .map(|(&time_s, (density, flow))| RegionSample {
            time_s,
            density: density[region],
            flow: flow[region],
        })
        .collect())
}

/// Applied input of one actuator over time.
pub fn actuator_series(bundle: &ResultBundle, name: &str) -> AppResult<Vec<(f64, f64)>> {
    let column = bundle
        .actuator_names
        .iter()
        .position(|n| n == name)
        .ok_or_else(|| AppError::Results(format!("no actuator named '{name}'")))?;
    Ok(bundle
        .time_s
        .iter()
        .zip(&bundle.inputs)
        .map(|(&t, row)| (t, row[column]))
        .collect())
}
