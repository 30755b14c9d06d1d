//! Trip-completion records and the run summary computed from them.

use serde::{Deserialize, Serialize};

/// One completed trip as reported by the simulation engine.
///
/// Emissions and fuel are totals over the trip in milligrams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub vehicle: String,
    pub depart_s: f64,
    pub travel_time_s: f64,
    pub waiting_time_s: f64,
    pub co2_mg: f64,
    pub co_mg: f64,
    pub hc_mg: f64,
    pub pmx_mg: f64,
    pub nox_mg: f64,
    pub fuel_mg: f64,
}

/// Per-vehicle means over all completed trips.
///
/// Times are in minutes, emissions and fuel in grams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub vehicle_count: usize,
    pub mean_travel_time_min: f64,
    pub mean_waiting_time_min: f64,
    pub mean_co2_g: f64,
    pub mean_co_g: f64,
    pub mean_hc_g: f64,
    pub mean_pmx_g: f64,
    pub mean_nox_g: f64,
    pub mean_fuel_g: f64,
}

impl SummaryMetrics {
    /// Summarize trip records. No trips gives an all-zero summary.
    pub fn from_trips(trips: &[TripRecord]) -> Self {
        if trips.is_empty() {
            return Self::default();
        }
        let n = trips.len() as f64;
        let avg = |f: fn(&TripRecord) -> f64| trips.iter().map(f).sum::<f64>() / n;
        Self {
            vehicle_count: trips.len(),
            mean_travel_time_min: avg(|t| t.travel_time_s) / 60.0,
            mean_waiting_time_min: avg(|t| t.waiting_time_s) / 60.0,
            mean_co2_g: avg(|t| t.co2_mg) / 1000.0,
            mean_co_g: avg(|t| t.co_mg) / 1000.0,
            mean_hc_g: avg(|t| t.hc_mg) / 1000.0,
            mean_pmx_g: avg(|t| t.pmx_mg) / 1000.0,
            mean_nox_g: avg(|t| t.nox_mg) / 1000.0,
            mean_fuel_g: avg(|t| t.fuel_mg) / 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(travel: f64, waiting: f64, co2: f64) -> TripRecord {
        TripRecord {
            vehicle: "veh".into(),
            depart_s: 0.0,
            travel_time_s: travel,
            waiting_time_s: waiting,
            co2_mg: co2,
            co_mg: 0.0,
            hc_mg: 0.0,
            pmx_mg: 0.0,
            nox_mg: 0.0,
            fuel_mg: 2000.0,
        }
    }

    #[test]
    fn summary_means_and_units() {
        let summary = SummaryMetrics::from_trips(&[trip(120.0, 30.0, 1000.0), trip(240.0, 90.0, 3000.0)]);
        assert_eq!(summary.vehicle_count, 2);
        assert!((summary.mean_travel_time_min - 3.0).abs() < 1e-12);
        assert!((summary.mean_waiting_time_min - 1.0).abs() < 1e-12);
        assert!((summary.mean_co2_g - 2.0).abs() < 1e-12);
        assert!((summary.mean_fuel_g - 2.0).abs() < 1e-12);
    }

    #[test]
    fn empty_trips_give_zero_summary() {
        assert_eq!(SummaryMetrics::from_trips(&[]), SummaryMetrics::default());
    }
}
