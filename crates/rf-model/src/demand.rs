//! Origin-destination demand.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// `demand[o][d][t]`: vehicles departing region `o` for region `d` during
/// one-second slot `t`. Slots past the end carry no demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandTensor {
    n_regions: usize,
    n_slots: usize,
    data: Vec<f64>,
}

impl DemandTensor {
    pub fn zeros(n_regions: usize, n_slots: usize) -> Self {
        Self {
            n_regions,
            n_slots,
            data: vec![0.0; n_regions * n_regions * n_slots],
        }
    }

    /// Build from nested `[origin][destination][slot]` vectors.
    pub fn from_nested(nested: &[Vec<Vec<f64>>]) -> ModelResult<Self> {
        let n_regions = nested.len();
        let n_slots = nested
            .first()
            .and_then(|row| row.first())
            .map_or(0, Vec::len);
        let mut tensor = Self::zeros(n_regions, n_slots);
        for (o, row) in nested.iter().enumerate() {
            if row.len() != n_regions {
                return Err(ModelError::DimensionMismatch {
                    what: "demand destinations",
                    expected: n_regions,
                    actual: row.len(),
                });
            }
            for (d, series) in row.iter().enumerate() {
                if series.len() != n_slots {
                    return Err(ModelError::DimensionMismatch {
                        what: "demand slots",
                        expected: n_slots,
                        actual: series.len(),
                    });
                }
                for (t, &v) in series.iter().enumerate() {
                    if !v.is_finite() || v < 0.0 {
                        return Err(ModelError::InvalidDemand {
                            what: "entries must be finite and non-negative",
                        });
                    }
                    tensor.set(o, d, t, v);
                }
            }
        }
        Ok(tensor)
    }

    fn offset(&self, o: usize, d: usize, t: usize) -> usize {
        (o * self.n_regions + d) * self.n_slots + t
    }

    pub fn set(&mut self, o: usize, d: usize, t: usize, vehicles: f64) {
        let i = self.offset(o, d, t);
        self.data[i] = vehicles;
    }

    pub fn get(&self, o: usize, d: usize, t: usize) -> f64 {
        if t >= self.n_slots {
            return 0.0;
        }
        self.data[self.offset(o, d, t)]
    }

    pub fn n_regions(&self) -> usize {
        self.n_regions
    }

    pub fn n_slots(&self) -> usize {
        self.n_slots
    }

    fn window(&self, start: usize, len: usize) -> std::ops::Range<usize> {
        let lo = start.min(self.n_slots);
        let hi = start.saturating_add(len).min(self.n_slots);
        lo..hi
    }

    /// Vehicles per origin-destination pair over slots `[start, start + len)`.
    pub fn pairwise(&self, start: usize, len: usize) -> DMatrix<f64> {
        let window = self.window(start, len);
        DMatrix::from_fn(self.n_regions, self.n_regions, |o, d| {
            let base = self.offset(o, d, 0);
            self.data[base + window.start..base + window.end].iter().sum()
        })
    }

    /// Vehicles departing each origin over slots `[start, start + len)`.
    pub fn origin_totals(&self, start: usize, len: usize) -> DVector<f64> {
        let pairs = self.pairwise(start, len);
        DVector::from_fn(self.n_regions, |o, _| pairs.row(o).sum())
    }

    /// Mean departure rate per origin over the window, in vehicles per hour.
    pub fn origin_rate_per_hour(&self, start: usize, len: usize) -> DVector<f64> {
        if len == 0 {
            return DVector::zeros(self.n_regions);
        }
        self.origin_totals(start, len) * (3600.0 / len as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DemandTensor {
        let mut t = DemandTensor::zeros(2, 4);
        for s in 0..4 {
            t.set(0, 1, s, 1.0);
            t.set(1, 1, s, 0.5);
        }
        t.set(1, 0, 3, 2.0);
        t
    }

    #[test]
    fn totals_sum_over_destinations_and_slots() {
        let t = sample();
        assert_eq!(t.origin_totals(0, 2).as_slice(), &[2.0, 1.0]);
        assert_eq!(t.origin_totals(2, 2).as_slice(), &[2.0, 3.0]);
        assert_eq!(t.pairwise(0, 4)[(1, 0)], 2.0);
    }

    #[test]
    fn window_past_end_is_truncated() {
        let t = sample();
        assert_eq!(t.origin_totals(3, 10).as_slice(), &[1.0, 2.5]);
        assert_eq!(t.origin_totals(10, 5).as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn rate_is_per_hour() {
        let t = sample();
        let rate = t.origin_rate_per_hour(0, 2);
        assert_eq!(rate.as_slice(), &[3600.0, 1800.0]);
    }

    #[test]
    fn ragged_nested_rejected() {
        let nested = vec![vec![vec![1.0, 2.0], vec![1.0]], vec![vec![0.0, 0.0], vec![0.0, 0.0]]];
        assert!(DemandTensor::from_nested(&nested).is_err());
    }
}
