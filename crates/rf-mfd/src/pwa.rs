//! Piecewise-linear surrogate of a fitted MFD curve.

use serde::{Deserialize, Serialize};

use crate::error::{MfdError, MfdResult};
use crate::polynomial::Polynomial;

/// One linear piece `flow = slope * density + intercept` on `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearSegment {
    pub start: f64,
    pub end: f64,
    pub slope: f64,
    pub intercept: f64,
}

impl LinearSegment {
    /// Segment through `(a, fa)` and `(b, fb)`.
    fn through(a: f64, fa: f64, b: f64, fb: f64) -> Self {
        let slope = (fb - fa) / (b - a);
        Self {
            start: a,
            end: b,
            slope,
            intercept: fa - slope * a,
        }
    }

    pub fn eval(&self, density: f64) -> f64 {
        self.slope * density + self.intercept
    }
}

/// Ordered, contiguous linear segments covering `[0, jam density]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pwa {
    segments: Vec<LinearSegment>,
}

impl Pwa {
    /// Build `n_pwa` segments: half on `[0, critical]`, half on `[critical, jam]`,
    /// with evenly spaced breakpoints on each side. Each segment interpolates the
    /// curve exactly at both of its endpoints.
    pub fn build(curve: &Polynomial, critical: f64, jam: f64, n_pwa: usize) -> MfdResult<Self> {
        if n_pwa < 2 || n_pwa % 2 != 0 {
            return Err(MfdError::InvalidPwaCount { n_pwa });
        }
        if !(critical > 0.0 && critical < jam) {
            return Err(MfdError::CriticalOutOfRange { critical, jam });
        }

        let half = n_pwa / 2;
        let mut breakpoints = Vec::with_capacity(n_pwa + 1);
        for k in 0..half {
            breakpoints.push(critical * k as f64 / half as f64);
        }
        for k in 0..half {
            breakpoints.push(critical + (jam - critical) * k as f64 / half as f64);
        }
        breakpoints.push(jam);

        let values: Vec<f64> = breakpoints.iter().map(|&x| curve.eval(x)).collect();
        let segments = breakpoints
            .windows(2)
            .zip(values.windows(2))
            .map(|(x, y)| LinearSegment::through(x[0], y[0], x[1], y[1]))
            .collect();
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[LinearSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment boundaries, ascending, `len() + 1` values.
    pub fn breakpoints(&self) -> Vec<f64> {
        let mut out: Vec<f64> = self.segments.iter().map(|s| s.start).collect();
        if let Some(last) = self.segments.last() {
            out.push(last.end);
        }
        out
    }

    /// Evaluate the surrogate; densities outside the covered range use the
    /// nearest end segment.
    pub fn eval(&self, density: f64) -> f64 {
        let idx = self
            .segments
            .partition_point(|s| s.end < density)
            .min(self.segments.len().saturating_sub(1));
        self.segments.get(idx).map_or(0.0, |s| s.eval(density))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parabola() -> Polynomial {
        // x (80 - x): critical 40, jam 80
        Polynomial::new(vec![0.0, 80.0, -1.0])
    }

    #[test]
    fn two_segments_meet_at_critical() {
        let pwa = Pwa::build(&parabola(), 40.0, 80.0, 2).unwrap();
        assert_eq!(pwa.breakpoints(), vec![0.0, 40.0, 80.0]);
        assert!((pwa.eval(40.0) - 1600.0).abs() < 1e-9);
        assert!((pwa.eval(20.0) - 800.0).abs() < 1e-9);
    }

    #[test]
    fn odd_count_rejected() {
        assert_eq!(
            Pwa::build(&parabola(), 40.0, 80.0, 3),
            Err(MfdError::InvalidPwaCount { n_pwa: 3 })
        );
        assert_eq!(
            Pwa::build(&parabola(), 40.0, 80.0, 0),
            Err(MfdError::InvalidPwaCount { n_pwa: 0 })
        );
    }

    #[test]
    fn critical_outside_range_rejected() {
        assert!(matches!(
            Pwa::build(&parabola(), 90.0, 80.0, 4),
            Err(MfdError::CriticalOutOfRange { .. })
        ));
    }

    #[test]
    fn breakpoints_are_symmetric_around_critical() {
        let pwa = Pwa::build(&parabola(), 30.0, 80.0, 4).unwrap();
        assert_eq!(pwa.breakpoints(), vec![0.0, 15.0, 30.0, 55.0, 80.0]);
    }
}
