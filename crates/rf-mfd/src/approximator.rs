//! Per-region MFD approximation: fit, breakpoints and PWA surrogate.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MfdError, MfdResult};
use crate::fit::fit_polynomial;
use crate::polynomial::Polynomial;
use crate::pwa::Pwa;

/// Roots with `|Im| <= IMAG_TOL * max(1, |Re|)` are treated as real.
pub const IMAG_TOL: f64 = 1e-5;

/// Fitting parameters shared by all regions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MfdConfig {
    pub degree: usize,
    pub n_pwa: usize,
}

impl Default for MfdConfig {
    fn default() -> Self {
        Self {
            degree: 4,
            n_pwa: 10,
        }
    }
}

/// Parallel density / flow observations for one region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MfdSamples {
    pub density: Vec<f64>,
    pub flow: Vec<f64>,
}

impl MfdSamples {
    pub fn push(&mut self, density: f64, flow: f64) {
        self.density.push(density);
        self.flow.push(flow);
    }

    pub fn len(&self) -> usize {
        self.density.len()
    }

    pub fn is_empty(&self) -> bool {
        self.density.is_empty()
    }
}

/// Fitted fundamental diagram of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMfd {
    pub curve: Polynomial,
    pub pwa: Pwa,
    pub critical_density: f64,
    pub jam_density: f64,
}

impl RegionMfd {
    /// Flow predicted by the fitted curve.
    pub fn flow(&self, density: f64) -> f64 {
        self.curve.eval(density)
    }

    /// d flow / d density of the fitted curve.
    pub fn flow_slope(&self, density: f64) -> f64 {
        self.curve.derivative().eval(density)
    }

    pub fn max_flow(&self) -> f64 {
        self.curve.eval(self.critical_density)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MfdApproximator {
    config: MfdConfig,
}

impl MfdApproximator {
    pub fn new(config: MfdConfig) -> MfdResult<Self> {
        if config.n_pwa < 2 || config.n_pwa % 2 != 0 {
            return Err(MfdError::InvalidPwaCount {
                n_pwa: config.n_pwa,
            });
        }
        if config.degree < 2 {
            return Err(MfdError::InvalidDegree {
                degree: config.degree,
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> MfdConfig {
        self.config
    }

    /// Fit one region from its samples.
    pub fn fit_region(&self, samples: &MfdSamples) -> MfdResult<RegionMfd> {
        let curve = fit_polynomial(&samples.density, &samples.flow, self.config.degree)?;
        let x_max = samples
            .density
            .iter()
            .fold(0.0_f64, |m, x| m.max(x.abs()));

        let jam_density = jam_density(&curve, x_max)?;
        let critical_density = critical_density(&curve, jam_density)?;
        let pwa = Pwa::build(&curve, critical_density, jam_density, self.config.n_pwa)?;

        debug!(
            critical_density,
            jam_density,
            degree = curve.degree(),
            "fitted region MFD"
        );

        Ok(RegionMfd {
            curve,
            pwa,
            critical_density,
            jam_density,
        })
    }

    /// Fit every region; regions are independent and fitted in parallel.
    ///
    /// The returned vector is indexed by region.
    pub fn fit_all(&self, samples: &[MfdSamples]) -> MfdResult<Vec<RegionMfd>> {
        samples
            .par_iter()
            .enumerate()
            .map(|(region, s)| self.fit_region(s).map_err(|e| e.in_region(region)))
            .collect()
    }
}

/// Select the jam density among the real roots of `curve`.
///
/// Real roots are sorted and walked in ascending order among the positive ones,
/// starting from a left boundary of 0. The first root `r` for which the curve
/// is positive at the midpoint of `(left, r)` is the jam density; otherwise the
/// boundary moves to `r`. `scale` is the magnitude of the sampled densities and
/// sets what counts as a distinct or positive root.
pub fn jam_density(curve: &Polynomial, scale: f64) -> MfdResult<f64> {
    let tol = 1e-7 * scale.abs().max(1.0);
    let roots = curve.real_roots(IMAG_TOL, tol);
    if roots.len() < 2 {
        return Err(MfdError::InsufficientRoots { found: roots.len() });
    }

    let mut left = 0.0;
    for &r in roots.iter().filter(|&&r| r > tol) {
        if curve.eval(0.5 * (left + r)) > 0.0 {
            return Ok(r);
        }
        left = r;
    }
    Err(MfdError::NoJamDensity)
}

/// Density in `[0, jam]` maximizing the curve.
///
/// Candidates are the endpoints and the real stationary points inside the
/// interval; the result must lie strictly inside `(0, jam)`.
pub fn critical_density(curve: &Polynomial, jam: f64) -> MfdResult<f64> {
    let slope = curve.derivative();
    let tol = 1e-7 * jam.abs().max(1.0);
    let mut best = (0.0, curve.eval(0.0));
    for x in slope
        .real_roots(IMAG_TOL, tol)
        .into_iter()
        .filter(|&x| x > 0.0 && x < jam)
        .chain([jam])
    {
        let y = curve.eval(x);
        if y > best.1 {
            best = (x, y);
        }
    }
    let critical = best.0;
    if critical > tol && critical < jam - tol {
        Ok(critical)
    } else {
        Err(MfdError::CriticalOutOfRange { critical, jam })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jam_skips_negative_lobe_near_origin() {
        // (x - 1)(x - 50) * -1: negative on (0, 1), positive on (1, 50)
        let p = Polynomial::new(vec![-50.0, 51.0, -1.0]);
        assert!((jam_density(&p, 60.0).unwrap() - 50.0).abs() < 1e-9);
        assert!((critical_density(&p, 50.0).unwrap() - 25.5).abs() < 1e-9);
    }

    #[test]
    fn upward_parabola_has_no_jam() {
        // x (x - 10): negative between its roots
        let p = Polynomial::new(vec![0.0, -10.0, 1.0]);
        assert_eq!(jam_density(&p, 20.0), Err(MfdError::NoJamDensity));
    }

    #[test]
    fn single_root_is_insufficient() {
        // (x - 3)^2 + 1 has no real roots; x^3 + x has one
        let p = Polynomial::new(vec![0.0, 1.0, 0.0, 1.0]);
        assert_eq!(
            jam_density(&p, 10.0),
            Err(MfdError::InsufficientRoots { found: 1 })
        );
    }

    #[test]
    fn invalid_config_rejected() {
        assert!(MfdApproximator::new(MfdConfig { degree: 4, n_pwa: 5 }).is_err());
        assert!(MfdApproximator::new(MfdConfig { degree: 1, n_pwa: 4 }).is_err());
    }

    #[test]
    fn region_index_attached_to_errors() {
        let approx = MfdApproximator::default();
        let good = MfdSamples {
            density: (0..=20).map(|i| i as f64 * 4.0).collect(),
            flow: (0..=20).map(|i| (i * 4) as f64 * (80.0 - (i * 4) as f64)).collect(),
        };
        let bad = MfdSamples {
            density: vec![1.0, 2.0],
            flow: vec![1.0],
        };
        let err = approx.fit_all(&[good, bad]).unwrap_err();
        assert!(matches!(err, MfdError::Region { region: 1, .. }));
    }
}
