//! Least-squares polynomial fit of flow over density.

use nalgebra::{DMatrix, DVector};
use rf_core::{Tolerances, ensure_finite, mean, nearly_equal, std_dev};

use crate::error::{MfdError, MfdResult};
use crate::polynomial::Polynomial;

/// Relative size below which leading fitted terms are treated as noise.
const TRIM_REL_TOL: f64 = 1e-10;

/// Densities closer than this count as one sample point.
const DISTINCT_TOL: Tolerances = Tolerances::new(1e-12, 1e-12);

/// Fit `flow ≈ p(density)` of the given degree in the least-squares sense.
///
/// Densities are centered and scaled before building the Vandermonde matrix
/// (solved by SVD), then the coefficients are mapped back to raw density.
/// Nearly constant density or flow samples are rejected instead of producing
/// a flat curve.
pub fn fit_polynomial(density: &[f64], flow: &[f64], degree: usize) -> MfdResult<Polynomial> {
    if density.len() != flow.len() {
        return Err(MfdError::LengthMismatch {
            density: density.len(),
            flow: flow.len(),
        });
    }
    if degree < 2 {
        return Err(MfdError::InvalidDegree { degree });
    }
    for (&x, &y) in density.iter().zip(flow) {
        ensure_finite(x, "density sample")?;
        ensure_finite(y, "flow sample")?;
    }

    let distinct = count_distinct(density);
    if distinct < degree + 1 {
        return Err(MfdError::InsufficientSamples {
            needed: degree + 1,
            got: distinct,
        });
    }

    let (Some(center), Some(x_spread), Some(y_spread)) =
        (mean(density), std_dev(density), std_dev(flow))
    else {
        return Err(MfdError::InsufficientSamples {
            needed: degree + 1,
            got: density.len(),
        });
    };
    let x_max = density.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    let y_max = flow.iter().fold(0.0_f64, |m, y| m.max(y.abs()));
    if x_spread <= 1e-9 * x_max.max(1.0) {
        return Err(MfdError::DegenerateSamples {
            what: "density samples are nearly constant",
        });
    }
    if y_spread <= 1e-9 * y_max.max(1.0) {
        return Err(MfdError::DegenerateSamples {
            what: "flow samples are nearly constant",
        });
    }

    let scale = density
        .iter()
        .fold(0.0_f64, |m, x| m.max((x - center).abs()));

    let n = density.len();
    let vander = DMatrix::from_fn(n, degree + 1, |i, k| {
        ((density[i] - center) / scale).powi(k as i32)
    });
    let rhs = DVector::from_column_slice(flow);
    let scaled = vander
        .svd(true, true)
        .solve(&rhs, 1e-13)
        .map_err(|e| MfdError::Solve {
            what: e.to_string(),
        })?;

    let coeffs = unscale(scaled.as_slice(), center, scale);
    for &c in &coeffs {
        ensure_finite(c, "fitted coefficient")?;
    }
    Ok(Polynomial::new(coeffs).trimmed(x_max, TRIM_REL_TOL))
}

/// Expand `sum_k c_k ((x - center) / scale)^k` into raw powers of `x`.
fn unscale(scaled: &[f64], center: f64, scale: f64) -> Vec<f64> {
    let mut out = vec![0.0; scaled.len()];
    for (k, &c) in scaled.iter().enumerate() {
        let factor = c / scale.powi(k as i32);
        let mut binom = 1.0;
        for j in 0..=k {
            // C(k, j) * x^j * (-center)^(k - j)
            out[j] += factor * binom * (-center).powi((k - j) as i32);
            binom = binom * (k - j) as f64 / (j + 1) as f64;
        }
    }
    out
}

fn count_distinct(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup_by(|a, b| nearly_equal(*a, *b, DISTINCT_TOL));
    sorted.len()
}
