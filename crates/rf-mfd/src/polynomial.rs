//! Dense real polynomials.

use nalgebra::{Complex, DMatrix};
use serde::{Deserialize, Serialize};

/// Polynomial with coefficients in ascending order: `c[0] + c[1] x + ...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    /// Trailing (highest-order) exact zeros are dropped.
    pub fn new(mut coeffs: Vec<f64>) -> Self {
        while coeffs.len() > 1 && coeffs.last() == Some(&0.0) {
            coeffs.pop();
        }
        if coeffs.is_empty() {
            coeffs.push(0.0);
        }
        Self { coeffs }
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// Horner evaluation.
    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }

    pub fn derivative(&self) -> Polynomial {
        if self.coeffs.len() <= 1 {
            return Polynomial::new(vec![0.0]);
        }
        Polynomial::new(
            self.coeffs
                .iter()
                .enumerate()
                .skip(1)
                .map(|(k, &c)| k as f64 * c)
                .collect(),
        )
    }

    /// Drop leading terms whose contribution on `[-x_max, x_max]` is below
    /// `rel_tol` of the largest term.
    pub fn trimmed(&self, x_max: f64, rel_tol: f64) -> Polynomial {
        let x_max = x_max.abs().max(1.0);
        let magnitude = |k: usize| self.coeffs[k].abs() * x_max.powi(k as i32);
        let largest = (0..self.coeffs.len()).map(magnitude).fold(0.0, f64::max);
        let mut keep = self.coeffs.len();
        while keep > 1 && magnitude(keep - 1) <= rel_tol * largest {
            keep -= 1;
        }
        Polynomial::new(self.coeffs[..keep].to_vec())
    }

    /// All complex roots, from the eigenvalues of the companion matrix.
    pub fn roots(&self) -> Vec<Complex<f64>> {
        let n = self.degree();
        if n == 0 {
            return Vec::new();
        }
        let lead = self.coeffs[n];
        let mut companion = DMatrix::<f64>::zeros(n, n);
        for i in 1..n {
            companion[(i, i - 1)] = 1.0;
        }
        for i in 0..n {
            companion[(i, n - 1)] = -self.coeffs[i] / lead;
        }
        companion.complex_eigenvalues().iter().copied().collect()
    }

    /// Real roots, ascending, polished with Newton steps and merged when
    /// closer than `merge_tol`.
    ///
    /// A root counts as real when `|Im| <= imag_tol * max(1, |Re|)`.
    pub fn real_roots(&self, imag_tol: f64, merge_tol: f64) -> Vec<f64> {
        let mut real: Vec<f64> = self
            .roots()
            .into_iter()
            .filter(|z| z.re.is_finite() && z.im.abs() <= imag_tol * z.re.abs().max(1.0))
            .map(|z| self.polish(z.re))
            .collect();
        real.sort_by(f64::total_cmp);
        real.dedup_by(|a, b| (*a - *b).abs() <= merge_tol);
        real
    }

    /// Refine a root estimate with Newton steps while they reduce |p(x)|.
    pub fn polish(&self, x0: f64) -> f64 {
        let d = self.derivative();
        let mut x = x0;
        let mut fx = self.eval(x).abs();
        for _ in 0..20 {
            let slope = d.eval(x);
            if slope == 0.0 || !slope.is_finite() {
                break;
            }
            let next = x - self.eval(x) / slope;
            let f_next = self.eval(next).abs();
            if !next.is_finite() || f_next >= fx {
                break;
            }
            x = next;
            fx = f_next;
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_and_derivative() {
        // 1 + 2x + 3x^2
        let p = Polynomial::new(vec![1.0, 2.0, 3.0]);
        assert_eq!(p.eval(2.0), 17.0);
        assert_eq!(p.derivative().coeffs(), &[2.0, 6.0]);
        assert_eq!(p.derivative().derivative().derivative().coeffs(), &[0.0]);
    }

    #[test]
    fn trailing_zeros_dropped() {
        let p = Polynomial::new(vec![1.0, 0.0, 0.0]);
        assert_eq!(p.degree(), 0);
    }

    #[test]
    fn real_roots_of_cubic() {
        // (x - 1)(x - 2)(x + 3) = x^3 - 7x + 6
        let p = Polynomial::new(vec![6.0, -7.0, 0.0, 1.0]);
        let roots = p.real_roots(1e-5, 1e-9);
        assert_eq!(roots.len(), 3);
        for (r, expected) in roots.iter().zip([-3.0, 1.0, 2.0]) {
            assert!((r - expected).abs() < 1e-10, "{r} vs {expected}");
        }
    }

    #[test]
    fn complex_roots_filtered() {
        // x^2 + 1 has no real roots
        let p = Polynomial::new(vec![1.0, 0.0, 1.0]);
        assert!(p.real_roots(1e-5, 1e-9).is_empty());
        assert_eq!(p.roots().len(), 2);
    }

    #[test]
    fn trimmed_drops_negligible_leading_terms() {
        let p = Polynomial::new(vec![0.0, 10.0, -0.1, 1e-20]);
        assert_eq!(p.trimmed(100.0, 1e-10).degree(), 2);
        assert_eq!(p.trimmed(100.0, 0.0).degree(), 3);
    }
}
