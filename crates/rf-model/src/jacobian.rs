//! Finite-difference Jacobians.
//!
//! The model linearizes analytically; these are used to cross-check it and to
//! linearize user-supplied step functions.

use crate::error::ModelResult;
use nalgebra::{DMatrix, DVector};

/// Forward differences: column j is `(f(x + h e_j) - f(x)) / h`.
pub fn finite_difference_jacobian<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> ModelResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> ModelResult<DVector<f64>>,
{
    let f_x = f(x)?;
    let mut jac = DMatrix::zeros(f_x.len(), x.len());

    for j in 0..x.len() {
        let dx = epsilon * x[j].abs().max(1.0);
        let mut shifted = x.clone();
        shifted[j] += dx;
        let df = (f(&shifted)? - &f_x) / dx;
        jac.set_column(j, &df);
    }

    Ok(jac)
}

/// Central differences (second-order accurate, twice the evaluations).
pub fn central_difference_jacobian<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> ModelResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> ModelResult<DVector<f64>>,
{
    let rows = f(x)?.len();
    let mut jac = DMatrix::zeros(rows, x.len());

    for j in 0..x.len() {
        let dx = epsilon * x[j].abs().max(1.0);
        let mut plus = x.clone();
        plus[j] += dx;
        let mut minus = x.clone();
        minus[j] -= dx;
        let df = (f(&plus)? - f(&minus)?) / (2.0 * dx);
        jac.set_column(j, &df);
    }

    Ok(jac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_forward_and_central() {
        // f(x) = [x0^2, x0 * x1]
        let f = |x: &DVector<f64>| -> ModelResult<DVector<f64>> {
            Ok(DVector::from_vec(vec![x[0] * x[0], x[0] * x[1]]))
        };
        let x = DVector::from_vec(vec![3.0, -2.0]);

        let fwd = finite_difference_jacobian(&x, f, 1e-7).unwrap();
        assert!((fwd[(0, 0)] - 6.0).abs() < 1e-5);
        assert!((fwd[(1, 1)] - 3.0).abs() < 1e-5);

        let ctr = central_difference_jacobian(&x, f, 1e-5).unwrap();
        assert!((ctr[(0, 0)] - 6.0).abs() < 1e-8);
        assert!((ctr[(1, 0)] + 2.0).abs() < 1e-8);
        assert!(ctr[(0, 1)].abs() < 1e-8);
    }
}
