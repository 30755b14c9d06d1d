//! Regional outputs `y` as functions of the density state.

use nalgebra::{DMatrix, DVector};
use rf_mfd::{OutputKind, RegionMfd};

/// Output vector for the given densities.
pub fn output_of(kind: OutputKind, mfds: &[RegionMfd], rho: &DVector<f64>) -> DVector<f64> {
    let flows = || rho.iter().zip(mfds).map(|(&x, m)| m.flow(x));
    match kind {
        OutputKind::Density => rho.clone(),
        OutputKind::Flow => DVector::from_iterator(rho.len(), flows()),
        OutputKind::DensityFlow => {
            DVector::from_iterator(2 * rho.len(), rho.iter().copied().chain(flows()))
        }
    }
}

/// Linear output map `y ≈ h * rho + h0` around `rho_ref`.
pub fn output_jacobian(
    kind: OutputKind,
    mfds: &[RegionMfd],
    rho_ref: &DVector<f64>,
) -> (DMatrix<f64>, DVector<f64>) {
    let n = rho_ref.len();
    let slopes = DMatrix::from_diagonal(&DVector::from_fn(n, |i, _| {
        mfds[i].flow_slope(rho_ref[i])
    }));
    let h = match kind {
        OutputKind::Density => DMatrix::identity(n, n),
        OutputKind::Flow => slopes,
        OutputKind::DensityFlow => {
            let mut h = DMatrix::zeros(2 * n, n);
            h.view_mut((0, 0), (n, n)).copy_from(&DMatrix::<f64>::identity(n, n));
            h.view_mut((n, 0), (n, n)).copy_from(&slopes);
            h
        }
    };
    let h0 = output_of(kind, mfds, rho_ref) - &h * rho_ref;
    (h, h0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_mfd::{Polynomial, Pwa};

    fn parabola(jam: f64) -> RegionMfd {
        let curve = Polynomial::new(vec![0.0, jam, -1.0]);
        RegionMfd {
            pwa: Pwa::build(&curve, jam / 2.0, jam, 2).unwrap(),
            curve,
            critical_density: jam / 2.0,
            jam_density: jam,
        }
    }

    #[test]
    fn stacked_output_exact_at_reference() {
        let mfds = [parabola(80.0), parabola(100.0)];
        let rho = DVector::from_vec(vec![10.0, 70.0]);
        let y = output_of(OutputKind::DensityFlow, &mfds, &rho);
        assert_eq!(y.as_slice(), &[10.0, 70.0, 700.0, 2100.0]);

        let (h, h0) = output_jacobian(OutputKind::DensityFlow, &mfds, &rho);
        let approx = &h * &rho + h0;
        assert!((approx - y).norm() < 1e-9);
        assert_eq!(h[(2, 0)], 60.0);
        assert_eq!(h[(3, 1)], -40.0);
    }
}
