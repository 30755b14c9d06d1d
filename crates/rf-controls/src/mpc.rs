//! Receding-horizon MPC on the affine regional model.
//!
//! Over `N` steps with constant `A, B, e = C q + d`, predicted outputs stack as
//! `Y = G U + f`. The controller minimizes
//! `|Y - R|^2 + lambda |U - U_ref|^2` subject to the safety box, by projected
//! gradient from the clamped unconstrained optimum, and returns the first move.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::controller::DecisionContext;
use crate::error::{ControlError, ControlResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpcConfig {
    pub horizon: usize,
    /// Penalty on deviating from the operating-point input.
    pub input_weight: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for MpcConfig {
    fn default() -> Self {
        Self {
            horizon: 5,
            input_weight: 1e-2,
            max_iterations: 500,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MpcController {
    config: MpcConfig,
}

impl MpcController {
    pub fn new(config: MpcConfig) -> ControlResult<Self> {
        if config.horizon == 0 {
            return Err(ControlError::InvalidArg {
                what: "MPC horizon must be at least 1",
            });
        }
        if !(config.input_weight > 0.0) {
            return Err(ControlError::InvalidArg {
                what: "MPC input weight must be positive",
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &MpcConfig {
        &self.config
    }

    fn fail(what: &str) -> ControlError {
        ControlError::Solve {
            controller: "mpc",
            what: what.to_string(),
        }
    }

    /// Stacked prediction `Y = g * U + f` over the horizon.
    fn condense(&self, ctx: &DecisionContext<'_>) -> (DMatrix<f64>, DVector<f64>) {
        let model = ctx.model;
        let (h, h0) = ctx.output_map;
        let n = model.n_states();
        let m = model.b.ncols();
        let p = h.nrows();
        let big_n = self.config.horizon;
        let e = &model.c * ctx.demand_forecast + &model.d;

        // powers[k] = A^k
        let mut powers = Vec::with_capacity(big_n + 1);
        powers.push(DMatrix::<f64>::identity(n, n));
        for k in 1..=big_n {
            powers.push(&model.a * &powers[k - 1]);
        }

        let mut g = DMatrix::zeros(big_n * p, big_n * m);
        let mut f = DVector::zeros(big_n * p);
        let mut x_free = ctx.state.clone();
        for k in 1..=big_n {
            x_free = &model.a * x_free + &e;
            let y_free = h * &x_free + h0;
            f.rows_mut((k - 1) * p, p).copy_from(&y_free);
            for j in 0..k {
                let block = h * &powers[k - 1 - j] * &model.b;
                g.view_mut(((k - 1) * p, j * m), (p, m)).copy_from(&block);
            }
        }
        (g, f)
    }

    pub fn decide(&mut self, ctx: &DecisionContext<'_>) -> ControlResult<DVector<f64>> {
        let m = ctx.model.b.ncols();
        if m != ctx.n_regions {
            return Err(ControlError::DimensionMismatch {
                what: "model inputs",
                expected: ctx.n_regions,
                actual: m,
            });
        }
        let big_n = self.config.horizon;
        let lambda = self.config.input_weight;
        let (g, f) = self.condense(ctx);
        let p = ctx.output_map.0.nrows();

        let mut r = DVector::zeros(big_n * p);
        for k in 0..big_n {
            r.rows_mut(k * p, p).copy_from(&ctx.reference_at(k));
        }
        let u_ref = DVector::from_fn(big_n * m, |i, _| ctx.model.u_ref[i % m]);

        // 1/2 U' Q U + c' U
        let q = g.transpose() * &g + DMatrix::identity(big_n * m, big_n * m) * lambda;
        let c = g.transpose() * (&f - &r) - &u_ref * lambda;

        let bounds = ctx.bounds;
        let project = |u: DVector<f64>| u.map(|v| bounds.clamp(v));

        let unconstrained = q
            .clone()
            .cholesky()
            .ok_or_else(|| Self::fail("cost Hessian is not positive definite"))?
            .solve(&(-&c));
        let mut u = project(unconstrained.clone());

        if u != unconstrained {
            let step = 1.0 / q.norm().max(f64::MIN_POSITIVE);
            for _ in 0..self.config.max_iterations {
                let grad = &q * &u + &c;
                let next = project(&u - grad * step);
                let moved = (&next - &u).norm();
                u = next;
                if moved <= self.config.tolerance * (1.0 + u.norm()) {
                    break;
                }
            }
        }

        if u.iter().any(|v| !v.is_finite()) {
            return Err(Self::fail("non-finite solution"));
        }
        Ok(u.rows(0, m).into_owned())
    }
}
