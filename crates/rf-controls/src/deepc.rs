//! Data-enabled predictive control (DeePC) on recorded input/output history.
//!
//! Block-Hankel matrices of depth `t_ini + horizon` are built from the
//! region-level input and output histories. A regularized least-squares
//! problem picks the combination `g` whose past matches the latest `t_ini`
//! samples and whose future tracks the reference; the first future input
//! block is returned (clamped). Until enough history exists the controller
//! holds the operating-point input.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::controller::DecisionContext;
use crate::error::{ControlError, ControlResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeePcConfig {
    /// Past samples used to pin the initial condition.
    pub t_ini: usize,
    pub horizon: usize,
    /// Ridge penalty on `g`.
    pub lambda_g: f64,
    /// Weight of the initial-condition match.
    pub lambda_ini: f64,
    /// Penalty on deviating from the operating-point input.
    pub lambda_u: f64,
    /// Hankel columns required before leaving the fallback.
    pub min_columns: usize,
}

impl Default for DeePcConfig {
    fn default() -> Self {
        Self {
            t_ini: 2,
            horizon: 4,
            lambda_g: 1e-2,
            lambda_ini: 1e4,
            lambda_u: 1e-3,
            min_columns: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeePcController {
    config: DeePcConfig,
}

/// Block-Hankel matrix of `depth` consecutive samples per column.
fn hankel(samples: &[DVector<f64>], depth: usize) -> DMatrix<f64> {
    let dim = samples.first().map_or(0, DVector::len);
    let cols = samples.len() + 1 - depth;
    DMatrix::from_fn(dim * depth, cols, |i, j| samples[j + i / dim][i % dim])
}

impl DeePcController {
    pub fn new(config: DeePcConfig) -> ControlResult<Self> {
        if config.t_ini == 0 || config.horizon == 0 {
            return Err(ControlError::InvalidArg {
                what: "DeePC needs positive t_ini and horizon",
            });
        }
        if !(config.lambda_g > 0.0 && config.lambda_ini > 0.0 && config.lambda_u >= 0.0) {
            return Err(ControlError::InvalidArg {
                what: "DeePC weights must be positive",
            });
        }
        Ok(Self { config })
    }

    fn fallback(ctx: &DecisionContext<'_>) -> DVector<f64> {
        ctx.model.u_ref.map(|v| ctx.bounds.clamp(v))
    }

    pub fn decide(&mut self, ctx: &DecisionContext<'_>) -> ControlResult<DVector<f64>> {
        let DeePcConfig {
            t_ini,
            horizon,
            lambda_g,
            lambda_ini,
            lambda_u,
            min_columns,
        } = self.config;
        let depth = t_ini + horizon;
        let len = ctx.input_history.len().min(ctx.output_history.len());
        if len < depth || len + 1 - depth < min_columns {
            debug!(history = len, "DeePC history too short, holding operating point");
            return Ok(Self::fallback(ctx));
        }
        let inputs = &ctx.input_history[ctx.input_history.len() - len..];
        let outputs = &ctx.output_history[ctx.output_history.len() - len..];
        let m = inputs[0].len();
        let p = outputs[0].len();
        if m != ctx.n_regions {
            return Err(ControlError::DimensionMismatch {
                what: "DeePC input history",
                expected: ctx.n_regions,
                actual: m,
            });
        }

        let hu = hankel(inputs, depth);
        let hy = hankel(outputs, depth);
        let cols = hu.ncols();
        let u_past = hu.rows(0, t_ini * m);
        let u_future = hu.rows(t_ini * m, horizon * m);
        let y_past = hy.rows(0, t_ini * p);
        let y_future = hy.rows(t_ini * p, horizon * p);

        let stack = |window: &[DVector<f64>]| -> DVector<f64> {
            DVector::from_iterator(
                window.iter().map(DVector::len).sum(),
                window.iter().flat_map(|v| v.iter().copied()),
            )
        };
        let u_ini = stack(&inputs[len - t_ini..]);
        let y_ini = stack(&outputs[len - t_ini..]);
        let mut r = DVector::zeros(horizon * p);
        for k in 0..horizon {
            r.rows_mut(k * p, p).copy_from(&ctx.reference_at(k));
        }
        let u_ref = DVector::from_fn(horizon * m, |i, _| ctx.model.u_ref[i % m]);

        // Stack weighted residual blocks into one least-squares system.
        let rows = t_ini * (m + p) + horizon * (p + m);
        let mut lhs = DMatrix::zeros(rows, cols);
        let mut rhs = DVector::zeros(rows);
        let blocks = [
            (u_past.into_owned(), u_ini, lambda_ini.sqrt()),
            (y_past.into_owned(), y_ini, lambda_ini.sqrt()),
            (y_future.into_owned(), r, 1.0),
            (u_future.clone_owned(), u_ref, lambda_u.sqrt()),
        ];
        let mut at = 0;
        for (mat, target, weight) in blocks {
            let n = mat.nrows();
            lhs.rows_mut(at, n).copy_from(&(mat * weight));
            rhs.rows_mut(at, n).copy_from(&(target * weight));
            at += n;
        }

        let normal = lhs.transpose() * &lhs + DMatrix::identity(cols, cols) * lambda_g;
        let g = normal
            .cholesky()
            .ok_or_else(|| ControlError::Solve {
                controller: "deepc",
                what: "normal equations are not positive definite".to_string(),
            })?
            .solve(&(lhs.transpose() * rhs));

        let u = (u_future * g).rows(0, m).map(|v| ctx.bounds.clamp(v));
        Ok(u)
    }
}
