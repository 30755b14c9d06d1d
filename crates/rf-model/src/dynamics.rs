//! Regional conservation dynamics and their affine linearization.
//!
//! With `Ts` in hours, region capacity `gamma_i` (lane-km), completion ratio
//! `eps_i`, routing `theta` and outflow `O_i = u_i * max(F_i(rho_i), 0)`:
//!
//! ```text
//! rho_i+ = eps_i rho_i + (Ts / gamma_i) (-O_i + sum_k theta_ki O_k + q_i)
//! ```
//!
//! `linearize` returns the exact Jacobians at the operating point and an
//! offset that makes the affine model agree with the step there.

use nalgebra::{DMatrix, DVector};
use rf_core::{Time, ensure_finite, s, to_hours, to_seconds};
use rf_mfd::RegionMfd;
use rf_network::{Network, RegionPartition};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::routing::RoutingTable;

/// Trip completion: a fraction `base` of the regional density survives every
/// `period`; over a step `Ts` the ratio is `base^(Ts / period)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionRate {
    pub base: f64,
    pub period: Time,
}

impl Default for CompletionRate {
    fn default() -> Self {
        Self {
            base: 0.9,
            period: s(20.0),
        }
    }
}

impl CompletionRate {
    /// No decay.
    pub fn disabled() -> Self {
        Self {
            base: 1.0,
            period: s(1.0),
        }
    }

    pub fn ratio(&self, ts: Time) -> f64 {
        self.base.powf(to_seconds(ts) / to_seconds(self.period))
    }

    fn validate(&self) -> ModelResult<()> {
        if !(self.base > 0.0 && self.base <= 1.0) {
            return Err(ModelError::InvalidCompletion {
                what: "base must lie in (0, 1]",
            });
        }
        if !(to_seconds(self.period) > 0.0) {
            return Err(ModelError::InvalidCompletion {
                what: "period must be positive",
            });
        }
        Ok(())
    }
}

/// `next = a * state + b * input + c * demand + d`, valid near one operating point.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineModel {
    pub a: DMatrix<f64>,
    pub b: DMatrix<f64>,
    pub c: DMatrix<f64>,
    pub d: DVector<f64>,
    pub rho_ref: DVector<f64>,
    pub u_ref: DVector<f64>,
}

impl AffineModel {
    pub fn n_states(&self) -> usize {
        self.a.nrows()
    }

    pub fn predict(
        &self,
        state: &DVector<f64>,
        input: &DVector<f64>,
        demand: &DVector<f64>,
    ) -> DVector<f64> {
        &self.a * state + &self.b * input + &self.c * demand + &self.d
    }

    /// Roll the model forward; column `t` of `inputs`/`demands` drives step `t`.
    /// Returns one predicted state per column.
    pub fn rollout(
        &self,
        state: &DVector<f64>,
        inputs: &DMatrix<f64>,
        demands: &DMatrix<f64>,
    ) -> DMatrix<f64> {
        let steps = inputs.ncols();
        let mut out = DMatrix::zeros(self.n_states(), steps);
        let mut x = state.clone();
        for t in 0..steps {
            let q = if t < demands.ncols() {
                demands.column(t).into_owned()
            } else {
                DVector::zeros(self.c.ncols())
            };
            x = self.predict(&x, &inputs.column(t).into_owned(), &q);
            out.set_column(t, &x);
        }
        out
    }
}

/// Multi-region conservation model parameterized by fitted MFDs, region
/// capacities, completion and routing.
#[derive(Debug, Clone)]
pub struct LinearDynamicsModel {
    mfds: Vec<RegionMfd>,
    capacities: Vec<f64>,
    completion: Vec<CompletionRate>,
    routing: RoutingTable,
}

impl LinearDynamicsModel {
    pub fn new(
        mfds: Vec<RegionMfd>,
        capacities: Vec<f64>,
        completion: Vec<CompletionRate>,
        routing: RoutingTable,
    ) -> ModelResult<Self> {
        let n = mfds.len();
        for (what, len) in [
            ("capacities", capacities.len()),
            ("completion rates", completion.len()),
            ("routing regions", routing.n_regions()),
        ] {
            if len != n {
                return Err(ModelError::DimensionMismatch {
                    what,
                    expected: n,
                    actual: len,
                });
            }
        }
        for (region, &value) in capacities.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(ModelError::InvalidCapacity { region, value });
            }
        }
        for rate in &completion {
            rate.validate()?;
        }
        Ok(Self {
            mfds,
            capacities,
            completion,
            routing,
        })
    }

    /// Capacities from member-edge geometry, one completion rate for all regions.
    pub fn from_partition(
        network: &Network,
        partition: &RegionPartition,
        mfds: Vec<RegionMfd>,
        routing: RoutingTable,
        completion: CompletionRate,
    ) -> ModelResult<Self> {
        let capacities = (0..partition.n_regions())
            .map(|r| partition.lane_km(network, r))
            .collect();
        let completion = vec![completion; partition.n_regions()];
        Self::new(mfds, capacities, completion, routing)
    }

    pub fn n_regions(&self) -> usize {
        self.mfds.len()
    }

    pub fn mfds(&self) -> &[RegionMfd] {
        &self.mfds
    }

    pub fn capacities(&self) -> &[f64] {
        &self.capacities
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    fn check_len(&self, what: &'static str, v: &DVector<f64>) -> ModelResult<()> {
        if v.len() != self.n_regions() {
            return Err(ModelError::DimensionMismatch {
                what,
                expected: self.n_regions(),
                actual: v.len(),
            });
        }
        Ok(())
    }

    fn hours(ts: Time) -> ModelResult<f64> {
        let h = to_hours(ts);
        if !(h.is_finite() && h > 0.0) {
            return Err(ModelError::Degenerate {
                what: "sample interval must be positive",
            });
        }
        Ok(h)
    }

    /// Outflow `u_i * max(F_i(rho_i), 0)` and its density slope per region.
    fn outflows(&self, rho: &DVector<f64>, u: &DVector<f64>) -> (DVector<f64>, DVector<f64>) {
        let n = self.n_regions();
        let mut flow = DVector::zeros(n);
        let mut slope = DVector::zeros(n);
        for i in 0..n {
            let f = self.mfds[i].flow(rho[i]);
            if f > 0.0 {
                flow[i] = u[i] * f;
                slope[i] = u[i] * self.mfds[i].flow_slope(rho[i]);
            }
        }
        (flow, slope)
    }

    /// One nonlinear step of the regional dynamics. `demand` is in veh/h.
    pub fn step(
        &self,
        ts: Time,
        rho: &DVector<f64>,
        u: &DVector<f64>,
        demand: &DVector<f64>,
    ) -> ModelResult<DVector<f64>> {
        self.check_len("density", rho)?;
        self.check_len("input", u)?;
        self.check_len("demand", demand)?;
        let h = Self::hours(ts)?;
        let (out, _) = self.outflows(rho, u);
        let inflow = self.routing.matrix().transpose() * &out;
        let n = self.n_regions();
        Ok(DVector::from_fn(n, |i, _| {
            self.completion[i].ratio(ts) * rho[i]
                + h / self.capacities[i] * (-out[i] + inflow[i] + demand[i])
        }))
    }

    /// Affine approximation around `(rho_ref, u_ref)`.
    ///
    /// Deterministic in its inputs; must be recomputed whenever the operating
    /// point moves.
    pub fn linearize(
        &self,
        ts: Time,
        rho_ref: &DVector<f64>,
        u_ref: &DVector<f64>,
    ) -> ModelResult<AffineModel> {
        self.check_len("reference density", rho_ref)?;
        self.check_len("reference input", u_ref)?;
        let h = Self::hours(ts)?;
        let n = self.n_regions();
        let theta = self.routing.matrix();

        let (_, slope) = self.outflows(rho_ref, u_ref);
        let mut raw_flow = DVector::zeros(n);
        for i in 0..n {
            raw_flow[i] = self.mfds[i].flow(rho_ref[i]).max(0.0);
        }

        let mut a = DMatrix::zeros(n, n);
        let mut b = DMatrix::zeros(n, n);
        for i in 0..n {
            let k = h / self.capacities[i];
            for j in 0..n {
                let own = if i == j { 1.0 } else { 0.0 };
                a[(i, j)] = own * self.completion[i].ratio(ts)
                    + k * (theta[(j, i)] * slope[j] - own * slope[i]);
                b[(i, j)] = k * (theta[(j, i)] * raw_flow[j] - own * raw_flow[i]);
            }
        }
        let c = DMatrix::from_diagonal(&DVector::from_fn(n, |i, _| h / self.capacities[i]));

        let f_ref = self.step(ts, rho_ref, u_ref, &DVector::zeros(n))?;
        let d = f_ref - &a * rho_ref - &b * u_ref;

        for v in a.iter().chain(b.iter()).chain(d.iter()) {
            if !v.is_finite() {
                return Err(ModelError::Degenerate {
                    what: "non-finite matrix entry",
                });
            }
        }

        Ok(AffineModel {
            a,
            b,
            c,
            d,
            rho_ref: rho_ref.clone(),
            u_ref: u_ref.clone(),
        })
    }

    /// Reject non-finite region densities before they reach the model.
    pub fn ensure_finite_state(rho: &DVector<f64>) -> ModelResult<()> {
        for &v in rho.iter() {
            ensure_finite(v, "region density")?;
        }
        Ok(())
    }
}
