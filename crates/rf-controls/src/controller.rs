//! The closed set of control strategies behind one `decide` capability.

use nalgebra::{DMatrix, DVector};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rf_model::AffineModel;
use serde::{Deserialize, Serialize};

use crate::bounds::SafetyBounds;
use crate::deepc::{DeePcConfig, DeePcController};
use crate::error::{ControlError, ControlResult};
use crate::mpc::{MpcConfig, MpcController};

/// Strategy selection as it appears in task configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerSpec {
    #[default]
    NoControl,
    Random,
    Mpc(MpcConfig),
    #[serde(rename = "deepc")]
    DeePc(DeePcConfig),
    /// Scripted strategy for tests: a constant input, optionally failing at
    /// a given cycle.
    TestStub {
        #[serde(default)]
        value: Option<f64>,
        #[serde(default)]
        fail_at_cycle: Option<usize>,
    },
}

impl ControllerSpec {
    /// Configuration tag of the strategy.
    pub fn name(&self) -> &'static str {
        match self {
            ControllerSpec::NoControl => "no_control",
            ControllerSpec::Random => "random",
            ControllerSpec::Mpc(_) => "mpc",
            ControllerSpec::DeePc(_) => "deepc",
            ControllerSpec::TestStub { .. } => "test_stub",
        }
    }
}

/// Size of the decision vector a strategy produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One value per actuator, in group order.
    Actuator,
    /// One value per region, fanned out to the region's actuators.
    Region,
}

/// Everything a strategy may look at when deciding the next input.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub cycle: usize,
    /// Current region densities.
    pub state: &'a DVector<f64>,
    /// Affine model linearized at the current operating point.
    pub model: &'a AffineModel,
    /// Output map `y ≈ h * state + h0`.
    pub output_map: (&'a DMatrix<f64>, &'a DVector<f64>),
    /// Exogenous demand rate per region for the coming cycle (veh/h).
    pub demand_forecast: &'a DVector<f64>,
    /// Reference outputs, one column per future step.
    pub reference: &'a DMatrix<f64>,
    /// Region-level effective inputs, oldest first.
    pub input_history: &'a [DVector<f64>],
    /// Observed outputs aligned with `input_history`, oldest first.
    pub output_history: &'a [DVector<f64>],
    pub bounds: SafetyBounds,
    pub neutral: f64,
    pub n_actuators: usize,
    pub n_regions: usize,
}

impl DecisionContext<'_> {
    /// Reference column for step `k`, repeating the last one past the horizon.
    pub fn reference_at(&self, k: usize) -> DVector<f64> {
        let last = self.reference.ncols().saturating_sub(1);
        self.reference.column(k.min(last)).into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct RandomController {
    rng: SmallRng,
}

impl RandomController {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn decide(&mut self, ctx: &DecisionContext<'_>) -> DVector<f64> {
        let SafetyBounds { lower, upper } = ctx.bounds;
        DVector::from_fn(ctx.n_actuators, |_, _| self.rng.gen_range(lower..=upper))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestStubController {
    pub value: Option<f64>,
    pub fail_at_cycle: Option<usize>,
}

/// A configured control strategy.
#[derive(Debug, Clone)]
pub enum Controller {
    NoControl,
    Random(RandomController),
    Mpc(MpcController),
    DeePc(DeePcController),
    TestStub(TestStubController),
}

impl Controller {
    pub fn from_spec(spec: &ControllerSpec, seed: u64) -> ControlResult<Self> {
        Ok(match spec {
            ControllerSpec::NoControl => Controller::NoControl,
            ControllerSpec::Random => Controller::Random(RandomController::new(seed)),
            ControllerSpec::Mpc(config) => Controller::Mpc(MpcController::new(config.clone())?),
            ControllerSpec::DeePc(config) => {
                Controller::DeePc(DeePcController::new(config.clone())?)
            }
            ControllerSpec::TestStub {
                value,
                fail_at_cycle,
            } => Controller::TestStub(TestStubController {
                value: *value,
                fail_at_cycle: *fail_at_cycle,
            }),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Controller::NoControl => "no_control",
            Controller::Random(_) => "random",
            Controller::Mpc(_) => "mpc",
            Controller::DeePc(_) => "deepc",
            Controller::TestStub(_) => "test_stub",
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            Controller::Mpc(_) | Controller::DeePc(_) => Granularity::Region,
            _ => Granularity::Actuator,
        }
    }

    /// `false` only for `NoControl`, whose decisions are never applied.
    pub fn actuates(&self) -> bool {
        !matches!(self, Controller::NoControl)
    }

    pub fn output_len(&self, ctx: &DecisionContext<'_>) -> usize {
        match self.granularity() {
            Granularity::Actuator => ctx.n_actuators,
            Granularity::Region => ctx.n_regions,
        }
    }

    /// Next input vector; its length is `output_len(ctx)`.
    pub fn decide(&mut self, ctx: &DecisionContext<'_>) -> ControlResult<DVector<f64>> {
        let expected = self.output_len(ctx);
        let u = match self {
            Controller::NoControl => DVector::zeros(ctx.n_actuators),
            Controller::Random(random) => random.decide(ctx),
            Controller::Mpc(mpc) => mpc.decide(ctx)?,
            Controller::DeePc(deepc) => deepc.decide(ctx)?,
            Controller::TestStub(stub) => {
                if stub.fail_at_cycle == Some(ctx.cycle) {
                    return Err(ControlError::Scripted { cycle: ctx.cycle });
                }
                DVector::from_element(ctx.n_actuators, stub.value.unwrap_or(ctx.neutral))
            }
        };
        if u.len() != expected {
            return Err(ControlError::DimensionMismatch {
                what: "controller output",
                expected,
                actual: u.len(),
            });
        }
        if u.iter().any(|v| !v.is_finite()) {
            return Err(ControlError::Solve {
                controller: self.name(),
                what: "non-finite input".to_string(),
            });
        }
        Ok(u)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// One-region context with an integrator-like model.
    pub(crate) struct Fixture {
        pub state: DVector<f64>,
        pub model: AffineModel,
        pub h: DMatrix<f64>,
        pub h0: DVector<f64>,
        pub demand: DVector<f64>,
        pub reference: DMatrix<f64>,
        pub inputs: Vec<DVector<f64>>,
        pub outputs: Vec<DVector<f64>>,
    }

    impl Fixture {
        pub fn new(state: f64, target: f64) -> Self {
            // x+ = x - 10 u + 8: u = 0.8 holds the state.
            let model = AffineModel {
                a: DMatrix::from_element(1, 1, 1.0),
                b: DMatrix::from_element(1, 1, -10.0),
                c: DMatrix::from_element(1, 1, 0.0),
                d: DVector::from_element(1, 8.0),
                rho_ref: DVector::from_element(1, state),
                u_ref: DVector::from_element(1, 0.8),
            };
            Self {
                state: DVector::from_element(1, state),
                model,
                h: DMatrix::identity(1, 1),
                h0: DVector::zeros(1),
                demand: DVector::zeros(1),
                reference: DMatrix::from_element(1, 5, target),
                inputs: Vec::new(),
                outputs: Vec::new(),
            }
        }

        pub fn ctx(&self, cycle: usize) -> DecisionContext<'_> {
            DecisionContext {
                cycle,
                state: &self.state,
                model: &self.model,
                output_map: (&self.h, &self.h0),
                demand_forecast: &self.demand,
                reference: &self.reference,
                input_history: &self.inputs,
                output_history: &self.outputs,
                bounds: SafetyBounds::TRAFFIC_LIGHT,
                neutral: 0.8,
                n_actuators: 3,
                n_regions: 1,
            }
        }
    }

    #[test]
    fn no_control_is_zero_per_actuator() {
        let f = Fixture::new(30.0, 30.0);
        let mut c = Controller::from_spec(&ControllerSpec::NoControl, 0).unwrap();
        assert!(!c.actuates());
        assert_eq!(c.decide(&f.ctx(0)).unwrap().as_slice(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn random_stays_in_bounds_and_replays_with_seed() {
        let f = Fixture::new(30.0, 30.0);
        let mut a = Controller::from_spec(&ControllerSpec::Random, 7).unwrap();
        let mut b = Controller::from_spec(&ControllerSpec::Random, 7).unwrap();
        for cycle in 0..20 {
            let ua = a.decide(&f.ctx(cycle)).unwrap();
            let ub = b.decide(&f.ctx(cycle)).unwrap();
            assert_eq!(ua, ub);
            assert!(ua.iter().all(|&v| (0.6..=1.0).contains(&v)));
        }
    }

    #[test]
    fn stub_fails_on_schedule() {
        let f = Fixture::new(30.0, 30.0);
        let spec = ControllerSpec::TestStub {
            value: Some(0.9),
            fail_at_cycle: Some(2),
        };
        let mut c = Controller::from_spec(&spec, 0).unwrap();
        assert_eq!(c.decide(&f.ctx(0)).unwrap().as_slice(), &[0.9, 0.9, 0.9]);
        assert_eq!(c.decide(&f.ctx(2)), Err(ControlError::Scripted { cycle: 2 }));
    }

    #[test]
    fn spec_parses_from_tagged_json() {
        let spec: ControllerSpec =
            serde_json::from_str(r#"{"type":"mpc","horizon":4,"input_weight":0.01}"#).unwrap();
        assert!(matches!(spec, ControllerSpec::Mpc(MpcConfig { horizon: 4, .. })));
        let spec: ControllerSpec = serde_json::from_str(r#"{"type":"deepc"}"#).unwrap();
        assert!(matches!(spec, ControllerSpec::DeePc(_)));
    }
}
