//! Closed-loop receding-horizon control over a simulation engine.
//!
//! Per control cycle, strictly in this order:
//!
//! 1. advance the engine to the cycle boundary
//! 2. aggregate region telemetry (parallel, read-only)
//! 3. re-linearize the dynamics at the observed densities
//! 4. ask the controller for the next input
//! 5. apply it through the actuator group (skipped for `NoControl`)
//! 6. record state, inputs, one-step prediction and tracking error
//!
//! Any failure tears the engine session down and is reported with the
//! cycle and stage it happened in.

use nalgebra::{DMatrix, DVector};
use rf_controls::{
    ActuatorGroup, CommandSink, ControlClock, Controller, DecisionContext, Granularity,
};
use rf_mfd::{OutputKind, reference_trajectory};
use rf_model::{DemandTensor, LinearDynamicsModel, output_jacobian};
use rf_network::{Channel, RegionPartition};
use rf_results::{ResultBundle, SummaryMetrics};
use tracing::{debug, info, warn};

use crate::engine::SimulationEngine;
use crate::error::{LoopStage, SimError, SimResult};
use crate::session::EngineSession;

/// Positive-definite weighting `W` of the tracking error `(y - r)' W (y - r)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorWeights {
    w: DMatrix<f64>,
}

impl ErrorWeights {
    pub fn identity(n: usize) -> Self {
        Self {
            w: DMatrix::identity(n, n),
        }
    }

    pub fn diagonal(weights: &[f64]) -> SimResult<Self> {
        if weights.iter().any(|w| !(w.is_finite() && *w > 0.0)) {
            return Err(SimError::InvalidArg {
                what: "error weights must be positive",
            });
        }
        Ok(Self {
            w: DMatrix::from_diagonal(&DVector::from_column_slice(weights)),
        })
    }

    pub fn from_matrix(w: DMatrix<f64>) -> SimResult<Self> {
        if !w.is_square() || w.iter().any(|v| !v.is_finite()) {
            return Err(SimError::InvalidArg {
                what: "error weight matrix must be square and finite",
            });
        }
        if (&w - w.transpose()).amax() > 1e-12 * (1.0 + w.amax()) {
            return Err(SimError::InvalidArg {
                what: "error weight matrix must be symmetric",
            });
        }
        if w.clone().cholesky().is_none() {
            return Err(SimError::InvalidArg {
                what: "error weight matrix must be positive definite",
            });
        }
        Ok(Self { w })
    }

    pub fn dim(&self) -> usize {
        self.w.nrows()
    }

    pub fn quadratic(&self, e: &DVector<f64>) -> f64 {
        e.dot(&(&self.w * e))
    }
}

/// Fixed parameters of one control run.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub clock: ControlClock,
    pub output: OutputKind,
    /// Columns of the reference trajectory handed to controllers.
    pub reference_horizon: usize,
    pub weights: ErrorWeights,
}

/// Progress report emitted after every completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle: usize,
    pub n_cycles: usize,
    pub time_s: f64,
    pub error: f64,
}

/// Quantities produced by one cycle before they are logged.
struct CycleOutcome {
    time_s: f64,
    density: DVector<f64>,
    flow: DVector<f64>,
    applied: DVector<f64>,
    region_input: DVector<f64>,
    prediction: DVector<f64>,
    error: f64,
}

pub struct ControlLoop<'a> {
    partition: &'a RegionPartition,
    model: &'a LinearDynamicsModel,
    group: &'a ActuatorGroup,
    demand: &'a DemandTensor,
    controller: Controller,
    config: LoopConfig,
    reference: DMatrix<f64>,
    input_history: Vec<DVector<f64>>,
    output_history: Vec<DVector<f64>>,
    bundle: ResultBundle,
    stage: LoopStage,
}

impl<'a> ControlLoop<'a> {
    /// Validate the run setup and prime the input history with the neutral
    /// region input.
    pub fn new(
        partition: &'a RegionPartition,
        model: &'a LinearDynamicsModel,
        group: &'a ActuatorGroup,
        demand: &'a DemandTensor,
        controller: Controller,
        config: LoopConfig,
    ) -> SimResult<Self> {
        let n = partition.n_regions();
        if model.n_regions() != n || group.n_regions() != n || demand.n_regions() != n {
            return Err(SimError::InvalidArg {
                what: "partition, model, actuators and demand disagree on the region count",
            });
        }
        if config.weights.dim() != config.output.n_outputs(n) {
            return Err(SimError::InvalidArg {
                what: "error weights do not match the output dimension",
            });
        }
        if config.reference_horizon == 0 {
            return Err(SimError::InvalidArg {
                what: "reference horizon must be positive",
            });
        }

        let reference = reference_trajectory(model.mfds(), config.reference_horizon, config.output);
        let neutral = group.region_reference(&group.neutral_inputs())?;
        let bundle = ResultBundle::new(n, group.names());

        Ok(Self {
            partition,
            model,
            group,
            demand,
            controller,
            config,
            reference,
            input_history: vec![neutral],
            output_history: Vec::new(),
            bundle,
            stage: LoopStage::Init,
        })
    }

    pub fn reference(&self) -> &DMatrix<f64> {
        &self.reference
    }

    pub fn run<E: SimulationEngine>(self, session: EngineSession<E>) -> SimResult<ResultBundle> {
        self.run_with_progress(session, None)
    }

    /// Drive the engine through every cycle and assemble the result bundle.
    ///
    /// The session is consumed: it is closed on success and torn down on
    /// failure.
    pub fn run_with_progress<E: SimulationEngine>(
        mut self,
        mut session: EngineSession<E>,
        mut progress_cb: Option<&mut dyn FnMut(CycleReport)>,
    ) -> SimResult<ResultBundle> {
        let n_cycles = self.config.clock.n_cycles();
        info!(
            controller = self.controller.name(),
            n_regions = self.partition.n_regions(),
            n_actuators = self.group.len(),
            n_cycles,
            "control loop started"
        );

        while let Some(boundary) = self.config.clock.next_boundary() {
            let k = self.config.clock.completed;
            let outcome = match self.cycle(k, boundary, &mut session) {
                Ok(outcome) => outcome,
                Err(e) => {
                    let e = e.at(k, self.stage);
                    if let Err(close_err) = session.close() {
                        warn!(error = %close_err, "engine teardown after failed cycle");
                    }
                    return Err(e);
                }
            };
            self.config.clock.advance();

            if let Some(cb) = progress_cb.as_deref_mut() {
                cb(CycleReport {
                    cycle: k,
                    n_cycles,
                    time_s: outcome.time_s,
                    error: outcome.error,
                });
            }
            self.log(outcome);
        }

        self.stage = LoopStage::Finalizing;
        let trips = session
            .trip_records()
            .map_err(|e| e.at(n_cycles, LoopStage::Finalizing))?;
        session
            .close()
            .map_err(|e| e.at(n_cycles, LoopStage::Finalizing))?;

        let mut bundle = self.bundle;
        bundle.summary = SummaryMetrics::from_trips(&trips);
        info!(
            cycles = bundle.n_rows(),
            vehicles = bundle.summary.vehicle_count,
            mean_travel_time_min = bundle.summary.mean_travel_time_min,
            "control loop finished"
        );
        Ok(bundle)
    }

    fn cycle<E: SimulationEngine>(
        &mut self,
        k: usize,
        boundary: rf_core::Time,
        session: &mut EngineSession<E>,
    ) -> SimResult<CycleOutcome> {
        let n = self.partition.n_regions();
        let ts = self.config.clock.cycle_duration();
        let time_s = rf_core::to_seconds(boundary);

        self.stage = LoopStage::Stepping;
        session.advance(boundary)?;

        self.stage = LoopStage::Aggregating;
        let regions: Vec<usize> = (0..n).collect();
        let telemetry =
            session.read_region_telemetry(self.partition, &regions, &[Channel::Density, Channel::Flow])?;
        let density = telemetry.column(0).into_owned();
        let flow = telemetry.column(1).into_owned();
        LinearDynamicsModel::ensure_finite_state(&density)?;
        let observed = match self.config.output {
            OutputKind::Density => density.clone(),
            OutputKind::Flow => flow.clone(),
            OutputKind::DensityFlow => {
                DVector::from_iterator(2 * n, density.iter().chain(flow.iter()).copied())
            }
        };
        self.output_history.push(observed.clone());

        self.stage = LoopStage::Linearizing;
        let u_ref = self
            .input_history
            .last()
            .cloned()
            .ok_or(SimError::InvalidArg {
                what: "input history was not primed",
            })?;
        let affine = self.model.linearize(ts, &density, &u_ref)?;
        let (h, h0) = output_jacobian(self.config.output, self.model.mfds(), &density);

        self.stage = LoopStage::Deciding;
        let (start, len) = self.config.clock.slot_window(k);
        let demand_forecast = self.demand.origin_rate_per_hour(start, len);
        let ctx = DecisionContext {
            cycle: k,
            state: &density,
            model: &affine,
            output_map: (&h, &h0),
            demand_forecast: &demand_forecast,
            reference: &self.reference,
            input_history: &self.input_history,
            output_history: &self.output_history,
            bounds: self.group.bounds(),
            neutral: self.group.neutral(),
            n_actuators: self.group.len(),
            n_regions: n,
        };
        let decision = self.controller.decide(&ctx)?;

        self.stage = LoopStage::Actuating;
        let (applied, region_input) = self.actuate(&decision, session)?;

        self.stage = LoopStage::Logging;
        let prediction = affine.predict(&density, &region_input, &demand_forecast);
        let error = self.config.weights.quadratic(&(&observed - self.reference.column(0)));
        if !error.is_finite() {
            return Err(SimError::InvalidArg {
                what: "tracking error is not finite",
            });
        }
        self.input_history.push(region_input.clone());

        debug!(cycle = k, time_s, error, "cycle complete");
        Ok(CycleOutcome {
            time_s,
            density,
            flow,
            applied,
            region_input,
            prediction,
            error,
        })
    }

    /// Apply a decision. Returns the per-actuator inputs recorded for the
    /// cycle and the region-level input in effect.
    fn actuate<S: CommandSink<Error = SimError>>(
        &self,
        decision: &DVector<f64>,
        sink: &mut S,
    ) -> SimResult<(DVector<f64>, DVector<f64>)> {
        if !self.controller.actuates() {
            let neutral = self.group.region_reference(&self.group.neutral_inputs())?;
            return Ok((DVector::zeros(self.group.len()), neutral));
        }
        let applied = match self.controller.granularity() {
            Granularity::Actuator => self.group.apply(decision, sink)?,
            Granularity::Region => self.group.apply_regions(decision, sink)?,
        };
        let region_input = self.group.region_reference(&applied)?;
        Ok((applied, region_input))
    }

    fn log(&mut self, outcome: CycleOutcome) {
        let row = |v: &DVector<f64>| v.iter().copied().collect::<Vec<_>>();
        self.bundle.time_s.push(outcome.time_s);
        self.bundle.density.push(row(&outcome.density));
        self.bundle.flow.push(row(&outcome.flow));
        self.bundle.inputs.push(row(&outcome.applied));
        self.bundle.region_inputs.push(row(&outcome.region_input));
        self.bundle.prediction.push(row(&outcome.prediction));
        self.bundle.error.push(outcome.error);
    }
}
