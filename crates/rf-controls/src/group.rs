//! Ordered actuator groups: safety envelope, region placement and command fan-out.

use nalgebra::DVector;
use rf_core::{ActuatorId, mean};
use rf_network::{Network, RegionPartition};
use tracing::warn;

use crate::actuator::{
    Actuator, ActuatorClass, ActuatorCommand, ActuatorPlacement, CommandValue,
};
use crate::bounds::{BoundsPolicy, SafetyBounds};
use crate::error::{ControlError, ControlResult};

/// Receiver of actuator commands (the simulation engine side).
pub trait CommandSink {
    type Error: From<ControlError>;

    fn apply_actuator_command(&mut self, command: &ActuatorCommand) -> Result<(), Self::Error>;
}

/// Actuators of one class, in the fixed order used by input vectors.
#[derive(Debug, Clone)]
pub struct ActuatorGroup {
    class: ActuatorClass,
    bounds: SafetyBounds,
    policy: BoundsPolicy,
    actuators: Vec<Actuator>,
    n_regions: usize,
}

impl ActuatorGroup {
    /// Resolve placements against the network; the input ordering is the
    /// placement ordering.
    pub fn new(
        class: ActuatorClass,
        placements: &[ActuatorPlacement],
        network: &Network,
        partition: &RegionPartition,
    ) -> ControlResult<Self> {
        if let ActuatorClass::TrafficLight { plan } = &class {
            plan.validate()?;
        }
        let mut actuators = Vec::with_capacity(placements.len());
        for (i, placement) in placements.iter().enumerate() {
            if actuators.iter().any(|a: &Actuator| a.name == placement.name) {
                return Err(ControlError::InvalidArg {
                    what: "actuator names must be unique",
                });
            }
            let edge = network
                .edge_id(&placement.edge)
                .map_err(|_| ControlError::UnknownEdge {
                    edge: placement.edge.clone(),
                })?;
            actuators.push(Actuator {
                id: ActuatorId::from_usize(i),
                name: placement.name.clone(),
                edge,
                region: partition.region_of(edge),
                max_speed: network.edge(edge).max_speed,
            });
        }
        Ok(Self {
            bounds: class.default_bounds(),
            class,
            policy: BoundsPolicy::default(),
            actuators,
            n_regions: partition.n_regions(),
        })
    }

    /// Override the class envelope.
    pub fn with_bounds(mut self, bounds: SafetyBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_policy(mut self, policy: BoundsPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn class(&self) -> &ActuatorClass {
        &self.class
    }

    pub fn policy(&self) -> BoundsPolicy {
        self.policy
    }

    pub fn bounds(&self) -> SafetyBounds {
        self.bounds
    }

    /// `(lower, upper)` safety envelope shared by every actuator of the group.
    pub fn get_input_bounds(&self) -> (f64, f64) {
        (self.bounds.lower, self.bounds.upper)
    }

    pub fn len(&self) -> usize {
        self.actuators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actuators.is_empty()
    }

    pub fn n_regions(&self) -> usize {
        self.n_regions
    }

    pub fn actuators(&self) -> &[Actuator] {
        &self.actuators
    }

    pub fn names(&self) -> Vec<String> {
        self.actuators.iter().map(|a| a.name.clone()).collect()
    }

    /// Indices of the actuators located in `region`.
    pub fn actuators_in(&self, region: usize) -> impl Iterator<Item = usize> + '_ {
        self.actuators
            .iter()
            .enumerate()
            .filter(move |(_, a)| a.region == region)
            .map(|(i, _)| i)
    }

    /// Neutral ratio ("u hat"); all actuators of a group share it.
    pub fn neutral(&self) -> f64 {
        match &self.class {
            ActuatorClass::TrafficLight { plan } => plan.neutral_ratio(),
            ActuatorClass::SpeedLimit => 1.0,
            ActuatorClass::Inert => 0.0,
        }
    }

    pub fn neutral_inputs(&self) -> DVector<f64> {
        DVector::from_element(self.len(), self.neutral())
    }

    /// Apply the safety policy to one value.
    fn enforce_one(&self, actuator: &Actuator, value: f64) -> ControlResult<f64> {
        if self.bounds.contains(value) {
            return Ok(value);
        }
        match self.policy {
            BoundsPolicy::Reject => Err(ControlError::OutOfBounds {
                actuator: actuator.name.clone(),
                value,
                lower: self.bounds.lower,
                upper: self.bounds.upper,
            }),
            BoundsPolicy::Clamp => {
                if value.is_nan() {
                    return Err(ControlError::InvalidArg {
                        what: "control input is NaN",
                    });
                }
                let clamped = self.bounds.clamp(value);
                warn!(actuator = %actuator.name, value, clamped, "input clamped to safety bounds");
                Ok(clamped)
            }
        }
    }

    /// Apply the safety policy to a full input vector.
    pub fn enforce(&self, inputs: &DVector<f64>) -> ControlResult<DVector<f64>> {
        self.check_len(inputs)?;
        let values = self
            .actuators
            .iter()
            .zip(inputs.iter())
            .map(|(a, &v)| self.enforce_one(a, v))
            .collect::<ControlResult<Vec<_>>>()?;
        Ok(DVector::from_vec(values))
    }

    fn check_len(&self, inputs: &DVector<f64>) -> ControlResult<()> {
        if inputs.len() != self.len() {
            return Err(ControlError::DimensionMismatch {
                what: "actuator inputs",
                expected: self.len(),
                actual: inputs.len(),
            });
        }
        Ok(())
    }

    fn command(&self, actuator: &Actuator, ratio: f64) -> ControlResult<Option<ActuatorCommand>> {
        let value = match &self.class {
            ActuatorClass::TrafficLight { plan } => {
                CommandValue::SignalProgram(plan.phase_durations(&actuator.name, ratio)?)
            }
            ActuatorClass::SpeedLimit => CommandValue::SpeedLimit(actuator.max_speed * ratio),
            ActuatorClass::Inert => return Ok(None),
        };
        Ok(Some(ActuatorCommand {
            actuator: actuator.id,
            edge: actuator.edge,
            ratio,
            value,
        }))
    }

    /// Commands for an input vector, one per (non-inert) actuator, in order.
    pub fn commands(&self, inputs: &DVector<f64>) -> ControlResult<Vec<ActuatorCommand>> {
        let enforced = self.enforce(inputs)?;
        let mut out = Vec::with_capacity(self.len());
        for (actuator, &ratio) in self.actuators.iter().zip(enforced.iter()) {
            if let Some(cmd) = self.command(actuator, ratio)? {
                out.push(cmd);
            }
        }
        Ok(out)
    }

    /// Map component `i` to actuator `i` and issue the commands.
    ///
    /// Returns the inputs actually applied (after the safety policy).
    pub fn apply<S: CommandSink>(
        &self,
        inputs: &DVector<f64>,
        sink: &mut S,
    ) -> Result<DVector<f64>, S::Error> {
        let applied = self.enforce(inputs)?;
        for (actuator, &ratio) in self.actuators.iter().zip(applied.iter()) {
            if let Some(cmd) = self.command(actuator, ratio)? {
                sink.apply_actuator_command(&cmd)?;
            }
        }
        Ok(applied)
    }

    /// Send one region-level value to every actuator located in `region`.
    ///
    /// Returns how many actuators received it.
    pub fn broadcast_region_input<S: CommandSink>(
        &self,
        region: usize,
        value: f64,
        sink: &mut S,
    ) -> Result<usize, S::Error> {
        if region >= self.n_regions {
            return Err(ControlError::InvalidArg {
                what: "region index out of range",
            }
            .into());
        }
        let mut count = 0;
        for i in self.actuators_in(region) {
            let actuator = &self.actuators[i];
            let ratio = self.enforce_one(actuator, value)?;
            if let Some(cmd) = self.command(actuator, ratio)? {
                sink.apply_actuator_command(&cmd)?;
            }
            count += 1;
        }
        Ok(count)
    }

    /// Expand one value per region into one value per actuator.
    pub fn fan_out_regions(&self, region_inputs: &DVector<f64>) -> ControlResult<DVector<f64>> {
        if region_inputs.len() != self.n_regions {
            return Err(ControlError::DimensionMismatch {
                what: "region inputs",
                expected: self.n_regions,
                actual: region_inputs.len(),
            });
        }
        Ok(DVector::from_iterator(
            self.len(),
            self.actuators.iter().map(|a| region_inputs[a.region]),
        ))
    }

    /// Apply one value per region to the region's actuators.
    ///
    /// The fanned-out inputs are enforced once, before any command is sent,
    /// so a rejected region leaves the sink untouched.
    pub fn apply_regions<S: CommandSink>(
        &self,
        region_inputs: &DVector<f64>,
        sink: &mut S,
    ) -> Result<DVector<f64>, S::Error> {
        let inputs = self.fan_out_regions(region_inputs)?;
        self.apply(&inputs, sink)
    }

    /// Region-level effective input: mean over the region's actuators, the
    /// neutral input where a region has none.
    pub fn region_reference(&self, applied: &DVector<f64>) -> ControlResult<DVector<f64>> {
        self.check_len(applied)?;
        let neutral = self.neutral();
        Ok(DVector::from_fn(self.n_regions, |r, _| {
            let values: Vec<f64> = self.actuators_in(r).map(|i| applied[i]).collect();
            mean(&values).unwrap_or(neutral)
        }))
    }
}
