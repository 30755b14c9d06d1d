//! Actuator classes, placements and the commands they produce.

use rf_core::{ActuatorId, EdgeId, Velocity};
use serde::{Deserialize, Serialize};

use crate::bounds::SafetyBounds;
use crate::signal_plan::{PhaseDurations, SignalPlan};

/// Physical kind shared by every actuator of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActuatorClass {
    /// Signalized junction; the input is a green-time ratio.
    TrafficLight { plan: SignalPlan },
    /// Edge speed limit; the input multiplies the edge's max speed.
    SpeedLimit,
    /// Placeholder that accepts no input and issues no command.
    Inert,
}

impl ActuatorClass {
    pub fn default_bounds(&self) -> SafetyBounds {
        match self {
            ActuatorClass::TrafficLight { .. } => SafetyBounds::TRAFFIC_LIGHT,
            ActuatorClass::SpeedLimit => SafetyBounds::SPEED_LIMIT,
            ActuatorClass::Inert => SafetyBounds::INERT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActuatorClass::TrafficLight { .. } => "traffic_light",
            ActuatorClass::SpeedLimit => "speed_limit",
            ActuatorClass::Inert => "inert",
        }
    }
}

/// Where an actuator sits: its name and the edge it controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorPlacement {
    pub name: String,
    pub edge: String,
}

/// A resolved actuator inside an `ActuatorGroup`.
#[derive(Debug, Clone, PartialEq)]
pub struct Actuator {
    pub id: ActuatorId,
    pub name: String,
    pub edge: EdgeId,
    pub region: usize,
    /// Speed limit of the controlled edge at construction time.
    pub max_speed: Velocity,
}

/// Concrete low-level setting sent to the simulation engine.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandValue {
    SignalProgram(PhaseDurations),
    SpeedLimit(Velocity),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorCommand {
    pub actuator: ActuatorId,
    pub edge: EdgeId,
    /// Control ratio after the safety policy was applied.
    pub ratio: f64,
    pub value: CommandValue,
}
