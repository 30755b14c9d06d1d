//! Actuation and control strategies for regioflow.
//!
//! This crate turns abstract control decisions into concrete actuator
//! commands and hosts the closed set of control strategies.
//!
//! # Architecture
//!
//! - `ActuatorGroup` owns the ordered actuator list of one class, its safety
//!   envelope and the actuator → region placement
//! - Controllers (`NoControl`, `Random`, `Mpc`, `DeePc`, `TestStub`) sit behind
//!   one `Controller::decide` capability and are selected by `ControllerSpec`
//! - Commands reach the simulation engine through the `CommandSink` trait
//! - `ControlClock` schedules control-cycle boundaries

pub mod actuator;
pub mod bounds;
pub mod clock;
pub mod controller;
pub mod deepc;
pub mod error;
pub mod group;
pub mod mpc;
pub mod signal_plan;

pub use actuator::{Actuator, ActuatorClass, ActuatorCommand, ActuatorPlacement, CommandValue};
pub use bounds::{BoundsPolicy, SafetyBounds};
pub use clock::ControlClock;
pub use controller::{Controller, ControllerSpec, DecisionContext, Granularity};
pub use deepc::{DeePcConfig, DeePcController};
pub use error::{ControlError, ControlResult};
pub use group::{ActuatorGroup, CommandSink};
pub use mpc::{MpcConfig, MpcController};
pub use signal_plan::{PhaseDurations, SignalPlan};
