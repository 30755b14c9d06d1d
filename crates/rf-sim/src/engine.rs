//! SimulationEngine trait for pluggable traffic simulators.

use rf_controls::ActuatorCommand;
use rf_core::{EdgeId, Time};
use rf_network::Channel;
use rf_results::TripRecord;

use crate::error::SimResult;

/// Boundary to a time-stepped traffic simulator.
///
/// The control thread is the only caller of the `&mut self` methods.
/// Telemetry reads take `&self` and may run in parallel once a step has
/// completed. Given the same seed and command sequence an engine must replay
/// deterministically.
pub trait SimulationEngine: Send + Sync {
    /// Version tag recorded in run manifests.
    fn version(&self) -> &str;

    /// Current simulation time.
    fn time(&self) -> Time;

    /// Run the simulation up to `to` (blocking).
    fn advance(&mut self, to: Time) -> SimResult<()>;

    /// Values of `channels` for one edge, in the given order.
    fn read_edge_telemetry(&self, edge: EdgeId, channels: &[Channel]) -> SimResult<Vec<f64>>;

    fn apply_actuator_command(&mut self, command: &ActuatorCommand) -> SimResult<()>;

    /// Trips completed so far.
    fn trip_records(&self) -> Vec<TripRecord>;

    /// Release the engine. Called exactly once by the owning session.
    fn close(&mut self) -> SimResult<()>;
}
