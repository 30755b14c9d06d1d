//! Simulation-engine boundary and closed-loop control driver for regioflow.
//!
//! Provides:
//! - `SimulationEngine` trait for pluggable traffic simulators
//! - `EngineSession` with scoped engine ownership and parallel telemetry reads
//! - `RegionalEngine`, a deterministic built-in engine for calibration and tests
//! - `ControlLoop`, the per-cycle step / aggregate / linearize / decide / actuate driver
//! - `collect_mfd_samples` for offline calibration runs

pub mod control_loop;
pub mod engine;
pub mod error;
pub mod regional;
pub mod sampling;
pub mod session;

pub use control_loop::{ControlLoop, CycleReport, ErrorWeights, LoopConfig};
pub use engine::SimulationEngine;
pub use error::{LoopStage, SimError, SimResult};
pub use regional::{RegionalEngine, RegionalEngineConfig, VERSION as REGIONAL_ENGINE_VERSION};
pub use sampling::collect_mfd_samples;
pub use session::EngineSession;
