//! Scoped ownership of a simulation engine.

use nalgebra::DMatrix;
use rayon::prelude::*;
use rf_controls::{ActuatorCommand, CommandSink};
use rf_core::Time;
use rf_network::{Channel, RegionPartition};
use rf_results::TripRecord;
use tracing::{debug, warn};

use crate::engine::SimulationEngine;
use crate::error::{SimError, SimResult};

/// Exclusive handle on an engine for the lifetime of a run.
///
/// The engine is closed exactly once: by [`EngineSession::close`] or, on
/// any early exit, when the session is dropped.
pub struct EngineSession<E: SimulationEngine> {
    engine: Option<E>,
    pool: rayon::ThreadPool,
}

impl<E: SimulationEngine> EngineSession<E> {
    /// Take ownership of `engine`, with one telemetry worker per region.
    pub fn open(engine: E, n_regions: usize) -> SimResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_regions.max(1))
            .thread_name(|i| format!("rf-telemetry-{i}"))
            .build()
            .map_err(|e| SimError::Engine {
                message: format!("telemetry pool: {e}"),
            })?;
        debug!(engine = engine.version(), workers = n_regions.max(1), "engine session opened");
        Ok(Self {
            engine: Some(engine),
            pool,
        })
    }

    pub fn is_open(&self) -> bool {
        self.engine.is_some()
    }

    pub fn engine(&self) -> SimResult<&E> {
        self.engine.as_ref().ok_or(SimError::EngineClosed)
    }

    fn engine_mut(&mut self) -> SimResult<&mut E> {
        self.engine.as_mut().ok_or(SimError::EngineClosed)
    }

    pub fn version(&self) -> SimResult<String> {
        Ok(self.engine()?.version().to_string())
    }

    pub fn time(&self) -> SimResult<Time> {
        Ok(self.engine()?.time())
    }

    pub fn advance(&mut self, to: Time) -> SimResult<()> {
        self.engine_mut()?.advance(to)
    }

    /// Mean telemetry over each region's member edges.
    ///
    /// Row `k` belongs to `regions[k]`, column `c` to `channels[c]`. Regions
    /// are read in parallel; the engine is not stepped meanwhile.
    pub fn read_region_telemetry(
        &self,
        partition: &RegionPartition,
        regions: &[usize],
        channels: &[Channel],
    ) -> SimResult<DMatrix<f64>> {
        let engine = self.engine()?;
        if let Some(&bad) = regions.iter().find(|&&r| r >= partition.n_regions()) {
            return Err(SimError::Engine {
                message: format!("telemetry requested for unknown region {bad}"),
            });
        }

        let rows: Vec<Vec<f64>> = self.pool.install(|| {
            regions
                .par_iter()
                .map(|&region| {
                    let members = partition.members(region);
                    let mut sums = vec![0.0; channels.len()];
                    for &edge in members {
                        let values = engine.read_edge_telemetry(edge, channels)?;
                        if values.len() != channels.len() {
                            return Err(SimError::Engine {
                                message: format!(
                                    "edge {edge} returned {} values for {} channels",
                                    values.len(),
                                    channels.len()
                                ),
                            });
                        }
                        for (sum, v) in sums.iter_mut().zip(values) {
                            *sum += v;
                        }
                    }
                    let n = members.len().max(1) as f64;
                    Ok(sums.into_iter().map(|s| s / n).collect())
                })
                .collect::<SimResult<Vec<_>>>()
        })?;

        Ok(DMatrix::from_fn(regions.len(), channels.len(), |r, c| rows[r][c]))
    }

    pub fn trip_records(&self) -> SimResult<Vec<TripRecord>> {
        Ok(self.engine()?.trip_records())
    }

    /// Close the engine now. Later calls fail with `EngineClosed`.
    pub fn close(&mut self) -> SimResult<()> {
        match self.engine.take() {
            Some(mut engine) => {
                debug!(engine = engine.version(), "engine session closed");
                engine.close()
            }
            None => Err(SimError::EngineClosed),
        }
    }
}

impl<E: SimulationEngine> CommandSink for EngineSession<E> {
    type Error = SimError;

    fn apply_actuator_command(&mut self, command: &ActuatorCommand) -> SimResult<()> {
        self.engine_mut()?.apply_actuator_command(command)
    }
}

impl<E: SimulationEngine> Drop for EngineSession<E> {
    fn drop(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            match engine.close() {
                Ok(()) => debug!(engine = engine.version(), "engine released on drop"),
                Err(e) => warn!(error = %e, "engine close failed during teardown"),
            }
        }
    }
}
