//! Offline calibration: record region (density, flow) pairs for MFD fitting.

use rf_core::{Time, s, to_seconds};
use rf_mfd::MfdSamples;
use rf_network::{Channel, RegionPartition};
use tracing::info;

use crate::engine::SimulationEngine;
use crate::error::{SimError, SimResult};
use crate::session::EngineSession;

/// Sample region telemetry every `interval` over `(begin, end]`.
///
/// Returns one sample set per region. The engine is advanced but receives no
/// commands.
pub fn collect_mfd_samples<E: SimulationEngine>(
    session: &mut EngineSession<E>,
    partition: &RegionPartition,
    begin: Time,
    end: Time,
    interval: Time,
) -> SimResult<Vec<MfdSamples>> {
    let (begin, end, interval) = (to_seconds(begin), to_seconds(end), to_seconds(interval));
    if !(interval > 0.0) {
        return Err(SimError::InvalidArg {
            what: "sampling interval must be positive",
        });
    }
    if !(end > begin) {
        return Err(SimError::InvalidArg {
            what: "sampling window is empty",
        });
    }

    let regions: Vec<usize> = (0..partition.n_regions()).collect();
    let mut samples = vec![MfdSamples::default(); regions.len()];
    let mut k = 1;
    loop {
        let t = begin + k as f64 * interval;
        if t > end + 1e-9 {
            break;
        }
        session.advance(s(t))?;
        let telemetry =
            session.read_region_telemetry(partition, &regions, &[Channel::Density, Channel::Flow])?;
        for (r, set) in samples.iter_mut().enumerate() {
            set.push(telemetry[(r, 0)], telemetry[(r, 1)]);
        }
        k += 1;
    }

    info!(
        regions = regions.len(),
        samples_per_region = samples.first().map_or(0, MfdSamples::len),
        "collected MFD samples"
    );
    Ok(samples)
}
