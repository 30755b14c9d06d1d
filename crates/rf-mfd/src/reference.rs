//! Reference trajectories derived from fitted MFD breakpoints.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::approximator::RegionMfd;

/// Which regional observables form the controlled output `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Region densities (`n_regions` outputs).
    #[default]
    Density,
    /// Region flows (`n_regions` outputs).
    Flow,
    /// Densities stacked over flows (`2 * n_regions` outputs).
    DensityFlow,
}

impl OutputKind {
    pub fn n_outputs(self, n_regions: usize) -> usize {
        match self {
            OutputKind::Density | OutputKind::Flow => n_regions,
            OutputKind::DensityFlow => 2 * n_regions,
        }
    }
}

/// Tile the per-region set point over `horizon` steps.
///
/// Rows are outputs, columns are steps. Density outputs track the critical
/// density; flow outputs track the maximum flow `mfd(critical)`.
pub fn reference_trajectory(mfds: &[RegionMfd], horizon: usize, kind: OutputKind) -> DMatrix<f64> {
    let critical = mfds.iter().map(|m| m.critical_density);
    let max_flow = mfds.iter().map(RegionMfd::max_flow);
    let column: Vec<f64> = match kind {
        OutputKind::Density => critical.collect(),
        OutputKind::Flow => max_flow.collect(),
        OutputKind::DensityFlow => critical.chain(max_flow).collect(),
    };
    DMatrix::from_fn(column.len(), horizon, |i, _| column[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Polynomial, Pwa};

    fn mfd(jam: f64) -> RegionMfd {
        // x (jam - x)
        let curve = Polynomial::new(vec![0.0, jam, -1.0]);
        let critical = jam / 2.0;
        RegionMfd {
            pwa: Pwa::build(&curve, critical, jam, 2).unwrap(),
            curve,
            critical_density: critical,
            jam_density: jam,
        }
    }

    #[test]
    fn tiles_breakpoints() {
        let mfds = [mfd(80.0), mfd(60.0)];
        let r = reference_trajectory(&mfds, 3, OutputKind::DensityFlow);
        assert_eq!(r.shape(), (4, 3));
        for t in 0..3 {
            assert_eq!(r[(0, t)], 40.0);
            assert_eq!(r[(1, t)], 30.0);
            assert_eq!(r[(2, t)], 1600.0);
            assert_eq!(r[(3, t)], 900.0);
        }
        assert_eq!(reference_trajectory(&mfds, 5, OutputKind::Flow).shape(), (2, 5));
    }
}
