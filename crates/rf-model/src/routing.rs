//! Inter-region routing fractions.

use nalgebra::DMatrix;
use rf_network::RegionAdjacency;

use crate::error::{ModelError, ModelResult};

const ROW_SUM_TOL: f64 = 1e-9;

/// `theta[(i, j)]`: fraction of region i's outflow entering region j.
///
/// Only adjacent pairs may carry a fraction; whatever a row leaves unassigned
/// exits the network.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingTable {
    theta: DMatrix<f64>,
}

impl RoutingTable {
    /// Validate explicit fractions against the region adjacency.
    pub fn new(rows: &[Vec<f64>], adjacency: &RegionAdjacency) -> ModelResult<Self> {
        let n = adjacency.n_regions();
        if rows.len() != n {
            return Err(ModelError::DimensionMismatch {
                what: "routing rows",
                expected: n,
                actual: rows.len(),
            });
        }
        let mut theta = DMatrix::zeros(n, n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(ModelError::DimensionMismatch {
                    what: "routing columns",
                    expected: n,
                    actual: row.len(),
                });
            }
            for (j, &value) in row.iter().enumerate() {
                if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                    return Err(ModelError::InvalidRouting {
                        from: i,
                        to: j,
                        what: "fraction must lie in [0, 1]",
                    });
                }
                if value > 0.0 && (i == j || !adjacency.is_adjacent(i, j)) {
                    return Err(ModelError::InvalidRouting {
                        from: i,
                        to: j,
                        what: "regions are not adjacent",
                    });
                }
                theta[(i, j)] = value;
            }
            if row.iter().sum::<f64>() > 1.0 + ROW_SUM_TOL {
                return Err(ModelError::InvalidRouting {
                    from: i,
                    to: i,
                    what: "outgoing fractions sum above 1",
                });
            }
        }
        Ok(Self { theta })
    }

    /// Split `fraction` of each region's outflow evenly over its neighbors.
    pub fn uniform(adjacency: &RegionAdjacency, fraction: f64) -> ModelResult<Self> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(ModelError::InvalidRouting {
                from: 0,
                to: 0,
                what: "fraction must lie in [0, 1]",
            });
        }
        let n = adjacency.n_regions();
        let mut theta = DMatrix::zeros(n, n);
        for i in 0..n {
            let neighbors: Vec<usize> = adjacency.neighbors_of(i).filter(|&j| j != i).collect();
            for &j in &neighbors {
                theta[(i, j)] = fraction / neighbors.len() as f64;
            }
        }
        Ok(Self { theta })
    }

    /// Every region's outflow leaves the network.
    pub fn isolated(n_regions: usize) -> Self {
        Self {
            theta: DMatrix::zeros(n_regions, n_regions),
        }
    }

    pub fn n_regions(&self) -> usize {
        self.theta.nrows()
    }

    pub fn fraction(&self, from: usize, to: usize) -> f64 {
        self.theta[(from, to)]
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.theta
    }

    /// Share of region i's outflow that leaves the network.
    pub fn exit_fraction(&self, from: usize) -> f64 {
        (1.0 - self.theta.row(from).sum()).max(0.0)
    }
}
