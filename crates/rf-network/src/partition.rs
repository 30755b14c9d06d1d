//! Region partition: edge membership, perimeter and region adjacency.
//!
//! The perimeter of a region is the set of *foreign* edges bordering it: for
//! every member edge, each neighbor living in another region is added to the
//! perimeter. Adjacency(i, j) is set iff region i's perimeter contains an edge
//! of region j.

use std::collections::{BTreeSet, HashMap};

use rf_core::EdgeId;

use crate::error::{NetworkError, NetworkResult};
use crate::network::Network;

/// Dense `n_regions x n_regions` boolean adjacency matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionAdjacency {
    n: usize,
    cells: Vec<bool>,
}

impl RegionAdjacency {
    fn empty(n: usize) -> Self {
        Self {
            n,
            cells: vec![false; n * n],
        }
    }

    pub fn n_regions(&self) -> usize {
        self.n
    }

    /// Panics when `i` or `j` is out of range.
    pub fn is_adjacent(&self, i: usize, j: usize) -> bool {
        assert!(i < self.n && j < self.n, "region index out of range");
        self.cells[i * self.n + j]
    }

    /// Regions bordering region `i`, ascending.
    pub fn neighbors_of(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.n).filter(move |&j| self.is_adjacent(i, j))
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.n).all(|i| (0..self.n).all(|j| self.is_adjacent(i, j) == self.is_adjacent(j, i)))
    }

    /// Row-major 0/1 weights, handy for matrix assembly and export.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n)
            .map(|i| {
                (0..self.n)
                    .map(|j| if self.is_adjacent(i, j) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect()
    }
}

/// Edge → region assignment plus its derived structure.
#[derive(Debug, Clone)]
pub struct RegionPartition {
    labels: Vec<usize>,
    members: Vec<Vec<EdgeId>>,
    perimeter: Vec<Vec<EdgeId>>,
    adjacency: RegionAdjacency,
}

impl RegionPartition {
    /// Build a partition from one label per edge, in edge-id order.
    pub fn from_labels(network: &Network, labels: &[usize]) -> NetworkResult<Self> {
        if network.is_empty() {
            return Err(NetworkError::EmptyNetwork);
        }
        if labels.len() != network.len() {
            return Err(NetworkError::LabelCountMismatch {
                expected: network.len(),
                actual: labels.len(),
            });
        }
        Self::derive(network, labels.to_vec())
    }

    /// Build a partition from labels keyed by edge name.
    ///
    /// Every edge must be labeled; names not present in the network are an error.
    pub fn from_named_labels(
        network: &Network,
        labels: &HashMap<String, usize>,
    ) -> NetworkResult<Self> {
        for name in labels.keys() {
            network.edge_id(name)?;
        }
        let ordered = network
            .edges()
            .iter()
            .map(|e| {
                labels
                    .get(&e.name)
                    .copied()
                    .ok_or_else(|| NetworkError::UnlabeledEdge {
                        name: e.name.clone(),
                    })
            })
            .collect::<NetworkResult<Vec<_>>>()?;
        Self::from_labels(network, &ordered)
    }

    /// Move edges to other regions and recompute perimeter and adjacency.
    ///
    /// The resulting labels must still be contiguous; on error `self` is unchanged.
    pub fn reassign(
        &mut self,
        network: &Network,
        moves: &[(EdgeId, usize)],
    ) -> NetworkResult<()> {
        let mut labels = self.labels.clone();
        for &(edge, region) in moves {
            let slot = labels
                .get_mut(edge.idx())
                .ok_or_else(|| NetworkError::UnknownEdge {
                    name: edge.to_string(),
                })?;
            *slot = region;
        }
        *self = Self::derive(network, labels)?;
        Ok(())
    }

    fn derive(network: &Network, labels: Vec<usize>) -> NetworkResult<Self> {
        if let Some(&label) = labels.iter().find(|&&l| l >= labels.len()) {
            return Err(NetworkError::LabelOutOfRange {
                label,
                n_edges: labels.len(),
            });
        }
        let n_regions = labels.iter().copied().max().map_or(0, |m| m + 1);

        let mut members: Vec<Vec<EdgeId>> = vec![Vec::new(); n_regions];
        for edge in network.edges() {
            members[labels[edge.id.idx()]].push(edge.id);
        }
        if let Some(missing) = members.iter().position(Vec::is_empty) {
            return Err(NetworkError::NonContiguousLabels { missing, n_regions });
        }

        let mut perimeter_sets: Vec<BTreeSet<EdgeId>> = vec![BTreeSet::new(); n_regions];
        for (region, edges) in members.iter().enumerate() {
            for &edge in edges {
                for &neighbor in network.neighbors(edge) {
                    if labels[neighbor.idx()] != region {
                        perimeter_sets[region].insert(neighbor);
                    }
                }
            }
        }

        let mut adjacency = RegionAdjacency::empty(n_regions);
        for (region, set) in perimeter_sets.iter().enumerate() {
            for edge in set {
                let other = labels[edge.idx()];
                adjacency.cells[region * n_regions + other] = true;
            }
        }

        Ok(Self {
            labels,
            members,
            perimeter: perimeter_sets
                .into_iter()
                .map(|s| s.into_iter().collect())
                .collect(),
            adjacency,
        })
    }

    pub fn n_regions(&self) -> usize {
        self.members.len()
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn region_of(&self, edge: EdgeId) -> usize {
        self.labels[edge.idx()]
    }

    pub fn members(&self, region: usize) -> &[EdgeId] {
        &self.members[region]
    }

    /// Foreign edges bordering `region`, sorted by id.
    pub fn perimeter(&self, region: usize) -> &[EdgeId] {
        &self.perimeter[region]
    }

    pub fn adjacency(&self) -> &RegionAdjacency {
        &self.adjacency
    }

    /// Sum of lanes x length (km) over the member edges of `region`.
    pub fn lane_km(&self, network: &Network, region: usize) -> f64 {
        self.members[region]
            .iter()
            .map(|&e| network.edge(e).lane_km())
            .sum()
    }
}
