//! Immutable network representation.

use std::collections::HashMap;

use rf_core::{EdgeId, Length, Velocity, to_km};

use crate::error::{NetworkError, NetworkResult};

/// A road edge (one directed street segment).
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub name: String,
    pub length: Length,
    pub lanes: u32,
    /// Speed limit the edge was built with; speed-limit actuators scale it.
    pub max_speed: Velocity,
    /// Edges sharing a start or end junction with this one, sorted by id.
    pub neighbors: Vec<EdgeId>,
}

impl Edge {
    /// Storage proxy of this edge: lanes times length in kilometers.
    pub fn lane_km(&self) -> f64 {
        self.lanes as f64 * to_km(self.length)
    }
}

/// Immutable edge arena with name lookup.
///
/// Constructed via `NetworkBuilder`; after construction the only mutable
/// per-edge attribute (the region label) lives in `RegionPartition`.
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) edges: Vec<Edge>,
    pub(crate) by_name: HashMap<String, EdgeId>,
}

impl Network {
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Get an edge by ID. Panics on a foreign id, like slice indexing.
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.idx()]
    }

    pub fn get(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.idx())
    }

    pub fn neighbors(&self, id: EdgeId) -> &[EdgeId] {
        &self.edge(id).neighbors
    }

    /// Resolve an edge name to its ID.
    pub fn edge_id(&self, name: &str) -> NetworkResult<EdgeId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| NetworkError::UnknownEdge {
                name: name.to_string(),
            })
    }

    /// True when every neighbor relation has its reverse.
    pub fn is_symmetric(&self) -> bool {
        self.edges.iter().all(|e| {
            e.neighbors
                .iter()
                .all(|n| self.edge(*n).neighbors.binary_search(&e.id).is_ok())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::NetworkBuilder;
    use rf_core::m;

    #[test]
    fn lane_km_uses_lanes_and_length() {
        let mut builder = NetworkBuilder::new();
        let a = builder.add_edge("a", m(500.0), 3);
        let network = builder.build().unwrap();
        assert!((network.edge(a).lane_km() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn name_lookup() {
        let mut builder = NetworkBuilder::new();
        let a = builder.add_edge("main_st", m(100.0), 1);
        let network = builder.build().unwrap();
        assert_eq!(network.edge_id("main_st").unwrap(), a);
        assert!(network.edge_id("nope").is_err());
    }
}
