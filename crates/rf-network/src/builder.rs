//! Incremental network builder.

use std::collections::HashMap;

use rf_core::{EdgeId, Length, Velocity, mps};

use crate::error::NetworkResult;
use crate::network::{Edge, Network};
use crate::validate;

/// Default edge speed limit (50 km/h).
pub const DEFAULT_MAX_SPEED_MPS: f64 = 50.0 / 3.6;

/// Builder for constructing a network incrementally.
///
/// Use `add_edge` and `connect` to build up the network,
/// then call `build()` to validate and freeze it into an immutable `Network`.
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    edges: Vec<Edge>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge and return its ID.
    pub fn add_edge(&mut self, name: impl Into<String>, length: Length, lanes: u32) -> EdgeId {
        let id = EdgeId::from_usize(self.edges.len());
        self.edges.push(Edge {
            id,
            name: name.into(),
            length,
            lanes,
            max_speed: mps(DEFAULT_MAX_SPEED_MPS),
            neighbors: Vec::new(),
        });
        id
    }

    pub fn set_max_speed(&mut self, id: EdgeId, max_speed: Velocity) {
        if let Some(edge) = self.edges.get_mut(id.idx()) {
            edge.max_speed = max_speed;
        }
    }

    /// Record a one-way neighbor relation `from -> to`.
    pub fn add_neighbor(&mut self, from: EdgeId, to: EdgeId) {
        if let Some(edge) = self.edges.get_mut(from.idx()) {
            edge.neighbors.push(to);
        }
    }

    /// Record that two edges share a junction (symmetric relation).
    pub fn connect(&mut self, a: EdgeId, b: EdgeId) {
        self.add_neighbor(a, b);
        self.add_neighbor(b, a);
    }

    /// Build and validate the network, returning an immutable `Network`.
    ///
    /// Neighbor lists are sorted and de-duplicated for determinism.
    pub fn build(mut self) -> NetworkResult<Network> {
        for edge in &mut self.edges {
            edge.neighbors.sort();
            edge.neighbors.dedup();
        }

        validate::validate_structure(&self.edges)?;

        let by_name: HashMap<String, EdgeId> =
            self.edges.iter().map(|e| (e.name.clone(), e.id)).collect();

        Ok(Network {
            edges: self.edges,
            by_name,
        })
    }
}
