//! Network validation logic.

use std::collections::HashSet;

use rf_core::to_km;

use crate::error::{NetworkError, NetworkResult};
use crate::network::Edge;

/// Validate the edge arena: names unique, geometry sane, neighbor refs in range.
pub(crate) fn validate_structure(edges: &[Edge]) -> NetworkResult<()> {
    let mut names = HashSet::new();
    for edge in edges {
        if !names.insert(edge.name.as_str()) {
            return Err(NetworkError::DuplicateEdge {
                name: edge.name.clone(),
            });
        }
    }

    for edge in edges {
        let length_km = to_km(edge.length);
        if !length_km.is_finite() || length_km <= 0.0 {
            return Err(NetworkError::InvalidGeometry {
                edge: edge.id,
                what: "length must be positive and finite",
            });
        }
        if edge.lanes == 0 {
            return Err(NetworkError::InvalidGeometry {
                edge: edge.id,
                what: "lane count must be at least 1",
            });
        }
        if !edge.max_speed.value.is_finite() || edge.max_speed.value <= 0.0 {
            return Err(NetworkError::InvalidGeometry {
                edge: edge.id,
                what: "max speed must be positive and finite",
            });
        }
    }

    for edge in edges {
        for &neighbor in &edge.neighbors {
            if neighbor.idx() >= edges.len() {
                return Err(NetworkError::InvalidNeighborRef {
                    edge: edge.id,
                    neighbor,
                });
            }
            if neighbor == edge.id {
                return Err(NetworkError::SelfNeighbor { edge: edge.id });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{NetworkBuilder, NetworkError};
    use rf_core::{EdgeId, m};

    #[test]
    fn zero_lanes_rejected() {
        let mut builder = NetworkBuilder::new();
        builder.add_edge("a", m(100.0), 0);
        assert!(matches!(
            builder.build(),
            Err(NetworkError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn non_positive_length_rejected() {
        let mut builder = NetworkBuilder::new();
        builder.add_edge("a", m(0.0), 1);
        assert!(matches!(
            builder.build(),
            Err(NetworkError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn dangling_neighbor_rejected() {
        let mut builder = NetworkBuilder::new();
        let a = builder.add_edge("a", m(100.0), 1);
        builder.add_neighbor(a, EdgeId::from_index(7));
        assert!(matches!(
            builder.build(),
            Err(NetworkError::InvalidNeighborRef { .. })
        ));
    }

    #[test]
    fn self_neighbor_rejected() {
        let mut builder = NetworkBuilder::new();
        let a = builder.add_edge("a", m(100.0), 1);
        builder.add_neighbor(a, a);
        assert!(matches!(
            builder.build(),
            Err(NetworkError::SelfNeighbor { .. })
        ));
    }
}
