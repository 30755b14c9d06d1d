//! Network and partition error types.

use rf_core::EdgeId;

pub type NetworkResult<T> = Result<T, NetworkError>;

/// Network construction, validation and partitioning errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Two edges share the same name.
    DuplicateEdge { name: String },

    /// A neighbor list refers to an edge that doesn't exist.
    InvalidNeighborRef { edge: EdgeId, neighbor: EdgeId },

    /// An edge lists itself as a neighbor.
    SelfNeighbor { edge: EdgeId },

    /// An edge has non-positive or non-finite geometry.
    InvalidGeometry { edge: EdgeId, what: &'static str },

    /// Edge name lookup failed.
    UnknownEdge { name: String },

    /// The label array does not carry one label per edge.
    LabelCountMismatch { expected: usize, actual: usize },

    /// An edge was left without a region label.
    UnlabeledEdge { name: String },

    /// A label cannot name a region: there are never more regions than edges.
    LabelOutOfRange { label: usize, n_edges: usize },

    /// Labels do not cover `[0, n_regions)` contiguously.
    NonContiguousLabels { missing: usize, n_regions: usize },

    /// The network has no edges to partition.
    EmptyNetwork,
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::DuplicateEdge { name } => {
                write!(f, "Edge name '{}' is used more than once", name)
            }
            NetworkError::InvalidNeighborRef { edge, neighbor } => {
                write!(f, "Edge {} refers to non-existent neighbor {}", edge, neighbor)
            }
            NetworkError::SelfNeighbor { edge } => {
                write!(f, "Edge {} lists itself as a neighbor", edge)
            }
            NetworkError::InvalidGeometry { edge, what } => {
                write!(f, "Edge {} has invalid geometry: {}", edge, what)
            }
            NetworkError::UnknownEdge { name } => write!(f, "Unknown edge '{}'", name),
            NetworkError::LabelCountMismatch { expected, actual } => write!(
                f,
                "Expected {} region labels (one per edge), got {}",
                expected, actual
            ),
            NetworkError::UnlabeledEdge { name } => {
                write!(f, "Edge '{}' has no region label", name)
            }
            NetworkError::LabelOutOfRange { label, n_edges } => write!(
                f,
                "Region label {} is out of range for {} edges",
                label, n_edges
            ),
            NetworkError::NonContiguousLabels { missing, n_regions } => write!(
                f,
                "Region labels must cover [0, {}) contiguously; label {} is unused",
                n_regions, missing
            ),
            NetworkError::EmptyNetwork => write!(f, "Network has no edges"),
        }
    }
}

impl std::error::Error for NetworkError {}
