//! rf-network: road network and region partition layer for regioflow.
//!
//! Provides:
//! - Edge arena with index-based neighbor lists (no object back-references)
//! - Incremental network builder with validation
//! - The fixed ordered set of per-edge telemetry channels
//! - `RegionPartition`: membership, foreign-edge perimeter and region adjacency
//!
//! # Example
//!
//! ```
//! use rf_core::m;
//! use rf_network::{NetworkBuilder, RegionPartition};
//!
//! let mut builder = NetworkBuilder::new();
//! let a = builder.add_edge("a", m(100.0), 1);
//! let b = builder.add_edge("b", m(100.0), 1);
//! builder.connect(a, b);
//! let network = builder.build().unwrap();
//!
//! let partition = RegionPartition::from_labels(&network, &[0, 1]).unwrap();
//! assert_eq!(partition.n_regions(), 2);
//! assert!(partition.adjacency().is_adjacent(0, 1));
//! ```

pub mod builder;
pub mod channel;
pub mod error;
pub mod network;
pub mod partition;
pub(crate) mod validate;

// Re-exports for ergonomics
pub use builder::NetworkBuilder;
pub use channel::Channel;
pub use error::{NetworkError, NetworkResult};
pub use network::{Edge, Network};
pub use partition::{RegionAdjacency, RegionPartition};
