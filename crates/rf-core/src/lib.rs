//! rf-core: stable foundation for regioflow.
//!
//! Contains:
//! - units (uom SI types + constructors for road geometry and cycle times)
//! - numeric (tolerances + float helpers)
//! - ids (compact IDs for edges, regions and actuators)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{RfError, RfResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
