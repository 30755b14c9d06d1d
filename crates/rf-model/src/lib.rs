//! rf-model: regional flow-conservation dynamics and their linearization.
//!
//! Provides:
//! - `RoutingTable` (inter-region transfer fractions on adjacent pairs)
//! - `DemandTensor` (origin-destination demand per one-second slot)
//! - `LinearDynamicsModel` (nonlinear step + exact affine linearization)
//! - `AffineModel` (A, B, C, d) with prediction helpers
//! - Output maps for density / flow / stacked outputs
//! - Finite-difference Jacobians for cross-checking

pub mod demand;
pub mod dynamics;
pub mod error;
pub mod jacobian;
pub mod output;
pub mod routing;

pub use demand::DemandTensor;
pub use dynamics::{AffineModel, CompletionRate, LinearDynamicsModel};
pub use error::{ModelError, ModelResult};
pub use jacobian::{central_difference_jacobian, finite_difference_jacobian};
pub use output::{output_jacobian, output_of};
pub use routing::RoutingTable;
