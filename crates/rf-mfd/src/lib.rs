//! rf-mfd: macroscopic fundamental diagram fitting for regioflow.
//!
//! Provides:
//! - `Polynomial` with evaluation, derivatives and companion-matrix roots
//! - Least-squares polynomial fit of flow over density
//! - Jam / critical density selection
//! - Piecewise-linear (PWA) surrogate with an even number of segments
//! - `MfdApproximator` producing one `RegionMfd` per region
//! - Reference trajectories tiled from the fitted breakpoints

pub mod approximator;
pub mod error;
pub mod fit;
pub mod polynomial;
pub mod pwa;
pub mod reference;

pub use approximator::{MfdApproximator, MfdConfig, MfdSamples, RegionMfd};
pub use error::{MfdError, MfdResult};
pub use fit::fit_polynomial;
pub use polynomial::Polynomial;
pub use pwa::{LinearSegment, Pwa};
pub use reference::{OutputKind, reference_trajectory};
