//! Error types for MFD fitting.

use rf_core::RfError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MfdError {
    #[error("Density and flow samples differ in length ({density} vs {flow})")]
    LengthMismatch { density: usize, flow: usize },

    #[error("Need at least {needed} distinct density samples for the fit, got {got}")]
    InsufficientSamples { needed: usize, got: usize },

    #[error("Degenerate samples: {what}")]
    DegenerateSamples { what: &'static str },

    #[error("Invalid polynomial degree {degree} (must be at least 2)")]
    InvalidDegree { degree: usize },

    #[error("Number of PWA segments must be even and at least 2, got {n_pwa}")]
    InvalidPwaCount { n_pwa: usize },

    #[error("Fitted curve has {found} distinct real roots; at least 2 are needed")]
    InsufficientRoots { found: usize },

    #[error("No real root of the fitted curve bounds a positive-flow interval")]
    NoJamDensity,

    #[error("Critical density {critical} is not strictly inside (0, {jam})")]
    CriticalOutOfRange { critical: f64, jam: f64 },

    #[error("Least-squares solve failed: {what}")]
    Solve { what: String },

    #[error("Region {region}: {source}")]
    Region {
        region: usize,
        #[source]
        source: Box<MfdError>,
    },

    #[error(transparent)]
    Core(#[from] RfError),
}

pub type MfdResult<T> = Result<T, MfdError>;

impl MfdError {
    /// Attach the region index the failure belongs to.
    pub fn in_region(self, region: usize) -> Self {
        MfdError::Region {
            region,
            source: Box::new(self),
        }
    }
}
