//! Safety envelopes for control inputs.

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Inclusive `[lower, upper]` range a control ratio may take.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyBounds {
    pub lower: f64,
    pub upper: f64,
}

impl SafetyBounds {
    /// Green-time ratio of traffic lights.
    pub const TRAFFIC_LIGHT: SafetyBounds = SafetyBounds {
        lower: 0.6,
        upper: 1.0,
    };
    /// Multiplier on an edge's speed limit.
    pub const SPEED_LIMIT: SafetyBounds = SafetyBounds {
        lower: 0.5,
        upper: 1.5,
    };
    /// Actuators that accept no input.
    pub const INERT: SafetyBounds = SafetyBounds {
        lower: 0.0,
        upper: 0.0,
    };

    pub fn new(lower: f64, upper: f64) -> ControlResult<Self> {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(ControlError::InvalidArg {
                what: "safety bounds must be finite",
            });
        }
        if lower > upper {
            return Err(ControlError::InvalidArg {
                what: "lower safety bound exceeds upper bound",
            });
        }
        Ok(Self { lower, upper })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// What to do with an input outside the envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Saturate to the nearest bound.
    #[default]
    Clamp,
    /// Fail with `ControlError::OutOfBounds`.
    Reject,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_saturates() {
        let b = SafetyBounds::TRAFFIC_LIGHT;
        assert_eq!(b.clamp(1.3), 1.0);
        assert_eq!(b.clamp(0.1), 0.6);
        assert_eq!(b.clamp(0.8), 0.8);
    }

    #[test]
    fn inverted_bounds_rejected() {
        assert!(SafetyBounds::new(1.0, 0.5).is_err());
        assert!(SafetyBounds::new(f64::NAN, 0.5).is_err());
        assert!(SafetyBounds::new(0.0, 0.0).is_ok());
    }
}
