//! Fixed-cycle traffic-light programs driven by a green-time ratio.

use rf_core::{Tolerances, nearly_equal};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

const CYCLE_TOL: Tolerances = Tolerances::absolute(1e-9);

/// Phase layout of a signalized junction with a fixed cycle length.
///
/// Durations are in seconds. The yellow phases keep their length; a control
/// ratio `u` redistributes the remaining time between green and red phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPlan {
    pub cycle: f64,
    pub yellow: f64,
    /// Red duration of the baseline program.
    pub red: f64,
    /// Green duration of the baseline program.
    pub green: f64,
    pub n_green: u32,
    pub n_red: u32,
    pub n_yellow: u32,
}

/// Phase durations produced for one control ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub green: f64,
    pub red: f64,
    pub yellow: f64,
}

impl SignalPlan {
    pub fn validate(&self) -> ControlResult<()> {
        if !(self.cycle > 0.0) {
            return Err(ControlError::InvalidArg {
                what: "signal cycle must be positive",
            });
        }
        if self.n_green == 0 || self.n_red == 0 {
            return Err(ControlError::InvalidArg {
                what: "signal plan needs at least one green and one red phase",
            });
        }
        if self.yellow < 0.0 || self.red < 0.0 || self.green <= 0.0 {
            return Err(ControlError::InvalidArg {
                what: "phase durations must be non-negative with a positive green",
            });
        }
        Ok(())
    }

    /// Ratio that reproduces the baseline program (the "do nothing" input).
    pub fn neutral_ratio(&self) -> f64 {
        let shared = self.cycle - self.n_yellow as f64 * self.yellow - self.n_red as f64 * self.red;
        if shared > 0.0 {
            self.green * self.n_green as f64 / shared
        } else {
            1.0
        }
    }

    /// Phase durations for ratio `u`, preserving the cycle length.
    ///
    /// `green = round(u (C - n_y Y - n_r R) / n_g)`; red phases share the rest
    /// (rounded to whole seconds). A program whose total differs from the
    /// cycle is refused.
    pub fn phase_durations(&self, actuator: &str, u: f64) -> ControlResult<PhaseDurations> {
        let n_g = self.n_green as f64;
        let n_r = self.n_red as f64;
        let n_y = self.n_yellow as f64;

        let green = (u * (self.cycle - n_y * self.yellow - self.red * n_r) / n_g).round();
        let red = ((self.cycle - n_y * self.yellow - green * n_g) / n_r).round();
        let total = green * n_g + red * n_r + self.yellow * n_y;

        if !nearly_equal(total, self.cycle, CYCLE_TOL) || green < 0.0 || red < 0.0 {
            return Err(ControlError::CycleChanged {
                actuator: actuator.to_string(),
                expected: self.cycle,
                actual: total,
            });
        }
        Ok(PhaseDurations {
            green,
            red,
            yellow: self.yellow,
        })
    }
}
