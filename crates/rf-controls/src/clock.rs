//! Control-cycle scheduling.
//!
//! The control loop runs on fixed boundaries `begin + k * cycle`. Between
//! boundaries the last applied inputs are held (zero-order hold).

use rf_core::{Time, s, to_seconds};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Slack against boundaries like `0.1 * 30` landing just below a whole second.
const SLOT_EPS: f64 = 1e-9;

/// Tracks the next control boundary of a run over `[begin, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlClock {
    /// Seconds.
    pub begin: f64,
    pub end: f64,
    pub cycle: f64,
    /// Number of completed cycles.
    pub completed: usize,
}

impl ControlClock {
    pub fn new(begin: Time, end: Time, cycle: Time) -> ControlResult<Self> {
        let (begin, end, cycle) = (to_seconds(begin), to_seconds(end), to_seconds(cycle));
        if !(cycle > 0.0) {
            return Err(ControlError::InvalidArg {
                what: "control cycle must be positive",
            });
        }
        if !(end > begin) {
            return Err(ControlError::InvalidArg {
                what: "end time must be after begin time",
            });
        }
        Ok(Self {
            begin,
            end,
            cycle,
            completed: 0,
        })
    }

    pub fn cycle_duration(&self) -> Time {
        s(self.cycle)
    }

    /// Whole cycles that fit into `[begin, end]`.
    pub fn n_cycles(&self) -> usize {
        ((self.end - self.begin) / self.cycle + SLOT_EPS).floor() as usize
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.n_cycles()
    }

    /// Boundary closing cycle `k` (0-based).
    pub fn boundary(&self, k: usize) -> Time {
        s(self.begin + (k + 1) as f64 * self.cycle)
    }

    pub fn next_boundary(&self) -> Option<Time> {
        (!self.is_finished()).then(|| self.boundary(self.completed))
    }

    /// One-second demand slots covered by cycle `k`, as `[start, start + len)`.
    ///
    /// Both edges are floored, so consecutive windows tile the timeline
    /// without overlap or gaps. A cycle that starts and ends inside one slot
    /// reads that slot.
    pub fn slot_window(&self, k: usize) -> (usize, usize) {
        let slot = |t: f64| (t + SLOT_EPS).max(0.0).floor() as usize;
        let start = slot(self.begin + k as f64 * self.cycle);
        let end = slot(self.begin + (k + 1) as f64 * self.cycle);
        (start, end.saturating_sub(start).max(1))
    }

    pub fn advance(&mut self) {
        self.completed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_whole_cycles() {
        let clock = ControlClock::new(s(0.0), s(3600.0), s(90.0)).unwrap();
        assert_eq!(clock.n_cycles(), 40);
        let clock = ControlClock::new(s(0.0), s(100.0), s(30.0)).unwrap();
        assert_eq!(clock.n_cycles(), 3);
    }

    #[test]
    fn boundaries_advance() {
        let mut clock = ControlClock::new(s(60.0), s(240.0), s(90.0)).unwrap();
        assert_eq!(to_seconds(clock.next_boundary().unwrap()), 150.0);
        assert_eq!(clock.slot_window(0), (60, 90));
        clock.advance();
        assert_eq!(to_seconds(clock.next_boundary().unwrap()), 240.0);
        clock.advance();
        assert!(clock.is_finished());
        assert!(clock.next_boundary().is_none());
    }

    #[test]
    fn fractional_cycles_tile_demand_slots() {
        let clock = ControlClock::new(s(0.0), s(30.0), s(1.5)).unwrap();
        let windows: Vec<_> = (0..clock.n_cycles()).map(|k| clock.slot_window(k)).collect();
        assert_eq!(&windows[..4], &[(0, 1), (1, 2), (3, 1), (4, 2)]);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].0 + pair[0].1, pair[1].0);
        }
        let (start, len) = windows[windows.len() - 1];
        assert_eq!(start + len, 30);

        let short = ControlClock::new(s(0.0), s(4.0), s(0.4)).unwrap();
        assert_eq!(short.slot_window(0), (0, 1));
        assert_eq!(short.slot_window(2), (0, 1));
        assert_eq!(short.slot_window(3), (1, 1));

        let offset = ControlClock::new(s(0.5), s(100.0), s(90.0)).unwrap();
        assert_eq!(offset.slot_window(0), (0, 90));
    }

    #[test]
    fn invalid_schedule_rejected() {
        assert!(ControlClock::new(s(0.0), s(100.0), s(0.0)).is_err());
        assert!(ControlClock::new(s(100.0), s(100.0), s(10.0)).is_err());
    }
}
