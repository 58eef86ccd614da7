use std::time::{Duration, Instant};

use crate::error::{ReplayError, Result};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Keeps the replay at or below a target number of operations per second.
///
/// The pacing is on average rate: an operation is delayed until `op_index / ops_per_second`
/// seconds have passed since the start.  Falling behind is never made up by going faster
/// than the configured rate.
#[derive(Debug, Clone, Copy)]
pub struct RateController {
    ops_per_second: f64,
}

impl RateController {
    /// create a controller for `ops_per_second`, which must be a positive finite number.
    pub fn new(ops_per_second: f64) -> Result<Self> {
        if !ops_per_second.is_finite() || ops_per_second <= 0.0 {
            return Err(ReplayError::InvalidSpeed(ops_per_second));
        }
        Ok(RateController { ops_per_second })
    }

    /// configured operations per second.
    pub fn ops_per_second(&self) -> f64 {
        self.ops_per_second
    }

    /// How long to pause before issuing operation number `op_index` (0 based) of a replay
    /// started at `start`.
    pub fn wait_before(&self, op_index: u64, start: Instant) -> Duration {
        self.wait_for_elapsed(op_index, start.elapsed())
    }

    /// Same as [wait_before](RateController::wait_before), given the time already `elapsed`.
    pub fn wait_for_elapsed(&self, op_index: u64, elapsed: Duration) -> Duration {
        let expected_nanos = op_index as f64 * NANOS_PER_SEC / self.ops_per_second;
        let expected = Duration::from_nanos(expected_nanos.round() as u64);
        expected.saturating_sub(elapsed)
    }
}
