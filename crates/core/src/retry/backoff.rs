//! Exponential backoff with optional jitter
//!
//! Shared by the retry executor and the channel manager's reconnect
//! schedule.

use rand::Rng;
use std::time::Duration;

/// Lower bound of the jitter factor; delays are scaled into `[0.5, 1.0]`.
const JITTER_FLOOR: f64 = 0.5;

/// Backoff schedule: `min(initial * multiplier^attempt, max)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: bool) -> Self {
        Self {
            initial,
            max,
            multiplier,
            jitter,
        }
    }

    /// Delay before retry number `attempt + 1` (0-based), without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let nanos = self.initial.as_nanos() as f64 * factor;

        if !nanos.is_finite() || nanos >= self.max.as_nanos() as f64 {
            return self.max;
        }
        Duration::from_nanos(nanos.round() as u64).min(self.max)
    }

    /// Delay before retry number `attempt + 1` (0-based), jittered when enabled
    ///
    /// Never exceeds `max`.
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter {
            return base;
        }
        let factor = rng.gen_range(JITTER_FLOOR..=1.0);
        base.mul_f64(factor).min(self.max)
    }
}
