//! User activity tracking for heartbeats and the idle fallback
//!
//! Owned by the channel driver task; `mark_activity` commands reach it
//! through the manager's command queue.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct ActivityTracker {
    last_activity: Instant,
    idle_timeout: Duration,
    idle: bool,
}

impl ActivityTracker {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            last_activity: Instant::now(),
            idle_timeout,
            idle: false,
        }
    }

    /// Record user activity
    ///
    /// Returns true when this ends an idle period.
    pub fn record_activity(&mut self) -> bool {
        self.last_activity = Instant::now();
        std::mem::replace(&mut self.idle, false)
    }

    /// When the user becomes idle if nothing else happens
    pub fn idle_deadline(&self) -> Instant {
        self.last_activity + self.idle_timeout
    }

    /// Flip to idle once the deadline passed
    ///
    /// Returns true only on the transition.
    pub fn check_idle(&mut self, now: Instant) -> bool {
        if self.idle || now < self.idle_deadline() {
            return false;
        }
        self.idle = true;
        true
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_activity)
    }
}
