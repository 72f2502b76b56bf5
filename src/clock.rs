//! Time sources for admission checks.
//!
//! Limiters never read the clock themselves: every check takes `now` as seconds
//! on a caller-chosen timeline. A [`Clock`] is how callers obtain that value.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

/// Source of the current time, in seconds.
///
/// Implementations must be non-decreasing for the limiters to behave as
/// documented; small backwards steps are tolerated and treated as no elapsed time.
pub trait Clock: Send + Sync + Debug {
    /// Current time in seconds on this clock's timeline.
    fn now(&self) -> f64;
}

/// Monotonic clock measuring seconds since it was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose timeline starts at zero now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Manually driven clock.
///
/// Clones share the same underlying time, so advancing one advances all.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<f64>>,
}

impl ManualClock {
    /// Create a clock starting at `start` seconds.
    pub fn new(start: f64) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: f64) {
        *self.current.lock() += secs;
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, secs: f64) {
        *self.current.lock() = secs;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.current.lock()
    }
}
