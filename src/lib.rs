//! Gatekeeper - Per-Identity Admission Control
//!
//! This crate decides, for a stream of timestamped requests keyed by identity,
//! whether each request is currently permitted. It provides a token bucket
//! limiter, a fixed-interval throttle and a sliding window limiter, all driven
//! by caller-supplied time so outcomes are deterministic and testable.

pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod simulation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{GatekeeperError, Result};
pub use ratelimit::{
    AdmissionPolicy, IntervalThrottle, SharedLimiter, SlidingWindowLimiter, TokenBucketLimiter,
};
