//! Admission policy trait for treating the limiters interchangeably.

/// Trait for per-identity admission policies.
///
/// Implemented by [`TokenBucketLimiter`](super::TokenBucketLimiter),
/// [`IntervalThrottle`](super::IntervalThrottle) and
/// [`SlidingWindowLimiter`](super::SlidingWindowLimiter) so drivers such as the
/// simulation and [`SharedLimiter`](super::SharedLimiter) can work with any of them.
pub trait AdmissionPolicy {
    /// Decide whether a request from `identity` at `now` is admitted, committing
    /// the decision to the identity's state.
    fn try_admit(&mut self, identity: &str, now: f64) -> bool;

    /// Seconds until `identity` could next be admitted, without mutating state.
    fn time_until_next_allowed(&self, identity: &str, now: f64) -> f64;

    /// Number of identities currently holding state.
    fn tracked_identities(&self) -> usize;

    /// Short label used in logs.
    fn name(&self) -> &'static str;
}
