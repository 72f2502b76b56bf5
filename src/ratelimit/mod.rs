//! Per-identity admission policies.

mod policy;
mod shared;
mod sliding_window;
mod throttle;
mod token_bucket;

pub use policy::AdmissionPolicy;
pub use shared::SharedLimiter;
pub use sliding_window::SlidingWindowLimiter;
pub use throttle::IntervalThrottle;
pub use token_bucket::TokenBucketLimiter;
