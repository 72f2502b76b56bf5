//! Thread-safe wrapper pairing an admission policy with a clock.

use parking_lot::Mutex;
use tracing::trace;

use super::policy::AdmissionPolicy;
use crate::clock::{Clock, SystemClock};

/// An admission policy guarded by a single lock and driven by a [`Clock`].
///
/// The limiters themselves perform check-then-act sequences on `&mut self`.
/// This wrapper serializes every call so the struct can be shared across
/// threads behind an `Arc`.
#[derive(Debug)]
pub struct SharedLimiter<P, C = SystemClock> {
    policy: Mutex<P>,
    clock: C,
}

impl<P: AdmissionPolicy> SharedLimiter<P, SystemClock> {
    /// Wrap a policy using the system clock.
    pub fn with_system_clock(policy: P) -> Self {
        Self::new(policy, SystemClock::new())
    }
}

impl<P: AdmissionPolicy, C: Clock> SharedLimiter<P, C> {
    /// Wrap a policy with the given clock.
    pub fn new(policy: P, clock: C) -> Self {
        Self {
            policy: Mutex::new(policy),
            clock,
        }
    }

    /// Check and commit a request from `identity` at the clock's current time.
    pub fn check(&self, identity: &str) -> bool {
        let now = self.clock.now();
        self.check_at(identity, now)
    }

    /// Check and commit a request from `identity` at an explicit time.
    pub fn check_at(&self, identity: &str, now: f64) -> bool {
        let mut policy = self.policy.lock();
        let allowed = policy.try_admit(identity, now);
        trace!(policy = policy.name(), identity, allowed, "Shared admission check");
        allowed
    }

    /// Seconds until `identity` may next be admitted.
    pub fn time_until_next_allowed(&self, identity: &str) -> f64 {
        let now = self.clock.now();
        self.policy.lock().time_until_next_allowed(identity, now)
    }

    /// Number of identities currently holding state.
    pub fn tracked_identities(&self) -> usize {
        self.policy.lock().tracked_identities()
    }

    /// Run `f` with exclusive access to the wrapped policy.
    pub fn with_policy<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        let mut policy = self.policy.lock();
        f(&mut *policy)
    }

    /// The clock driving this limiter.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Unwrap the policy.
    pub fn into_inner(self) -> P {
        self.policy.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ratelimit::{IntervalThrottle, TokenBucketLimiter};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_check_uses_clock() {
        let clock = ManualClock::new(0.0);
        let limiter = SharedLimiter::new(IntervalThrottle::new(10.0).unwrap(), clock.clone());

        assert!(limiter.check("alice"));
        assert!(!limiter.check("alice"));
        assert_eq!(limiter.time_until_next_allowed("alice"), 10.0);

        clock.advance(10.0);
        assert_eq!(limiter.time_until_next_allowed("alice"), 0.0);
        assert!(limiter.check("alice"));
    }

    #[test]
    fn test_concurrent_checks_respect_capacity() {
        let clock = ManualClock::new(0.0);
        let limiter = Arc::new(SharedLimiter::new(
            TokenBucketLimiter::new(20.0, 1.0).unwrap(),
            clock,
        ));
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                thread::spawn(move || {
                    for _ in 0..10 {
                        if limiter.check("alice") {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 20);
        assert_eq!(limiter.with_policy(|p| p.tokens("alice")), Some(0.0));
    }

    #[test]
    fn test_into_inner_returns_policy_state() {
        let limiter = SharedLimiter::new(IntervalThrottle::new(1.0).unwrap(), ManualClock::new(3.0));
        limiter.check("alice");
        limiter.check_at("bob", 5.0);
        assert_eq!(limiter.tracked_identities(), 2);
        assert_eq!(limiter.clock().now(), 3.0);

        let throttle = limiter.into_inner();
        assert_eq!(throttle.last_message_time("alice"), Some(3.0));
        assert_eq!(throttle.last_message_time("bob"), Some(5.0));
    }
}
