//! Fixed-interval throttling.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::policy::AdmissionPolicy;
use crate::error::{GatekeeperError, Result};

/// Enforces a minimum gap between accepted messages per identity.
///
/// An identity with no recorded message is always allowed. Once a message is
/// recorded, the next one is allowed only after `min_interval` seconds.
#[derive(Debug, Clone)]
pub struct IntervalThrottle {
    min_interval: f64,
    last_message: HashMap<String, f64>,
}

impl IntervalThrottle {
    /// Create a throttle with the given minimum interval in seconds.
    ///
    /// Zero is valid and allows every message not timestamped before the last
    /// accepted one.
    pub fn new(min_interval: f64) -> Result<Self> {
        if !(min_interval.is_finite() && min_interval >= 0.0) {
            return Err(GatekeeperError::InvalidConfig(format!(
                "min_interval must be a non-negative number, got {}",
                min_interval
            )));
        }

        Ok(Self {
            min_interval,
            last_message: HashMap::new(),
        })
    }

    /// Minimum interval between accepted messages, in seconds.
    pub fn min_interval(&self) -> f64 {
        self.min_interval
    }

    /// Whether `identity` may send a message at `now`.
    pub fn can_send_message(&self, identity: &str, now: f64) -> bool {
        match self.last_message.get(identity) {
            None => true,
            Some(&last) => now - last >= self.min_interval,
        }
    }

    /// Record a message from `identity` at `now` if it is allowed.
    ///
    /// Returns `false` and leaves the stored timestamp alone when throttled.
    pub fn record_message(&mut self, identity: &str, now: f64) -> bool {
        let allowed = self.can_send_message(identity, now);
        trace!(identity, now, allowed, "Throttle check");

        if allowed {
            if self.last_message.insert(identity.to_string(), now).is_none() {
                debug!(identity, "First message recorded");
            }
        } else {
            debug!(
                identity,
                wait = self.time_until_next_allowed(identity, now),
                "Message throttled"
            );
        }

        allowed
    }

    /// Seconds until `identity` may send again, or zero if it may send now.
    pub fn time_until_next_allowed(&self, identity: &str, now: f64) -> f64 {
        match self.last_message.get(identity) {
            None => 0.0,
            Some(&last) => (self.min_interval - (now - last)).max(0.0),
        }
    }

    /// Time of the last accepted message for `identity`.
    pub fn last_message_time(&self, identity: &str) -> Option<f64> {
        self.last_message.get(identity).copied()
    }
}

impl AdmissionPolicy for IntervalThrottle {
    fn try_admit(&mut self, identity: &str, now: f64) -> bool {
        self.record_message(identity, now)
    }

    fn time_until_next_allowed(&self, identity: &str, now: f64) -> f64 {
        IntervalThrottle::time_until_next_allowed(self, identity, now)
    }

    fn tracked_identities(&self) -> usize {
        self.last_message.len()
    }

    fn name(&self) -> &'static str {
        "throttle"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_rejects_negative_interval() {
        assert!(matches!(
            IntervalThrottle::new(-1.0),
            Err(GatekeeperError::InvalidConfig(_))
        ));
        assert!(IntervalThrottle::new(f64::NAN).is_err());
        assert!(IntervalThrottle::new(0.0).is_ok());
    }

    #[test]
    fn test_first_message_passes() {
        let mut throttle = IntervalThrottle::new(10.0).unwrap();

        assert!(throttle.can_send_message("alice", 0.0));
        assert!(throttle.record_message("alice", 0.0));
        assert_eq!(throttle.last_message_time("alice"), Some(0.0));
    }

    #[test]
    fn test_interval_enforcement() {
        let mut throttle = IntervalThrottle::new(10.0).unwrap();
        assert!(throttle.record_message("alice", 0.0));

        assert!(!throttle.can_send_message("alice", 9.9));
        assert!(!throttle.record_message("alice", 9.9));
        assert_eq!(throttle.last_message_time("alice"), Some(0.0));

        assert!(throttle.can_send_message("alice", 10.0));
        assert!(throttle.record_message("alice", 10.0));
        assert_eq!(throttle.last_message_time("alice"), Some(10.0));
    }

    #[test]
    fn test_can_send_does_not_record() {
        let throttle = IntervalThrottle::new(10.0).unwrap();

        assert!(throttle.can_send_message("alice", 0.0));
        assert_eq!(throttle.last_message_time("alice"), None);
        assert_eq!(throttle.tracked_identities(), 0);
    }

    #[test]
    fn test_time_until_next_allowed() {
        let mut throttle = IntervalThrottle::new(10.0).unwrap();
        assert_eq!(throttle.time_until_next_allowed("alice", 0.0), 0.0);

        throttle.record_message("alice", 0.0);
        assert!((throttle.time_until_next_allowed("alice", 3.0) - 7.0).abs() < EPSILON);
        assert_eq!(throttle.time_until_next_allowed("alice", 15.0), 0.0);
    }

    #[test]
    fn test_zero_interval_allows_non_decreasing_messages() {
        let mut throttle = IntervalThrottle::new(0.0).unwrap();

        for _ in 0..5 {
            assert!(throttle.record_message("alice", 1.0));
        }
        assert!(throttle.record_message("alice", 1.5));
        assert_eq!(throttle.time_until_next_allowed("alice", 1.5), 0.0);
    }

    #[test]
    fn test_zero_interval_rejects_earlier_timestamp() {
        let mut throttle = IntervalThrottle::new(0.0).unwrap();
        assert!(throttle.record_message("alice", 1.0));

        // An accepted message never precedes the last accepted one
        assert!(!throttle.can_send_message("alice", 0.5));
        assert!(!throttle.record_message("alice", 0.5));
        assert_eq!(throttle.last_message_time("alice"), Some(1.0));
        assert!((throttle.time_until_next_allowed("alice", 0.5) - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_clock_going_backwards_keeps_waiting() {
        let mut throttle = IntervalThrottle::new(10.0).unwrap();
        throttle.record_message("alice", 20.0);

        assert!(!throttle.record_message("alice", 5.0));
        assert_eq!(throttle.time_until_next_allowed("alice", 5.0), 25.0);
        assert_eq!(throttle.last_message_time("alice"), Some(20.0));
    }

    #[test]
    fn test_identities_are_independent() {
        let mut throttle = IntervalThrottle::new(10.0).unwrap();

        assert!(throttle.record_message("alice", 0.0));
        assert!(throttle.record_message("bob", 1.0));
        assert!(!throttle.record_message("alice", 2.0));

        assert_eq!(throttle.last_message_time("bob"), Some(1.0));
        assert!(throttle.can_send_message("carol", 2.0));
        assert_eq!(throttle.tracked_identities(), 2);
    }
}
