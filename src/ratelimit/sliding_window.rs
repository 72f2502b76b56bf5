//! Sliding window log limiter.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace};

use super::policy::AdmissionPolicy;
use crate::error::{GatekeeperError, Result};

/// Allows at most `max_requests` accepted messages per identity within any
/// trailing window of `window_size` seconds.
///
/// Accepted timestamps are kept per identity. Expired ones are dropped when
/// the identity records its next message, and an identity whose window has
/// fully drained is forgotten.
#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter {
    window_size: f64,
    max_requests: usize,
    windows: HashMap<String, VecDeque<f64>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter with the given window length in seconds and request cap.
    pub fn new(window_size: f64, max_requests: usize) -> Result<Self> {
        if !(window_size.is_finite() && window_size > 0.0) {
            return Err(GatekeeperError::InvalidConfig(format!(
                "window_size must be a positive number, got {}",
                window_size
            )));
        }
        if max_requests == 0 {
            return Err(GatekeeperError::InvalidConfig(
                "max_requests must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            window_size,
            max_requests,
            windows: HashMap::new(),
        })
    }

    /// Window length in seconds.
    pub fn window_size(&self) -> f64 {
        self.window_size
    }

    /// Maximum accepted messages per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Whether `identity` may send a message at `now`.
    pub fn can_send_message(&self, identity: &str, now: f64) -> bool {
        self.live_count(identity, now) < self.max_requests
    }

    /// Record a message from `identity` at `now` if the window has room.
    pub fn record_message(&mut self, identity: &str, now: f64) -> bool {
        self.cleanup_window(identity, now);

        let allowed = self.can_send_message(identity, now);
        trace!(identity, now, allowed, "Sliding window check");

        if allowed {
            self.windows
                .entry(identity.to_string())
                .or_default()
                .push_back(now);
        } else {
            debug!(
                identity,
                limit = self.max_requests,
                "Sliding window full"
            );
        }

        allowed
    }

    /// Seconds until the oldest live message leaves the window, or zero if
    /// `identity` may send now.
    pub fn time_until_next_allowed(&self, identity: &str, now: f64) -> f64 {
        let Some(window) = self.windows.get(identity) else {
            return 0.0;
        };

        let mut live = window.iter().filter(|&&ts| !self.is_expired(ts, now));
        let Some(&earliest) = live.next() else {
            return 0.0;
        };
        if 1 + live.count() < self.max_requests {
            return 0.0;
        }

        (self.window_size - (now - earliest)).max(0.0)
    }

    /// Number of messages from `identity` still inside the window at `now`.
    pub fn live_count(&self, identity: &str, now: f64) -> usize {
        self.windows.get(identity).map_or(0, |window| {
            window.iter().filter(|&&ts| !self.is_expired(ts, now)).count()
        })
    }

    fn is_expired(&self, ts: f64, now: f64) -> bool {
        now - ts >= self.window_size
    }

    /// Drop expired timestamps for `identity`, forgetting it once empty.
    fn cleanup_window(&mut self, identity: &str, now: f64) {
        let window_size = self.window_size;
        let Some(window) = self.windows.get_mut(identity) else {
            return;
        };

        // Timestamps may arrive out of order, so scan the whole queue.
        window.retain(|&ts| now - ts < window_size);

        if window.is_empty() {
            self.windows.remove(identity);
            debug!(identity, "Sliding window drained");
        }
    }
}

impl AdmissionPolicy for SlidingWindowLimiter {
    fn try_admit(&mut self, identity: &str, now: f64) -> bool {
        self.record_message(identity, now)
    }

    fn time_until_next_allowed(&self, identity: &str, now: f64) -> f64 {
        SlidingWindowLimiter::time_until_next_allowed(self, identity, now)
    }

    fn tracked_identities(&self) -> usize {
        self.windows.len()
    }

    fn name(&self) -> &'static str {
        "sliding-window"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_rejects_invalid_config() {
        assert!(matches!(
            SlidingWindowLimiter::new(0.0, 1),
            Err(GatekeeperError::InvalidConfig(_))
        ));
        assert!(SlidingWindowLimiter::new(10.0, 0).is_err());
        assert!(SlidingWindowLimiter::new(f64::INFINITY, 1).is_err());
    }

    #[test]
    fn test_allows_up_to_max_requests() {
        let mut limiter = SlidingWindowLimiter::new(10.0, 3).unwrap();

        assert!(limiter.record_message("alice", 0.0));
        assert!(limiter.record_message("alice", 1.0));
        assert!(limiter.record_message("alice", 2.0));
        assert!(!limiter.can_send_message("alice", 3.0));
        assert!(!limiter.record_message("alice", 3.0));
        assert_eq!(limiter.live_count("alice", 3.0), 3);
    }

    #[test]
    fn test_window_slides() {
        let mut limiter = SlidingWindowLimiter::new(10.0, 2).unwrap();
        limiter.record_message("alice", 0.0);
        limiter.record_message("alice", 4.0);

        assert!(!limiter.record_message("alice", 9.9));
        // The message at t=0 leaves the window at t=10
        assert!(limiter.record_message("alice", 10.0));
        assert!(!limiter.record_message("alice", 13.0));
        assert!(limiter.record_message("alice", 14.0));
    }

    #[test]
    fn test_time_until_next_allowed() {
        let mut limiter = SlidingWindowLimiter::new(10.0, 2).unwrap();
        assert_eq!(limiter.time_until_next_allowed("alice", 0.0), 0.0);

        limiter.record_message("alice", 1.0);
        assert_eq!(limiter.time_until_next_allowed("alice", 2.0), 0.0);

        limiter.record_message("alice", 3.0);
        assert!((limiter.time_until_next_allowed("alice", 4.0) - 7.0).abs() < EPSILON);
        // Once t=1 expires only one live message remains
        assert_eq!(limiter.time_until_next_allowed("alice", 11.0), 0.0);
    }

    #[test]
    fn test_drained_identity_is_forgotten() {
        let mut limiter = SlidingWindowLimiter::new(5.0, 1).unwrap();
        limiter.record_message("alice", 0.0);
        limiter.record_message("bob", 0.0);
        assert_eq!(limiter.tracked_identities(), 2);

        // Recording again after expiry drains and re-creates the window
        assert!(limiter.record_message("alice", 6.0));
        assert_eq!(limiter.live_count("alice", 6.0), 1);
        assert_eq!(limiter.tracked_identities(), 2);

        // Queries never mutate
        assert!(limiter.can_send_message("bob", 6.0));
        assert_eq!(limiter.tracked_identities(), 2);
    }

    #[test]
    fn test_out_of_order_entries_are_cleaned_up() {
        let mut limiter = SlidingWindowLimiter::new(10.0, 3).unwrap();
        limiter.record_message("alice", 20.0);
        // Earlier timestamp lands behind a newer one
        limiter.record_message("alice", 5.0);
        assert_eq!(limiter.live_count("alice", 12.0), 2);

        // At t=16 the t=5 entry has expired while t=20 is still live
        assert!(limiter.record_message("alice", 16.0));
        assert_eq!(limiter.windows["alice"], VecDeque::from(vec![20.0, 16.0]));

        // Once everything expires the identity is forgotten
        limiter.record_message("bob", 40.0);
        limiter.cleanup_window("alice", 40.0);
        assert!(!limiter.windows.contains_key("alice"));
        assert_eq!(limiter.tracked_identities(), 1);
    }

    #[test]
    fn test_identities_are_independent() {
        let mut limiter = SlidingWindowLimiter::new(10.0, 1).unwrap();

        assert!(limiter.record_message("alice", 0.0));
        assert!(limiter.record_message("bob", 0.0));
        assert!(!limiter.record_message("alice", 1.0));
        assert_eq!(limiter.live_count("bob", 1.0), 1);
    }
}
