//! Token bucket admission control.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::{debug, trace};

use super::policy::AdmissionPolicy;
use crate::error::{GatekeeperError, Result};

/// Per-identity bucket state.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bucket {
    /// Tokens currently available, in `0..=max_tokens`
    tokens: f64,
    /// Time of the last refill
    last_refill: f64,
}

impl Bucket {
    fn full(max_tokens: f64, now: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: now,
        }
    }

    /// Token count after refilling up to `now`, without mutating.
    fn projected(&self, now: f64, max_tokens: f64, refill_rate: f64) -> f64 {
        // A clock that steps backwards counts as no elapsed time.
        let elapsed = (now - self.last_refill).max(0.0);
        (self.tokens + elapsed * refill_rate).min(max_tokens)
    }

    fn refill(&mut self, now: f64, max_tokens: f64, refill_rate: f64) {
        self.tokens = self.projected(now, max_tokens, refill_rate);
        self.last_refill = now;
    }
}

/// Token bucket limiter keyed by identity.
///
/// Each identity gets a bucket of `max_tokens` on first sight. Buckets refill
/// lazily at `refill_rate` tokens per second whenever that identity is checked,
/// and every admitted request costs one token.
///
/// Methods take `&mut self`; wrap the limiter in a
/// [`SharedLimiter`](super::SharedLimiter) to share it across threads.
#[derive(Debug, Clone)]
pub struct TokenBucketLimiter {
    max_tokens: f64,
    refill_rate: f64,
    buckets: HashMap<String, Bucket>,
}

impl TokenBucketLimiter {
    /// Create a limiter with the given capacity and refill rate (tokens/second).
    ///
    /// Both must be finite and strictly positive.
    pub fn new(max_tokens: f64, refill_rate: f64) -> Result<Self> {
        if !(max_tokens.is_finite() && max_tokens > 0.0) {
            return Err(GatekeeperError::InvalidConfig(format!(
                "max_tokens must be a positive number, got {}",
                max_tokens
            )));
        }
        if !(refill_rate.is_finite() && refill_rate > 0.0) {
            return Err(GatekeeperError::InvalidConfig(format!(
                "refill_rate must be a positive number, got {}",
                refill_rate
            )));
        }

        Ok(Self {
            max_tokens,
            refill_rate,
            buckets: HashMap::new(),
        })
    }

    /// Bucket capacity.
    pub fn max_tokens(&self) -> f64 {
        self.max_tokens
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Check whether `identity` may proceed at `now`, consuming a token if so.
    ///
    /// The identity's bucket is refilled first regardless of the outcome. A
    /// denied request leaves the refilled token count untouched.
    pub fn can_proceed(&mut self, identity: &str, now: f64) -> bool {
        let bucket = self.refill(identity, now);

        let allowed = if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        };
        let tokens = bucket.tokens;

        trace!(identity, now, tokens, allowed, "Token bucket check");
        if !allowed {
            debug!(identity, tokens, "Token bucket exhausted");
        }

        allowed
    }

    /// Stored token count for `identity`, as of its last refill.
    pub fn tokens(&self, identity: &str) -> Option<f64> {
        self.buckets.get(identity).map(|b| b.tokens)
    }

    /// Look up or create the bucket for `identity` and bring it up to `now`.
    fn refill(&mut self, identity: &str, now: f64) -> &mut Bucket {
        let max_tokens = self.max_tokens;
        let refill_rate = self.refill_rate;

        match self.buckets.entry(identity.to_string()) {
            Entry::Occupied(entry) => {
                let bucket = entry.into_mut();
                bucket.refill(now, max_tokens, refill_rate);
                bucket
            }
            Entry::Vacant(entry) => {
                debug!(identity, max_tokens, "Creating new token bucket");
                entry.insert(Bucket::full(max_tokens, now))
            }
        }
    }
}

impl AdmissionPolicy for TokenBucketLimiter {
    fn try_admit(&mut self, identity: &str, now: f64) -> bool {
        self.can_proceed(identity, now)
    }

    fn time_until_next_allowed(&self, identity: &str, now: f64) -> f64 {
        let Some(bucket) = self.buckets.get(identity) else {
            return 0.0;
        };

        let projected = bucket.projected(now, self.max_tokens, self.refill_rate);
        if projected >= 1.0 {
            0.0
        } else {
            (1.0 - projected) / self.refill_rate
        }
    }

    fn tracked_identities(&self) -> usize {
        self.buckets.len()
    }

    fn name(&self) -> &'static str {
        "token-bucket"
    }
}
