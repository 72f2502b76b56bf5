//! Configuration management for Gatekeeper.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{GatekeeperError, Result};
use crate::ratelimit::{IntervalThrottle, SlidingWindowLimiter, TokenBucketLimiter};

/// Main configuration for Gatekeeper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatekeeperConfig {
    /// Token bucket configuration
    #[serde(default)]
    pub token_bucket: TokenBucketConfig,

    /// Interval throttle configuration
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Sliding window configuration
    #[serde(default)]
    pub sliding_window: SlidingWindowConfig,

    /// Message stream simulation settings
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Token bucket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBucketConfig {
    /// Bucket capacity
    #[serde(default = "default_max_tokens")]
    pub max_tokens: f64,

    /// Tokens added per second
    #[serde(default = "default_refill_rate")]
    pub refill_rate: f64,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            refill_rate: default_refill_rate(),
        }
    }
}

impl TokenBucketConfig {
    /// Build a limiter from this configuration.
    pub fn build(&self) -> Result<TokenBucketLimiter> {
        TokenBucketLimiter::new(self.max_tokens, self.refill_rate)
    }
}

fn default_max_tokens() -> f64 {
    5.0
}

fn default_refill_rate() -> f64 {
    1.0
}

/// Interval throttle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Minimum seconds between accepted messages
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval(),
        }
    }
}

impl ThrottleConfig {
    /// Build a throttle from this configuration.
    pub fn build(&self) -> Result<IntervalThrottle> {
        IntervalThrottle::new(self.min_interval_secs)
    }
}

fn default_min_interval() -> f64 {
    10.0
}

/// Sliding window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidingWindowConfig {
    /// Window length in seconds
    #[serde(default = "default_window_size")]
    pub window_size_secs: f64,

    /// Accepted messages allowed per window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
}

impl Default for SlidingWindowConfig {
    fn default() -> Self {
        Self {
            window_size_secs: default_window_size(),
            max_requests: default_max_requests(),
        }
    }
}

impl SlidingWindowConfig {
    /// Build a limiter from this configuration.
    pub fn build(&self) -> Result<SlidingWindowLimiter> {
        SlidingWindowLimiter::new(self.window_size_secs, self.max_requests)
    }
}

fn default_window_size() -> f64 {
    10.0
}

fn default_max_requests() -> usize {
    1
}

/// Largest batch size whose message ids still fit in a `u32`.
pub const MAX_SIMULATED_MESSAGES: u32 = u32::MAX / 2;

/// Message stream simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Messages per batch
    #[serde(default = "default_messages")]
    pub messages: u32,

    /// Number of distinct users messages are spread across
    #[serde(default = "default_users")]
    pub users: u32,

    /// Shortest simulated delay between messages
    #[serde(default = "default_min_delay")]
    pub min_delay_secs: f64,

    /// Longest simulated delay between messages
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,

    /// Simulated pause between the two batches
    #[serde(default = "default_pause")]
    pub pause_secs: f64,

    /// Seed for the delay generator; random when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            messages: default_messages(),
            users: default_users(),
            min_delay_secs: default_min_delay(),
            max_delay_secs: default_max_delay(),
            pause_secs: default_pause(),
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Check that the simulation settings describe a runnable stream.
    pub fn validate(&self) -> Result<()> {
        // Message ids run 1..=2 * messages across both batches.
        if self.messages == 0 || self.messages > MAX_SIMULATED_MESSAGES {
            return Err(GatekeeperError::InvalidConfig(format!(
                "simulation.messages must be between 1 and {}, got {}",
                MAX_SIMULATED_MESSAGES, self.messages
            )));
        }

        if self.users == 0 {
            return Err(GatekeeperError::InvalidConfig(
                "simulation.users must be at least 1".to_string(),
            ));
        }

        let delays_valid = self.min_delay_secs.is_finite()
            && self.max_delay_secs.is_finite()
            && self.min_delay_secs >= 0.0
            && self.min_delay_secs <= self.max_delay_secs;
        if !delays_valid {
            return Err(GatekeeperError::InvalidConfig(format!(
                "simulation delays must satisfy 0 <= min <= max, got {}..{}",
                self.min_delay_secs, self.max_delay_secs
            )));
        }

        if !(self.pause_secs.is_finite() && self.pause_secs >= 0.0) {
            return Err(GatekeeperError::InvalidConfig(format!(
                "simulation.pause_secs must be non-negative, got {}",
                self.pause_secs
            )));
        }

        Ok(())
    }
}

fn default_messages() -> u32 {
    10
}

fn default_users() -> u32 {
    5
}

fn default_min_delay() -> f64 {
    0.1
}

fn default_max_delay() -> f64 {
    1.0
}

fn default_pause() -> f64 {
    10.0
}

impl GatekeeperConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GatekeeperError::Config(format!("Failed to parse configuration: {}", e)))
    }
}
