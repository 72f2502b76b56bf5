//! Simulated message streams for exercising admission policies.
//!
//! A simulation sends two batches of messages spread round-robin over a set of
//! users, with a random delay between messages and a pause between batches.
//! Time is simulated on a [`ManualClock`], so nothing actually sleeps.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::clock::{Clock, ManualClock};
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::ratelimit::AdmissionPolicy;

/// Outcome of a single simulated message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageOutcome {
    /// 1-based message number, continuing across batches
    pub message_id: u32,
    /// 1-based batch number
    pub batch: u32,
    /// User the message was sent as
    pub user: String,
    /// Simulated send time in seconds
    pub at: f64,
    /// Whether the policy admitted the message
    pub allowed: bool,
    /// Seconds the user must wait after this message
    pub wait_secs: f64,
}

/// Results of a full simulation run.
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    /// Every message in send order
    pub outcomes: Vec<MessageOutcome>,
}

impl SimulationReport {
    /// Number of admitted messages.
    pub fn admitted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.allowed).count()
    }

    /// Number of denied messages.
    pub fn denied(&self) -> usize {
        self.outcomes.len() - self.admitted()
    }

    /// Outcomes belonging to one batch.
    pub fn batch(&self, batch: u32) -> impl Iterator<Item = &MessageOutcome> {
        self.outcomes.iter().filter(move |o| o.batch == batch)
    }
}

/// Driver replaying a message stream against an [`AdmissionPolicy`].
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    clock: ManualClock,
    rng: StdRng,
}

impl Simulation {
    /// Create a simulation starting at t=0.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            clock: ManualClock::new(0.0),
            rng,
        })
    }

    /// The simulated clock.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Run both batches against `policy`.
    pub fn run<P: AdmissionPolicy>(&mut self, policy: &mut P) -> SimulationReport {
        let messages = self.config.messages;
        let mut report = SimulationReport::default();

        info!(policy = policy.name(), messages, "Starting first batch");
        self.run_batch(policy, 1, 1, &mut report);

        self.clock.advance(self.config.pause_secs);
        info!(pause = self.config.pause_secs, "Starting second batch");
        match messages.checked_add(1) {
            Some(first_id) => self.run_batch(policy, 2, first_id, &mut report),
            None => warn!(messages, "Message ids exhausted, skipping second batch"),
        }

        info!(
            admitted = report.admitted(),
            denied = report.denied(),
            tracked = policy.tracked_identities(),
            "Simulation finished"
        );
        report
    }

    fn run_batch<P: AdmissionPolicy>(
        &mut self,
        policy: &mut P,
        batch: u32,
        first_id: u32,
        report: &mut SimulationReport,
    ) {
        let Some(end_id) = first_id.checked_add(self.config.messages) else {
            warn!(first_id, messages = self.config.messages, "Message ids exhausted, skipping batch");
            return;
        };

        for message_id in first_id..end_id {
            let user = (message_id % self.config.users + 1).to_string();
            let at = self.clock.now();

            let allowed = policy.try_admit(&user, at);
            let wait_secs = policy.time_until_next_allowed(&user, at);
            debug!(message_id, user = %user, at, allowed, wait_secs, "Simulated message");

            report.outcomes.push(MessageOutcome {
                message_id,
                batch,
                user,
                at,
                allowed,
                wait_secs,
            });

            let delay = self
                .rng
                .gen_range(self.config.min_delay_secs..=self.config.max_delay_secs);
            self.clock.advance(delay);
        }
    }
}
