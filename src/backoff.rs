//! Backoff - timeout escalation and consecutive-failure gating
//!
//! A busy node (IBD, long `scantxoutset`, slow disk) answers late rather
//! than not at all, so timeouts climb a ladder instead of failing fast, and
//! only a long unbroken run of failures counts as a lost connection.

use std::time::Duration;

use crate::config::PollConfig;

/// Escalating RPC timeouts: base, ×2, ×4, capped and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutLadder {
    tiers: Vec<Duration>,
    index: usize,
}

impl TimeoutLadder {
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        let mut tiers: Vec<Duration> = Vec::with_capacity(3);
        for factor in [1u32, 2, 4] {
            let tier = base.saturating_mul(factor).min(max);
            if tiers.last() != Some(&tier) {
                tiers.push(tier);
            }
        }
        Self { tiers, index: 0 }
    }

    pub fn from_config(poll: &PollConfig) -> Self {
        Self::new(poll.connection_timeout(), poll.max_timeout())
    }

    pub fn current(&self) -> Duration { self.tiers[self.index] }
    pub fn tiers(&self) -> &[Duration] { &self.tiers }
    pub fn is_at_max(&self) -> bool { self.index + 1 == self.tiers.len() }

    /// Move one tier up; saturates at the top. Returns the new timeout.
    pub fn escalate(&mut self) -> Duration {
        if !self.is_at_max() {
            self.index += 1;
        }
        self.current()
    }

    /// Move one tier down after a success.
    pub fn relax(&mut self) -> Duration {
        self.index = self.index.saturating_sub(1);
        self.current()
    }

    pub fn reset(&mut self) { self.index = 0; }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureVerdict {
    /// Keep the connection and try again next cycle
    Retry,
    /// Threshold reached; drop the connection
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureTracker {
    consecutive: u32,
    threshold: u32,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self { Self { consecutive: 0, threshold: threshold.max(1) } }

    pub fn record_failure(&mut self) -> FailureVerdict {
        self.consecutive = self.consecutive.saturating_add(1);
        if self.consecutive >= self.threshold {
            FailureVerdict::Disconnect
        } else {
            FailureVerdict::Retry
        }
    }

    pub fn record_success(&mut self) { self.consecutive = 0; }
    pub fn consecutive(&self) -> u32 { self.consecutive }
    pub fn threshold(&self) -> u32 { self.threshold }
}
