//! Throttle - slow-address skip list
//!
//! `scantxoutset` walks the whole UTXO set; on a busy or low-power node a
//! single scan can take minutes. Addresses whose last scan exceeded the
//! threshold are rescanned at most once per retry interval, and at most one
//! of them per update cycle, rotating through them in address order.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::config::PollConfig;

#[derive(Debug, Clone)]
pub struct SlowAddressTracker {
    threshold: Duration,
    retry_interval: Duration,
    /// address -> when its last (slow) scan finished
    slow: BTreeMap<String, Instant>,
    last_pick: Option<String>,
}

impl SlowAddressTracker {
    pub fn new(threshold: Duration, retry_interval: Duration) -> Self {
        Self { threshold, retry_interval, slow: BTreeMap::new(), last_pick: None }
    }

    pub fn from_config(poll: &PollConfig) -> Self {
        Self::new(poll.slow_scan_threshold(), poll.slow_retry_interval())
    }

    /// Record a finished scan. Returns true when the slow state flipped.
    pub fn record_scan(&mut self, address: &str, elapsed: Duration, now: Instant) -> bool {
        if elapsed > self.threshold {
            self.slow.insert(address.to_string(), now).is_none()
        } else {
            self.slow.remove(address).is_some()
        }
    }

    pub fn is_slow(&self, address: &str) -> bool { self.slow.contains_key(address) }
    pub fn slow_count(&self) -> usize { self.slow.len() }
    pub fn retry_interval(&self) -> Duration { self.retry_interval }

    pub fn forget(&mut self, address: &str) {
        self.slow.remove(address);
        if self.last_pick.as_deref() == Some(address) {
            self.last_pick = None;
        }
    }

    fn is_due(&self, address: &str, now: Instant) -> bool {
        self.slow
            .get(address)
            .map(|last| now.saturating_duration_since(*last) >= self.retry_interval)
            .unwrap_or(true)
    }

    /// Choose which addresses to scan this cycle, preserving input order.
    pub fn plan_cycle<'a, I>(&mut self, addresses: I, now: Instant) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let addresses: Vec<&String> = addresses.into_iter().collect();
        let mut due_slow: Vec<&String> = addresses
            .iter()
            .copied()
            .filter(|a| self.is_slow(a) && self.is_due(a, now))
            .collect();
        due_slow.sort();

        let pick = match self.last_pick.as_ref() {
            Some(last) => due_slow.iter().find(|a| a.as_str() > last.as_str()).or_else(|| due_slow.first()),
            None => due_slow.first(),
        }
        .map(|a| a.to_string());

        if let Some(p) = &pick {
            self.last_pick = Some(p.clone());
        }

        addresses
            .into_iter()
            .filter(|a| !self.is_slow(a) || pick.as_deref() == Some(a.as_str()))
            .cloned()
            .collect()
    }
}
