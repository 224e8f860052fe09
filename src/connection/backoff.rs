//! Capped exponential backoff with an optional retry ceiling.
//!
//! `initial → 2·initial → 4·initial …` capped at `max`.  Reset after any
//! attempt that reached a live session.

use core::time::Duration;

use crate::config::ReconnectConfig;

#[derive(Debug, Clone)]
pub struct Backoff {
    initial_ms: u32,
    max_ms: u32,
    max_attempts: u32,
    current_ms: u32,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: &ReconnectConfig) -> Self {
        Self {
            initial_ms: policy.initial_backoff_ms,
            max_ms: policy.max_backoff_ms,
            max_attempts: policy.max_attempts,
            current_ms: policy.initial_backoff_ms,
            failures: 0,
        }
    }

    /// Record a failed attempt and return the delay before the next one,
    /// or `None` once the ceiling is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        if self.max_attempts != 0 && self.failures >= self.max_attempts {
            return None;
        }
        let delay = self.current_ms;
        self.current_ms = self.current_ms.saturating_mul(2).min(self.max_ms);
        Some(Duration::from_millis(u64::from(delay)))
    }

    pub fn reset(&mut self) {
        self.current_ms = self.initial_ms;
        self.failures = 0;
    }

    /// Consecutive failures since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}
