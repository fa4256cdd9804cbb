//! Exponential backoff between retry attempts.
//!
//! Attempt 1 never waits. Attempt `n >= 2` waits
//! `min(base * multiplier^(n-2), cap)`, which is non-decreasing in `n`
//! and flat once it hits the cap.

use std::time::Duration;

use crate::config;

/// Exponential backoff schedule with a floor (`base`) and ceiling (`cap`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Growth factor per retry. Values below 1.0 are treated as 1.0.
    pub multiplier: f64,
    /// Ceiling on any single delay.
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(config::BACKOFF_BASE_MS),
            multiplier: config::BACKOFF_MULTIPLIER,
            cap: Duration::from_millis(config::BACKOFF_CAP_MS),
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy from millisecond values.
    pub fn new(base_ms: u64, multiplier: f64, cap_ms: u64) -> Self {
        Self {
            base: Duration::from_millis(base_ms),
            multiplier,
            cap: Duration::from_millis(cap_ms),
        }
    }

    /// A policy that never sleeps. Handy for tests that don't pause time.
    pub fn none() -> Self {
        Self::new(0, 1.0, 0)
    }

    /// Delay to sleep before attempt `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let base_ms = self.base.as_millis() as f64;
        let cap_ms = self.cap.as_millis() as f64;
        let delay_ms = (base_ms * factor).min(cap_ms);
        Duration::from_millis(delay_ms as u64)
    }

    /// The full schedule for a submission with `max_attempts` attempts.
    /// Entry `i` is the delay before attempt `i + 1`.
    pub fn schedule(&self, max_attempts: u32) -> Vec<Duration> {
        (1..=max_attempts).map(|n| self.delay_for_attempt(n)).collect()
    }
}
