//! Backoff controller for oracle rate limiting.
//!
//! Tracks a deadline before which the oracle must not be called, and an
//! exponent that grows with each consecutive rate-limit signal.

use tracing::warn;

use warpplan_core::PlannerConfig;

/// Highest exponent reached by consecutive rate-limit signals.
pub const MAX_BACKOFF_POWER: u32 = 4;

#[derive(Debug, Clone)]
pub struct Backoff {
    /// Wait unit when the oracle gives no hint.
    base_sec: f64,
    /// Ceiling on any single wait.
    max_sec: f64,
    /// Epoch seconds before which calls are suppressed.
    until: f64,
    /// Consecutive rate-limit count, capped at `MAX_BACKOFF_POWER`.
    power: u32,
}

impl Backoff {
    pub fn new(base_sec: f64, max_sec: f64) -> Self {
        Self {
            base_sec,
            max_sec,
            until: 0.0,
            power: 0,
        }
    }

    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(config.backoff_base_sec, config.backoff_max_sec)
    }

    /// Record a rate-limit signal at `now` and return the chosen wait.
    ///
    /// A usable `hint_sec` (the server's `Retry-After`) wins over the
    /// exponential schedule. Either way the wait is capped at `max_sec`.
    pub fn trip(&mut self, hint_sec: Option<f64>, now: f64) -> f64 {
        let exponential = self.base_sec * 2f64.powi(self.power as i32);
        let wait = hint_sec
            .filter(|h| h.is_finite() && *h >= 0.0)
            .unwrap_or(exponential)
            .min(self.max_sec);

        self.until = now + wait;
        self.power = (self.power + 1).min(MAX_BACKOFF_POWER);

        warn!(
            wait_secs = wait,
            power = self.power,
            hinted = hint_sec.is_some(),
            "oracle rate limited, backing off"
        );
        wait
    }

    pub fn active(&self, now: f64) -> bool {
        now < self.until
    }

    /// Clear the exponent after a successful call. The deadline is kept;
    /// once it passes it no longer suppresses anything.
    pub fn reset(&mut self) {
        self.power = 0;
    }

    pub fn until(&self) -> f64 {
        self.until
    }

    pub fn power(&self) -> u32 {
        self.power
    }
}
