//! Invocation gate: decides whether this window consults the oracle.
//!
//! The oracle is wanted when the coarse planner state changed since the
//! last window, or when a jittered heartbeat has elapsed since the last
//! successful call. Whether it is actually called also depends on a
//! configured credential, backoff, cooldown, and the token bucket.

use rand::Rng;
use tracing::debug;

use warpplan_core::{PlannerConfig, TelemetryWindow};

use crate::bucket::TokenBucket;
use crate::window::LowWindowHistory;

/// Latency zone relative to the thresholds, widened by the deadband.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    High,
    Mid,
    Low,
}

impl Band {
    pub fn classify(p95_ms: f64, config: &PlannerConfig) -> Self {
        if p95_ms > config.upscale_p95_ms + config.deadband_ms {
            Band::High
        } else if p95_ms < config.downscale_p95_ms - config.deadband_ms {
            Band::Low
        } else {
            Band::Mid
        }
    }
}

/// Coarse planner state used for change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateKey {
    pub band: Band,
    pub replicas: Option<u32>,
    pub low_windows: Vec<bool>,
}

/// Why the oracle was not consulted for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoOracle,
    Backoff,
    Cooldown,
    /// Nothing changed and no heartbeat was due, or no token was left.
    Cadence,
}

impl SkipReason {
    pub fn label(self) -> &'static str {
        match self {
            SkipReason::NoOracle => "no_llm_key",
            SkipReason::Backoff => "llm_backoff",
            SkipReason::Cooldown => "cooldown",
            SkipReason::Cadence => "cadence",
        }
    }
}

/// Per-window facts the gate reads but does not own.
#[derive(Debug, Clone, Copy)]
pub struct GateInputs {
    pub oracle_configured: bool,
    pub backoff_active: bool,
    pub cooldown_ok: bool,
}

#[derive(Debug, Clone)]
pub struct InvocationGate {
    heartbeat_sec: f64,
    /// Key of the previous window; `None` until the first window.
    last_key: Option<StateKey>,
    /// Time of the last successful oracle call.
    last_oracle_call: Option<f64>,
}

impl InvocationGate {
    pub fn new(heartbeat_sec: f64) -> Self {
        Self {
            heartbeat_sec,
            last_key: None,
            last_oracle_call: None,
        }
    }

    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(config.heartbeat_sec)
    }

    /// Whether a state change or an elapsed heartbeat calls for the oracle.
    ///
    /// Always stores the new key, so an unchanged state is only flagged once.
    pub fn want_call<R: Rng + ?Sized>(
        &mut self,
        window: &TelemetryWindow,
        history: &LowWindowHistory,
        config: &PlannerConfig,
        now: f64,
        rng: &mut R,
    ) -> bool {
        let key = StateKey {
            band: Band::classify(window.p95_ms, config),
            replicas: window.replicas,
            low_windows: history.snapshot(),
        };
        let changed = self.last_key.as_ref() != Some(&key);

        let heartbeat = self.heartbeat_sec * rng.gen_range(0.9..1.1);
        let heartbeat_due = match self.last_oracle_call {
            Some(last) => now - last >= heartbeat,
            None => true,
        };

        debug!(band = ?key.band, changed, heartbeat_due, "gate state");
        self.last_key = Some(key);
        changed || heartbeat_due
    }

    /// Run the full gate. `Ok(())` means a token was taken and the oracle
    /// should be called; otherwise the first failing condition is returned.
    pub fn check<R: Rng + ?Sized>(
        &mut self,
        window: &TelemetryWindow,
        history: &LowWindowHistory,
        config: &PlannerConfig,
        inputs: GateInputs,
        bucket: &mut TokenBucket,
        now: f64,
        rng: &mut R,
    ) -> Result<(), SkipReason> {
        let wanted = self.want_call(window, history, config, now, rng);

        if !inputs.oracle_configured {
            return Err(SkipReason::NoOracle);
        }
        if inputs.backoff_active {
            return Err(SkipReason::Backoff);
        }
        if !inputs.cooldown_ok {
            return Err(SkipReason::Cooldown);
        }
        if !wanted || !bucket.try_take(now) {
            return Err(SkipReason::Cadence);
        }
        Ok(())
    }

    /// Note a successful oracle round trip for heartbeat accounting.
    pub fn record_call(&mut self, now: f64) {
        self.last_oracle_call = Some(now);
    }

    pub fn last_oracle_call(&self) -> Option<f64> {
        self.last_oracle_call
    }
}
