//! Planner configuration.
//!
//! Built-in defaults, optionally overlaid by a TOML file, then by
//! environment variables. Loaded once at startup and never mutated.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_ORACLE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Oracle `generateContent` endpoint.
    pub oracle_url: String,
    /// Oracle API key. Without one the oracle is never consulted.
    pub oracle_api_key: Option<String>,
    /// Bound on a single oracle round trip.
    pub oracle_timeout_sec: f64,
    /// Name of the managed service; every decision targets it.
    pub target: String,
    pub upscale_p95_ms: f64,
    pub downscale_p95_ms: f64,
    /// Minimum spacing between impactful actions.
    pub cooldown_sec: f64,
    /// Oracle calls per minute (token bucket capacity and refill rate).
    pub rpm: f64,
    /// Maximum staleness before the oracle is consulted without a state change.
    pub heartbeat_sec: f64,
    /// Margin around the thresholds when classifying the latency band.
    pub deadband_ms: f64,
    pub backoff_base_sec: f64,
    pub backoff_max_sec: f64,
    pub min_replicas: u32,
    pub max_replicas: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            oracle_url: DEFAULT_ORACLE_URL.to_string(),
            oracle_api_key: None,
            oracle_timeout_sec: 20.0,
            target: "app".to_string(),
            upscale_p95_ms: 300.0,
            downscale_p95_ms: 120.0,
            cooldown_sec: 20.0,
            rpm: 10.0,
            heartbeat_sec: 45.0,
            deadband_ms: 30.0,
            backoff_base_sec: 5.0,
            backoff_max_sec: 60.0,
            min_replicas: 1,
            max_replicas: 5,
        }
    }
}

impl fmt::Debug for PlannerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannerConfig")
            .field("oracle_url", &self.oracle_url)
            .field(
                "oracle_api_key",
                &self.oracle_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("oracle_timeout_sec", &self.oracle_timeout_sec)
            .field("target", &self.target)
            .field("upscale_p95_ms", &self.upscale_p95_ms)
            .field("downscale_p95_ms", &self.downscale_p95_ms)
            .field("cooldown_sec", &self.cooldown_sec)
            .field("rpm", &self.rpm)
            .field("heartbeat_sec", &self.heartbeat_sec)
            .field("deadband_ms", &self.deadband_ms)
            .field("backoff_base_sec", &self.backoff_base_sec)
            .field("backoff_max_sec", &self.backoff_max_sec)
            .field("min_replicas", &self.min_replicas)
            .field("max_replicas", &self.max_replicas)
            .finish()
    }
}

impl PlannerConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        let mut config: PlannerConfig = toml::from_str(s)?;
        config.normalize();
        Ok(config)
    }

    /// Defaults overlaid with the process environment, validated.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("LLM_URL") {
            self.oracle_url = url;
        }
        if let Some(key) = lookup("LLM_API_KEY") {
            self.oracle_api_key = Some(key);
        }
        if let Some(target) = lookup("PLAN_TARGET") {
            self.target = target;
        }

        let floats: [(&str, &mut f64); 9] = [
            ("LLM_TIMEOUT_SEC", &mut self.oracle_timeout_sec),
            ("UPSCALE_P95_MS", &mut self.upscale_p95_ms),
            ("DOWNSCALE_P95_MS", &mut self.downscale_p95_ms),
            ("COOLDOWN_SEC", &mut self.cooldown_sec),
            ("LLM_RPM", &mut self.rpm),
            ("LLM_HEARTBEAT_SEC", &mut self.heartbeat_sec),
            ("LLM_DEADBAND_MS", &mut self.deadband_ms),
            ("LLM_BACKOFF_BASE_SEC", &mut self.backoff_base_sec),
            ("LLM_BACKOFF_MAX_SEC", &mut self.backoff_max_sec),
        ];
        for (key, slot) in floats {
            if let Some(raw) = lookup(key) {
                *slot = parse_value(key, &raw)?;
            }
        }

        for (key, slot) in [
            ("MIN_REPLICAS", &mut self.min_replicas),
            ("MAX_REPLICAS", &mut self.max_replicas),
        ] {
            if let Some(raw) = lookup(key) {
                *slot = parse_value(key, &raw)?;
            }
        }

        self.normalize();
        Ok(())
    }

    /// Whether an oracle credential is configured.
    pub fn oracle_enabled(&self) -> bool {
        self.oracle_api_key.is_some()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let positive = [
            ("oracle_timeout_sec", self.oracle_timeout_sec),
            ("upscale_p95_ms", self.upscale_p95_ms),
            ("downscale_p95_ms", self.downscale_p95_ms),
            ("cooldown_sec", self.cooldown_sec),
            ("rpm", self.rpm),
            ("heartbeat_sec", self.heartbeat_sec),
            ("backoff_base_sec", self.backoff_base_sec),
            ("backoff_max_sec", self.backoff_max_sec),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        if Duration::try_from_secs_f64(self.oracle_timeout_sec).is_err() {
            return Err(ConfigError::Invalid(format!(
                "oracle_timeout_sec is too large, got {}",
                self.oracle_timeout_sec
            )));
        }
        if !self.deadband_ms.is_finite() || self.deadband_ms < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "deadband_ms must be non-negative, got {}",
                self.deadband_ms
            )));
        }
        if self.upscale_p95_ms <= self.downscale_p95_ms {
            return Err(ConfigError::Invalid(format!(
                "upscale_p95_ms ({}) must exceed downscale_p95_ms ({})",
                self.upscale_p95_ms, self.downscale_p95_ms
            )));
        }
        if self.backoff_max_sec < self.backoff_base_sec {
            return Err(ConfigError::Invalid(format!(
                "backoff_max_sec ({}) is below backoff_base_sec ({})",
                self.backoff_max_sec, self.backoff_base_sec
            )));
        }
        if self.min_replicas > self.max_replicas {
            return Err(ConfigError::Invalid(format!(
                "min_replicas ({}) exceeds max_replicas ({})",
                self.min_replicas, self.max_replicas
            )));
        }
        if self.target.trim().is_empty() {
            return Err(ConfigError::Invalid("target must not be empty".to_string()));
        }
        Ok(())
    }

    /// Render as TOML with the API key masked.
    pub fn to_redacted_toml(&self) -> anyhow::Result<String> {
        let mut shown = self.clone();
        if shown.oracle_api_key.is_some() {
            shown.oracle_api_key = Some("<redacted>".to_string());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }

    // An empty key means "not configured".
    fn normalize(&mut self) {
        if self
            .oracle_api_key
            .as_deref()
            .is_some_and(|k| k.trim().is_empty())
        {
            self.oracle_api_key = None;
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> ConfigResult<T> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
