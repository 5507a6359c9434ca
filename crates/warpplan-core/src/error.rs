//! Error types for configuration loading and inbound event parsing.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating a `PlannerConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised while turning a raw `alerts` event into a telemetry window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EventError {
    /// Not a `latency_metrics` event. Dropped without output.
    #[error("event is not a latency_metrics window")]
    NotLatencyMetrics,

    /// A `latency_metrics` event whose fields cannot be interpreted.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl EventError {
    /// Whether the event should be dropped silently rather than reported.
    pub fn is_skippable(&self) -> bool {
        matches!(self, EventError::NotLatencyMetrics)
    }
}
