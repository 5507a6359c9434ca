//! Shared types used across WarpPlan crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Longest reason string a `Decision` may carry, in characters.
pub const MAX_REASON_CHARS: usize = 160;

/// One action the planner may ask the executor to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Noop,
    Restart,
    ScaleUp,
    ScaleDown,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Noop,
        Action::Restart,
        Action::ScaleUp,
        Action::ScaleDown,
    ];

    /// Anything other than `noop` changes the running service.
    pub fn is_impactful(self) -> bool {
        !matches!(self, Action::Noop)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Noop => "noop",
            Action::Restart => "restart",
            Action::ScaleUp => "scale_up",
            Action::ScaleDown => "scale_down",
        }
    }

    /// Parse the wire name of an action. Unknown names yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        Action::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A planner decision for one telemetry window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub target: String,
    pub reason: String,
}

impl Decision {
    pub fn new(action: Action, target: &str, reason: &str) -> Self {
        Self {
            action,
            target: target.to_string(),
            reason: truncate_reason(reason),
        }
    }

    pub fn noop(target: &str, reason: &str) -> Self {
        Self::new(Action::Noop, target, reason)
    }

    /// Append a parenthesised diagnostic note to the reason.
    pub fn annotate(&mut self, note: &str) {
        self.reason = truncate_reason(&format!("{} ({note})", self.reason));
    }
}

/// Cut a reason down to `MAX_REASON_CHARS` characters.
pub fn truncate_reason(reason: &str) -> String {
    reason.chars().take(MAX_REASON_CHARS).collect()
}

/// One latency window reported by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryWindow {
    pub p95_ms: f64,
    /// Replica count when the monitor knows it.
    pub replicas: Option<u32>,
}

/// An event published on the `actions` stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionEvent {
    /// A decision together with the telemetry that produced it.
    Plan {
        ts: f64,
        container: String,
        decision: Decision,
        telemetry: TelemetryWindow,
    },
    /// Processing one inbound event failed.
    Error {
        error: String,
        raw: serde_json::Value,
    },
}

impl ActionEvent {
    pub fn decision(&self) -> Option<&Decision> {
        match self {
            ActionEvent::Plan { decision, .. } => Some(decision),
            ActionEvent::Error { .. } => None,
        }
    }
}
