//! Oracle request construction.
//!
//! The request is a `generateContent` body: a fixed policy prompt as the
//! system instruction, then the current telemetry and planner hints as a
//! single user turn. Output length and temperature are pinned low.

use serde::Serialize;
use serde_json::{Value, json};

use warpplan_core::{PlannerConfig, TelemetryWindow};

use crate::error::OracleError;

/// Planner state shared with the oracle alongside the telemetry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hints {
    pub policy: PolicyHints,
    pub cooldown_ok: bool,
    pub low_windows: Vec<bool>,
    pub replicas: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyHints {
    pub upscale_if_p95_gt: f64,
    pub downscale_if_p95_lt_3x: f64,
    pub min_replicas: u32,
    pub max_replicas: u32,
}

impl PolicyHints {
    pub fn from_config(config: &PlannerConfig) -> Self {
        Self {
            upscale_if_p95_gt: config.upscale_p95_ms,
            downscale_if_p95_lt_3x: config.downscale_p95_ms,
            min_replicas: config.min_replicas,
            max_replicas: config.max_replicas,
        }
    }
}

/// The policy description sent as the system instruction.
pub fn system_prompt(config: &PlannerConfig) -> String {
    let target = &config.target;
    format!(
        "You are an autoscaling planner for a web service.\n\
         Return ONLY compact JSON:\n\
         {{\"action\":\"noop|restart|scale_up|scale_down\",\"target\":\"{target}\",\"reason\":\"<short>\"}}\n\
         \n\
         Policy:\n\
         - If p95_ms > {up} -> \"scale_up\".\n\
         - If p95_ms < {down} for 3 consecutive windows AND replicas > {min} -> \"scale_down\".\n\
         - Otherwise \"noop\".\n\
         Target is always \"{target}\". Keep reason short.\n",
        up = config.upscale_p95_ms,
        down = config.downscale_p95_ms,
        min = config.min_replicas,
    )
}

/// Assemble the full request body.
pub fn build_body(
    system: &str,
    telemetry: &TelemetryWindow,
    hints: &Hints,
) -> Result<Value, OracleError> {
    let metrics = serde_json::to_string(telemetry)
        .map_err(|e| OracleError::Unavailable(format!("encode telemetry: {e}")))?;
    let hints = serde_json::to_string(hints)
        .map_err(|e| OracleError::Unavailable(format!("encode hints: {e}")))?;

    Ok(json!({
        "system_instruction": {"parts": [{"text": system}]},
        "contents": [{
            "parts": [{
                "text": format!("metrics: {metrics}\nhints: {hints}\nReturn compact JSON only."),
            }]
        }],
        "generation_config": {
            "temperature": 0.05,
            "max_output_tokens": 128,
            "response_mime_type": "application/json",
        },
    }))
}
