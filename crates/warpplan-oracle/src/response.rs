//! Oracle response decoding.
//!
//! The body is untrusted. Anything structurally wrong is an
//! `OracleError::Unavailable`; anything semantically wrong inside an
//! otherwise well-formed payload is coerced to a safe value.

use serde_json::Value;
use tracing::debug;

use warpplan_core::{Action, Decision};

use crate::error::OracleError;

/// Decode a `generateContent` response body into a decision for `target`.
pub fn decode(body: &[u8], target: &str) -> Result<Decision, OracleError> {
    let envelope: Value = serde_json::from_slice(body)
        .map_err(|e| OracleError::Unavailable(format!("invalid response body: {e}")))?;

    let text = envelope
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| OracleError::Unavailable("response missing candidate text".to_string()))?;

    parse_decision(text, target)
}

/// Parse the model's text output. `target` always replaces whatever the
/// model put there.
pub fn parse_decision(text: &str, target: &str) -> Result<Decision, OracleError> {
    let text = strip_code_fence(text);
    let text = if text.is_empty() { "{}" } else { text };

    let payload: Value = serde_json::from_str(text)
        .map_err(|e| OracleError::Unavailable(format!("invalid decision json: {e}")))?;
    let fields = payload
        .as_object()
        .ok_or_else(|| OracleError::Unavailable("decision is not a json object".to_string()))?;

    let raw_action = fields.get("action");
    let action = match raw_action.and_then(Value::as_str).and_then(Action::parse) {
        Some(action) => action,
        None => {
            if let Some(raw) = raw_action {
                debug!(action = %raw, "oracle returned unknown action, coercing to noop");
            }
            Action::Noop
        }
    };

    let reason = match fields.get("reason") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    Ok(Decision::new(action, target, &reason))
}

/// Remove a surrounding Markdown code fence and its optional `json` tag.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    if !text.starts_with("```") {
        return text;
    }
    let inner = text.trim_matches('`').trim();
    match inner.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => inner[4..].trim(),
        _ => inner,
    }
}
