//! Inbound `alerts` event parsing.
//!
//! Events arrive as loosely-typed JSON. Only `latency_metrics` events are
//! planner input; everything else is dropped before any state is touched.

use serde_json::Value;

use crate::error::EventError;
use crate::types::TelemetryWindow;

/// The `kind` tag carried by monitor latency windows.
pub const LATENCY_METRICS_KIND: &str = "latency_metrics";

/// Extract a `TelemetryWindow` from a raw inbound event.
///
/// A missing `p95_ms` reads as 0. A missing or null `replicas` reads as
/// unknown, never as zero.
pub fn parse_window(raw: &Value) -> Result<TelemetryWindow, EventError> {
    if raw.get("kind").and_then(Value::as_str) != Some(LATENCY_METRICS_KIND) {
        return Err(EventError::NotLatencyMetrics);
    }

    let p95_ms = match raw.get("p95_ms") {
        None | Some(Value::Null) => 0.0,
        Some(v) => parse_p95(v)?,
    };

    let replicas = match raw.get("replicas") {
        None | Some(Value::Null) => None,
        Some(v) => Some(parse_replicas(v)?),
    };

    Ok(TelemetryWindow { p95_ms, replicas })
}

fn parse_p95(v: &Value) -> Result<f64, EventError> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(p) if p.is_finite() && p >= 0.0 => Ok(p),
        _ => Err(EventError::InvalidField {
            field: "p95_ms",
            reason: format!("expected a non-negative number, got {v}"),
        }),
    }
}

fn parse_replicas(v: &Value) -> Result<u32, EventError> {
    let parsed = match v {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| EventError::InvalidField {
            field: "replicas",
            reason: format!("expected a non-negative integer, got {v}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_window() {
        let w = parse_window(&json!({"kind": "latency_metrics", "p95_ms": 412.5, "replicas": 3}))
            .unwrap();
        assert_eq!(w.p95_ms, 412.5);
        assert_eq!(w.replicas, Some(3));
    }

    #[test]
    fn missing_p95_defaults_to_zero() {
        let w = parse_window(&json!({"kind": "latency_metrics"})).unwrap();
        assert_eq!(w.p95_ms, 0.0);
        assert_eq!(w.replicas, None);
    }

    #[test]
    fn null_replicas_is_unknown() {
        let w = parse_window(&json!({"kind": "latency_metrics", "p95_ms": 10, "replicas": null}))
            .unwrap();
        assert_eq!(w.replicas, None);
    }

    #[test]
    fn other_kinds_are_skippable() {
        for raw in [
            json!({"kind": "plan"}),
            json!({"p95_ms": 10}),
            json!({"raw": "not json"}),
            json!([1, 2, 3]),
            json!("latency_metrics"),
        ] {
            let err = parse_window(&raw).unwrap_err();
            assert!(err.is_skippable(), "{raw} should be skipped");
        }
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let raw = json!({"kind": "latency_metrics", "p95_ms": " 250 ", "replicas": "2"});
        let w = parse_window(&raw).unwrap();
        assert_eq!(w.p95_ms, 250.0);
        assert_eq!(w.replicas, Some(2));
    }

    #[test]
    fn integral_float_replicas_are_accepted() {
        let raw = json!({"kind": "latency_metrics", "replicas": 4.0});
        let w = parse_window(&raw).unwrap();
        assert_eq!(w.replicas, Some(4));
    }

    #[test]
    fn garbage_p95_is_reported() {
        let raw = json!({"kind": "latency_metrics", "p95_ms": "fast"});
        let err = parse_window(&raw).unwrap_err();
        assert!(!err.is_skippable());
        assert!(matches!(err, EventError::InvalidField { field: "p95_ms", .. }));
    }

    #[test]
    fn negative_p95_is_reported() {
        let raw = json!({"kind": "latency_metrics", "p95_ms": -1});
        let err = parse_window(&raw).unwrap_err();
        assert!(matches!(err, EventError::InvalidField { field: "p95_ms", .. }));
    }

    #[test]
    fn bad_replicas_are_reported() {
        for bad in [json!(-1), json!(2.5), json!("two"), json!(true), json!(u64::MAX)] {
            let raw = json!({"kind": "latency_metrics", "p95_ms": 10, "replicas": bad});
            let err = parse_window(&raw).unwrap_err();
            assert!(
                matches!(err, EventError::InvalidField { field: "replicas", .. }),
                "{raw} should be rejected"
            );
        }
    }
}
