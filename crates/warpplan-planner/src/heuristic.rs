//! Deterministic threshold policy, used when the oracle is skipped or fails.

use warpplan_core::{Action, Decision, PlannerConfig, TelemetryWindow};

use crate::window::LowWindowHistory;

/// Decide from thresholds alone. Never fails.
///
/// The replica ceiling is not checked here; the executor enforces it.
pub fn decide(
    telemetry: &TelemetryWindow,
    history: &LowWindowHistory,
    config: &PlannerConfig,
) -> Decision {
    let target = config.target.as_str();

    if telemetry.p95_ms > config.upscale_p95_ms {
        let reason = format!(
            "p95 {:.0}ms > {:.0}ms",
            telemetry.p95_ms, config.upscale_p95_ms
        );
        return Decision::new(Action::ScaleUp, target, &reason);
    }

    if history.all_low() {
        let replicas = match telemetry.replicas {
            Some(n) => format!("replicas={n}"),
            None => "replicas_unknown; executor_enforces_min".to_string(),
        };
        let reason = format!(
            "p95 < {:.0}ms for 3 windows ({replicas})",
            config.downscale_p95_ms
        );
        return Decision::new(Action::ScaleDown, target, &reason);
    }

    Decision::noop(target, "heuristic")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn low_history(n: usize) -> LowWindowHistory {
        let mut h = LowWindowHistory::new();
        for _ in 0..n {
            h.record(true);
        }
        h
    }

    #[test]
    fn high_latency_scales_up() {
        let config = PlannerConfig::default();
        let w = TelemetryWindow { p95_ms: 400.0, replicas: Some(5) };
        let d = decide(&w, &low_history(0), &config);
        assert_eq!(d.action, Action::ScaleUp);
        assert_eq!(d.reason, "p95 400ms > 300ms");
        assert_eq!(d.target, "app");
    }

    #[test]
    fn exactly_at_threshold_is_not_high() {
        let config = PlannerConfig::default();
        let w = TelemetryWindow { p95_ms: 300.0, replicas: None };
        assert_eq!(decide(&w, &low_history(0), &config).action, Action::Noop);
    }

    #[test]
    fn three_low_windows_scale_down_with_known_replicas() {
        let config = PlannerConfig::default();
        let w = TelemetryWindow { p95_ms: 50.0, replicas: Some(3) };
        let d = decide(&w, &low_history(3), &config);
        assert_eq!(d.action, Action::ScaleDown);
        assert!(d.reason.contains("replicas=3"), "{}", d.reason);
    }

    #[test]
    fn unknown_replicas_defer_floor_to_executor() {
        let config = PlannerConfig::default();
        let w = TelemetryWindow { p95_ms: 50.0, replicas: None };
        let d = decide(&w, &low_history(3), &config);
        assert_eq!(d.action, Action::ScaleDown);
        assert!(d.reason.contains("replicas_unknown"));
        assert!(d.reason.contains("executor_enforces_min"));
    }

    #[test]
    fn short_history_is_noop() {
        let config = PlannerConfig::default();
        let w = TelemetryWindow { p95_ms: 50.0, replicas: Some(3) };
        let d = decide(&w, &low_history(2), &config);
        assert_eq!(d, Decision::noop("app", "heuristic"));
    }

    #[test]
    fn uses_configured_target() {
        let config = PlannerConfig {
            target: "checkout".to_string(),
            ..PlannerConfig::default()
        };
        let w = TelemetryWindow { p95_ms: 1000.0, replicas: None };
        assert_eq!(decide(&w, &low_history(0), &config).target, "checkout");
    }
}
