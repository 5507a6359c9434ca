//! Planner loop: one decision per inbound latency window.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use warpplan_core::{ActionEvent, Clock, Decision, PlannerConfig, TelemetryWindow, parse_window};
use warpplan_oracle::{Backoff, Hints, OracleClient, PolicyHints};

use crate::bucket::TokenBucket;
use crate::cooldown::{Cooldown, permit};
use crate::gate::{GateInputs, InvocationGate, SkipReason};
use crate::heuristic;
use crate::window::LowWindowHistory;

/// All mutable planner state. Process-local and reset on restart.
#[derive(Debug, Clone)]
pub struct PlannerState {
    pub history: LowWindowHistory,
    pub bucket: TokenBucket,
    pub backoff: Backoff,
    pub cooldown: Cooldown,
    pub gate: InvocationGate,
}

impl PlannerState {
    pub fn new(config: &PlannerConfig, now: f64) -> Self {
        Self {
            history: LowWindowHistory::new(),
            bucket: TokenBucket::new(config.rpm, now),
            backoff: Backoff::from_config(config),
            cooldown: Cooldown::from_config(config),
            gate: InvocationGate::from_config(config),
        }
    }
}

pub struct Planner {
    config: PlannerConfig,
    state: PlannerState,
    oracle: Option<OracleClient>,
    clock: Arc<dyn Clock>,
    rng: StdRng,
}

impl Planner {
    /// Create a planner. Without an oracle client every decision comes
    /// from the heuristic.
    pub fn new(
        config: PlannerConfig,
        oracle: Option<OracleClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = PlannerState::new(&config, clock.now());
        Self {
            config,
            state,
            oracle,
            clock,
            rng: StdRng::from_entropy(),
        }
    }

    /// Fix the heartbeat jitter sequence.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> &PlannerState {
        &self.state
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Process one raw inbound event.
    ///
    /// Returns `None` for events that are not latency windows. A latency
    /// window that cannot be read yields an error event carrying the input.
    pub async fn handle(&mut self, raw: &Value) -> Option<ActionEvent> {
        match parse_window(raw) {
            Ok(window) => Some(self.plan(window).await),
            Err(e) if e.is_skippable() => {
                debug!(reason = %e, "skipping event");
                None
            }
            Err(e) => {
                error!(error = %e, "failed to process event");
                Some(ActionEvent::Error {
                    error: e.to_string(),
                    raw: raw.clone(),
                })
            }
        }
    }

    async fn plan(&mut self, window: TelemetryWindow) -> ActionEvent {
        let now = self.clock.now();
        let state = &mut self.state;

        state
            .history
            .record(window.p95_ms < self.config.downscale_p95_ms);
        let cooldown_ok = state.cooldown.ok(now);

        let inputs = GateInputs {
            oracle_configured: self.oracle.is_some(),
            backoff_active: state.backoff.active(now),
            cooldown_ok,
        };
        let gate = state.gate.check(
            &window,
            &state.history,
            &self.config,
            inputs,
            &mut state.bucket,
            now,
            &mut self.rng,
        );

        let decision = match (gate, self.oracle.as_ref()) {
            (Ok(()), Some(oracle)) => {
                let hints = Hints {
                    policy: PolicyHints::from_config(&self.config),
                    cooldown_ok,
                    low_windows: state.history.snapshot(),
                    replicas: window.replicas,
                };
                match oracle
                    .invoke(&window, &hints, &mut state.backoff, self.clock.as_ref())
                    .await
                {
                    Ok(decision) => {
                        state.gate.record_call(self.clock.now());
                        state.backoff.reset();
                        decision
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            rate_limited = e.is_rate_limited(),
                            "oracle call failed, using heuristic"
                        );
                        let mut d = heuristic::decide(&window, &state.history, &self.config);
                        d.annotate(&format!("llm_fallback: {}", e.label()));
                        d
                    }
                }
            }
            (Ok(()), None) => {
                fallback(&window, &state.history, &self.config, SkipReason::NoOracle)
            }
            (Err(skip), _) => fallback(&window, &state.history, &self.config, skip),
        };

        let decision = permit(decision, cooldown_ok);
        let ts = self.clock.now();
        if decision.action.is_impactful() {
            state.cooldown.record(ts);
        }

        debug!(
            action = %decision.action,
            p95_ms = window.p95_ms,
            replicas = ?window.replicas,
            reason = %decision.reason,
            "planned"
        );

        ActionEvent::Plan {
            ts,
            container: self.config.target.clone(),
            decision,
            telemetry: window,
        }
    }

    /// Consume events until the input closes or shutdown is signalled.
    ///
    /// Events are handled strictly one at a time. Returns the number of
    /// action events published.
    pub async fn run(
        &mut self,
        mut events: mpsc::Receiver<Value>,
        actions: mpsc::Sender<ActionEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> u64 {
        info!(
            container = %self.config.target,
            oracle = self.oracle.is_some(),
            rpm = self.config.rpm,
            "planner started"
        );

        let mut published = 0;
        loop {
            tokio::select! {
                biased;
                Ok(()) = shutdown.changed() => {
                    info!("planner shutting down");
                    break;
                }
                event = events.recv() => {
                    let Some(raw) = event else {
                        info!("input stream closed");
                        break;
                    };
                    let Some(action) = self.handle(&raw).await else {
                        continue;
                    };
                    if actions.send(action).await.is_err() {
                        warn!("action stream closed, stopping planner");
                        break;
                    }
                    published += 1;
                }
            }
        }
        published
    }
}

fn fallback(
    window: &TelemetryWindow,
    history: &LowWindowHistory,
    config: &PlannerConfig,
    skip: SkipReason,
) -> Decision {
    debug!(skip = skip.label(), "oracle not consulted");
    let mut d = heuristic::decide(window, history, config);
    d.annotate(skip.label());
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warpplan_core::{Action, ManualClock};

    fn planner(clock: &ManualClock) -> Planner {
        Planner::new(PlannerConfig::default(), None, Arc::new(clock.clone())).with_seed(42)
    }

    #[tokio::test]
    async fn other_kinds_are_ignored_without_touching_state() {
        let clock = ManualClock::new(0.0);
        let mut p = planner(&clock);

        for raw in [
            json!({"kind": "deploy", "p95_ms": 50}),
            json!({"p95_ms": 50}),
            json!("latency_metrics"),
            json!({"raw": "not json"}),
        ] {
            assert!(p.handle(&raw).await.is_none());
        }
        assert!(p.state().history.is_empty());
    }

    #[tokio::test]
    async fn bad_field_becomes_error_event() {
        let clock = ManualClock::new(0.0);
        let mut p = planner(&clock);
        let raw = json!({"kind": "latency_metrics", "p95_ms": "fast"});

        match p.handle(&raw).await {
            Some(ActionEvent::Error { error, raw: echoed }) => {
                assert!(error.contains("p95_ms"), "{error}");
                assert_eq!(echoed, raw);
            }
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn plan_echoes_telemetry_and_timestamp() {
        let clock = ManualClock::new(1234.5);
        let mut p = planner(&clock);

        let event = p
            .handle(&json!({"kind": "latency_metrics", "p95_ms": 200, "replicas": 2}))
            .await
            .unwrap();
        match event {
            ActionEvent::Plan {
                ts,
                container,
                decision,
                telemetry,
            } => {
                assert_eq!(ts, 1234.5);
                assert_eq!(container, "app");
                assert_eq!(decision.action, Action::Noop);
                assert_eq!(decision.reason, "heuristic (no_llm_key)");
                assert_eq!(
                    telemetry,
                    TelemetryWindow {
                        p95_ms: 200.0,
                        replicas: Some(2),
                    }
                );
            }
            other => panic!("expected plan, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn noop_does_not_start_cooldown() {
        let clock = ManualClock::new(0.0);
        let mut p = planner(&clock);
        p.handle(&json!({"kind": "latency_metrics", "p95_ms": 200})).await;
        assert_eq!(p.state().cooldown.last_action_ts(), None);

        p.handle(&json!({"kind": "latency_metrics", "p95_ms": 900})).await;
        assert_eq!(p.state().cooldown.last_action_ts(), Some(0.0));
    }

    #[tokio::test]
    async fn run_stops_when_input_closes() {
        let clock = ManualClock::new(0.0);
        let mut p = planner(&clock);
        let (event_tx, event_rx) = mpsc::channel(8);
        let (action_tx, mut action_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        for event in [
            json!({"kind": "latency_metrics", "p95_ms": 400}),
            json!({"kind": "noise"}),
            json!({"kind": "latency_metrics", "p95_ms": -1}),
        ] {
            event_tx.send(event).await.unwrap();
        }
        drop(event_tx);

        let published = p.run(event_rx, action_tx, shutdown_rx).await;
        assert_eq!(published, 2);

        let first = action_rx.recv().await.unwrap();
        assert_eq!(first.decision().unwrap().action, Action::ScaleUp);
        assert!(matches!(action_rx.recv().await.unwrap(), ActionEvent::Error { .. }));
        assert!(action_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let clock = ManualClock::new(0.0);
        let mut p = planner(&clock);
        let (_event_tx, event_rx) = mpsc::channel::<Value>(8);
        let (action_tx, _action_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        shutdown_tx.send(true).unwrap();
        assert_eq!(p.run(event_rx, action_tx, shutdown_rx).await, 0);
    }
}
