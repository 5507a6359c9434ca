//! Cooldown between impactful actions.

use warpplan_core::{Decision, PlannerConfig};

/// Tracks when the last impactful action was emitted.
#[derive(Debug, Clone)]
pub struct Cooldown {
    cooldown_sec: f64,
    last_action_ts: Option<f64>,
}

impl Cooldown {
    pub fn new(cooldown_sec: f64) -> Self {
        Self {
            cooldown_sec,
            last_action_ts: None,
        }
    }

    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(config.cooldown_sec)
    }

    /// True when no action was ever recorded or the window has elapsed.
    pub fn ok(&self, now: f64) -> bool {
        match self.last_action_ts {
            Some(last) => now - last >= self.cooldown_sec,
            None => true,
        }
    }

    pub fn record(&mut self, now: f64) {
        self.last_action_ts = Some(now);
    }

    pub fn last_action_ts(&self) -> Option<f64> {
        self.last_action_ts
    }
}

/// Replace an impactful decision with `noop` while cooling down.
pub fn permit(decision: Decision, cooldown_ok: bool) -> Decision {
    if decision.action.is_impactful() && !cooldown_ok {
        Decision::noop(&decision.target, "cooldown")
    } else {
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpplan_core::Action;

    #[test]
    fn ok_until_first_action() {
        let mut c = Cooldown::new(20.0);
        assert!(c.ok(0.0));
        c.record(100.0);
        assert!(!c.ok(102.0));
        assert!(!c.ok(119.9));
        assert!(c.ok(120.0));
    }

    #[test]
    fn impactful_actions_are_held_back() {
        for action in [Action::ScaleUp, Action::ScaleDown, Action::Restart] {
            let d = permit(Decision::new(action, "app", "busy"), false);
            assert_eq!(d, Decision::noop("app", "cooldown"));
        }
    }

    #[test]
    fn noop_and_open_window_pass_through() {
        let noop = Decision::noop("app", "heuristic");
        assert_eq!(permit(noop.clone(), false), noop);

        let up = Decision::new(Action::ScaleUp, "app", "p95 400ms > 300ms");
        assert_eq!(permit(up.clone(), true), up);
    }

    #[test]
    fn nothing_impactful_escapes_inside_the_window() {
        let mut c = Cooldown::new(20.0);
        c.record(0.0);
        let mut now = 0.0;
        while now < 20.0 {
            for action in Action::ALL {
                let d = permit(Decision::new(action, "app", "x"), c.ok(now));
                assert!(!d.action.is_impactful(), "{action} escaped at {now}");
            }
            now += 0.7;
        }
    }
}
