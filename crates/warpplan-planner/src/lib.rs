//! warpplan-planner: latency-driven scaling decisions.
//!
//! Consumes `latency_metrics` windows one at a time and emits exactly one
//! `Decision` per window. An external oracle is consulted when the planner
//! state has moved or a heartbeat is due, subject to a token bucket,
//! rate-limit backoff, and the action cooldown. Whenever the oracle is
//! skipped or fails, a deterministic threshold heuristic decides instead.
//!
//! # Planning Algorithm
//!
//! ```text
//! history.record(p95 < downscale)
//!
//! gate:   want = state_key changed || now - last_call >= heartbeat * U(0.9, 1.1)
//!         call = oracle configured && !backoff && cooldown_ok && want && bucket.try_take()
//!
//! if call:
//!     decision = oracle.invoke()          // on error: heuristic + "llm_fallback: <cause>"
//! else:
//!     decision = heuristic + skip label   // no_llm_key | llm_backoff | cooldown | cadence
//!
//! heuristic:
//!     p95 > upscale            → scale_up
//!     last 3 windows all low   → scale_down
//!     otherwise                → noop
//!
//! if impactful && !cooldown_ok:
//!     decision = noop "cooldown"
//! ```
//!
//! Replica bounds are enforced by the executor, not here.

pub mod bucket;
pub mod cooldown;
pub mod gate;
pub mod heuristic;
pub mod planner;
pub mod window;

pub use bucket::TokenBucket;
pub use cooldown::{Cooldown, permit};
pub use gate::{Band, GateInputs, InvocationGate, SkipReason, StateKey};
pub use planner::{Planner, PlannerState};
pub use window::{LowWindowHistory, WINDOW_CAPACITY};
