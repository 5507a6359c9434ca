//! warpplan-core: types shared by every WarpPlan crate.
//!
//! Holds the planner configuration, the telemetry/decision data model,
//! inbound event parsing for the `alerts` stream, the outbound
//! `actions` event shape, and the `Clock` used to timestamp everything.

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PlannerConfig;
pub use error::{ConfigError, ConfigResult, EventError};
pub use event::parse_window;
pub use types::*;
