//! Prelude module for common re-exports.
//!
//! Consumers can do `use motus_common::prelude::*;` and get the most
//! important types without listing individual paths.

use std::time::Duration;

// ─── Contract ───────────────────────────────────────────────────────
pub use crate::controller::{ControlError, ControllerFactory, RobotController};

// ─── Data model ─────────────────────────────────────────────────────
pub use crate::state::ControlState;
pub use crate::types::DofVariables;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{AxisConfig, JointConfig, RobotConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{
    DEFAULT_CYCLE_TIME_US, DEFAULT_TIME_DELTA, MAX_DOFS, MAX_EXTRA_IO, POSITION_TOLERANCE,
};

/// Default control cycle time as Duration.
pub const DEFAULT_CYCLE_TIME: Duration = Duration::from_micros(DEFAULT_CYCLE_TIME_US as u64);
