//! Workspace-wide constants.
//!
//! Limits for joint/axis cardinalities and auxiliary channel widths,
//! plus default timing values shared by the supervisor and plugins.

/// Maximum number of degrees of freedom per coordinate set (joints or axes)
pub const MAX_DOFS: usize = 32;

/// Maximum width of the auxiliary input/output channels
pub const MAX_EXTRA_IO: usize = 64;

/// Default control cycle time in microseconds (5ms = 200Hz)
pub const DEFAULT_CYCLE_TIME_US: u32 = 5000;

/// Conventional time delta [s] for the first control step, when no
/// previous tick exists yet.
pub const DEFAULT_TIME_DELTA: f64 = 0.005;

/// Declared numerical tolerance for joint/axis kinematic consistency
pub const POSITION_TOLERANCE: f64 = 1e-6;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/motus/robot.toml";
