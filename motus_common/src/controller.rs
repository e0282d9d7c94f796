//! Robot controller trait and error types.
//!
//! This module defines:
//! - `RobotController` trait - Contract between the supervisor and device plugins
//! - `ControlError` enum - Error types for controller operations
//! - `ControllerFactory` type alias - Factory function type

use crate::state::ControlState;
use crate::types::DofVariables;
use thiserror::Error;

/// Error types for controller operations.
#[derive(Debug, Clone, Error)]
pub enum ControlError {
    /// Controller initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Controller not found in registry
    #[error("Controller not found: {0}")]
    ControllerNotFound(String),

    /// Operation invoked outside the defined lifecycle order
    #[error("Lifecycle error: {0}")]
    LifecycleError(String),
}

/// Factory function type for creating controller instances.
pub type ControllerFactory = fn() -> Box<dyn RobotController>;

/// Trait defining the contract between the motion supervisor and
/// device-specific control plugins.
///
/// A controller converts between two coordinate spaces — joint space
/// (actuator degrees of freedom) and axis space (task/effector degrees of
/// freedom) — once per control tick, and exchanges auxiliary non-kinematic
/// scalars alongside.
///
/// # Lifecycle
///
/// 1. `init()` - Called once before the control loop starts
/// 2. `set_control_state()` / `run_control_step()` - Called from the loop
/// 3. `shutdown()` - Called exactly once after the last cycle
///
/// Calling any cycle operation before a successful `init()` is a caller
/// contract violation; implementations guard it but behavior is undefined
/// beyond "no fault, no memory corruption".
///
/// # Timing Contracts
///
/// | Operation | Max Duration | RT Constraint |
/// |-----------|--------------|---------------|
/// | `init()` | seconds | None (pre-RT) |
/// | `run_control_step()` | cycle budget | **HARD** |
/// | `shutdown()` | 1 second | None (post-RT) |
///
/// # Ownership
///
/// The caller owns and allocates every buffer crossing the cycle boundary.
/// The controller mutates through the given slices and never retains
/// references beyond the call.
///
/// # Concurrency
///
/// One logical thread of control per instance: `run_control_step` and
/// `set_control_state` are invoked strictly sequentially. Independent
/// instances may live on separate threads, hence the `Send` bound; buffers
/// are never shared across instances.
pub trait RobotController: Send {
    /// Returns the controller's unique identifier (e.g., "linear").
    fn name(&self) -> &'static str;

    /// Returns the controller's semantic version.
    fn version(&self) -> &'static str;

    /// Initialize the controller from a configuration string.
    ///
    /// Parses the device/plugin configuration, fixes the joint and axis
    /// cardinalities and their name lists for the instance lifetime, and
    /// establishes the initial state (`ControlState::Passive`).
    ///
    /// # Errors
    /// Returns `ControlError::ConfigError` for malformed configuration or
    /// `ControlError::InitFailed` when a required resource cannot be
    /// acquired. On error no partial state is observable externally.
    fn init(&mut self, configuration: &str) -> Result<(), ControlError>;

    /// Release all resources acquired during `init`.
    ///
    /// Safe to call exactly once after a successful `init`; the only valid
    /// way to dispose of a controller instance. Must not fault.
    fn shutdown(&mut self) -> Result<(), ControlError>;

    /// Number of joint coordinates/degrees-of-freedom.
    ///
    /// Constant for the instance lifetime after `init` succeeds.
    fn joints_number(&self) -> usize;

    /// Ordered joint names, index-aligned with the joint variable slices.
    fn joint_names(&self) -> &[String];

    /// Number of axis coordinates/degrees-of-freedom.
    fn axes_number(&self) -> usize;

    /// Ordered axis names, index-aligned with the axis variable slices.
    fn axis_names(&self) -> &[String];

    /// Command a control-state transition.
    ///
    /// Takes effect before the next control step. Re-setting the active
    /// state is a no-op beyond any state-entry action; the plugin
    /// interprets every defined state and never rejects one.
    fn set_control_state(&mut self, state: ControlState);

    /// Process a single control pass and the joint/axis coordinate
    /// conversions.
    ///
    /// Reads current joint measures, reconciles axis measures from them
    /// via the plugin's forward kinematics, computes joint setpoints from
    /// the supplied axis setpoints via the inverse map, and honors the
    /// active control state's behavioral mode. All four slices are mutated
    /// in place and never resized.
    ///
    /// # Arguments
    /// * `joint_measures` - Per-joint current measures
    /// * `axis_measures` - Per-axis current measures
    /// * `joint_setpoints` - Per-joint desired states
    /// * `axis_setpoints` - Per-axis desired states
    /// * `time_delta` - Seconds since the previous control pass
    ///
    /// # Numerical policy
    /// When `time_delta` is zero or negative, velocity/acceleration-derived
    /// terms hold previous values or zero; the call must not divide by the
    /// delta, fault, or produce NaN/Inf.
    fn run_control_step(
        &mut self,
        joint_measures: &mut [DofVariables],
        axis_measures: &mut [DofVariables],
        joint_setpoints: &mut [DofVariables],
        axis_setpoints: &mut [DofVariables],
        time_delta: f64,
    );

    /// Declared width of the auxiliary input channel.
    fn extra_inputs_number(&self) -> usize;

    /// Stage auxiliary input scalars for the next control step.
    ///
    /// The slice should carry the declared input width; shorter buffers
    /// are a caller contract violation and are copied as far as they go.
    fn set_extra_inputs(&mut self, inputs: &[f64]);

    /// Declared width of the auxiliary output channel.
    fn extra_outputs_number(&self) -> usize;

    /// Read auxiliary output scalars produced by the last control step.
    ///
    /// Populates up to the declared output width; shorter buffers are a
    /// caller contract violation and are filled as far as they go.
    fn get_extra_outputs(&self, outputs: &mut [f64]);
}
