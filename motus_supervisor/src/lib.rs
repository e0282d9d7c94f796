//! # Motus Supervisor Library
//!
//! Cyclic control-loop host for robot control plugins.
//!
//! The supervisor owns the four DoF buffer sets and the auxiliary scalar
//! buffers, drives one `RobotController` instance through strictly
//! sequential control steps, and paces the loop against the configured
//! cycle time. Plugins are selected by name from the
//! `motus_plugins::ControllerRegistry`.
//!
//! # Module Structure
//!
//! - [`cycle`] - Buffers, cycle statistics, and the `Supervisor` runner
//! - [`rt`] - Optional PREEMPT_RT setup (behind the `rt` feature)

pub mod cycle;
pub mod rt;

pub use crate::cycle::{ControlBuffers, CycleError, CycleStats, Supervisor};
