//! Motus Common Library
//!
//! This crate provides the shared types and the plugin contract for all
//! Motus workspace crates: the per-DoF variable set, the control-state
//! enumeration, the `RobotController` trait implemented by device plugins,
//! and the robot configuration types.
//!
//! # Module Structure
//!
//! - [`types`] - Per-DoF variable struct
//! - [`state`] - Control-state enumeration
//! - [`controller`] - `RobotController` plugin trait and error types
//! - [`config`] - Robot configuration parsing and validation
//! - [`consts`] - Workspace-wide constants
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod controller;
pub mod prelude;
pub mod state;
pub mod types;
