//! # Motus Plugins Library
//!
//! Controller registry and control plugin implementations.
//!
//! Plugins implement the `RobotController` trait defined in
//! `motus_common::controller`. The supervisor selects a plugin by name
//! through the [`registry::ControllerRegistry`].
//!
//! # Module Structure
//!
//! - [`registry`] - Controller factory registration
//! - [`linear`] - Reference plugin: linear kinematics + impedance control

pub mod linear;
pub mod registry;

pub use crate::linear::LinearController;
pub use crate::registry::ControllerRegistry;

/// Build a registry populated with all built-in controllers.
pub fn builtin_registry() -> ControllerRegistry {
    let mut registry = ControllerRegistry::new();
    registry.register("linear", || Box::new(LinearController::new()));
    registry
}
