//! Controller registry.
//!
//! Provides a `ControllerRegistry` struct for registering and retrieving
//! controller factories. This uses constructor-injection rather than global
//! state; the host builds a registry at startup and passes it where needed.

use motus_common::controller::{ControlError, ControllerFactory, RobotController};
use std::collections::HashMap;

/// Registry of available robot controllers.
///
/// Constructed at startup, populated via `register()`, and handed to the
/// supervisor by value. No global state — testable in isolation.
pub struct ControllerRegistry {
    factories: HashMap<&'static str, ControllerFactory>,
}

impl ControllerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a controller factory.
    ///
    /// # Panics
    /// Panics if a controller with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: ControllerFactory) {
        if self.factories.contains_key(name) {
            panic!("Controller '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a controller factory by name.
    pub fn get_factory(&self, name: &str) -> Option<ControllerFactory> {
        self.factories.get(name).copied()
    }

    /// Create a controller instance by name.
    ///
    /// # Errors
    /// Returns `ControlError::ControllerNotFound` if no controller with the
    /// given name is registered.
    pub fn create_controller(&self, name: &str) -> Result<Box<dyn RobotController>, ControlError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| ControlError::ControllerNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// List all registered controller names.
    pub fn list_controllers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
