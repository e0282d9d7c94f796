//! Robot configuration types.
//!
//! This module contains the configuration types parsed from the
//! configuration string handed to `RobotController::init`:
//! - `RobotConfig` - Main configuration (TOML document)
//! - `JointConfig` - Per-joint configuration
//! - `AxisConfig` - Per-axis configuration with its kinematic weight row
//!
//! The supervisor reads the string from a file; the plugin only ever sees
//! the text.

use crate::consts::{MAX_DOFS, MAX_EXTRA_IO};
use crate::controller::ControlError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default function for joint stiffness
fn default_stiffness() -> f64 {
    100.0
}

/// Default function for joint damping
fn default_damping() -> f64 {
    10.0
}

/// Default function for joint inertia
fn default_inertia() -> f64 {
    1.0
}

/// Default function for axis force limit
fn default_force_limit() -> f64 {
    1000.0
}

/// Main robot configuration, parsed from the configuration string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotConfig {
    /// Robot identifier (used for logging)
    pub robot: String,

    /// Auxiliary input channel names. Channel width = list length.
    #[serde(default)]
    pub extra_inputs: Vec<String>,

    /// Auxiliary output channel names. Channel width = list length.
    #[serde(default)]
    pub extra_outputs: Vec<String>,

    /// Joint definitions, ordered. Index-aligned with all joint slices.
    #[serde(rename = "joint", default)]
    pub joints: Vec<JointConfig>,

    /// Axis definitions, ordered. Index-aligned with all axis slices.
    #[serde(rename = "axis", default)]
    pub axes: Vec<AxisConfig>,
}

impl RobotConfig {
    /// Parse and validate a configuration string.
    ///
    /// # Errors
    /// Returns `ControlError::ConfigError` for malformed TOML or semantic
    /// validation failures.
    pub fn from_toml_str(configuration: &str) -> Result<Self, ControlError> {
        let config: Self = toml::from_str(configuration)
            .map_err(|e| ControlError::ConfigError(format!("TOML parse failed: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the robot configuration.
    ///
    /// # Validation Rules
    /// 1. At least one joint and one axis
    /// 2. `joints.len()` and `axes.len()` <= MAX_DOFS
    /// 3. Auxiliary channel widths <= MAX_EXTRA_IO
    /// 4. All names non-empty and unique within their set
    /// 5. Every axis weight row has one entry per joint, not all zero
    /// 6. All gains and limits non-negative
    pub fn validate(&self) -> Result<(), ControlError> {
        if self.joints.is_empty() {
            return Err(ControlError::ConfigError(
                "at least one joint is required".to_string(),
            ));
        }
        if self.axes.is_empty() {
            return Err(ControlError::ConfigError(
                "at least one axis is required".to_string(),
            ));
        }

        if self.joints.len() > MAX_DOFS {
            return Err(ControlError::ConfigError(format!(
                "Too many joints: {} (max {})",
                self.joints.len(),
                MAX_DOFS
            )));
        }
        if self.axes.len() > MAX_DOFS {
            return Err(ControlError::ConfigError(format!(
                "Too many axes: {} (max {})",
                self.axes.len(),
                MAX_DOFS
            )));
        }

        if self.extra_inputs.len() > MAX_EXTRA_IO {
            return Err(ControlError::ConfigError(format!(
                "Too many extra inputs: {} (max {})",
                self.extra_inputs.len(),
                MAX_EXTRA_IO
            )));
        }
        if self.extra_outputs.len() > MAX_EXTRA_IO {
            return Err(ControlError::ConfigError(format!(
                "Too many extra outputs: {} (max {})",
                self.extra_outputs.len(),
                MAX_EXTRA_IO
            )));
        }

        // Check for duplicate joint names
        let mut joint_names = HashSet::new();
        for (idx, joint) in self.joints.iter().enumerate() {
            joint.validate(idx)?;
            if !joint_names.insert(&joint.name) {
                return Err(ControlError::ConfigError(format!(
                    "Duplicate joint name: {}",
                    joint.name
                )));
            }
        }

        // Check for duplicate axis names
        let mut axis_names = HashSet::new();
        for (idx, axis) in self.axes.iter().enumerate() {
            axis.validate(idx, self.joints.len())?;
            if !axis_names.insert(&axis.name) {
                return Err(ControlError::ConfigError(format!(
                    "Duplicate axis name: {}",
                    axis.name
                )));
            }
        }

        Ok(())
    }

    /// Ordered joint name list (owned clones, index-aligned).
    pub fn joint_name_list(&self) -> Vec<String> {
        self.joints.iter().map(|j| j.name.clone()).collect()
    }

    /// Ordered axis name list (owned clones, index-aligned).
    pub fn axis_name_list(&self) -> Vec<String> {
        self.axes.iter().map(|a| a.name.clone()).collect()
    }
}

/// Per-joint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointConfig {
    /// Joint name (unique identifier)
    pub name: String,

    /// Default impedance stiffness for this joint
    #[serde(default = "default_stiffness")]
    pub stiffness: f64,

    /// Default impedance damping for this joint
    #[serde(default = "default_damping")]
    pub damping: f64,

    /// Apparent inertia estimate for this joint
    #[serde(default = "default_inertia")]
    pub inertia: f64,
}

impl JointConfig {
    /// Validate a single joint entry.
    pub fn validate(&self, index: usize) -> Result<(), ControlError> {
        if self.name.is_empty() {
            return Err(ControlError::ConfigError(format!(
                "Joint {index} has empty name"
            )));
        }
        if self.stiffness < 0.0 || self.damping < 0.0 || self.inertia < 0.0 {
            return Err(ControlError::ConfigError(format!(
                "Joint '{}': stiffness, damping and inertia must be >= 0",
                self.name
            )));
        }
        Ok(())
    }
}

/// Per-axis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Axis name (unique identifier)
    pub name: String,

    /// Kinematic weight row: axis value = weights · joint values.
    /// One entry per configured joint.
    pub weights: Vec<f64>,

    /// Impedance stiffness gain for this axis
    #[serde(default = "default_stiffness")]
    pub stiffness: f64,

    /// Impedance damping gain for this axis
    #[serde(default = "default_damping")]
    pub damping: f64,

    /// Absolute force/torque clamp applied to setpoints on this axis
    #[serde(default = "default_force_limit")]
    pub force_limit: f64,
}

impl AxisConfig {
    /// Validate a single axis entry against the configured joint count.
    pub fn validate(&self, index: usize, joints_number: usize) -> Result<(), ControlError> {
        if self.name.is_empty() {
            return Err(ControlError::ConfigError(format!(
                "Axis {index} has empty name"
            )));
        }
        if self.weights.len() != joints_number {
            return Err(ControlError::ConfigError(format!(
                "Axis '{}': weight row has {} entries, expected {} (one per joint)",
                self.name,
                self.weights.len(),
                joints_number
            )));
        }
        if self.weights.iter().all(|w| *w == 0.0) {
            return Err(ControlError::ConfigError(format!(
                "Axis '{}': weight row must not be all zero",
                self.name
            )));
        }
        if self.weights.iter().any(|w| !w.is_finite()) {
            return Err(ControlError::ConfigError(format!(
                "Axis '{}': weight row must be finite",
                self.name
            )));
        }
        if self.stiffness < 0.0 || self.damping < 0.0 || self.force_limit < 0.0 {
            return Err(ControlError::ConfigError(format!(
                "Axis '{}': stiffness, damping and force_limit must be >= 0",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLANAR_2J_1A: &str = r#"
robot = "planar"
extra_inputs = ["trigger"]
extra_outputs = ["cycle", "dt"]

[[joint]]
name = "shoulder"

[[joint]]
name = "elbow"

[[axis]]
name = "reach"
weights = [1.0, 1.0]
"#;

    #[test]
    fn parse_valid_config() {
        let config = RobotConfig::from_toml_str(PLANAR_2J_1A).expect("parse");
        assert_eq!(config.robot, "planar");
        assert_eq!(config.joints.len(), 2);
        assert_eq!(config.axes.len(), 1);
        assert_eq!(config.extra_inputs.len(), 1);
        assert_eq!(config.extra_outputs.len(), 2);
        assert_eq!(config.joint_name_list(), vec!["shoulder", "elbow"]);
        assert_eq!(config.axis_name_list(), vec!["reach"]);
    }

    #[test]
    fn defaults_applied() {
        let config = RobotConfig::from_toml_str(PLANAR_2J_1A).expect("parse");
        assert_eq!(config.joints[0].stiffness, default_stiffness());
        assert_eq!(config.joints[0].damping, default_damping());
        assert_eq!(config.joints[0].inertia, default_inertia());
        assert_eq!(config.axes[0].force_limit, default_force_limit());
    }

    #[test]
    fn malformed_toml_rejected() {
        let result = RobotConfig::from_toml_str("robot = [not toml");
        assert!(matches!(result, Err(ControlError::ConfigError(_))));
    }

    #[test]
    fn empty_joint_list_rejected() {
        let result = RobotConfig::from_toml_str(
            r#"
robot = "empty"
[[axis]]
name = "a0"
weights = []
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn weight_row_length_mismatch_rejected() {
        let result = RobotConfig::from_toml_str(
            r#"
robot = "bad"
[[joint]]
name = "j0"
[[joint]]
name = "j1"
[[axis]]
name = "a0"
weights = [1.0]
"#,
        );
        let err = result.expect_err("must fail");
        assert!(err.to_string().contains("weight row"));
    }

    #[test]
    fn all_zero_weight_row_rejected() {
        let result = RobotConfig::from_toml_str(
            r#"
robot = "bad"
[[joint]]
name = "j0"
[[axis]]
name = "a0"
weights = [0.0]
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = RobotConfig::from_toml_str(
            r#"
robot = "dup"
[[joint]]
name = "j0"
[[joint]]
name = "j0"
[[axis]]
name = "a0"
weights = [1.0, 1.0]
"#,
        );
        let err = result.expect_err("must fail");
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn negative_gain_rejected() {
        let result = RobotConfig::from_toml_str(
            r#"
robot = "bad"
[[joint]]
name = "j0"
stiffness = -1.0
[[axis]]
name = "a0"
weights = [1.0]
"#,
        );
        assert!(result.is_err());
    }
}
