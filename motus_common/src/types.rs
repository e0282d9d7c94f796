//! Per-DoF control variable struct.
//!
//! This module defines `DofVariables`, the seven-field variable set carried
//! for every degree of freedom in both coordinate spaces. The same struct is
//! used for joint measures, axis measures, joint setpoints, and axis
//! setpoints; only the semantic meaning of the fields changes per set
//! (`force` is joint torque in joint space, end-effector force in axis
//! space).

use static_assertions::const_assert_eq;

/// Control variables for a single degree of freedom (joint or axis).
///
/// All seven fields are always populated after any control step that
/// touches the containing set; a plugin never leaves a field stale while
/// updating its siblings. Values are SI-consistent within the plugin's
/// domain.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct DofVariables {
    /// Position [user units]
    pub position: f64,
    /// Velocity [user units/s]
    pub velocity: f64,
    /// Force — joint torque or effector force depending on the set
    pub force: f64,
    /// Acceleration [user units/s²]
    pub acceleration: f64,
    /// Apparent inertia
    pub inertia: f64,
    /// Stiffness (impedance spring term)
    pub stiffness: f64,
    /// Damping (impedance viscous term)
    pub damping: f64,
}

// Layout is part of the contract: 7 × f64, no padding.
const_assert_eq!(core::mem::size_of::<DofVariables>(), 56);

impl DofVariables {
    /// Create a variable set with a known position, everything else zero.
    pub const fn at_position(position: f64) -> Self {
        Self {
            position,
            velocity: 0.0,
            force: 0.0,
            acceleration: 0.0,
            inertia: 0.0,
            stiffness: 0.0,
            damping: 0.0,
        }
    }

    /// Reset all fields to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True if any field is NaN or infinite.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !(self.position.is_finite()
            && self.velocity.is_finite()
            && self.force.is_finite()
            && self.acceleration.is_finite()
            && self.inertia.is_finite()
            && self.stiffness.is_finite()
            && self.damping.is_finite())
    }
}
