//! Control-state enumeration.
//!
//! Exactly one `ControlState` is active per controller instance at any
//! time. Transitions are commanded externally by the supervisor and take
//! effect before the next control step; the plugin interprets the state,
//! it never rejects one. All states are reachable from all others.

use serde::{Deserialize, Serialize};

/// Behavioral mode of a robot controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ControlState {
    /// Fully compliant behavior — no corrective force is applied.
    Passive = 0,
    /// Capture current measurements as the reference (zero) point.
    Offset = 1,
    /// Observe measurement extrema (min/max) to refine limits.
    Calibration = 2,
    /// One-shot derivation of internal controller parameters.
    Preprocessing = 3,
    /// Normal closed-loop operation.
    Operation = 4,
}

/// Total number of control states.
pub const CONTROL_STATES_NUMBER: usize = 5;

impl ControlState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Passive),
            1 => Some(Self::Offset),
            2 => Some(Self::Calibration),
            3 => Some(Self::Preprocessing),
            4 => Some(Self::Operation),
            _ => None,
        }
    }

    /// True if the controller is allowed to command corrective force.
    #[inline]
    pub const fn allows_actuation(&self) -> bool {
        matches!(self, Self::Operation)
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::Passive
    }
}

impl std::fmt::Display for ControlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Passive => "passive",
            Self::Offset => "offset",
            Self::Calibration => "calibration",
            Self::Preprocessing => "preprocessing",
            Self::Operation => "operation",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_passive() {
        assert_eq!(ControlState::default(), ControlState::Passive);
    }

    #[test]
    fn from_u8_round_trip() {
        for raw in 0..CONTROL_STATES_NUMBER as u8 {
            let state = ControlState::from_u8(raw).expect("valid state value");
            assert_eq!(state as u8, raw);
        }
        assert_eq!(ControlState::from_u8(CONTROL_STATES_NUMBER as u8), None);
        assert_eq!(ControlState::from_u8(255), None);
    }

    #[test]
    fn only_operation_actuates() {
        assert!(ControlState::Operation.allows_actuation());
        assert!(!ControlState::Passive.allows_actuation());
        assert!(!ControlState::Offset.allows_actuation());
        assert!(!ControlState::Calibration.allows_actuation());
        assert!(!ControlState::Preprocessing.allows_actuation());
    }

    #[test]
    fn serde_snake_case() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Wrap {
            state: ControlState,
        }
        let w: Wrap = toml::from_str("state = \"calibration\"").expect("parse");
        assert_eq!(w.state, ControlState::Calibration);
        let s = toml::to_string(&Wrap {
            state: ControlState::Preprocessing,
        })
        .expect("serialize");
        assert!(s.contains("preprocessing"));
    }
}
