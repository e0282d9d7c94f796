//! Linear reference controller.
//!
//! The `LinearController` implements the `RobotController` trait with a
//! linear joint↔axis kinematic map and per-axis impedance setpoint
//! generation. Joints are authoritative for measures (forward map
//! joints→axes); axes are authoritative for setpoints (least-norm inverse
//! axes→joints).
//!
//! Control-state semantics per step:
//! - **Passive** - force setpoints are zeroed and position setpoints track
//!   the measures (compliant posture hold)
//! - **Offset** - raw joint positions are snapshotted once as the new zero;
//!   subsequent reported measures are relative to it
//! - **Calibration** - min/max extrema of reported positions are tracked
//!   and folded into the joint limit model on state exit
//! - **Preprocessing** - a one-shot parameter fit refines per-joint
//!   inertia estimates; no actuation is commanded
//! - **Operation** - full closed loop: impedance force per axis, clamped
//!   to the configured limit, distributed to the joints

mod kinematics;
mod tuning;

pub use kinematics::KinematicMap;
pub use tuning::{CalibrationWindow, JointEstimates, OffsetReference, ParameterFit};

use motus_common::config::RobotConfig;
use motus_common::controller::{ControlError, RobotController};
use motus_common::state::ControlState;
use motus_common::types::DofVariables;
use tracing::{debug, info, warn};

/// Per-axis impedance gains, copied out of the configuration at init.
#[derive(Debug, Clone, Copy)]
struct AxisGains {
    stiffness: f64,
    damping: f64,
    force_limit: f64,
}

/// Reference controller with linear kinematics.
pub struct LinearController {
    version: &'static str,
    initialized: bool,
    robot_name: String,
    joint_names: Vec<String>,
    axis_names: Vec<String>,
    map: Option<KinematicMap>,
    axis_gains: Vec<AxisGains>,
    state: ControlState,
    offset: OffsetReference,
    calibration: CalibrationWindow,
    fit: ParameterFit,
    /// Per-joint (min, max) limits captured by the last calibration window.
    limits: Option<Vec<(f64, f64)>>,
    /// Offset-relative joint positions from the previous step.
    prev_positions: Vec<f64>,
    /// Joint velocities from the previous step.
    prev_velocities: Vec<f64>,
    have_prev: bool,
    extra_in: Vec<f64>,
    extra_out: Vec<f64>,
    cycle_count: u64,
    last_time_delta: f64,
    // Scratch vectors, sized at init — no allocation on the hot path.
    scratch_joint: Vec<f64>,
    scratch_axis: Vec<f64>,
}

impl LinearController {
    /// Create an uninitialized controller instance.
    pub fn new() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            initialized: false,
            robot_name: String::new(),
            joint_names: Vec::new(),
            axis_names: Vec::new(),
            map: None,
            axis_gains: Vec::new(),
            state: ControlState::default(),
            offset: OffsetReference::new(0),
            calibration: CalibrationWindow::new(0),
            fit: ParameterFit::new(&[]),
            limits: None,
            prev_positions: Vec::new(),
            prev_velocities: Vec::new(),
            have_prev: false,
            extra_in: Vec::new(),
            extra_out: Vec::new(),
            cycle_count: 0,
            last_time_delta: 0.0,
            scratch_joint: Vec::new(),
            scratch_axis: Vec::new(),
        }
    }
}

impl Default for LinearController {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy one scalar field out of a DoF slice.
fn gather(src: &[DofVariables], n: usize, dst: &mut [f64], get: impl Fn(&DofVariables) -> f64) {
    for j in 0..n.min(src.len()).min(dst.len()) {
        dst[j] = get(&src[j]);
    }
}

/// Write one scalar field back into a DoF slice.
fn scatter(dst: &mut [DofVariables], n: usize, src: &[f64], set: impl Fn(&mut DofVariables, f64)) {
    for j in 0..n.min(src.len()).min(dst.len()) {
        set(&mut dst[j], src[j]);
    }
}

impl RobotController for LinearController {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn version(&self) -> &'static str {
        self.version
    }

    fn init(&mut self, configuration: &str) -> Result<(), ControlError> {
        if self.initialized {
            return Err(ControlError::LifecycleError(
                "controller is already initialized".to_string(),
            ));
        }

        // Build everything into locals first: a failed init leaves no
        // externally observable partial state.
        let config = RobotConfig::from_toml_str(configuration)?;
        let joints_number = config.joints.len();

        let rows: Vec<Vec<f64>> = config.axes.iter().map(|a| a.weights.clone()).collect();
        let map = KinematicMap::new(rows);

        let axis_gains: Vec<AxisGains> = config
            .axes
            .iter()
            .map(|a| AxisGains {
                stiffness: a.stiffness,
                damping: a.damping,
                force_limit: a.force_limit,
            })
            .collect();

        let defaults: Vec<JointEstimates> = config
            .joints
            .iter()
            .map(|j| JointEstimates {
                inertia: j.inertia,
                stiffness: j.stiffness,
                damping: j.damping,
            })
            .collect();

        info!(
            robot = %config.robot,
            joints = joints_number,
            axes = config.axes.len(),
            extra_inputs = config.extra_inputs.len(),
            extra_outputs = config.extra_outputs.len(),
            "Initializing linear controller"
        );

        self.robot_name = config.robot.clone();
        self.joint_names = config.joint_name_list();
        self.axis_names = config.axis_name_list();
        self.axis_gains = axis_gains;
        self.offset = OffsetReference::new(joints_number);
        self.calibration = CalibrationWindow::new(joints_number);
        self.fit = ParameterFit::new(&defaults);
        self.limits = None;
        self.prev_positions = vec![0.0; joints_number];
        self.prev_velocities = vec![0.0; joints_number];
        self.have_prev = false;
        self.extra_in = vec![0.0; config.extra_inputs.len()];
        self.extra_out = vec![0.0; config.extra_outputs.len()];
        self.scratch_joint = vec![0.0; joints_number];
        self.scratch_axis = vec![0.0; config.axes.len()];
        self.map = Some(map);
        self.state = ControlState::Passive;
        self.cycle_count = 0;
        self.last_time_delta = 0.0;
        self.initialized = true;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ControlError> {
        info!(robot = %self.robot_name, "Shutting down linear controller");
        self.map = None;
        self.joint_names.clear();
        self.axis_names.clear();
        self.axis_gains.clear();
        self.extra_in.clear();
        self.extra_out.clear();
        self.initialized = false;
        Ok(())
    }

    fn joints_number(&self) -> usize {
        self.joint_names.len()
    }

    fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    fn axes_number(&self) -> usize {
        self.axis_names.len()
    }

    fn axis_names(&self) -> &[String] {
        &self.axis_names
    }

    fn set_control_state(&mut self, state: ControlState) {
        if state == self.state {
            // Idempotent: re-setting the active state is a no-op.
            return;
        }

        // Exit action: fold calibration extrema into the limit model.
        if self.state == ControlState::Calibration {
            if let Some(limits) = self.calibration.limits() {
                debug!(?limits, "Calibration window closed");
                self.limits = Some(limits);
            }
        }

        // Entry action.
        match state {
            ControlState::Offset => self.offset.arm(),
            ControlState::Calibration => self.calibration.reset(),
            ControlState::Preprocessing => self.fit.schedule(),
            ControlState::Passive | ControlState::Operation => {}
        }

        info!(from = %self.state, to = %state, "Control state transition");
        self.state = state;
    }

    fn run_control_step(
        &mut self,
        joint_measures: &mut [DofVariables],
        axis_measures: &mut [DofVariables],
        joint_setpoints: &mut [DofVariables],
        axis_setpoints: &mut [DofVariables],
        time_delta: f64,
    ) {
        let Self {
            map: Some(map),
            axis_gains,
            state,
            offset,
            calibration,
            fit,
            limits,
            prev_positions,
            prev_velocities,
            have_prev,
            extra_in,
            extra_out,
            cycle_count,
            last_time_delta,
            scratch_joint,
            scratch_axis,
            ..
        } = self
        else {
            warn!("run_control_step called before init; ignoring");
            return;
        };

        let nj = map
            .joints_number()
            .min(joint_measures.len())
            .min(joint_setpoints.len());
        let na = map
            .axes_number()
            .min(axis_measures.len())
            .min(axis_setpoints.len());

        // ═══ MEASURES ═══
        // Raw joint positions, then offset capture and relative rewrite.
        gather(joint_measures, nj, scratch_joint, |v| v.position);
        if offset.maybe_capture(&scratch_joint[..nj]) {
            // The reported positions change basis here; restart the
            // finite differences so no derivative spans both bases.
            *have_prev = false;
            info!("Offset reference captured");
        }
        for j in 0..nj {
            joint_measures[j].position = offset.relative(j, scratch_joint[j]);
        }

        // Finite-difference velocity/acceleration. Held when time_delta
        // is not positive or no previous sample exists — never a divide.
        if time_delta > 0.0 && *have_prev {
            for j in 0..nj {
                let velocity = (joint_measures[j].position - prev_positions[j]) / time_delta;
                joint_measures[j].acceleration = (velocity - prev_velocities[j]) / time_delta;
                joint_measures[j].velocity = velocity;
            }
        }

        // State bookkeeping on reported (offset-relative) positions.
        match *state {
            ControlState::Calibration => {
                gather(joint_measures, nj, scratch_joint, |v| v.position);
                calibration.observe(&scratch_joint[..nj]);
            }
            ControlState::Preprocessing => {
                gather(joint_measures, nj, scratch_joint, |v| v.force);
                let mut accels = [0.0; motus_common::consts::MAX_DOFS];
                gather(joint_measures, nj, &mut accels, |v| v.acceleration);
                if fit.maybe_fit(&scratch_joint[..nj], &accels[..nj]) {
                    info!("Preprocessing parameter fit completed");
                }
            }
            _ => {}
        }

        // Parameter fields on the joint measures come from the fit
        // (configured defaults until Preprocessing ran).
        for j in 0..nj {
            if let Some(est) = fit.get(j) {
                joint_measures[j].inertia = est.inertia;
                joint_measures[j].stiffness = est.stiffness;
                joint_measures[j].damping = est.damping;
            }
        }

        // Forward kinematics: joints → axes, field by field.
        gather(joint_measures, nj, scratch_joint, |v| v.position);
        map.forward(&scratch_joint[..nj], &mut scratch_axis[..na]);
        scatter(axis_measures, na, scratch_axis, |v, x| v.position = x);

        gather(joint_measures, nj, scratch_joint, |v| v.velocity);
        map.forward(&scratch_joint[..nj], &mut scratch_axis[..na]);
        scatter(axis_measures, na, scratch_axis, |v, x| v.velocity = x);

        gather(joint_measures, nj, scratch_joint, |v| v.acceleration);
        map.forward(&scratch_joint[..nj], &mut scratch_axis[..na]);
        scatter(axis_measures, na, scratch_axis, |v, x| v.acceleration = x);

        // The force-direction conversions hold previous values for
        // singular rows, so the scratch is seeded with the current field.
        gather(axis_measures, na, scratch_axis, |v| v.force);
        gather(joint_measures, nj, scratch_joint, |v| v.force);
        map.force_to_axes(&scratch_joint[..nj], &mut scratch_axis[..na]);
        scatter(axis_measures, na, scratch_axis, |v, x| v.force = x);

        gather(axis_measures, na, scratch_axis, |v| v.inertia);
        gather(joint_measures, nj, scratch_joint, |v| v.inertia);
        map.force_to_axes(&scratch_joint[..nj], &mut scratch_axis[..na]);
        scatter(axis_measures, na, scratch_axis, |v, x| v.inertia = x);

        for a in 0..na {
            axis_measures[a].stiffness = axis_gains[a].stiffness;
            axis_measures[a].damping = axis_gains[a].damping;
        }

        // ═══ SETPOINTS ═══
        if *state == ControlState::Passive {
            // Compliant: setpoints mirror the measures, no corrective force.
            for j in 0..nj {
                joint_setpoints[j].position = joint_measures[j].position;
                joint_setpoints[j].velocity = joint_measures[j].velocity;
                joint_setpoints[j].acceleration = joint_measures[j].acceleration;
                joint_setpoints[j].force = 0.0;
            }
            for a in 0..na {
                axis_setpoints[a].position = axis_measures[a].position;
                axis_setpoints[a].velocity = axis_measures[a].velocity;
                axis_setpoints[a].acceleration = axis_measures[a].acceleration;
                axis_setpoints[a].force = 0.0;
            }
        } else {
            // Inverse kinematics: axis setpoints → joint setpoints. The
            // joint scratch is seeded with the current setpoints so joints
            // served only by singular rows hold their previous values.
            gather(joint_setpoints, nj, scratch_joint, |v| v.position);
            gather(axis_setpoints, na, scratch_axis, |v| v.position);
            map.inverse(&scratch_axis[..na], &mut scratch_joint[..nj]);
            if let Some(limits) = limits {
                for j in 0..nj.min(limits.len()) {
                    let (lo, hi) = limits[j];
                    scratch_joint[j] = scratch_joint[j].clamp(lo, hi);
                }
            }
            scatter(joint_setpoints, nj, scratch_joint, |v, x| v.position = x);

            gather(joint_setpoints, nj, scratch_joint, |v| v.velocity);
            gather(axis_setpoints, na, scratch_axis, |v| v.velocity);
            map.inverse(&scratch_axis[..na], &mut scratch_joint[..nj]);
            scatter(joint_setpoints, nj, scratch_joint, |v, x| v.velocity = x);

            gather(joint_setpoints, nj, scratch_joint, |v| v.acceleration);
            gather(axis_setpoints, na, scratch_axis, |v| v.acceleration);
            map.inverse(&scratch_axis[..na], &mut scratch_joint[..nj]);
            scatter(joint_setpoints, nj, scratch_joint, |v, x| v.acceleration = x);

            if state.allows_actuation() {
                // Impedance law per axis, clamped to the configured limit.
                for a in 0..na {
                    let gains = axis_gains[a];
                    let force = gains.stiffness
                        * (axis_setpoints[a].position - axis_measures[a].position)
                        + gains.damping * (axis_setpoints[a].velocity - axis_measures[a].velocity)
                        + axis_setpoints[a].force;
                    scratch_axis[a] = force.clamp(-gains.force_limit, gains.force_limit);
                    axis_setpoints[a].force = scratch_axis[a];
                }
                map.force_to_joints(&scratch_axis[..na], &mut scratch_joint[..nj]);
                scatter(joint_setpoints, nj, scratch_joint, |v, x| v.force = x);
            } else {
                // Offset/Calibration/Preprocessing: conversions happen for
                // observability, actuation stays suppressed.
                for a in 0..na {
                    axis_setpoints[a].force = 0.0;
                }
                for j in 0..nj {
                    joint_setpoints[j].force = 0.0;
                }
            }
        }

        // Parameter fields on setpoints mirror the gains in use.
        for j in 0..nj {
            if let Some(est) = fit.get(j) {
                joint_setpoints[j].inertia = est.inertia;
                joint_setpoints[j].stiffness = est.stiffness;
                joint_setpoints[j].damping = est.damping;
            }
        }
        for a in 0..na {
            axis_setpoints[a].inertia = axis_measures[a].inertia;
            axis_setpoints[a].stiffness = axis_gains[a].stiffness;
            axis_setpoints[a].damping = axis_gains[a].damping;
        }

        // ═══ BOOKKEEPING ═══
        for j in 0..nj {
            prev_positions[j] = joint_measures[j].position;
            prev_velocities[j] = joint_measures[j].velocity;
        }
        *have_prev = true;
        *cycle_count += 1;
        *last_time_delta = time_delta;

        // Auxiliary outputs: cycle diagnostics, then staged inputs echoed.
        let mut slot = 0;
        let diagnostics = [
            *cycle_count as f64,
            time_delta,
            *state as u8 as f64,
        ];
        for value in diagnostics {
            if slot >= extra_out.len() {
                break;
            }
            extra_out[slot] = value;
            slot += 1;
        }
        for value in extra_in.iter() {
            if slot >= extra_out.len() {
                break;
            }
            extra_out[slot] = *value;
            slot += 1;
        }

        debug!(
            cycle = *cycle_count,
            dt = time_delta,
            state = %*state,
            "control step complete"
        );
    }

    fn extra_inputs_number(&self) -> usize {
        self.extra_in.len()
    }

    fn set_extra_inputs(&mut self, inputs: &[f64]) {
        let n = self.extra_in.len().min(inputs.len());
        self.extra_in[..n].copy_from_slice(&inputs[..n]);
    }

    fn extra_outputs_number(&self) -> usize {
        self.extra_out.len()
    }

    fn get_extra_outputs(&self, outputs: &mut [f64]) {
        let n = self.extra_out.len().min(outputs.len());
        outputs[..n].copy_from_slice(&self.extra_out[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motus_common::consts::POSITION_TOLERANCE;

    const PLANAR_CONFIG: &str = r#"
robot = "planar"
extra_inputs = ["trigger"]
extra_outputs = ["cycle", "dt", "state", "trigger_echo"]

[[joint]]
name = "shoulder"

[[joint]]
name = "elbow"

[[axis]]
name = "reach"
weights = [1.0, 1.0]
stiffness = 100.0
damping = 10.0
force_limit = 50.0
"#;

    fn ready_controller() -> LinearController {
        let mut ctl = LinearController::new();
        ctl.init(PLANAR_CONFIG).expect("init");
        ctl
    }

    fn buffers(
        nj: usize,
        na: usize,
    ) -> (
        Vec<DofVariables>,
        Vec<DofVariables>,
        Vec<DofVariables>,
        Vec<DofVariables>,
    ) {
        (
            vec![DofVariables::default(); nj],
            vec![DofVariables::default(); na],
            vec![DofVariables::default(); nj],
            vec![DofVariables::default(); na],
        )
    }

    #[test]
    fn init_fixes_cardinalities_and_names() {
        let ctl = ready_controller();
        assert_eq!(ctl.joints_number(), 2);
        assert_eq!(ctl.axes_number(), 1);
        assert_eq!(ctl.joint_names(), ["shoulder", "elbow"]);
        assert_eq!(ctl.axis_names(), ["reach"]);
        assert_eq!(ctl.extra_inputs_number(), 1);
        assert_eq!(ctl.extra_outputs_number(), 4);
    }

    #[test]
    fn init_failure_leaves_no_partial_state() {
        let mut ctl = LinearController::new();
        assert!(ctl.init("robot = [broken").is_err());
        assert_eq!(ctl.joints_number(), 0);
        assert_eq!(ctl.axes_number(), 0);
        assert_eq!(ctl.extra_inputs_number(), 0);
        // A failed init does not consume the one valid init.
        assert!(ctl.init(PLANAR_CONFIG).is_ok());
    }

    #[test]
    fn double_init_rejected() {
        let mut ctl = ready_controller();
        assert!(matches!(
            ctl.init(PLANAR_CONFIG),
            Err(ControlError::LifecycleError(_))
        ));
    }

    #[test]
    fn step_before_init_is_harmless() {
        let mut ctl = LinearController::new();
        let (mut jm, mut am, mut js, mut asp) = buffers(2, 1);
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);
        assert_eq!(jm[0], DofVariables::default());
    }

    #[test]
    fn operation_scenario_two_joints_one_axis() {
        // Planar reach: joints [0.1, 0.2], axis setpoint 0.3, dt = 0.01.
        let mut ctl = ready_controller();
        ctl.set_control_state(ControlState::Operation);

        let (mut jm, mut am, mut js, mut asp) = buffers(2, 1);
        jm[0].position = 0.1;
        jm[1].position = 0.2;
        asp[0].position = 0.3;
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);

        // Measures reconciled: axis = j0 + j1.
        assert!((am[0].position - 0.3).abs() < POSITION_TOLERANCE);

        // Joint setpoints consistent with the declared forward map.
        let forward = js[0].position + js[1].position;
        assert!((forward - 0.3).abs() < POSITION_TOLERANCE);

        // Operation commands a clamped impedance force.
        assert!(asp[0].force.abs() <= 50.0);
        assert!(js[0].force.is_finite() && js[1].force.is_finite());
    }

    #[test]
    fn offset_scenario_reads_relative_to_captured_zero() {
        let mut ctl = ready_controller();
        ctl.set_control_state(ControlState::Offset);

        let (mut jm, mut am, mut js, mut asp) = buffers(2, 1);
        jm[0].position = 1.0;
        jm[1].position = -0.5;
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);
        // The capture step itself reads zero.
        assert_eq!(jm[0].position, 0.0);
        assert_eq!(jm[1].position, 0.0);

        // A measurement equal to the captured reference reads as zero.
        jm[0].position = 1.0;
        jm[1].position = -0.5;
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);
        assert_eq!(jm[0].position, 0.0);
        assert_eq!(jm[1].position, 0.0);

        // And a shifted measurement reads as the shift.
        jm[0].position = 1.25;
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);
        assert!((jm[0].position - 0.25).abs() < POSITION_TOLERANCE);
    }

    #[test]
    fn offset_capture_does_not_spike_derivatives() {
        let mut ctl = ready_controller();
        let (mut jm, mut am, mut js, mut asp) = buffers(2, 1);

        // Two steps at a steady pose establish the finite differences.
        jm[0].position = 1.0;
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);
        jm[0].position = 1.0;
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);
        assert_eq!(jm[0].velocity, 0.0);

        // The capture step rebases positions from 1.0 to 0.0; the
        // derivatives must not difference across the rebase.
        ctl.set_control_state(ControlState::Offset);
        jm[0].position = 1.0;
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);
        assert_eq!(jm[0].position, 0.0);
        assert!(jm[0].velocity.abs() < POSITION_TOLERANCE);
        assert!(jm[0].acceleration.abs() < POSITION_TOLERANCE);
    }

    #[test]
    fn tiny_weight_axis_holds_joint_setpoints() {
        const TINY_CONFIG: &str = r#"
robot = "tiny"

[[joint]]
name = "j0"

[[joint]]
name = "j1"

[[axis]]
name = "a0"
weights = [1e-7, 1e-7]
"#;
        let mut ctl = LinearController::new();
        ctl.init(TINY_CONFIG).expect("init");
        ctl.set_control_state(ControlState::Operation);

        // The weight row passes validation but is below the singular
        // threshold; the previous joint setpoints must survive the step.
        let (mut jm, mut am, mut js, mut asp) = buffers(2, 1);
        js[0].position = 0.5;
        js[1].position = -0.25;
        asp[0].position = 0.3;
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);
        assert_eq!(js[0].position, 0.5);
        assert_eq!(js[1].position, -0.25);
        for v in js.iter().chain(asp.iter()) {
            assert!(!v.is_degenerate());
        }
    }

    #[test]
    fn passive_suppresses_force_and_tracks_measures() {
        let mut ctl = ready_controller();
        let (mut jm, mut am, mut js, mut asp) = buffers(2, 1);
        jm[0].position = 0.4;
        jm[1].position = 0.1;
        asp[0].position = 5.0; // Ignored in Passive.
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);

        assert_eq!(js[0].force, 0.0);
        assert_eq!(js[1].force, 0.0);
        assert_eq!(asp[0].force, 0.0);
        assert!((js[0].position - jm[0].position).abs() < POSITION_TOLERANCE);
        assert!((asp[0].position - am[0].position).abs() < POSITION_TOLERANCE);
    }

    #[test]
    fn non_positive_time_delta_never_faults() {
        let mut ctl = ready_controller();
        ctl.set_control_state(ControlState::Operation);
        let (mut jm, mut am, mut js, mut asp) = buffers(2, 1);
        jm[0].position = 0.1;
        asp[0].position = 0.2;

        for dt in [0.01, 0.0, -0.5, 0.01] {
            jm[0].position += 0.01;
            ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, dt);
            for v in jm.iter().chain(am.iter()).chain(js.iter()).chain(asp.iter()) {
                assert!(!v.is_degenerate(), "NaN/Inf leaked at dt={dt}");
            }
        }
    }

    #[test]
    fn set_state_is_idempotent() {
        let mut ctl_once = ready_controller();
        let mut ctl_twice = ready_controller();
        ctl_once.set_control_state(ControlState::Operation);
        ctl_twice.set_control_state(ControlState::Operation);
        ctl_twice.set_control_state(ControlState::Operation);

        let (mut jm1, mut am1, mut js1, mut asp1) = buffers(2, 1);
        let (mut jm2, mut am2, mut js2, mut asp2) = buffers(2, 1);
        jm1[0].position = 0.1;
        jm2[0].position = 0.1;
        asp1[0].position = 0.3;
        asp2[0].position = 0.3;
        ctl_once.run_control_step(&mut jm1, &mut am1, &mut js1, &mut asp1, 0.01);
        ctl_twice.run_control_step(&mut jm2, &mut am2, &mut js2, &mut asp2, 0.01);

        assert_eq!(js1, js2);
        assert_eq!(asp1, asp2);
    }

    #[test]
    fn calibration_limits_clamp_setpoints_after_exit() {
        let mut ctl = ready_controller();
        ctl.set_control_state(ControlState::Calibration);

        let (mut jm, mut am, mut js, mut asp) = buffers(2, 1);
        // Sweep the joints through [-0.2, 0.2].
        for pos in [-0.2, 0.0, 0.2] {
            jm[0].position = pos;
            jm[1].position = pos;
            ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);
        }
        ctl.set_control_state(ControlState::Operation);

        // An axis setpoint far outside the calibrated range gets clamped.
        jm[0].position = 0.0;
        jm[1].position = 0.0;
        asp[0].position = 100.0;
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);
        assert!(js[0].position <= 0.2 + POSITION_TOLERANCE);
        assert!(js[1].position <= 0.2 + POSITION_TOLERANCE);
    }

    #[test]
    fn preprocessing_fits_inertia_once() {
        let mut ctl = ready_controller();
        ctl.set_control_state(ControlState::Preprocessing);

        let (mut jm, mut am, mut js, mut asp) = buffers(2, 1);
        jm[0].force = 4.0;
        jm[0].acceleration = 2.0;
        jm[1].force = 1.0;
        jm[1].acceleration = 1.0;
        // dt <= 0 keeps the caller-provided acceleration for the fit.
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.0);

        assert!((jm[0].inertia - 2.0).abs() < 1e-12);
        assert!((jm[1].inertia - 1.0).abs() < 1e-12);
    }

    #[test]
    fn auxiliary_channel_round_trip() {
        let mut ctl = ready_controller();
        ctl.set_extra_inputs(&[42.5]);

        let (mut jm, mut am, mut js, mut asp) = buffers(2, 1);
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);

        let mut outputs = vec![0.0; ctl.extra_outputs_number()];
        ctl.get_extra_outputs(&mut outputs);
        assert_eq!(outputs.len(), 4);
        assert_eq!(outputs[0], 1.0); // cycle count
        assert_eq!(outputs[1], 0.01); // time delta
        assert_eq!(outputs[2], ControlState::Passive as u8 as f64);
        assert_eq!(outputs[3], 42.5); // staged input echoed
    }

    #[test]
    fn narrow_auxiliary_buffers_do_not_fault() {
        let mut ctl = ready_controller();
        ctl.set_extra_inputs(&[]); // Narrower than declared width.

        let (mut jm, mut am, mut js, mut asp) = buffers(2, 1);
        ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);

        let mut narrow = [0.0; 1];
        ctl.get_extra_outputs(&mut narrow);
        assert_eq!(narrow[0], 1.0);
    }

    #[test]
    fn names_stable_across_lifetime() {
        let mut ctl = ready_controller();
        let joints_before = ctl.joint_names().to_vec();
        let axes_before = ctl.axis_names().to_vec();

        let (mut jm, mut am, mut js, mut asp) = buffers(2, 1);
        for state in [
            ControlState::Offset,
            ControlState::Calibration,
            ControlState::Preprocessing,
            ControlState::Operation,
            ControlState::Passive,
        ] {
            ctl.set_control_state(state);
            ctl.run_control_step(&mut jm, &mut am, &mut js, &mut asp, 0.01);
            assert_eq!(ctl.joint_names(), joints_before.as_slice());
            assert_eq!(ctl.axis_names(), axes_before.as_slice());
            assert_eq!(ctl.joints_number(), 2);
            assert_eq!(ctl.axes_number(), 1);
        }

        ctl.shutdown().expect("shutdown");
    }
}
