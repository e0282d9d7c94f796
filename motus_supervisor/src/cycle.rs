//! Cyclic control loop: stage inputs → control step → collect outputs.
//!
//! All buffers crossing the plugin boundary are pre-allocated here at
//! startup (fixed-capacity `heapless::Vec`, sized from the controller's
//! declared cardinalities) and never resized — zero heap allocation in the
//! loop. Pacing uses wall-clock sleep with the measured elapsed time fed
//! to the plugin as `time_delta`; the first tick uses the conventional
//! default delta.

use motus_common::consts::{DEFAULT_TIME_DELTA, MAX_DOFS, MAX_EXTRA_IO};
use motus_common::controller::{ControlError, RobotController};
use motus_common::state::ControlState;
use motus_common::types::DofVariables;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-cycle timing statistics.
///
/// Updated every cycle with no allocation.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Number of budget overruns detected.
    pub overruns: u64,
}

impl CycleStats {
    /// Create a new zeroed stats instance.
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
        }
    }

    /// Record a cycle duration. O(1), no allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns < self.min_cycle_ns {
            self.min_cycle_ns = duration_ns;
        }
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
        self.sum_cycle_ns += duration_ns;
    }

    /// Average cycle time [ns] (returns 0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Errors during supervisor setup or cycle execution.
#[derive(Debug)]
pub enum CycleError {
    /// Controller-reported error (init/shutdown).
    Controller(ControlError),
    /// Declared cardinality exceeds a fixed buffer capacity.
    Capacity {
        /// What overflowed ("joints", "axes", "extra inputs", ...).
        what: &'static str,
        /// Declared count.
        declared: usize,
        /// Fixed capacity.
        capacity: usize,
    },
    /// RT system call failed.
    RtSetup(String),
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Controller(e) => write!(f, "controller error: {e}"),
            Self::Capacity {
                what,
                declared,
                capacity,
            } => write!(f, "too many {what}: {declared} (capacity {capacity})"),
            Self::RtSetup(msg) => write!(f, "RT setup error: {msg}"),
        }
    }
}

impl std::error::Error for CycleError {}

impl From<ControlError> for CycleError {
    fn from(e: ControlError) -> Self {
        Self::Controller(e)
    }
}

// ─── Buffers ────────────────────────────────────────────────────────

/// Pre-allocated DoF and auxiliary buffers owned by the host.
///
/// Sized once from the controller's declared cardinalities, never resized.
/// The host writes raw measures and desired setpoints in, the plugin
/// mutates them in place every step.
#[derive(Debug)]
pub struct ControlBuffers {
    /// Per-joint current measures.
    pub joint_measures: heapless::Vec<DofVariables, MAX_DOFS>,
    /// Per-axis current measures.
    pub axis_measures: heapless::Vec<DofVariables, MAX_DOFS>,
    /// Per-joint desired states.
    pub joint_setpoints: heapless::Vec<DofVariables, MAX_DOFS>,
    /// Per-axis desired states.
    pub axis_setpoints: heapless::Vec<DofVariables, MAX_DOFS>,
    /// Auxiliary inputs, staged before each step.
    pub extra_inputs: heapless::Vec<f64, MAX_EXTRA_IO>,
    /// Auxiliary outputs, collected after each step.
    pub extra_outputs: heapless::Vec<f64, MAX_EXTRA_IO>,
}

fn zeroed_dofs(
    count: usize,
    what: &'static str,
) -> Result<heapless::Vec<DofVariables, MAX_DOFS>, CycleError> {
    let mut buffer = heapless::Vec::new();
    if count > buffer.capacity() {
        return Err(CycleError::Capacity {
            what,
            declared: count,
            capacity: buffer.capacity(),
        });
    }
    for _ in 0..count {
        // Capacity checked above.
        let _ = buffer.push(DofVariables::default());
    }
    Ok(buffer)
}

fn zeroed_scalars(
    count: usize,
    what: &'static str,
) -> Result<heapless::Vec<f64, MAX_EXTRA_IO>, CycleError> {
    let mut buffer = heapless::Vec::new();
    if count > buffer.capacity() {
        return Err(CycleError::Capacity {
            what,
            declared: count,
            capacity: buffer.capacity(),
        });
    }
    for _ in 0..count {
        let _ = buffer.push(0.0);
    }
    Ok(buffer)
}

impl ControlBuffers {
    /// Allocate buffers matching an initialized controller's declared
    /// cardinalities and auxiliary widths.
    pub fn for_controller(controller: &dyn RobotController) -> Result<Self, CycleError> {
        Ok(Self {
            joint_measures: zeroed_dofs(controller.joints_number(), "joints")?,
            axis_measures: zeroed_dofs(controller.axes_number(), "axes")?,
            joint_setpoints: zeroed_dofs(controller.joints_number(), "joints")?,
            axis_setpoints: zeroed_dofs(controller.axes_number(), "axes")?,
            extra_inputs: zeroed_scalars(controller.extra_inputs_number(), "extra inputs")?,
            extra_outputs: zeroed_scalars(controller.extra_outputs_number(), "extra outputs")?,
        })
    }
}

// ─── Supervisor ─────────────────────────────────────────────────────

/// The cyclic control-loop runner.
///
/// Owns the controller instance, the cycle buffers, and the timing
/// statistics. `step()` executes one control pass; `run()` enters the
/// paced loop until the stop flag is raised, then `shutdown()` disposes
/// of the controller exactly once.
pub struct Supervisor {
    controller: Box<dyn RobotController>,
    /// Cycle buffers, host-writable between steps.
    pub buffers: ControlBuffers,
    /// Cycle statistics.
    pub stats: CycleStats,
    cycle_time: Duration,
    stop: Arc<AtomicBool>,
    last_tick: Option<Instant>,
    ended: bool,
}

impl Supervisor {
    /// Initialize the controller from the configuration string and
    /// pre-allocate all cycle buffers.
    ///
    /// # Errors
    /// Propagates controller init failures and capacity overflows; the
    /// controller is not left initialized on error.
    pub fn new(
        mut controller: Box<dyn RobotController>,
        configuration: &str,
        cycle_time_us: u32,
    ) -> Result<Self, CycleError> {
        controller.init(configuration)?;
        let buffers = match ControlBuffers::for_controller(controller.as_ref()) {
            Ok(buffers) => buffers,
            Err(e) => {
                // Give the plugin its teardown even on host-side failure.
                let _ = controller.shutdown();
                return Err(e);
            }
        };

        info!(
            controller = controller.name(),
            version = controller.version(),
            joints = controller.joints_number(),
            axes = controller.axes_number(),
            cycle_time_us,
            "Supervisor ready"
        );

        Ok(Self {
            controller,
            buffers,
            stats: CycleStats::new(),
            cycle_time: Duration::from_micros(cycle_time_us as u64),
            stop: Arc::new(AtomicBool::new(false)),
            last_tick: None,
            ended: false,
        })
    }

    /// Shared stop flag; raising it ends `run()` after the current cycle.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Access the hosted controller.
    pub fn controller(&self) -> &dyn RobotController {
        self.controller.as_ref()
    }

    /// Command a control-state transition, effective from the next step.
    pub fn set_control_state(&mut self, state: ControlState) {
        self.controller.set_control_state(state);
    }

    /// Execute one control pass with the given time delta.
    ///
    /// Stages the auxiliary inputs, runs the plugin step on the owned
    /// buffers, and collects the auxiliary outputs. Never resizes any
    /// buffer. Every pass is recorded in the cycle statistics, whether
    /// driven directly or through `run()`.
    pub fn step(&mut self, time_delta: f64) {
        let step_start = Instant::now();
        self.controller.set_extra_inputs(&self.buffers.extra_inputs);
        self.controller.run_control_step(
            &mut self.buffers.joint_measures,
            &mut self.buffers.axis_measures,
            &mut self.buffers.joint_setpoints,
            &mut self.buffers.axis_setpoints,
            time_delta,
        );
        self.controller
            .get_extra_outputs(&mut self.buffers.extra_outputs);
        self.stats.record(step_start.elapsed().as_nanos() as i64);
    }

    /// Measured time delta since the previous tick, or the conventional
    /// default on the first call.
    fn tick_delta(&mut self, now: Instant) -> f64 {
        let delta = match self.last_tick {
            Some(previous) => now.duration_since(previous).as_secs_f64(),
            None => DEFAULT_TIME_DELTA,
        };
        self.last_tick = Some(now);
        delta
    }

    /// Enter the paced cycle loop until the stop flag is raised.
    ///
    /// Overruns are counted and logged, not fatal: each cycle is
    /// independent and the next one proceeds with the measured delta.
    pub fn run(&mut self) -> Result<(), CycleError> {
        info!("Entering control loop");
        while !self.stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();
            let time_delta = self.tick_delta(cycle_start);

            self.step(time_delta);

            let elapsed = cycle_start.elapsed();
            if elapsed > self.cycle_time {
                self.stats.overruns += 1;
                warn!(
                    actual_ns = elapsed.as_nanos() as i64,
                    budget_ns = self.cycle_time.as_nanos() as i64,
                    "cycle overrun"
                );
            } else {
                std::thread::sleep(self.cycle_time - elapsed);
            }
        }
        debug!(cycles = self.stats.cycle_count, "Control loop stopped");
        Ok(())
    }

    /// Dispose of the controller. Safe to call once; subsequent calls are
    /// no-ops.
    pub fn shutdown(&mut self) -> Result<(), CycleError> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;
        self.controller.shutdown()?;
        info!(
            cycles = self.stats.cycle_count,
            avg_ns = self.stats.avg_cycle_ns(),
            max_ns = self.stats.max_cycle_ns,
            overruns = self.stats.overruns,
            "Supervisor shut down"
        );
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
