//! State-dependent measurement bookkeeping.
//!
//! Small per-joint state carried across control steps:
//! - `OffsetReference` - snapshot zero point captured in the Offset state
//! - `CalibrationWindow` - min/max extrema observed in the Calibration state
//! - `ParameterFit` - one-shot parameter estimates from Preprocessing

/// Captured measurement reference (zero point).
///
/// Armed on Offset entry; the snapshot is taken as a single, complete
/// action on the first step that sees it armed, not an ongoing average.
#[derive(Debug, Clone)]
pub struct OffsetReference {
    reference: Vec<f64>,
    armed: bool,
}

impl OffsetReference {
    /// New reference with all zeros for `joints_number` joints.
    pub fn new(joints_number: usize) -> Self {
        Self {
            reference: vec![0.0; joints_number],
            armed: false,
        }
    }

    /// Arm a new snapshot; taken on the next control step.
    pub fn arm(&mut self) {
        self.armed = true;
    }

    /// Capture `raw_positions` as the new zero if a snapshot is armed.
    /// Returns true when a capture happened.
    pub fn maybe_capture(&mut self, raw_positions: &[f64]) -> bool {
        if !self.armed {
            return false;
        }
        let n = self.reference.len().min(raw_positions.len());
        self.reference[..n].copy_from_slice(&raw_positions[..n]);
        self.armed = false;
        true
    }

    /// Offset-relative position for joint `index`.
    #[inline]
    pub fn relative(&self, index: usize, raw: f64) -> f64 {
        raw - self.reference.get(index).copied().unwrap_or(0.0)
    }
}

/// Calibration extrema window.
///
/// Tracks per-joint min/max of reported positions while Calibration is
/// active. The window starts at state entry; the captured limits are taken
/// when the state is left.
#[derive(Debug, Clone)]
pub struct CalibrationWindow {
    min: Vec<f64>,
    max: Vec<f64>,
    samples: u64,
}

impl CalibrationWindow {
    /// New, empty window for `joints_number` joints.
    pub fn new(joints_number: usize) -> Self {
        Self {
            min: vec![f64::INFINITY; joints_number],
            max: vec![f64::NEG_INFINITY; joints_number],
            samples: 0,
        }
    }

    /// Discard collected extrema and start a fresh window.
    pub fn reset(&mut self) {
        for m in self.min.iter_mut() {
            *m = f64::INFINITY;
        }
        for m in self.max.iter_mut() {
            *m = f64::NEG_INFINITY;
        }
        self.samples = 0;
    }

    /// Fold one position sample per joint into the window.
    pub fn observe(&mut self, positions: &[f64]) {
        let n = self.min.len().min(positions.len());
        for j in 0..n {
            if positions[j] < self.min[j] {
                self.min[j] = positions[j];
            }
            if positions[j] > self.max[j] {
                self.max[j] = positions[j];
            }
        }
        self.samples += 1;
    }

    /// Per-joint (min, max) limits, or `None` when no samples were seen.
    pub fn limits(&self) -> Option<Vec<(f64, f64)>> {
        if self.samples == 0 {
            return None;
        }
        Some(
            self.min
                .iter()
                .zip(self.max.iter())
                .map(|(lo, hi)| (*lo, *hi))
                .collect(),
        )
    }
}

/// Per-joint parameter estimates derived during Preprocessing.
#[derive(Debug, Clone, Copy)]
pub struct JointEstimates {
    /// Estimated apparent inertia
    pub inertia: f64,
    /// Estimated stiffness
    pub stiffness: f64,
    /// Estimated damping
    pub damping: f64,
}

/// One-shot parameter fit.
///
/// Runs once per Preprocessing entry: derives per-joint estimates from the
/// current measures, falling back to the configured defaults when a sample
/// carries no usable signal.
#[derive(Debug, Clone)]
pub struct ParameterFit {
    estimates: Vec<JointEstimates>,
    pending: bool,
}

impl ParameterFit {
    /// New fit seeded with configured defaults.
    pub fn new(defaults: &[JointEstimates]) -> Self {
        Self {
            estimates: defaults.to_vec(),
            pending: false,
        }
    }

    /// Schedule a fit on the next control step.
    pub fn schedule(&mut self) {
        self.pending = true;
    }

    /// Derive estimates from one measurement sample if a fit is pending.
    ///
    /// `forces` and `accelerations` are index-aligned with the joints.
    /// Returns true when the fit ran.
    pub fn maybe_fit(&mut self, forces: &[f64], accelerations: &[f64]) -> bool {
        if !self.pending {
            return false;
        }
        let n = self
            .estimates
            .len()
            .min(forces.len())
            .min(accelerations.len());
        for j in 0..n {
            // inertia ≈ |force / acceleration| when the sample excites the joint
            let accel = accelerations[j];
            if accel.abs() > 1e-9 {
                let estimate = (forces[j] / accel).abs();
                if estimate.is_finite() {
                    self.estimates[j].inertia = estimate;
                }
            }
        }
        self.pending = false;
        true
    }

    /// Current estimate for joint `index` (configured default until a fit ran).
    #[inline]
    pub fn get(&self, index: usize) -> Option<&JointEstimates> {
        self.estimates.get(index)
    }
}
