//! Linear joint↔axis kinematic mapping.
//!
//! Each axis carries a weight row over the joints: `axis = w · joints`.
//! The inverse direction distributes axis values back onto the joints with
//! the least-norm solution `joints += wᵀ · axis / (w·w)`, accumulated over
//! all axes. Forward∘inverse reproduces axis values exactly; the joint
//! round-trip holds when the weight rows are mutually orthogonal and span
//! the joint space.
//!
//! Singular rows never divide: the directions that scale by a row norm
//! (`inverse`, `force_to_axes`) skip them entirely, and entries reachable
//! only through singular rows keep the caller's previous content rather
//! than being overwritten.

/// Weight rows below this squared-norm are treated as singular.
const SINGULAR_NORM2: f64 = 1e-12;

/// Linear kinematic map between joint space and axis space.
///
/// Row shapes are fixed at construction and never resized.
#[derive(Debug, Clone)]
pub struct KinematicMap {
    /// One weight row per axis, each with one entry per joint.
    rows: Vec<Vec<f64>>,
    /// Squared norm of each row, precomputed at construction.
    norms2: Vec<f64>,
    joints_number: usize,
}

impl KinematicMap {
    /// Build a map from per-axis weight rows.
    ///
    /// Rows are assumed validated (uniform length, finite); validation
    /// happens in `RobotConfig::validate`.
    pub fn new(rows: Vec<Vec<f64>>) -> Self {
        let joints_number = rows.first().map(Vec::len).unwrap_or(0);
        let norms2 = rows
            .iter()
            .map(|row| row.iter().map(|w| w * w).sum())
            .collect();
        Self {
            rows,
            norms2,
            joints_number,
        }
    }

    /// Number of joints covered by the map.
    #[inline]
    pub fn joints_number(&self) -> usize {
        self.joints_number
    }

    /// Number of axes covered by the map.
    #[inline]
    pub fn axes_number(&self) -> usize {
        self.rows.len()
    }

    /// Forward map: `axes[a] = rows[a] · joints`.
    ///
    /// Used for positions, velocities and accelerations. O(axes × joints),
    /// no allocation.
    pub fn forward(&self, joints: &[f64], axes: &mut [f64]) {
        for (a, row) in self.rows.iter().enumerate() {
            if a >= axes.len() {
                break;
            }
            let mut acc = 0.0;
            for (j, w) in row.iter().enumerate() {
                if j >= joints.len() {
                    break;
                }
                acc += w * joints[j];
            }
            axes[a] = acc;
        }
    }

    /// Inverse map: least-norm distribution of axis values onto joints.
    ///
    /// Each usable axis adds `wᵀ · axis / (w·w)`. Singular rows are
    /// skipped, and joints reached only through singular rows are left
    /// untouched — the caller's previous content is held, not zeroed.
    pub fn inverse(&self, axes: &[f64], joints: &mut [f64]) {
        for (j, joint) in joints.iter_mut().enumerate() {
            if self.joint_is_reachable(j) {
                *joint = 0.0;
            }
        }
        for (a, row) in self.rows.iter().enumerate() {
            if a >= axes.len() {
                break;
            }
            let norm2 = self.norms2[a];
            if norm2 < SINGULAR_NORM2 {
                continue;
            }
            let scale = axes[a] / norm2;
            for (j, w) in row.iter().enumerate() {
                if j >= joints.len() {
                    break;
                }
                joints[j] += w * scale;
            }
        }
    }

    /// Map joint torques up to axis forces: `F[a] = rows[a] · τ / (w·w)`.
    ///
    /// Least-squares solution of `τ = wᵀ F` per axis. Singular rows leave
    /// the force entry unchanged.
    pub fn force_to_axes(&self, torques: &[f64], forces: &mut [f64]) {
        for (a, row) in self.rows.iter().enumerate() {
            if a >= forces.len() {
                break;
            }
            let norm2 = self.norms2[a];
            if norm2 < SINGULAR_NORM2 {
                continue;
            }
            let mut acc = 0.0;
            for (j, w) in row.iter().enumerate() {
                if j >= torques.len() {
                    break;
                }
                acc += w * torques[j];
            }
            forces[a] = acc / norm2;
        }
    }

    /// True when some non-singular row has a non-zero weight on `joint`.
    fn joint_is_reachable(&self, joint: usize) -> bool {
        self.rows.iter().zip(self.norms2.iter()).any(|(row, norm2)| {
            *norm2 >= SINGULAR_NORM2 && row.get(joint).is_some_and(|w| *w != 0.0)
        })
    }

    /// Map axis forces down to joint torques: `τ = Σ_a rows[a]ᵀ · F[a]`.
    pub fn force_to_joints(&self, forces: &[f64], torques: &mut [f64]) {
        for torque in torques.iter_mut() {
            *torque = 0.0;
        }
        for (a, row) in self.rows.iter().enumerate() {
            if a >= forces.len() {
                break;
            }
            for (j, w) in row.iter().enumerate() {
                if j >= torques.len() {
                    break;
                }
                torques[j] += w * forces[a];
            }
        }
    }
}
