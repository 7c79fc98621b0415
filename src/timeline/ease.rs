//! Easing curves for animation leaves.

/// Springiness values this close to zero fall back to the linear envelope.
const SPRING_EPSILON: f64 = 1e-9;

/// Easing functions used to map normalized animation progress.
///
/// Treated by the engine as an opaque `progress -> progress` map; the timing
/// ramp (acceleration/deceleration ratios) is separate and lives on the
/// descriptor, not here.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Ease {
    /// Linear interpolation.
    Linear,
    /// Quadratic ease-in.
    InQuad,
    /// Quadratic ease-out.
    OutQuad,
    /// Quadratic ease-in/out.
    InOutQuad,
    /// Cubic ease-in.
    InCubic,
    /// Cubic ease-out.
    OutCubic,
    /// Cubic ease-in/out.
    InOutCubic,
    /// Damped spring oscillation toward the target.
    Elastic {
        /// Number of full oscillations over the progress range.
        oscillations: u32,
        /// Exponential damping stiffness; `0` decays linearly.
        springiness: f64,
    },
}

impl Ease {
    /// Apply this easing function to normalized progress `t` in `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
            Self::Elastic {
                oscillations,
                springiness,
            } => {
                // The exponential envelope divides by `exp(s) - 1`, which is
                // singular as s approaches 0; nudge rather than fail.
                let s = springiness.max(0.0);
                let envelope = if s < SPRING_EPSILON {
                    t
                } else {
                    ((s * t).exp() - 1.0) / (s.exp() - 1.0)
                };
                let cycles = f64::from(oscillations) * 2.0 + 0.5;
                envelope * (cycles * std::f64::consts::PI * t).sin()
            }
        }
    }
}
