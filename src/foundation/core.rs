use crate::foundation::error::{TempraError, TempraResult};

/// Nanoseconds in one second.
const NANOS_PER_SEC: i64 = 1_000_000_000;
/// Nanoseconds in one millisecond.
const NANOS_PER_MILLI: i64 = 1_000_000;

/// A point or span of time in some clock's local base, in integer nanoseconds.
///
/// Signed so that parent-relative offsets may go negative during transforms;
/// arithmetic saturates at the representable extremes.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct TimeValue(pub i64);

impl TimeValue {
    /// The zero time value.
    pub const ZERO: TimeValue = TimeValue(0);

    /// Build from whole seconds.
    pub fn from_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(NANOS_PER_SEC))
    }

    /// Build from whole milliseconds.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(NANOS_PER_MILLI))
    }

    /// Build from fractional seconds, rejecting non-finite input.
    pub fn from_secs_f64(secs: f64) -> TempraResult<Self> {
        if !secs.is_finite() {
            return Err(TempraError::validation("TimeValue seconds must be finite"));
        }
        Ok(Self((secs * NANOS_PER_SEC as f64).round() as i64))
    }

    /// Convert to fractional seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    /// Saturating addition.
    pub fn saturating_add(self, rhs: TimeValue) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    pub fn saturating_sub(self, rhs: TimeValue) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Scale by a finite ratio, rounding to the nearest nanosecond.
    pub fn scale(self, ratio: f64) -> Self {
        Self((self.0 as f64 * ratio).round() as i64)
    }

    /// Return `true` when this value is negative.
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl std::ops::Add for TimeValue {
    type Output = TimeValue;

    fn add(self, rhs: TimeValue) -> TimeValue {
        TimeValue(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for TimeValue {
    type Output = TimeValue;

    fn sub(self, rhs: TimeValue) -> TimeValue {
        TimeValue(self.0.saturating_sub(rhs.0))
    }
}

/// Declared simple duration of a timeline node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Duration {
    /// A finite, non-negative span.
    Timed(TimeValue),
    /// Resolved from descendants (groups) or the node's natural length.
    Automatic,
    /// Never ends on its own.
    Forever,
}

impl Duration {
    /// Create a validated finite duration.
    pub fn timed(span: TimeValue) -> TempraResult<Self> {
        if span.is_negative() {
            return Err(TempraError::validation("Duration span must be >= 0"));
        }
        Ok(Self::Timed(span))
    }

    /// Return the finite span, if any.
    pub fn as_timed(self) -> Option<TimeValue> {
        match self {
            Self::Timed(span) => Some(span),
            Self::Automatic | Self::Forever => None,
        }
    }

    /// Return `true` for [`Duration::Automatic`].
    pub fn is_automatic(self) -> bool {
        matches!(self, Self::Automatic)
    }

    /// Return `true` for [`Duration::Forever`].
    pub fn is_forever(self) -> bool {
        matches!(self, Self::Forever)
    }
}

/// When the scheduler next needs a tick to observe a change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextTick {
    /// Something is animating continuously; tick every frame.
    Immediate,
    /// Nothing changes before this absolute root-base time.
    At(TimeValue),
    /// Nothing will ever change without an interactive request.
    Never,
}

impl NextTick {
    /// Combine two bounds, keeping the earlier one.
    pub fn earlier(self, other: NextTick) -> NextTick {
        match (self, other) {
            (Self::Immediate, _) | (_, Self::Immediate) => Self::Immediate,
            (Self::At(a), Self::At(b)) => Self::At(a.min(b)),
            (Self::At(a), Self::Never) | (Self::Never, Self::At(a)) => Self::At(a),
            (Self::Never, Self::Never) => Self::Never,
        }
    }

    /// Clip this bound to be no later than `limit`.
    pub fn clip_to(self, limit: NextTick) -> NextTick {
        self.earlier(limit)
    }

    /// Return `true` when a tick at `now` would observe a change.
    pub fn is_due(self, now: TimeValue) -> bool {
        match self {
            Self::Immediate => true,
            Self::At(t) => t <= now,
            Self::Never => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_value_second_conversions_round_trip() {
        let t = TimeValue::from_secs(3);
        assert_eq!(t.0, 3_000_000_000);
        assert_eq!(t.as_secs_f64(), 3.0);
        assert_eq!(TimeValue::from_secs_f64(0.5).unwrap(), TimeValue::from_millis(500));
        assert!(TimeValue::from_secs_f64(f64::NAN).is_err());
    }

    #[test]
    fn time_value_scale_rounds() {
        assert_eq!(TimeValue::from_secs(1).scale(0.5), TimeValue::from_millis(500));
        assert_eq!(TimeValue::from_secs(-1).scale(2.0), TimeValue::from_secs(-2));
    }

    #[test]
    fn duration_rejects_negative_span() {
        assert!(Duration::timed(TimeValue::from_secs(-1)).is_err());
        assert_eq!(
            Duration::timed(TimeValue::ZERO).unwrap().as_timed(),
            Some(TimeValue::ZERO)
        );
    }

    #[test]
    fn next_tick_earlier_prefers_immediate_then_min() {
        let a = NextTick::At(TimeValue::from_secs(2));
        let b = NextTick::At(TimeValue::from_secs(5));
        assert_eq!(a.earlier(b), a);
        assert_eq!(NextTick::Never.earlier(b), b);
        assert_eq!(NextTick::Immediate.earlier(NextTick::Never), NextTick::Immediate);
        assert!(a.is_due(TimeValue::from_secs(2)));
        assert!(!a.is_due(TimeValue::from_secs(1)));
    }
}
