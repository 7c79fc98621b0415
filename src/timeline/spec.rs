//! Declarative timing descriptors.
//!
//! A [`Timeline`] is the immutable specification of one node in a timing
//! tree: when it begins, how long one iteration runs, how it repeats and
//! fills, and (for groups) its ordered children. Descriptors are plain owned
//! values; instantiating one through
//! [`TimeManager::instantiate`](crate::TimeManager::instantiate) produces an
//! independent runtime tree each time.

use crate::foundation::core::{Duration, TimeValue};
use crate::foundation::error::{TempraError, TempraResult};

/// How a timeline repeats its simple duration.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RepeatBehavior {
    /// Run the (possibly autoreversed) iteration this many times; may be
    /// fractional, must be finite and `>= 0`.
    Count(f64),
    /// Run for a fixed total span of the node's scaled local time.
    Span(TimeValue),
    /// Repeat until stopped.
    Forever,
}

/// What a timeline does after its active period ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FillBehavior {
    /// Hold the terminal progress until the parent stops.
    HoldEnd,
    /// Stop immediately; progress becomes undefined.
    Stop,
}

/// Origin of an interactive seek offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SeekOrigin {
    /// Offset measured from the begin point of the local timeline.
    BeginTime,
    /// Offset measured from the end of the simple duration.
    Duration,
}

/// Node kind: an animation leaf or a group of ordered children.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TimelineKind {
    /// Leaf whose only output is a sampled value.
    Animation,
    /// Interior node owning an ordered list of child descriptors.
    Group {
        /// Children in composition order; order is significant.
        children: Vec<Timeline>,
        /// Slip the group's effective begin to its first slip-capable
        /// descendant's actual begin.
        slip: bool,
    },
}

/// One immutable timing descriptor node.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Timeline {
    /// Parent-relative begin offset; `None` never begins on its own.
    pub begin: Option<TimeValue>,
    /// Declared simple duration.
    pub duration: Duration,
    /// Local-per-parent time rate; must be finite and `> 0`.
    pub speed_ratio: f64,
    /// Fraction of each iteration spent accelerating, in `[0, 1]`.
    pub acceleration_ratio: f64,
    /// Fraction of each iteration spent decelerating, in `[0, 1]`;
    /// `acceleration_ratio + deceleration_ratio <= 1`.
    pub deceleration_ratio: f64,
    /// Play each iteration forward then backward.
    pub auto_reverse: bool,
    /// Repeat behavior over the active period.
    pub repeat: RepeatBehavior,
    /// Fill behavior after the active period.
    pub fill: FillBehavior,
    /// This node's actual begin waits on an external readiness signal.
    pub can_slip: bool,
    /// Leaf or group payload.
    pub kind: TimelineKind,
}

impl Timeline {
    /// New animation-leaf descriptor with default timing.
    pub fn animation() -> Self {
        Self {
            begin: Some(TimeValue::ZERO),
            duration: Duration::Automatic,
            speed_ratio: 1.0,
            acceleration_ratio: 0.0,
            deceleration_ratio: 0.0,
            auto_reverse: false,
            repeat: RepeatBehavior::Count(1.0),
            fill: FillBehavior::HoldEnd,
            can_slip: false,
            kind: TimelineKind::Animation,
        }
    }

    /// New group descriptor owning `children`, with default timing.
    pub fn group(children: Vec<Timeline>) -> Self {
        Self {
            kind: TimelineKind::Group {
                children,
                slip: false,
            },
            ..Self::animation()
        }
    }

    /// Set the begin offset.
    pub fn with_begin(mut self, begin: TimeValue) -> Self {
        self.begin = Some(begin);
        self
    }

    /// Mark the node as never beginning on its own.
    pub fn never_begins(mut self) -> Self {
        self.begin = None;
        self
    }

    /// Set a finite simple duration.
    pub fn with_duration(mut self, span: TimeValue) -> Self {
        self.duration = Duration::Timed(span);
        self
    }

    /// Set the full duration enum.
    pub fn with_duration_kind(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the speed ratio.
    pub fn with_speed_ratio(mut self, ratio: f64) -> Self {
        self.speed_ratio = ratio;
        self
    }

    /// Set acceleration and deceleration ratios.
    pub fn with_ramp(mut self, accel: f64, decel: f64) -> Self {
        self.acceleration_ratio = accel;
        self.deceleration_ratio = decel;
        self
    }

    /// Set autoreverse.
    pub fn with_auto_reverse(mut self, auto_reverse: bool) -> Self {
        self.auto_reverse = auto_reverse;
        self
    }

    /// Set repeat behavior.
    pub fn with_repeat(mut self, repeat: RepeatBehavior) -> Self {
        self.repeat = repeat;
        self
    }

    /// Set fill behavior.
    pub fn with_fill(mut self, fill: FillBehavior) -> Self {
        self.fill = fill;
        self
    }

    /// Mark this node slip-capable (its begin awaits an external signal).
    pub fn with_can_slip(mut self, can_slip: bool) -> Self {
        self.can_slip = can_slip;
        self
    }

    /// Request slip synchronization on a group descriptor.
    ///
    /// Fails on leaves; the remaining slip preconditions are checked by
    /// [`Timeline::validate`] and at instantiation.
    pub fn with_slip(mut self) -> TempraResult<Self> {
        match self.kind {
            TimelineKind::Group { ref mut slip, .. } => *slip = true,
            TimelineKind::Animation => {
                return Err(TempraError::validation(
                    "slip synchronization is only defined for groups",
                ));
            }
        }
        Ok(self)
    }

    /// Children of a group descriptor; empty for leaves.
    pub fn children(&self) -> &[Timeline] {
        match &self.kind {
            TimelineKind::Group { children, .. } => children,
            TimelineKind::Animation => &[],
        }
    }

    /// Whether this descriptor requests slip synchronization.
    pub fn slip_requested(&self) -> bool {
        matches!(self.kind, TimelineKind::Group { slip: true, .. })
    }

    /// Validate this descriptor subtree.
    ///
    /// Checks every numeric range and the structurally checkable slip
    /// preconditions; the execution-root precondition is checked at
    /// instantiation, where rootness is known.
    pub fn validate(&self) -> TempraResult<()> {
        if !self.speed_ratio.is_finite() || self.speed_ratio <= 0.0 {
            return Err(TempraError::validation("speed_ratio must be finite and > 0"));
        }
        for (name, v) in [
            ("acceleration_ratio", self.acceleration_ratio),
            ("deceleration_ratio", self.deceleration_ratio),
        ] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(TempraError::validation(format!("{name} must be in [0, 1]")));
            }
        }
        if self.acceleration_ratio + self.deceleration_ratio > 1.0 {
            return Err(TempraError::validation(
                "acceleration_ratio + deceleration_ratio must be <= 1",
            ));
        }
        if let Duration::Timed(span) = self.duration {
            if span.is_negative() {
                return Err(TempraError::validation("duration span must be >= 0"));
            }
        }
        match self.repeat {
            RepeatBehavior::Count(n) => {
                if !n.is_finite() || n < 0.0 {
                    return Err(TempraError::validation(
                        "repeat count must be finite and >= 0",
                    ));
                }
            }
            RepeatBehavior::Span(span) => {
                if span.is_negative() {
                    return Err(TempraError::validation("repeat span must be >= 0"));
                }
            }
            RepeatBehavior::Forever => {}
        }
        if self.slip_requested() {
            self.validate_slip_shape()?;
        }
        for child in self.children() {
            child.validate()?;
        }
        Ok(())
    }

    /// Slip is defined only for simple, non-looping, non-ramped timelines:
    /// slip changes the group's begin time retroactively, and any periodic or
    /// ramped transform over a shifting begin would be ill-defined.
    fn validate_slip_shape(&self) -> TempraResult<()> {
        if self.repeat != RepeatBehavior::Count(1.0) {
            return Err(TempraError::validation(
                "a slip group must not repeat (repeat must be Count(1))",
            ));
        }
        if self.auto_reverse {
            return Err(TempraError::validation("a slip group must not autoreverse"));
        }
        if self.acceleration_ratio != 0.0 || self.deceleration_ratio != 0.0 {
            return Err(TempraError::validation(
                "a slip group must have zero acceleration/deceleration ratios",
            ));
        }
        if self.find_slip_designee().is_none() {
            return Err(TempraError::validation(
                "a slip group needs a slip-capable descendant",
            ));
        }
        Ok(())
    }

    /// Depth-first search for the first slip-capable descendant.
    pub(crate) fn find_slip_designee(&self) -> Option<Vec<usize>> {
        fn rec(node: &Timeline, path: &mut Vec<usize>) -> bool {
            for (i, child) in node.children().iter().enumerate() {
                path.push(i);
                if child.can_slip || rec(child, path) {
                    return true;
                }
                path.pop();
            }
            false
        }

        let mut path = Vec::new();
        rec(self, &mut path).then_some(path)
    }
}
