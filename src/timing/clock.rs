//! Runtime clock nodes.
//!
//! Each descriptor node is mirrored by exactly one [`ClockNode`] per
//! instantiation, stored in an arena owned by the
//! [`TimeManager`](crate::TimeManager) and addressed by generation-checked
//! [`ClockId`] handles. A node's state, progress, and iteration are written
//! only during its own step of the tick walk and are read-only otherwise.

use crate::foundation::core::{Duration, NextTick, TimeValue};
use crate::timeline::spec::{FillBehavior, RepeatBehavior, SeekOrigin, Timeline, TimelineKind};
use crate::timing::interval::{PeriodicProjection, ProjectedPoint, TimeIntervalCollection};
use crate::timing::slip::SlipState;

/// Natural simple duration of an animation leaf whose duration is
/// [`Duration::Automatic`].
pub(crate) const NATURAL_LEAF_PERIOD: TimeValue = TimeValue(1_000_000_000);

/// Generation-checked handle to a runtime clock node.
///
/// Stale handles (from a released subtree) resolve to validation errors,
/// never to a recycled node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Local time, progress, and iteration of a non-stopped clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockSample {
    /// Warped local time within the current iteration.
    pub local_time: TimeValue,
    /// Warped progress in `[0, 1]` (`0.0` for a `Forever` simple duration).
    pub progress: f64,
    /// 1-based iteration count.
    pub iteration: u64,
}

/// Activity state of a runtime clock node.
///
/// Progress and iteration exist only while the clock is `Active` or
/// `Filling`; there is no "undefined while stopped" convention to misread.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum ClockState {
    /// Not begun, past its fill window, or explicitly stopped.
    #[default]
    Stopped,
    /// Inside the active period.
    Active(ClockSample),
    /// Past the active period, holding the terminal value.
    Filling(ClockSample),
}

impl ClockState {
    /// Return `true` for [`ClockState::Stopped`].
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Return `true` for [`ClockState::Active`].
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// The sample, when not stopped.
    pub fn sample(&self) -> Option<ClockSample> {
        match self {
            Self::Stopped => None,
            Self::Active(s) | Self::Filling(s) => Some(*s),
        }
    }

    fn discriminant(&self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Active(_) => 1,
            Self::Filling(_) => 2,
        }
    }

    /// Whether two states differ in kind (ignoring sample payloads).
    pub(crate) fn same_kind(&self, other: &ClockState) -> bool {
        self.discriminant() == other.discriminant()
    }
}

/// Interactive request queued against a node, drained at its next tick step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum PendingRequest {
    Begin,
    Stop,
    Pause,
    Resume,
    Seek { offset: TimeValue, origin: SeekOrigin },
    SkipToFill,
    SpeedRatio(f64),
}

/// Timing parameters copied out of a descriptor node.
#[derive(Clone, Copy, Debug)]
pub(crate) struct NodeSpec {
    pub(crate) begin: Option<TimeValue>,
    pub(crate) duration: Duration,
    pub(crate) speed_ratio: f64,
    pub(crate) accel: f64,
    pub(crate) decel: f64,
    pub(crate) auto_reverse: bool,
    pub(crate) repeat: RepeatBehavior,
    pub(crate) fill: FillBehavior,
    pub(crate) is_group: bool,
    pub(crate) can_slip: bool,
}

impl NodeSpec {
    pub(crate) fn from_timeline(t: &Timeline) -> Self {
        Self {
            begin: t.begin,
            duration: t.duration,
            speed_ratio: t.speed_ratio,
            accel: t.acceleration_ratio,
            decel: t.deceleration_ratio,
            auto_reverse: t.auto_reverse,
            repeat: t.repeat,
            fill: t.fill,
            is_group: matches!(t.kind, TimelineKind::Group { .. }),
            can_slip: t.can_slip,
        }
    }
}

/// Mutable runtime state of one instantiated descriptor node.
#[derive(Debug)]
pub(crate) struct ClockNode {
    pub(crate) spec: NodeSpec,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) child_index: usize,

    /// Simple duration with `Automatic` resolved; `None` is `Forever`.
    pub(crate) resolved_period: Option<TimeValue>,

    /// Effective begin in the parent base; `None` means not scheduled.
    pub(crate) begin_time: Option<TimeValue>,
    /// Effective local-per-parent rate (descriptor ratio x interactive ratio).
    pub(crate) rate: f64,
    /// Parent-base time at which the node was paused, while paused.
    pub(crate) paused_at: Option<TimeValue>,

    pub(crate) state: ClockState,
    pub(crate) next_tick: NextTick,
    /// Bumped on every state-kind change; polled by the composition layer.
    pub(crate) state_generation: u64,
    /// Scaled local elapsed time as of the last visit, while begun.
    pub(crate) current_u: Option<TimeValue>,
    /// This node's local validity windows for the current tick.
    pub(crate) tick_intervals: TimeIntervalCollection,

    pub(crate) pending: Vec<PendingRequest>,
    pub(crate) subtree_dirty: bool,

    /// Slip negotiation state; present only on a slip root group.
    pub(crate) slip: Option<SlipState>,
    /// External readiness, meaningful only on a slip-capable node.
    pub(crate) slip_ready: bool,
}

impl ClockNode {
    pub(crate) fn new(spec: NodeSpec, parent: Option<usize>, child_index: usize) -> Self {
        Self {
            begin_time: spec.begin,
            rate: spec.speed_ratio,
            spec,
            parent,
            children: Vec::new(),
            child_index,
            resolved_period: None,
            paused_at: None,
            state: ClockState::Stopped,
            next_tick: NextTick::Never,
            state_generation: 0,
            current_u: None,
            tick_intervals: TimeIntervalCollection::empty(),
            pending: Vec::new(),
            subtree_dirty: true,
            slip: None,
            slip_ready: false,
        }
    }

    /// Length of one iteration (simple duration, doubled by autoreverse) in
    /// the scaled local base; `None` when the simple duration is `Forever`.
    pub(crate) fn iteration_len(&self) -> Option<TimeValue> {
        self.resolved_period.map(|p| {
            if self.spec.auto_reverse { p + p } else { p }
        })
    }

    /// Total active span in the scaled local base; `None` when unbounded.
    pub(crate) fn active_span_scaled(&self) -> Option<TimeValue> {
        match self.spec.repeat {
            RepeatBehavior::Forever => None,
            RepeatBehavior::Span(span) => Some(span),
            RepeatBehavior::Count(n) => match self.iteration_len() {
                Some(len) => Some(len.scale(n)),
                // A Forever period repeated any positive number of times is
                // still unbounded.
                None => (n == 0.0).then_some(TimeValue::ZERO),
            },
        }
    }

    /// End of the active period in the parent base, given the current
    /// effective begin; `None` when unbounded or not scheduled.
    pub(crate) fn active_end_in_parent(&self) -> Option<TimeValue> {
        let begin = self.begin_time?;
        let span = self.active_span_scaled()?;
        Some(begin + span.scale(1.0 / self.rate))
    }

    /// Projection arguments for the current effective transform.
    pub(crate) fn projection(&self) -> Option<PeriodicProjection> {
        let begin = self.begin_time?;
        let end = self.active_end_in_parent();
        let fill_end = match self.spec.fill {
            FillBehavior::HoldEnd => None,
            FillBehavior::Stop => end,
        };
        Some(PeriodicProjection {
            begin,
            end,
            fill_end,
            period: self.resolved_period,
            speed_ratio: self.rate,
            accel: self.spec.accel,
            decel: self.spec.decel,
            auto_reverse: self.spec.auto_reverse,
        })
    }

    /// Parent time with the pause clamp applied.
    pub(crate) fn effective_parent_time(&self, parent_local: TimeValue) -> TimeValue {
        match self.paused_at {
            Some(p) => parent_local.min(p),
            None => parent_local,
        }
    }

    /// Map a projected point to a clock state under this node's fill behavior.
    pub(crate) fn state_for_point(&self, point: ProjectedPoint) -> ClockState {
        match point {
            ProjectedPoint::Before | ProjectedPoint::After => ClockState::Stopped,
            ProjectedPoint::Active {
                local,
                progress,
                iteration,
            } => ClockState::Active(ClockSample {
                local_time: local,
                progress,
                iteration,
            }),
            ProjectedPoint::PostFill {
                local,
                progress,
                iteration,
            } => match self.spec.fill {
                FillBehavior::HoldEnd => ClockState::Filling(ClockSample {
                    local_time: local,
                    progress,
                    iteration,
                }),
                FillBehavior::Stop => ClockState::Stopped,
            },
        }
    }

    /// Apply one queued interactive request at parent-base time `t_p`.
    ///
    /// Continuity rule: every transform change rewrites the effective begin
    /// so the scaled local time is unchanged at the moment of application.
    pub(crate) fn apply_request(&mut self, req: PendingRequest, t_p_raw: TimeValue) {
        // While paused, requests apply at the frozen time; resuming is the
        // one request that must see the real parent time to measure the
        // paused span.
        let t_p = self.effective_parent_time(t_p_raw);
        match req {
            PendingRequest::Begin => {
                self.begin_time = Some(t_p);
                if let Some(slip) = &mut self.slip {
                    slip.reset();
                }
            }
            PendingRequest::Stop => {
                self.begin_time = None;
                self.current_u = None;
                if let Some(slip) = &mut self.slip {
                    slip.reset();
                }
            }
            PendingRequest::Pause => {
                if self.paused_at.is_none() {
                    self.paused_at = Some(t_p);
                }
            }
            PendingRequest::Resume => {
                if let Some(paused) = self.paused_at.take() {
                    if let Some(begin) = self.begin_time {
                        // Shift begin forward by the paused span so local
                        // time resumes exactly where it froze.
                        self.begin_time = Some(begin + (t_p_raw - paused));
                    }
                }
            }
            PendingRequest::Seek { offset, origin } => {
                let target_u = match origin {
                    SeekOrigin::BeginTime => offset,
                    SeekOrigin::Duration => {
                        // Validated against an unresolved duration upstream.
                        let period = self.resolved_period.unwrap_or(TimeValue::ZERO);
                        period + offset
                    }
                };
                self.begin_time = Some(t_p - target_u.scale(1.0 / self.rate));
            }
            PendingRequest::SkipToFill => {
                if let Some(span) = self.active_span_scaled() {
                    self.begin_time = Some(t_p - span.scale(1.0 / self.rate));
                }
            }
            PendingRequest::SpeedRatio(ratio) => {
                let new_rate = self.spec.speed_ratio * ratio;
                if let Some(begin) = self.begin_time {
                    let u = (t_p - begin).scale(self.rate);
                    if !u.is_negative() {
                        self.begin_time = Some(t_p - u.scale(1.0 / new_rate));
                    }
                }
                self.rate = new_rate;
            }
        }
    }

    /// Next discrete boundary of this node in the parent base, if any.
    ///
    /// Covers the begin point, iteration boundaries, and the active end.
    /// Continuous change (an active animation leaf) is reported as
    /// [`NextTick::Immediate`] by the walk instead.
    pub(crate) fn next_boundary_in_parent(&self, t_p: TimeValue) -> Option<TimeValue> {
        if self.paused_at.is_some() {
            return None;
        }
        let begin = self.begin_time?;
        if t_p < begin {
            return Some(begin);
        }
        let u = (t_p - begin).scale(self.rate);
        let active = self.active_span_scaled();
        let mut best: Option<TimeValue> = None;
        let mut consider = |u_evt: TimeValue| {
            if u_evt > u {
                best = Some(best.map_or(u_evt, |b| b.min(u_evt)));
            }
        };
        if let Some(len) = self.iteration_len() {
            if len > TimeValue::ZERO {
                let k = u.0.div_euclid(len.0) + 1;
                let boundary = TimeValue(k * len.0);
                match active {
                    Some(a) if boundary > a => {}
                    _ => consider(boundary),
                }
            }
        }
        if let Some(a) = active {
            consider(a);
        }
        best.map(|u_evt| begin + u_evt.scale(1.0 / self.rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(spec: NodeSpec) -> ClockNode {
        let mut n = ClockNode::new(spec, None, 0);
        n.resolved_period = spec.duration.as_timed();
        n
    }

    fn spec_secs(duration: i64) -> NodeSpec {
        NodeSpec::from_timeline(
            &Timeline::animation().with_duration(TimeValue::from_secs(duration)),
        )
    }

    #[test]
    fn active_span_multiplies_iterations() {
        let mut s = spec_secs(2);
        s.repeat = RepeatBehavior::Count(3.0);
        assert_eq!(node(s).active_span_scaled(), Some(TimeValue::from_secs(6)));

        s.auto_reverse = true;
        assert_eq!(node(s).active_span_scaled(), Some(TimeValue::from_secs(12)));

        s.repeat = RepeatBehavior::Forever;
        assert_eq!(node(s).active_span_scaled(), None);
    }

    #[test]
    fn pause_and_resume_keep_local_time_continuous() {
        let mut n = node(spec_secs(10));
        n.apply_request(PendingRequest::Pause, TimeValue::from_secs(3));
        // While paused, parent time is clamped at the pause point.
        assert_eq!(n.effective_parent_time(TimeValue::from_secs(7)), TimeValue::from_secs(3));
        n.apply_request(PendingRequest::Resume, TimeValue::from_secs(7));
        // Paused for 4s: begin shifted from 0s to 4s.
        assert_eq!(n.begin_time, Some(TimeValue::from_secs(4)));
        assert_eq!(n.effective_parent_time(TimeValue::from_secs(7)), TimeValue::from_secs(7));
    }

    #[test]
    fn seek_rewrites_begin() {
        let mut n = node(spec_secs(10));
        n.apply_request(
            PendingRequest::Seek {
                offset: TimeValue::from_secs(4),
                origin: SeekOrigin::BeginTime,
            },
            TimeValue::from_secs(6),
        );
        assert_eq!(n.begin_time, Some(TimeValue::from_secs(2)));

        n.apply_request(
            PendingRequest::Seek {
                offset: TimeValue::from_secs(1),
                origin: SeekOrigin::Duration,
            },
            TimeValue::from_secs(6),
        );
        // Target local = 10s + 1s = 11s.
        assert_eq!(n.begin_time, Some(TimeValue::from_secs(-5)));
    }

    #[test]
    fn speed_change_preserves_elapsed_local_time() {
        let mut n = node(spec_secs(10));
        // At t_p = 4s, u = 4s; doubling speed must keep u = 4s.
        n.apply_request(PendingRequest::SpeedRatio(2.0), TimeValue::from_secs(4));
        assert_eq!(n.rate, 2.0);
        let begin = n.begin_time.unwrap();
        let u = (TimeValue::from_secs(4) - begin).scale(n.rate);
        assert_eq!(u, TimeValue::from_secs(4));
    }

    #[test]
    fn next_boundary_reports_begin_then_iterations_then_end() {
        let mut s = spec_secs(2);
        s.repeat = RepeatBehavior::Count(3.0);
        s.begin = Some(TimeValue::from_secs(1));
        let n = node(s);

        assert_eq!(
            n.next_boundary_in_parent(TimeValue::ZERO),
            Some(TimeValue::from_secs(1))
        );
        // At t=2s (u=1s), next iteration boundary is u=2s -> t=3s.
        assert_eq!(
            n.next_boundary_in_parent(TimeValue::from_secs(2)),
            Some(TimeValue::from_secs(3))
        );
        // At t=6.5s (u=5.5s), only the active end at u=6s -> t=7s remains.
        assert_eq!(
            n.next_boundary_in_parent(TimeValue::from_millis(6500)),
            Some(TimeValue::from_secs(7))
        );
    }

    #[test]
    fn state_for_point_honors_fill() {
        let mut hold = node(spec_secs(2));
        hold.spec.fill = FillBehavior::HoldEnd;
        let pinned = ProjectedPoint::PostFill {
            local: TimeValue::from_secs(2),
            progress: 1.0,
            iteration: 1,
        };
        assert!(matches!(hold.state_for_point(pinned), ClockState::Filling(_)));

        let mut stop = node(spec_secs(2));
        stop.spec.fill = FillBehavior::Stop;
        assert_eq!(stop.state_for_point(pinned), ClockState::Stopped);
    }
}
