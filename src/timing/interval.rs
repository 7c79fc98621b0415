//! Interval algebra for propagating tick validity between time bases.
//!
//! A [`TimeIntervalCollection`] is the set of time windows a clock considers
//! "covered" by the current tick, plus a sentinel null point marking "time is
//! undefined here" across `Stopped` transitions. Projecting a collection
//! through a node's periodic transform (begin offset, speed ratio, repeat,
//! autoreverse, accel/decel ramp) answers both "did anything happen to this
//! node during the tick" and "where is this node right now" with one kernel.

use crate::foundation::core::TimeValue;
use crate::foundation::error::{TempraError, TempraResult};
use smallvec::SmallVec;

/// Ramp ratios this close to zero are nudged away from the singular division.
const RAMP_EPSILON: f64 = 1e-9;

/// A single, possibly degenerate, time interval with per-end inclusion flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeInterval {
    /// Lower bound.
    pub begin: TimeValue,
    /// Upper bound; `begin <= end`.
    pub end: TimeValue,
    /// Whether `begin` itself is a member.
    pub begin_included: bool,
    /// Whether `end` itself is a member.
    pub end_included: bool,
}

impl TimeInterval {
    /// Degenerate interval containing exactly `t`.
    pub fn point(t: TimeValue) -> Self {
        Self {
            begin: t,
            end: t,
            begin_included: true,
            end_included: true,
        }
    }

    /// Return `true` when `t` is a member of this interval.
    pub fn contains(&self, t: TimeValue) -> bool {
        if t < self.begin || t > self.end {
            return false;
        }
        if t == self.begin && !self.begin_included {
            // A degenerate excluded-begin interval still matches its included end.
            return t == self.end && self.end_included;
        }
        if t == self.end && !self.end_included {
            return false;
        }
        true
    }

    fn is_degenerate(&self) -> bool {
        self.begin == self.end
    }
}

/// Ordered set of non-overlapping intervals plus an optional null point.
///
/// Intervals are stored start-ascending and never overlap; the null-point
/// flag is independent of the interval list and survives every projection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeIntervalCollection {
    intervals: SmallVec<[TimeInterval; 2]>,
    null_point: bool,
}

impl TimeIntervalCollection {
    /// The empty collection.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Collection holding the single point `t`.
    pub fn point(t: TimeValue) -> Self {
        let mut c = Self::default();
        c.intervals.push(TimeInterval::point(t));
        c
    }

    /// Collection holding the half-open interval `(begin, end]`.
    ///
    /// `begin > end` is rejected; `begin == end` yields the empty collection
    /// (nothing elapsed).
    pub fn open_closed(begin: TimeValue, end: TimeValue) -> TempraResult<Self> {
        if begin > end {
            return Err(TempraError::timing("open_closed interval requires begin <= end"));
        }
        let mut c = Self::default();
        if begin < end {
            c.intervals.push(TimeInterval {
                begin,
                end,
                begin_included: false,
                end_included: true,
            });
        }
        Ok(c)
    }

    /// Add the sentinel null point. Once set it survives projection.
    pub fn add_null_point(&mut self) {
        self.null_point = true;
    }

    /// Remove all intervals and the null point.
    pub fn clear(&mut self) {
        self.intervals.clear();
        self.null_point = false;
    }

    /// Return `true` when there are no intervals and no null point.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty() && !self.null_point
    }

    /// Return `true` when the null point is set.
    pub fn has_null_point(&self) -> bool {
        self.null_point
    }

    /// Return `true` when `t` is a member of any interval.
    pub fn contains(&self, t: TimeValue) -> bool {
        self.intervals.iter().any(|i| i.contains(t))
    }

    /// Return `true` when any interval intersects `[begin, end]`.
    pub fn intersects_range(&self, begin: TimeValue, end: TimeValue) -> bool {
        self.intervals.iter().any(|i| i.begin <= end && begin <= i.end)
    }

    /// Iterate the intervals in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &TimeInterval> {
        self.intervals.iter()
    }

    fn push_normalized(&mut self, iv: TimeInterval) {
        debug_assert!(iv.begin <= iv.end);
        if iv.is_degenerate() && !(iv.begin_included && iv.end_included) {
            return;
        }
        // Insert keeping start-ascending order, then merge with neighbors that
        // overlap or touch with at least one side included.
        let at = self.intervals.partition_point(|x| x.begin < iv.begin);
        self.intervals.insert(at, iv);
        let mut i = at.saturating_sub(1);
        while i + 1 < self.intervals.len() {
            let (a, b) = (self.intervals[i], self.intervals[i + 1]);
            let touching = a.end == b.begin && (a.end_included || b.begin_included);
            if b.begin < a.end || touching {
                let merged = TimeInterval {
                    begin: a.begin,
                    begin_included: a.begin_included
                        || (b.begin == a.begin && b.begin_included),
                    end: a.end.max(b.end),
                    end_included: if a.end == b.end {
                        a.end_included || b.end_included
                    } else if b.end > a.end {
                        b.end_included
                    } else {
                        a.end_included
                    },
                };
                self.intervals[i] = merged;
                self.intervals.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }

    /// Project this collection through a node's periodic transform into the
    /// node's warped local time base.
    ///
    /// Source points ahead of `begin` vanish; points past the active period
    /// but inside the fill window route through the post-fill zone and pin at
    /// the terminal value; the null flag always carries over.
    pub fn project_onto_periodic_function(&self, args: &PeriodicProjection) -> TimeIntervalCollection {
        let mut out = TimeIntervalCollection::empty();
        if self.null_point {
            out.add_null_point();
        }
        for iv in &self.intervals {
            project_interval(iv, args, &mut out);
        }
        out
    }
}

/// Arguments for projecting a parent-base collection into a child's warped
/// local base. `begin`, `end`, and `fill_end` are in the parent base; `period`
/// is in the child's scaled local base.
#[derive(Clone, Copy, Debug)]
pub struct PeriodicProjection {
    /// Effective begin time in the parent base.
    pub begin: TimeValue,
    /// End of the active period in the parent base; `None` is unbounded.
    pub end: Option<TimeValue>,
    /// End of the fill window in the parent base; `None` is unbounded.
    pub fill_end: Option<TimeValue>,
    /// Simple duration in the scaled local base; `None` is `Forever`.
    pub period: Option<TimeValue>,
    /// Local-per-parent time rate; `> 0`.
    pub speed_ratio: f64,
    /// Acceleration ratio in `[0, 1]`.
    pub accel: f64,
    /// Deceleration ratio in `[0, 1]`; `accel + decel <= 1`.
    pub decel: f64,
    /// Reflect every other leg of each iteration.
    pub auto_reverse: bool,
}

impl PeriodicProjection {
    /// Scaled active duration, `None` when unbounded.
    fn active_span(&self) -> Option<TimeValue> {
        self.end.map(|e| (e - self.begin).scale(self.speed_ratio))
    }
}

/// Where a single projected point landed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum ProjectedPoint {
    /// Ahead of the node's begin time.
    Before,
    /// Inside the active period.
    Active {
        /// Warped local time.
        local: TimeValue,
        /// Warped progress in `[0, 1]`.
        progress: f64,
        /// 1-based iteration count.
        iteration: u64,
    },
    /// Past the active period, held in the fill zone at the terminal value.
    PostFill {
        /// Warped local time, pinned.
        local: TimeValue,
        /// Terminal progress (1.0, or 0.0 when the period ended reversed).
        progress: f64,
        /// Iteration the active period ended in.
        iteration: u64,
    },
    /// Past the end of the fill window.
    After,
}

/// Position of a scaled local time within its iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct IterationSlot {
    /// 1-based iteration index.
    pub(crate) iteration: u64,
    /// Unwarped position within the iteration's simple duration, `[0, period]`.
    pub(crate) pos: TimeValue,
    /// Whether the position lies on a reversed leg.
    pub(crate) reversed: bool,
}

/// Fold scaled local time `u >= 0` into its iteration slot.
pub(crate) fn fold_iteration(
    u: TimeValue,
    period: TimeValue,
    auto_reverse: bool,
) -> IterationSlot {
    if period == TimeValue::ZERO {
        return IterationSlot {
            iteration: 1,
            pos: TimeValue::ZERO,
            reversed: false,
        };
    }
    let len = if auto_reverse { period.0 * 2 } else { period.0 };
    let k = u.0.div_euclid(len);
    let r = u.0.rem_euclid(len);
    let (pos, reversed) = if auto_reverse && r > period.0 {
        (TimeValue(2 * period.0 - r), true)
    } else {
        (TimeValue(r), false)
    };
    IterationSlot {
        iteration: (k as u64) + 1,
        pos,
        reversed,
    }
}

/// Terminal slot for an active period of scaled length `active`.
///
/// An end landing exactly on an iteration boundary belongs to the iteration
/// that just completed, never to a zero-width successor.
pub(crate) fn fold_active_end(
    active: TimeValue,
    period: TimeValue,
    auto_reverse: bool,
) -> IterationSlot {
    if active == TimeValue::ZERO || period == TimeValue::ZERO {
        return IterationSlot {
            iteration: 1,
            pos: period,
            reversed: false,
        };
    }
    let len = if auto_reverse { period.0 * 2 } else { period.0 };
    let r = active.0.rem_euclid(len);
    if r == 0 {
        let last = (active.0 / len) as u64;
        let pos = if auto_reverse { TimeValue::ZERO } else { period };
        return IterationSlot {
            iteration: last,
            pos,
            reversed: auto_reverse,
        };
    }
    fold_iteration(active, period, auto_reverse)
}

/// Piecewise-quadratic accel/decel warp of normalized progress.
pub(crate) fn warp_progress(p0: f64, accel: f64, decel: f64) -> f64 {
    let (accel, decel) = nudge_ramp(accel, decel);
    if accel == 0.0 && decel == 0.0 {
        return p0.clamp(0.0, 1.0);
    }
    let t = p0.clamp(0.0, 1.0);
    let max_rate = 2.0 / (2.0 - accel - decel);
    if t < accel {
        max_rate * t * t / (2.0 * accel)
    } else if t <= 1.0 - decel {
        max_rate * (t - accel / 2.0)
    } else {
        1.0 - max_rate * (1.0 - t) * (1.0 - t) / (2.0 * decel)
    }
}

/// Inverse of [`warp_progress`]; both are monotone on `[0, 1]`.
pub(crate) fn unwarp_progress(p: f64, accel: f64, decel: f64) -> f64 {
    let (accel, decel) = nudge_ramp(accel, decel);
    if accel == 0.0 && decel == 0.0 {
        return p.clamp(0.0, 1.0);
    }
    let p = p.clamp(0.0, 1.0);
    let max_rate = 2.0 / (2.0 - accel - decel);
    let p_accel = max_rate * accel / 2.0;
    let p_decel = 1.0 - max_rate * decel / 2.0;
    if p < p_accel {
        (2.0 * accel * p / max_rate).sqrt()
    } else if p <= p_decel {
        p / max_rate + accel / 2.0
    } else {
        1.0 - (2.0 * decel * (1.0 - p) / max_rate).sqrt()
    }
}

/// Nudge near-singular ramp ratios a negligible epsilon away from zero.
fn nudge_ramp(accel: f64, decel: f64) -> (f64, f64) {
    let a = if accel > 0.0 && accel < RAMP_EPSILON { RAMP_EPSILON } else { accel };
    let d = if decel > 0.0 && decel < RAMP_EPSILON { RAMP_EPSILON } else { decel };
    (a, d)
}

/// Warped local time and progress for an iteration slot.
fn warp_slot(slot: IterationSlot, period: Option<TimeValue>, args: &PeriodicProjection) -> (TimeValue, f64) {
    let Some(period) = period else {
        // Forever period: one unbounded iteration, no normalized progress.
        return (slot.pos, 0.0);
    };
    if period == TimeValue::ZERO {
        return (TimeValue::ZERO, 1.0);
    }
    let p0 = slot.pos.0 as f64 / period.0 as f64;
    let p = warp_progress(p0, args.accel, args.decel);
    (period.scale(p), p)
}

/// Project a single parent-base point.
pub(crate) fn project_point(t: TimeValue, args: &PeriodicProjection) -> ProjectedPoint {
    if t < args.begin {
        return ProjectedPoint::Before;
    }
    let u = (t - args.begin).scale(args.speed_ratio);
    if let Some(active) = args.active_span() {
        if u >= active {
            return project_post_fill_zone(t, active, args);
        }
    }
    let slot = match args.period {
        Some(p) => fold_iteration(u, p, args.auto_reverse),
        None => IterationSlot {
            iteration: 1,
            pos: u,
            reversed: false,
        },
    };
    let (local, progress) = warp_slot(slot, args.period, args);
    ProjectedPoint::Active {
        local,
        progress,
        iteration: slot.iteration,
    }
}

/// Route a point past the active period through the fill zone.
///
/// Progress is pinned at the terminal value instead of advancing.
pub(crate) fn project_post_fill_zone(
    t: TimeValue,
    active: TimeValue,
    args: &PeriodicProjection,
) -> ProjectedPoint {
    if let Some(fill_end) = args.fill_end {
        if t >= fill_end {
            return ProjectedPoint::After;
        }
    }
    let Some(period) = args.period else {
        // A Forever period only ends via a repeat span; hold where it stopped.
        return ProjectedPoint::PostFill {
            local: active,
            progress: 0.0,
            iteration: 1,
        };
    };
    let slot = fold_active_end(active, period, args.auto_reverse);
    let (local, progress) = warp_slot(slot, Some(period), args);
    ProjectedPoint::PostFill {
        local,
        progress,
        iteration: slot.iteration,
    }
}

/// Project one source interval into the output collection.
fn project_interval(iv: &TimeInterval, args: &PeriodicProjection, out: &mut TimeIntervalCollection) {
    // Degenerate source: a single point projects to a single point.
    if iv.is_degenerate() {
        match project_point(iv.begin, args) {
            ProjectedPoint::Active { local, .. } | ProjectedPoint::PostFill { local, .. } => {
                out.push_normalized(TimeInterval::point(local));
            }
            ProjectedPoint::Before | ProjectedPoint::After => {}
        }
        return;
    }
    let b = project_point(iv.end, args);

    // Clip the scaled span to the active period.
    let u0 = ((iv.begin.max(args.begin)) - args.begin).scale(args.speed_ratio);
    let mut u1 = (iv.end.max(args.begin) - args.begin).scale(args.speed_ratio);
    let mut ended = false;
    if let Some(active) = args.active_span() {
        if u1 >= active {
            u1 = active;
            ended = true;
        }
    }

    if u1 > u0 {
        match args.period {
            None => {
                // Forever period: identity transform of the clipped span.
                out.push_normalized(TimeInterval {
                    begin: u0,
                    end: u1,
                    begin_included: if iv.begin < args.begin {
                        iv.contains(args.begin)
                    } else {
                        iv.begin_included
                    },
                    end_included: !ended && iv.end_included,
                });
            }
            Some(period) if period == TimeValue::ZERO => {
                out.push_normalized(TimeInterval::point(TimeValue::ZERO));
            }
            Some(period) => {
                let len = if args.auto_reverse { period.0 * 2 } else { period.0 };
                if u1.0 - u0.0 >= len {
                    // Spans at least one full iteration: covers the whole range.
                    out.push_normalized(TimeInterval {
                        begin: TimeValue::ZERO,
                        end: period,
                        begin_included: true,
                        end_included: true,
                    });
                } else {
                    project_partial_span(u0, u1, period, args, out);
                }
            }
        }
    }

    // The portion past the active period pins at the terminal value.
    if ended || matches!(b, ProjectedPoint::PostFill { .. }) {
        if let ProjectedPoint::PostFill { local, .. } = b {
            out.push_normalized(TimeInterval::point(local));
        } else if let Some(active) = args.active_span() {
            if let ProjectedPoint::PostFill { local, .. } =
                project_post_fill_zone(iv.end, active, args)
            {
                out.push_normalized(TimeInterval::point(local));
            }
        }
    }
}

/// Project a sub-iteration span `[u0, u1]`, splitting at leg boundaries.
fn project_partial_span(
    u0: TimeValue,
    u1: TimeValue,
    period: TimeValue,
    args: &PeriodicProjection,
    out: &mut TimeIntervalCollection,
) {
    // Walk leg boundaries between u0 and u1; each leg maps monotonically.
    let mut lo = u0;
    while lo < u1 {
        let slot = fold_iteration(lo, period, args.auto_reverse);
        // End of the current leg in scaled local time.
        let leg_len = if slot.reversed { slot.pos } else { period - slot.pos };
        let leg_end = TimeValue(lo.0 + leg_len.0.max(1));
        let hi = leg_end.min(u1);

        let (a_local, _) = warp_slot(fold_iteration(lo, period, args.auto_reverse), Some(period), args);
        let hi_slot = fold_boundary_inclusive(hi, period, args.auto_reverse);
        let (b_local, _) = warp_slot(hi_slot, Some(period), args);

        let (begin, end) = if a_local <= b_local {
            (a_local, b_local)
        } else {
            (b_local, a_local)
        };
        out.push_normalized(TimeInterval {
            begin,
            end,
            begin_included: true,
            end_included: true,
        });
        lo = hi;
    }
}

/// Fold a span's upper bound, attributing exact boundaries to the closing leg.
fn fold_boundary_inclusive(u: TimeValue, period: TimeValue, auto_reverse: bool) -> IterationSlot {
    if period == TimeValue::ZERO {
        return fold_iteration(u, period, auto_reverse);
    }
    let len = if auto_reverse { period.0 * 2 } else { period.0 };
    let r = u.0.rem_euclid(len);
    if r == 0 && u.0 > 0 {
        let pos = if auto_reverse { TimeValue::ZERO } else { period };
        return IterationSlot {
            iteration: (u.0 / len) as u64,
            pos,
            reversed: auto_reverse,
        };
    }
    fold_iteration(u, period, auto_reverse)
}

/// Earliest scaled local time `u >= u_now` whose warped local time is `local`.
///
/// Enumerates the forward and (with autoreverse) reversed leg candidates of
/// the current and next iteration, inverting the ramp per piece. `None` when
/// the target is unreachable before the active period ends.
pub(crate) fn next_local_hit(
    u_now: TimeValue,
    local: TimeValue,
    args: &PeriodicProjection,
) -> Option<TimeValue> {
    let Some(period) = args.period else {
        // Identity transform: the target is the scaled time itself.
        let u = local;
        return (u >= u_now && in_active(u, args)).then_some(u);
    };
    if period == TimeValue::ZERO || local > period || local.is_negative() {
        return None;
    }
    let p = local.0 as f64 / period.0.max(1) as f64;
    let p0 = unwarp_progress(p, args.accel, args.decel);
    let pos = period.scale(p0);
    let len = if args.auto_reverse { period.0 * 2 } else { period.0 };
    let base_iter = u_now.0.div_euclid(len);

    for k in base_iter..=base_iter + 1 {
        let fwd = TimeValue(k * len + pos.0);
        if fwd >= u_now && in_active(fwd, args) {
            return Some(fwd);
        }
        if args.auto_reverse {
            let rev = TimeValue(k * len + 2 * period.0 - pos.0);
            if rev >= u_now && in_active(rev, args) {
                return Some(rev);
            }
        }
    }
    None
}

fn in_active(u: TimeValue, args: &PeriodicProjection) -> bool {
    match args.active_span() {
        Some(active) => u < active,
        None => true,
    }
}
