//! The tick scheduler.
//!
//! A [`TimeManager`] owns the runtime clock arena and the external time
//! source, and drives global time forward one synchronous tick at a time.
//! Each tick reads the source once, builds the tick's top-level interval,
//! walks the tree depth-first resolving every node's state (prefix), and
//! aggregates "when is the next tick actually needed" bottom-up (postfix) so
//! a host loop can sleep instead of polling.

use crate::foundation::core::{Duration, NextTick, TimeValue};
use crate::foundation::error::{TempraError, TempraResult};
use crate::timeline::spec::{SeekOrigin, Timeline};
use crate::timing::clock::{
    ClockId, ClockNode, ClockSample, ClockState, NodeSpec, PendingRequest, NATURAL_LEAF_PERIOD,
};
use crate::timing::interval::{next_local_hit, project_point, TimeIntervalCollection};
use crate::timing::slip::SlipState;
use std::cell::Cell;
use std::rc::Rc;

/// External clock the scheduler advances against.
///
/// Read exactly once at the start of each tick; every node observes the same
/// global time within one tick.
pub trait TimeSource {
    /// Current absolute time in the root base.
    fn now(&self) -> TimeValue;
}

/// Monotonic wall-clock source based on [`std::time::Instant`].
#[derive(Debug)]
pub struct SystemTimeSource {
    origin: std::time::Instant,
}

impl SystemTimeSource {
    /// Source whose zero is the moment of construction.
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> TimeValue {
        TimeValue(i64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(i64::MAX))
    }
}

/// Host-driven source for deterministic loops and tests.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now: Rc<Cell<TimeValue>>,
}

impl ManualTimeSource {
    /// Source starting at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that can move this source's time from outside the manager.
    pub fn handle(&self) -> ManualTimeHandle {
        ManualTimeHandle {
            now: Rc::clone(&self.now),
        }
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> TimeValue {
        self.now.get()
    }
}

/// Setter half of a [`ManualTimeSource`].
#[derive(Clone, Debug)]
pub struct ManualTimeHandle {
    now: Rc<Cell<TimeValue>>,
}

impl ManualTimeHandle {
    /// Set the absolute time.
    pub fn set(&self, t: TimeValue) {
        self.now.set(t);
    }

    /// Advance time by `delta`.
    pub fn advance(&self, delta: TimeValue) {
        self.now.set(self.now.get() + delta);
    }
}

/// One arena slot; the generation bumps when the slot is vacated so stale
/// [`ClockId`]s fail to resolve.
#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<ClockNode>,
}

/// Owns a runtime clock tree and drives it forward in discrete ticks.
pub struct TimeManager {
    source: Box<dyn TimeSource>,
    slots: Vec<Slot>,
    free: Vec<usize>,
    last_tick: Option<TimeValue>,
    /// Raw source time at which the global clock was held, while held.
    paused_at: Option<TimeValue>,
    /// Accumulated raw source time spent held, subtracted from every read.
    pause_shift: TimeValue,
}

impl TimeManager {
    /// Manager driven by the given time source.
    pub fn new(source: Box<dyn TimeSource>) -> Self {
        let root_spec = NodeSpec::from_timeline(
            &Timeline::group(Vec::new()).with_duration_kind(Duration::Forever),
        );
        let root = ClockNode::new(root_spec, None, 0);
        Self {
            source,
            slots: vec![Slot {
                generation: 0,
                node: Some(root),
            }],
            free: Vec::new(),
            last_tick: None,
            paused_at: None,
            pause_shift: TimeValue::ZERO,
        }
    }

    /// Manager driven by the system wall clock.
    pub fn with_system_clock() -> Self {
        Self::new(Box::new(SystemTimeSource::new()))
    }

    // ----- arena plumbing -------------------------------------------------

    fn node(&self, idx: usize) -> &ClockNode {
        self.slots[idx].node.as_ref().expect("occupied arena slot")
    }

    fn node_mut(&mut self, idx: usize) -> &mut ClockNode {
        self.slots[idx].node.as_mut().expect("occupied arena slot")
    }

    fn resolve(&self, id: ClockId) -> TempraResult<usize> {
        let idx = id.index as usize;
        let live = self
            .slots
            .get(idx)
            .is_some_and(|s| s.generation == id.generation && s.node.is_some());
        if !live {
            return Err(TempraError::validation("stale or unknown clock handle"));
        }
        Ok(idx)
    }

    fn alloc(&mut self, node: ClockNode) -> usize {
        if let Some(idx) = self.free.pop() {
            self.slots[idx].node = Some(node);
            idx
        } else {
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            self.slots.len() - 1
        }
    }

    fn mark_dirty_chain(&mut self, mut idx: usize) {
        loop {
            let n = self.node_mut(idx);
            n.subtree_dirty = true;
            match n.parent {
                Some(p) => idx = p,
                None => break,
            }
        }
    }

    // ----- instantiation --------------------------------------------------

    /// Instantiate a descriptor tree into a fresh runtime clock tree rooted
    /// under this manager, returning the subtree root's handle.
    pub fn instantiate(&mut self, timeline: &Timeline) -> TempraResult<ClockId> {
        timeline.validate()?;
        // Slip is defined only for the execution root: a nested slip group's
        // begin-time resolution would be ill-defined.
        for child in timeline.children() {
            if subtree_requests_slip(child) {
                return Err(TempraError::validation(
                    "slip synchronization requires the execution root",
                ));
            }
        }

        let root_children = self.node(0).children.len();
        let idx = self.build(timeline, 0, root_children);
        self.node_mut(0).children.push(idx);

        if timeline.slip_requested() {
            let path = timeline
                .find_slip_designee()
                .ok_or_else(|| TempraError::validation("a slip group needs a slip-capable descendant"))?;
            let mut designee = idx;
            for step in path {
                designee = self.node(designee).children[step];
            }
            self.node_mut(idx).slip = Some(SlipState::new(designee));
        }

        self.mark_dirty_chain(idx);
        let id = ClockId {
            index: idx as u32,
            generation: self.slots[idx].generation,
        };
        tracing::debug!(index = idx, "instantiated clock tree");
        Ok(id)
    }

    fn build(&mut self, t: &Timeline, parent: usize, child_index: usize) -> usize {
        let idx = self.alloc(ClockNode::new(NodeSpec::from_timeline(t), Some(parent), child_index));
        for (i, child) in t.children().iter().enumerate() {
            let c = self.build(child, idx, i);
            self.node_mut(idx).children.push(c);
        }
        let period = self.resolve_period(idx);
        self.node_mut(idx).resolved_period = period;
        idx
    }

    /// Resolve a node's simple duration bottom-up (children already resolved).
    ///
    /// `Automatic` on a leaf is the natural leaf period; on a group it is the
    /// maximum end-of-active-period over its children, `Forever` when any
    /// child is unbounded. Computed once per structural change, never per
    /// tick.
    fn resolve_period(&self, idx: usize) -> Option<TimeValue> {
        let n = self.node(idx);
        match n.spec.duration {
            Duration::Timed(span) => Some(span),
            Duration::Forever => None,
            Duration::Automatic => {
                if !n.spec.is_group {
                    return Some(NATURAL_LEAF_PERIOD);
                }
                let mut max_end = TimeValue::ZERO;
                for &c in &n.children {
                    let child = self.node(c);
                    let Some(begin) = child.spec.begin else {
                        // A never-beginning child contributes no end point.
                        continue;
                    };
                    match child.active_span_scaled() {
                        Some(span) => {
                            let end = begin + span.scale(1.0 / child.spec.speed_ratio);
                            max_end = max_end.max(end);
                        }
                        None => return None,
                    }
                }
                Some(max_end)
            }
        }
    }

    /// Release a runtime subtree, invalidating every handle into it.
    pub fn release(&mut self, id: ClockId) -> TempraResult<()> {
        let idx = self.resolve(id)?;
        if idx == 0 {
            return Err(TempraError::validation("the manager root cannot be released"));
        }
        let parent = self.node(idx).parent;
        if let Some(p) = parent {
            let children = &mut self.node_mut(p).children;
            children.retain(|&c| c != idx);
            let reindexed: Vec<usize> = children.clone();
            for (i, c) in reindexed.into_iter().enumerate() {
                self.node_mut(c).child_index = i;
            }
            self.mark_dirty_chain(p);
        }
        let mut stack = vec![idx];
        while let Some(i) = stack.pop() {
            if let Some(node) = self.slots[i].node.take() {
                stack.extend(node.children);
            }
            self.slots[i].generation = self.slots[i].generation.wrapping_add(1);
            self.free.push(i);
        }
        tracing::debug!(index = idx, "released clock tree");
        Ok(())
    }

    // ----- interactive controller surface ---------------------------------

    fn queue(&mut self, id: ClockId, req: PendingRequest) -> TempraResult<()> {
        let idx = self.resolve(id)?;
        self.node_mut(idx).pending.push(req);
        self.mark_dirty_chain(idx);
        Ok(())
    }

    /// Restart the node now, regardless of its descriptor begin offset.
    pub fn begin(&mut self, id: ClockId) -> TempraResult<()> {
        self.queue(id, PendingRequest::Begin)
    }

    /// Stop the node; its state becomes `Stopped` until begun again.
    pub fn stop(&mut self, id: ClockId) -> TempraResult<()> {
        self.queue(id, PendingRequest::Stop)
    }

    /// Freeze the node's local time.
    pub fn pause(&mut self, id: ClockId) -> TempraResult<()> {
        self.queue(id, PendingRequest::Pause)
    }

    /// Resume a paused node with local-time continuity.
    pub fn resume(&mut self, id: ClockId) -> TempraResult<()> {
        self.queue(id, PendingRequest::Resume)
    }

    /// Jump the node's local time to `offset` from the given origin,
    /// applied at the next tick.
    pub fn seek(&mut self, id: ClockId, offset: TimeValue, origin: SeekOrigin) -> TempraResult<()> {
        self.validate_seek(id, offset, origin)?;
        self.queue(id, PendingRequest::Seek { offset, origin })
    }

    /// Like [`TimeManager::seek`], but applied synchronously against the
    /// last tick's time instead of waiting for the next tick.
    pub fn seek_aligned_to_last_tick(
        &mut self,
        id: ClockId,
        offset: TimeValue,
        origin: SeekOrigin,
    ) -> TempraResult<()> {
        self.validate_seek(id, offset, origin)?;
        self.queue(id, PendingRequest::Seek { offset, origin })?;
        if let Some(t) = self.last_tick {
            self.walk(t)?;
        }
        Ok(())
    }

    fn validate_seek(&self, id: ClockId, offset: TimeValue, origin: SeekOrigin) -> TempraResult<()> {
        let idx = self.resolve(id)?;
        if offset.is_negative() {
            return Err(TempraError::timing("seek offset must be >= 0"));
        }
        if origin == SeekOrigin::Duration && self.node(idx).resolved_period.is_none() {
            return Err(TempraError::timing(
                "seek from the Duration origin requires a resolved finite duration",
            ));
        }
        Ok(())
    }

    /// Jump to the end of the active period (the fill zone).
    pub fn skip_to_fill(&mut self, id: ClockId) -> TempraResult<()> {
        let idx = self.resolve(id)?;
        if self.node(idx).active_span_scaled().is_none() {
            return Err(TempraError::timing(
                "cannot skip to fill of an unbounded active period",
            ));
        }
        self.queue(id, PendingRequest::SkipToFill)
    }

    /// Set the node's interactive speed ratio (multiplies the descriptor's).
    pub fn set_speed_ratio(&mut self, id: ClockId, ratio: f64) -> TempraResult<()> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(TempraError::timing("speed ratio must be finite and > 0"));
        }
        self.queue(id, PendingRequest::SpeedRatio(ratio))
    }

    /// Signal that a slip-capable node's external dependency is ready.
    pub fn signal_slip_ready(&mut self, id: ClockId) -> TempraResult<()> {
        let idx = self.resolve(id)?;
        if !self.node(idx).spec.can_slip {
            return Err(TempraError::validation(
                "signal_slip_ready targets a slip-capable node",
            ));
        }
        self.node_mut(idx).slip_ready = true;
        self.mark_dirty_chain(idx);
        Ok(())
    }

    // ----- global clock ---------------------------------------------------

    /// Current global time (held fixed while globally paused).
    pub fn current_global_time(&self) -> TimeValue {
        let raw = match self.paused_at {
            Some(p) => p,
            None => self.source.now(),
        };
        raw - self.pause_shift
    }

    /// Time of the most recent tick, if any.
    pub fn last_tick_time(&self) -> Option<TimeValue> {
        self.last_tick
    }

    /// Hold the global clock; subsequent ticks observe frozen time.
    pub fn pause_all(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(self.source.now());
        }
    }

    /// Release the global clock, discarding the held span.
    pub fn resume_all(&mut self) {
        if let Some(p) = self.paused_at.take() {
            self.pause_shift = self.pause_shift + (self.source.now() - p);
        }
    }

    // ----- reads ----------------------------------------------------------

    /// Current state of a clock node.
    pub fn state(&self, id: ClockId) -> TempraResult<ClockState> {
        Ok(self.node(self.resolve(id)?).state)
    }

    /// Current sample of a clock node, `None` while stopped.
    pub fn sample(&self, id: ClockId) -> TempraResult<Option<ClockSample>> {
        Ok(self.node(self.resolve(id)?).state.sample())
    }

    /// Position of a clock among its siblings, in descriptor order.
    pub fn child_index(&self, id: ClockId) -> TempraResult<usize> {
        Ok(self.node(self.resolve(id)?).child_index)
    }

    /// Handles of a group clock's children, in descriptor order.
    pub fn children(&self, id: ClockId) -> TempraResult<Vec<ClockId>> {
        let idx = self.resolve(id)?;
        Ok(self
            .node(idx)
            .children
            .iter()
            .map(|&c| ClockId {
                index: c as u32,
                generation: self.slots[c].generation,
            })
            .collect())
    }

    /// Resolved simple duration (`Timed` or `Forever`, never `Automatic`).
    pub fn resolved_duration(&self, id: ClockId) -> TempraResult<Duration> {
        let idx = self.resolve(id)?;
        Ok(match self.node(idx).resolved_period {
            Some(span) => Duration::Timed(span),
            None => Duration::Forever,
        })
    }

    pub(crate) fn state_generation(&self, id: ClockId) -> TempraResult<u64> {
        Ok(self.node(self.resolve(id)?).state_generation)
    }

    /// When the next tick is actually needed; `At` is absolute root time.
    pub fn next_tick_needed(&self) -> NextTick {
        match self.last_tick {
            None => NextTick::Immediate,
            Some(_) => self.node(0).next_tick,
        }
    }

    /// Convenience: how long after the last tick the next one is needed.
    pub fn time_until_next_tick(&self) -> Option<TimeValue> {
        match (self.next_tick_needed(), self.last_tick) {
            (NextTick::Immediate, _) | (NextTick::At(_), None) => Some(TimeValue::ZERO),
            (NextTick::At(t), Some(last)) => Some((t - last).max(TimeValue::ZERO)),
            (NextTick::Never, _) => None,
        }
    }

    // ----- the tick -------------------------------------------------------

    /// Advance global time and re-resolve the whole tree once.
    ///
    /// One tick is one synchronous pass; the time source is read exactly once
    /// at entry and held fixed for the remainder of the computation.
    pub fn tick(&mut self) -> TempraResult<()> {
        let now = self.current_global_time();
        self.walk(now)
    }

    fn walk(&mut self, now: TimeValue) -> TempraResult<()> {
        let first = self.last_tick.is_none();
        let top = match self.last_tick {
            None => {
                // Root activation: a single point plus a null point.
                let mut c = TimeIntervalCollection::point(now);
                c.add_null_point();
                c
            }
            Some(prev) => {
                if now < prev {
                    return Err(TempraError::timing("time source went backwards"));
                }
                if now == prev {
                    TimeIntervalCollection::point(now)
                } else {
                    TimeIntervalCollection::open_closed(prev, now)?
                }
            }
        };
        tracing::trace!(now = now.0, first, "tick");
        self.rec_tick(0, Some(now), &top, first, NextTick::Never, now);
        self.last_tick = Some(now);
        Ok(())
    }

    /// Prefix step for one node, recursion into children, postfix aggregation
    /// on the unwind. Returns the node's aggregated next-tick bound.
    fn rec_tick(
        &mut self,
        idx: usize,
        parent_local_now: Option<TimeValue>,
        parent_intervals: &TimeIntervalCollection,
        parent_changed: bool,
        parent_bound: NextTick,
        now_root: TimeValue,
    ) -> NextTick {
        // Pruning: an untouched subtree whose cached bound is not yet due
        // keeps its state; correctness relies on revisiting it by then.
        {
            let n = self.node(idx);
            if !parent_changed && !n.subtree_dirty && !n.next_tick.is_due(now_root) {
                return n.next_tick;
            }
        }

        let t_p_now = parent_local_now.unwrap_or(TimeValue::ZERO);
        let mut changed = parent_changed;

        let pending = std::mem::take(&mut self.node_mut(idx).pending);
        if !pending.is_empty() {
            changed = true;
        }
        for req in pending {
            self.node_mut(idx).apply_request(req, t_p_now);
        }

        if self.node(idx).slip.is_some() && self.slip_adjust(idx, now_root) {
            changed = true;
        }

        // Project this node's current point and tick windows.
        let prev_state = self.node(idx).state;
        let (new_state, mut local_intervals, current_u) = {
            let n = self.node(idx);
            match (parent_local_now, n.projection()) {
                (Some(t_p), Some(args)) => {
                    let t_eff = n.effective_parent_time(t_p);
                    let state = n.state_for_point(project_point(t_eff, &args));
                    let u = (t_eff >= args.begin)
                        .then(|| (t_eff - args.begin).scale(n.rate));
                    let col = parent_intervals.project_onto_periodic_function(&args);
                    (state, col, u)
                }
                _ => (ClockState::Stopped, TimeIntervalCollection::empty(), None),
            }
        };

        let kind_changed = !prev_state.same_kind(&new_state);
        if kind_changed {
            changed = true;
            // Entering or leaving Stopped makes local time momentarily
            // undefined; mark it for descendants. A fill regressing to
            // Active (seek) passes through Stopped within the same tick.
            if prev_state.is_stopped() || new_state.is_stopped() || new_state.is_active() {
                local_intervals.add_null_point();
            }
        }
        match (prev_state.sample(), new_state.sample()) {
            (Some(a), Some(b)) if b.iteration != a.iteration || b.local_time < a.local_time => {
                // Iteration wrap or reversal: descendants replay.
                changed = true;
            }
            _ => {}
        }

        {
            let n = self.node_mut(idx);
            if kind_changed {
                n.state_generation += 1;
            }
            n.state = new_state;
            n.current_u = current_u;
            n.tick_intervals = local_intervals;
        }

        let own_bound = self.own_bound(idx, parent_local_now);

        let mut agg = own_bound;
        if self.node(idx).spec.is_group {
            let children = self.node(idx).children.clone();
            let child_local = new_state.sample().map(|s| s.local_time);
            let col = self.node(idx).tick_intervals.clone();
            for c in children {
                let r = self.rec_tick(c, child_local, &col, changed, own_bound, now_root);
                agg = agg.earlier(r);
            }
        }

        let bound = agg.clip_to(parent_bound);
        {
            let n = self.node_mut(idx);
            n.next_tick = bound;
            n.subtree_dirty = false;
        }
        bound
    }

    /// This node's own contribution to "when is the next tick needed".
    ///
    /// An unpaused active animation leaf changes continuously; everything
    /// else only changes at discrete boundaries, converted to root time
    /// through the ancestor chain.
    fn own_bound(&self, idx: usize, parent_local_now: Option<TimeValue>) -> NextTick {
        let n = self.node(idx);
        let Some(t_p) = parent_local_now else {
            return NextTick::Never;
        };
        if n.state.is_active() && !n.spec.is_group && n.paused_at.is_none() {
            return NextTick::Immediate;
        }
        match n.next_boundary_in_parent(n.effective_parent_time(t_p)) {
            Some(t_evt) => match self.to_root_time(idx, t_evt) {
                Some(t) => NextTick::At(t),
                None => NextTick::Never,
            },
            None => NextTick::Never,
        }
    }

    /// Convert an event at `target` in `idx`'s parent base into root time by
    /// asking each ancestor when its warped local time next reaches that
    /// value. `None` when some ancestor can never reach it.
    fn to_root_time(&self, idx: usize, target: TimeValue) -> Option<TimeValue> {
        let n = self.node(idx);
        let Some(p_idx) = n.parent else {
            // The root's parent base is global time itself.
            return Some(target);
        };
        let p = self.node(p_idx);
        if p.paused_at.is_some() {
            return None;
        }
        let args = p.projection()?;
        let u_now = p.current_u.unwrap_or(TimeValue::ZERO).max(TimeValue::ZERO);
        let u_hit = next_local_hit(u_now, target, &args)?;
        let t_pp = args.begin + u_hit.scale(1.0 / args.speed_ratio);
        self.to_root_time(p_idx, t_pp)
    }

    /// One step of the slip negotiation; returns `true` when the root's
    /// begin slid this tick.
    fn slip_adjust(&mut self, idx: usize, now_root: TimeValue) -> bool {
        let Some(slip) = self.node(idx).slip else {
            return false;
        };
        if !slip.in_sync {
            return false;
        }
        let designee = slip.designee;
        if !self.node(designee).slip_ready {
            // Hold the subtree at the designee's begin point until ready:
            // slide the root's begin by exactly the designee's overshoot,
            // converted through the ancestor rate chain.
            if let Some((overshoot, rate)) = self.designee_overshoot(idx, designee, now_root) {
                if overshoot > TimeValue::ZERO && rate > 0.0 {
                    if let Some(begin) = self.node(idx).begin_time {
                        let max_slide = (now_root - begin).max(TimeValue::ZERO);
                        let slide = overshoot.scale(1.0 / rate).min(max_slide);
                        if slide > TimeValue::ZERO {
                            self.node_mut(idx).begin_time = Some(begin + slide);
                            tracing::trace!(index = idx, slipped = slide.0, "slip hold");
                            return true;
                        }
                    }
                }
            }
            return false;
        }
        // Ready: tear the relationship down once the designee's elapsed time
        // reaches its own active span; the slipped begin freezes as-is.
        if let (Some(u), Some(span)) = (
            self.node(designee).current_u,
            self.node(designee).active_span_scaled(),
        ) {
            if u >= span {
                if let Some(s) = &mut self.node_mut(idx).slip {
                    s.in_sync = false;
                }
                tracing::debug!(index = idx, "slip sync period ended");
            }
        }
        false
    }

    /// Probe how far past its begin point the designee would be at the
    /// current transforms, walking the chain from the slip root down.
    ///
    /// Returns the overshoot in the designee's parent base together with the
    /// accumulated local-per-root rate of the ancestors above it; `None` when
    /// the designee has not reached its begin point.
    fn designee_overshoot(
        &self,
        root_idx: usize,
        designee: usize,
        now_root: TimeValue,
    ) -> Option<(TimeValue, f64)> {
        // Collect the path root -> designee.
        let mut path = vec![designee];
        let mut cur = designee;
        while let Some(p) = self.node(cur).parent {
            path.push(p);
            if p == root_idx {
                break;
            }
            cur = p;
        }
        path.reverse();

        // Parent base of the slip root is the manager root's local time,
        // which is global time by construction.
        let mut t_p = now_root;
        let mut rate = 1.0;
        for (i, &node_idx) in path.iter().enumerate() {
            let n = self.node(node_idx);
            let Some(begin) = n.begin_time else {
                return None;
            };
            if i == path.len() - 1 {
                let over = n.effective_parent_time(t_p) - begin;
                return (!over.is_negative()).then_some((over, rate));
            }
            let args = n.projection()?;
            match project_point(n.effective_parent_time(t_p), &args) {
                crate::timing::interval::ProjectedPoint::Active { local, .. }
                | crate::timing::interval::ProjectedPoint::PostFill { local, .. } => {
                    t_p = local;
                    rate *= n.rate;
                }
                _ => return None,
            }
        }
        None
    }
}

impl std::fmt::Debug for TimeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeManager")
            .field("nodes", &(self.slots.len() - self.free.len()))
            .field("last_tick", &self.last_tick)
            .finish_non_exhaustive()
    }
}

fn subtree_requests_slip(t: &Timeline) -> bool {
    t.slip_requested() || t.children().iter().any(subtree_requests_slip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Duration;
    use crate::timeline::spec::{FillBehavior, RepeatBehavior};

    fn manager() -> (TimeManager, ManualTimeHandle) {
        let source = ManualTimeSource::new();
        let handle = source.handle();
        (TimeManager::new(Box::new(source)), handle)
    }

    fn secs(s: i64) -> TimeValue {
        TimeValue::from_secs(s)
    }

    #[test]
    fn stale_handles_fail_to_resolve() {
        let (mut mgr, _) = manager();
        let id = mgr.instantiate(&Timeline::animation()).unwrap();
        mgr.release(id).unwrap();
        assert!(mgr.state(id).is_err());
        // A fresh instantiation reusing the slot gets a new generation.
        let id2 = mgr.instantiate(&Timeline::animation()).unwrap();
        assert!(mgr.state(id).is_err());
        assert!(mgr.state(id2).is_ok());
    }

    #[test]
    fn automatic_group_duration_is_max_child_end() {
        let (mut mgr, _) = manager();
        let tree = Timeline::group(vec![
            Timeline::animation()
                .with_begin(secs(1))
                .with_duration(secs(2)),
            Timeline::animation().with_duration(secs(2)),
        ]);
        let id = mgr.instantiate(&tree).unwrap();
        assert_eq!(mgr.resolved_duration(id).unwrap(), Duration::Timed(secs(3)));
    }

    #[test]
    fn automatic_group_with_unbounded_child_is_forever() {
        let (mut mgr, _) = manager();
        let tree = Timeline::group(vec![
            Timeline::animation()
                .with_duration(secs(1))
                .with_repeat(RepeatBehavior::Forever),
        ]);
        let id = mgr.instantiate(&tree).unwrap();
        assert_eq!(mgr.resolved_duration(id).unwrap(), Duration::Forever);
    }

    #[test]
    fn nested_slip_is_rejected() {
        let (mut mgr, _) = manager();
        let inner = Timeline::group(vec![Timeline::animation().with_can_slip(true)])
            .with_slip()
            .unwrap();
        let outer = Timeline::group(vec![inner]);
        assert!(mgr.instantiate(&outer).is_err());
    }

    #[test]
    fn first_tick_activates_a_zero_begin_clock() {
        let (mut mgr, _) = manager();
        let id = mgr
            .instantiate(&Timeline::animation().with_duration(secs(4)))
            .unwrap();
        mgr.tick().unwrap();
        let sample = mgr.sample(id).unwrap().unwrap();
        assert_eq!(sample.local_time, TimeValue::ZERO);
        assert_eq!(sample.iteration, 1);
    }

    #[test]
    fn next_tick_sleeps_until_a_future_begin() {
        let (mut mgr, handle) = manager();
        let id = mgr
            .instantiate(
                &Timeline::animation()
                    .with_begin(secs(5))
                    .with_duration(secs(1))
                    .with_fill(FillBehavior::Stop),
            )
            .unwrap();
        mgr.tick().unwrap();
        assert!(mgr.state(id).unwrap().is_stopped());
        assert_eq!(mgr.next_tick_needed(), NextTick::At(secs(5)));

        handle.set(secs(5));
        mgr.tick().unwrap();
        assert!(mgr.state(id).unwrap().is_active());
        assert_eq!(mgr.next_tick_needed(), NextTick::Immediate);

        // Past the active period with FillBehavior::Stop nothing remains.
        handle.set(secs(7));
        mgr.tick().unwrap();
        assert!(mgr.state(id).unwrap().is_stopped());
        assert_eq!(mgr.next_tick_needed(), NextTick::Never);
        assert_eq!(mgr.time_until_next_tick(), None);
    }

    #[test]
    fn rejects_backward_time() {
        let (mut mgr, handle) = manager();
        mgr.instantiate(&Timeline::animation()).unwrap();
        handle.set(secs(2));
        mgr.tick().unwrap();
        handle.set(secs(1));
        assert!(mgr.tick().is_err());
    }

    #[test]
    fn seek_validation_rejects_bad_requests() {
        let (mut mgr, _) = manager();
        let bounded = mgr
            .instantiate(&Timeline::animation().with_duration(secs(2)))
            .unwrap();
        let unbounded = mgr
            .instantiate(&Timeline::animation().with_duration_kind(Duration::Forever))
            .unwrap();

        assert!(mgr.seek(bounded, secs(-1), SeekOrigin::BeginTime).is_err());
        assert!(mgr.seek(unbounded, secs(1), SeekOrigin::Duration).is_err());
        assert!(mgr.seek(bounded, secs(1), SeekOrigin::Duration).is_ok());
        assert!(mgr.set_speed_ratio(bounded, 0.0).is_err());
        assert!(mgr.skip_to_fill(unbounded).is_err());
    }

    #[test]
    fn global_pause_freezes_observed_time() {
        let (mut mgr, handle) = manager();
        let id = mgr
            .instantiate(&Timeline::animation().with_duration(secs(10)))
            .unwrap();
        handle.set(secs(2));
        mgr.tick().unwrap();
        mgr.pause_all();
        handle.set(secs(6));
        mgr.tick().unwrap();
        assert_eq!(mgr.sample(id).unwrap().unwrap().local_time, secs(2));
        mgr.resume_all();
        handle.set(secs(7));
        mgr.tick().unwrap();
        // 4 held seconds are discarded.
        assert_eq!(mgr.sample(id).unwrap().unwrap().local_time, secs(3));
    }
}
