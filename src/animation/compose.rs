//! The composition layer: reconciling competing animation clocks per target.
//!
//! An [`AnimationLayer`] is the composition record for one animated target: an
//! ordered chain of animation clocks folded over a base value, plus the
//! snapshot machinery that keeps values continuous across handoffs.
//! [`AnimationStorage`] maps `(target, property)` pairs to layers, creating
//! them lazily on first attach and dropping them when a chain empties.

use crate::animation::leaf::AnimationClock;
use crate::animation::value::Animatable;
use crate::foundation::error::TempraResult;
use crate::timing::scheduler::TimeManager;
use std::collections::HashMap;

/// How a newly attached chain interacts with one already driving the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandoffPolicy {
    /// Freeze the current folded value as a snapshot, detach the old chain,
    /// and install the new one in its place.
    SnapshotAndReplace,
    /// Append the new clocks after the existing chain.
    Compose,
}

/// Opaque identifier of an animated target object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

/// Opaque identifier of an animated property on a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub u64);

/// Composition record for one animated target value.
#[derive(Debug)]
pub struct AnimationLayer<T: Animatable> {
    chain: Vec<AnimationClock<T>>,
    snapshot: Option<T>,
    sticky: bool,
    /// First clock's state generation at attach; polled at sample time to
    /// release the snapshot the moment that clock's state changes.
    observed_generation: Option<u64>,
}

impl<T: Animatable> Default for AnimationLayer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Animatable> AnimationLayer<T> {
    /// Empty layer with no clocks and no snapshot.
    pub fn new() -> Self {
        Self {
            chain: Vec::new(),
            snapshot: None,
            sticky: false,
            observed_generation: None,
        }
    }

    /// Return `true` when no clocks are attached.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Currently attached clocks, in composition order.
    pub fn clocks(&self) -> &[AnimationClock<T>] {
        &self.chain
    }

    /// Whether the snapshot is sticky (the incoming chain's first clock was
    /// already stopped at attach).
    pub fn has_sticky_snapshot(&self) -> bool {
        self.sticky && self.snapshot.is_some()
    }

    /// Attach `clocks` under `policy`.
    ///
    /// `current_default` is the target's base value at attach time, needed to
    /// fold the outgoing chain into the snapshot.
    pub fn apply(
        &mut self,
        manager: &TimeManager,
        clocks: Vec<AnimationClock<T>>,
        policy: HandoffPolicy,
        current_default: &T,
    ) -> TempraResult<()> {
        match policy {
            HandoffPolicy::Compose => {
                self.chain.extend(clocks);
            }
            HandoffPolicy::SnapshotAndReplace => {
                let snapshot = self.fold(manager, current_default)?;
                self.snapshot = Some(snapshot);
                self.chain = clocks;
                match self.chain.first() {
                    Some(first) => {
                        self.sticky = manager.state(first.clock_id())?.is_stopped();
                        self.observed_generation =
                            Some(manager.state_generation(first.clock_id())?);
                    }
                    None => {
                        self.sticky = false;
                        self.observed_generation = None;
                    }
                }
                tracing::debug!(sticky = self.sticky, clocks = self.chain.len(), "handoff");
            }
        }
        Ok(())
    }

    /// Fold the chain into the target's effective value.
    ///
    /// Starts from the snapshot (or `default` when unset), skips stopped
    /// clocks, and feeds the running value as each clock's origin and
    /// `default` as its destination. With zero contributions the default is
    /// returned outright.
    pub fn sample(&mut self, manager: &TimeManager, default: &T) -> TempraResult<T> {
        self.release_stale_snapshot(manager)?;
        self.fold(manager, default)
    }

    fn fold(&self, manager: &TimeManager, default: &T) -> TempraResult<T> {
        let mut running: Option<T> = self.snapshot.clone();
        for clock in &self.chain {
            if manager.state(clock.clock_id())?.is_stopped() {
                continue;
            }
            let origin = running.take().unwrap_or_else(|| default.clone());
            running = Some(clock.value(manager, &origin, default)?);
        }
        Ok(running.unwrap_or_else(|| default.clone()))
    }

    /// Polled replacement for a state-invalidation subscription: once the
    /// first clock's state generation moves, the snapshot (sticky or not) is
    /// released and real values flow.
    fn release_stale_snapshot(&mut self, manager: &TimeManager) -> TempraResult<()> {
        if self.snapshot.is_none() {
            return Ok(());
        }
        let Some(first) = self.chain.first() else {
            return Ok(());
        };
        let generation = manager.state_generation(first.clock_id())?;
        if self.observed_generation != Some(generation) {
            self.snapshot = None;
            self.sticky = false;
            self.observed_generation = None;
        }
        Ok(())
    }

    /// Detach every clock and reset to the unanimated state.
    pub fn detach_all(&mut self) {
        self.chain.clear();
        self.snapshot = None;
        self.sticky = false;
        self.observed_generation = None;
    }
}

/// Per-`(target, property)` composition records for one value type.
#[derive(Debug)]
pub struct AnimationStorage<T: Animatable> {
    layers: HashMap<(TargetId, PropertyId), AnimationLayer<T>>,
}

impl<T: Animatable> Default for AnimationStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Animatable> AnimationStorage<T> {
    /// Empty storage.
    pub fn new() -> Self {
        Self {
            layers: HashMap::new(),
        }
    }

    /// Attach `clocks` to a target property under `policy`.
    ///
    /// The composition record is created lazily on first attach and removed
    /// as soon as its chain empties, returning the property to being
    /// unanimated.
    pub fn apply_animation(
        &mut self,
        manager: &TimeManager,
        target: TargetId,
        property: PropertyId,
        clocks: Vec<AnimationClock<T>>,
        policy: HandoffPolicy,
        current_default: &T,
    ) -> TempraResult<()> {
        let layer = self.layers.entry((target, property)).or_default();
        layer.apply(manager, clocks, policy, current_default)?;
        if layer.is_empty() {
            self.layers.remove(&(target, property));
        }
        Ok(())
    }

    /// Effective value of a target property, or `default` when unanimated.
    pub fn sample_current_value(
        &mut self,
        manager: &TimeManager,
        target: TargetId,
        property: PropertyId,
        default: &T,
    ) -> TempraResult<T> {
        match self.layers.get_mut(&(target, property)) {
            Some(layer) => layer.sample(manager, default),
            None => Ok(default.clone()),
        }
    }

    /// Detach everything from a target property.
    pub fn detach_all(&mut self, target: TargetId, property: PropertyId) {
        self.layers.remove(&(target, property));
    }

    /// Return `true` when the property has a composition record.
    pub fn is_animated(&self, target: TargetId, property: PropertyId) -> bool {
        self.layers.contains_key(&(target, property))
    }
}
