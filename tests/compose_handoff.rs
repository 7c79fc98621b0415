//! Composition-layer folding and handoff behavior.

use std::sync::Arc;
use tempra::{
    AnimationClock, AnimationLayer, AnimationStorage, FillBehavior, FromToBy, HandoffPolicy,
    ManualTimeSource, PropertyId, TargetId, TimeManager, TimeValue, Timeline,
};

fn manager() -> (TimeManager, tempra::ManualTimeHandle) {
    let source = ManualTimeSource::new();
    let handle = source.handle();
    (TimeManager::new(Box::new(source)), handle)
}

fn secs(s: i64) -> TimeValue {
    TimeValue::from_secs(s)
}

#[test]
fn empty_chain_returns_default() {
    let (mgr, _) = manager();
    let mut layer: AnimationLayer<f64> = AnimationLayer::new();
    assert_eq!(layer.sample(&mgr, &13.5).unwrap(), 13.5);
}

#[test]
fn stopped_clock_returns_destination_verbatim() {
    let (mut mgr, handle) = manager();
    let id = mgr
        .instantiate(
            &Timeline::animation()
                .with_duration(secs(1))
                .with_fill(FillBehavior::Stop),
        )
        .unwrap();
    let clock = AnimationClock::new(id, Arc::new(FromToBy::from_to(0.0, 100.0)));

    // Run the clock to completion; FillBehavior::Stop leaves it Stopped.
    mgr.tick().unwrap();
    handle.set(secs(2));
    mgr.tick().unwrap();
    assert!(mgr.state(id).unwrap().is_stopped());
    assert_eq!(clock.value(&mgr, &1.0, &42.0).unwrap(), 42.0);
    // Idempotent regardless of history.
    assert_eq!(clock.value(&mgr, &7.0, &42.0).unwrap(), 42.0);
}

#[test]
fn additive_then_non_additive_folds_to_the_override() {
    // Clock A: additive, delta +10, fully elapsed (iteration 1).
    // Clock B: non-additive, targets 50.
    // B replaces the running value, so A's contribution is superseded: 50.
    let (mut mgr, handle) = manager();
    let a_id = mgr
        .instantiate(
            &Timeline::animation()
                .with_duration(secs(1))
                .with_fill(FillBehavior::HoldEnd),
        )
        .unwrap();
    let b_id = mgr
        .instantiate(
            &Timeline::animation()
                .with_duration(secs(1))
                .with_fill(FillBehavior::HoldEnd),
        )
        .unwrap();

    mgr.tick().unwrap();
    handle.set(secs(2));
    mgr.tick().unwrap();

    let a = AnimationClock::new(a_id, Arc::new(FromToBy::from_to(0.0, 10.0).additive()));
    let b = AnimationClock::new(b_id, Arc::new(FromToBy::to(50.0)));

    let mut layer = AnimationLayer::new();
    layer
        .apply(&mgr, vec![a.clone(), b.clone()], HandoffPolicy::Compose, &0.0)
        .unwrap();
    assert_eq!(layer.sample(&mgr, &0.0).unwrap(), 50.0);

    // Reversed order: the additive clock applies after the override.
    let mut layer = AnimationLayer::new();
    layer.apply(&mgr, vec![b, a], HandoffPolicy::Compose, &0.0).unwrap();
    assert_eq!(layer.sample(&mgr, &0.0).unwrap(), 60.0);
}

#[test]
fn snapshot_and_replace_preserves_value_across_handoff() {
    let (mut mgr, handle) = manager();
    let first = mgr
        .instantiate(
            &Timeline::animation()
                .with_duration(secs(2))
                .with_fill(FillBehavior::HoldEnd),
        )
        .unwrap();

    let mut layer = AnimationLayer::new();
    layer
        .apply(
            &mgr,
            vec![AnimationClock::new(first, Arc::new(FromToBy::to(80.0)))],
            HandoffPolicy::SnapshotAndReplace,
            &0.0,
        )
        .unwrap();

    mgr.tick().unwrap();
    handle.set(secs(1));
    mgr.tick().unwrap();
    assert_eq!(layer.sample(&mgr, &0.0).unwrap(), 40.0);

    // Replace with a chain whose clock has not begun yet: the pre-attach
    // folded value must keep flowing.
    let late = mgr
        .instantiate(
            &Timeline::animation()
                .with_begin(secs(5))
                .with_duration(secs(2)),
        )
        .unwrap();
    handle.set(secs(1));
    mgr.tick().unwrap();
    layer
        .apply(
            &mgr,
            vec![AnimationClock::new(late, Arc::new(FromToBy::to(100.0)))],
            HandoffPolicy::SnapshotAndReplace,
            &0.0,
        )
        .unwrap();
    assert_eq!(layer.sample(&mgr, &0.0).unwrap(), 40.0);

    // Once the new clock starts, its state generation moves, the snapshot is
    // released, and the new animation takes over from the default origin.
    handle.set(secs(6));
    mgr.tick().unwrap();
    let v = layer.sample(&mgr, &0.0).unwrap();
    assert!((v - 50.0).abs() < 1e-9, "got {v}");
}

#[test]
fn sticky_snapshot_survives_an_already_stopped_chain() {
    let (mut mgr, handle) = manager();
    let running = mgr
        .instantiate(
            &Timeline::animation()
                .with_duration(secs(2))
                .with_fill(FillBehavior::HoldEnd),
        )
        .unwrap();
    // A clock that never begins on its own is Stopped at attach.
    let stopped = mgr
        .instantiate(&Timeline::animation().never_begins().with_duration(secs(1)))
        .unwrap();

    mgr.tick().unwrap();
    handle.set(secs(1));
    mgr.tick().unwrap();

    let mut layer = AnimationLayer::new();
    layer
        .apply(
            &mgr,
            vec![AnimationClock::new(running, Arc::new(FromToBy::to(80.0)))],
            HandoffPolicy::SnapshotAndReplace,
            &0.0,
        )
        .unwrap();
    assert_eq!(layer.sample(&mgr, &0.0).unwrap(), 40.0);

    layer
        .apply(
            &mgr,
            vec![AnimationClock::new(stopped, Arc::new(FromToBy::to(7.0)))],
            HandoffPolicy::SnapshotAndReplace,
            &0.0,
        )
        .unwrap();
    assert!(layer.has_sticky_snapshot());
    // The stopped clock would otherwise contribute nothing; the snapshot is
    // honored instead.
    assert_eq!(layer.sample(&mgr, &0.0).unwrap(), 40.0);

    // Beginning the stopped clock changes its state; stickiness clears.
    mgr.begin(stopped).unwrap();
    handle.set(secs(2));
    mgr.tick().unwrap();
    layer.sample(&mgr, &0.0).unwrap();
    assert!(!layer.has_sticky_snapshot());
}

#[test]
fn storage_round_trip_through_targets() {
    let (mut mgr, handle) = manager();
    let id = mgr
        .instantiate(
            &Timeline::animation()
                .with_duration(secs(2))
                .with_fill(FillBehavior::HoldEnd),
        )
        .unwrap();

    mgr.tick().unwrap();
    handle.set(secs(1));
    mgr.tick().unwrap();

    let mut storage: AnimationStorage<f64> = AnimationStorage::new();
    let (t, p) = (TargetId(7), PropertyId(3));
    storage
        .apply_animation(
            &mgr,
            t,
            p,
            vec![AnimationClock::new(id, Arc::new(FromToBy::from_to(0.0, 10.0)))],
            HandoffPolicy::SnapshotAndReplace,
            &0.0,
        )
        .unwrap();
    assert!(storage.is_animated(t, p));
    assert_eq!(storage.sample_current_value(&mgr, t, p, &0.0).unwrap(), 5.0);

    // An untouched property folds to its default.
    assert_eq!(
        storage
            .sample_current_value(&mgr, t, PropertyId(99), &3.25)
            .unwrap(),
        3.25
    );

    storage.detach_all(t, p);
    assert!(!storage.is_animated(t, p));
}
