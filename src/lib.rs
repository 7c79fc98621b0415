//! Tempra is a hierarchical clock and time-scheduling engine.
//!
//! A declarative [`Timeline`] tree describes begin offsets, durations, speed
//! ratios, acceleration/deceleration ramps, repeat behavior, autoreverse, and
//! fill. Instantiating a tree produces a mutable runtime clock tree owned by a
//! [`TimeManager`]; each call to [`TimeManager::tick`] advances global time
//! once and resolves every node's activity state, local time, progress, and
//! iteration in a single synchronous pass. Animation clocks layered over the
//! tree produce values on demand through an [`AnimationLayer`], which folds
//! competing contributors over a base value under an explicit handoff policy.
//!
//! The public API is manager-oriented:
//!
//! - Build and validate a [`Timeline`] descriptor tree
//! - [`TimeManager::instantiate`] it into a clock tree, keep the [`ClockId`]
//! - Drive [`TimeManager::tick`] from the host loop, sleeping by
//!   [`TimeManager::next_tick_needed`]
//! - Sample values through [`AnimationLayer`] / [`AnimationStorage`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Animation value contract and composition layer.
pub mod animation;
/// Declarative descriptor tree.
pub mod timeline;
/// Interval algebra, runtime clock tree, and the tick scheduler.
pub mod timing;

pub use crate::foundation::core::{Duration, NextTick, TimeValue};
pub use crate::foundation::error::{TempraError, TempraResult};

pub use crate::animation::compose::{
    AnimationLayer, AnimationStorage, HandoffPolicy, PropertyId, TargetId,
};
pub use crate::animation::leaf::{AnimationClock, FromToBy, PathPosition, ValueSource};
pub use crate::animation::value::Animatable;
pub use crate::timeline::ease::Ease;
pub use crate::timeline::spec::{FillBehavior, RepeatBehavior, SeekOrigin, Timeline, TimelineKind};
pub use crate::timing::clock::{ClockId, ClockSample, ClockState};
pub use crate::timing::scheduler::{
    ManualTimeHandle, ManualTimeSource, SystemTimeSource, TimeManager, TimeSource,
};
