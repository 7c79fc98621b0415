//! Animation leaves: value computation driven by a clock's current sample.
//!
//! An [`AnimationClock`] pairs a runtime clock handle with a [`ValueSource`].
//! Value sampling is pull-based and independent of the tick walk: the
//! composition layer asks the clock for a value on demand, handing it a
//! default origin and destination; the source computes from the clock's
//! current progress and iteration.

use crate::animation::value::Animatable;
use crate::foundation::error::{TempraError, TempraResult};
use crate::timeline::ease::Ease;
use crate::timing::clock::{ClockId, ClockSample, ClockState};
use crate::timing::scheduler::TimeManager;
use kurbo::{BezPath, ParamCurve, PathSeg, Point};
use std::sync::Arc;

/// Computes an output value from a clock sample and two fallback values.
pub trait ValueSource<T: Animatable> {
    /// Value at `sample`, given the externally supplied `origin` and
    /// `destination` fallbacks.
    fn current_value(&self, origin: &T, destination: &T, sample: &ClockSample) -> TempraResult<T>;
}

/// A runtime clock paired with the value source it drives.
///
/// Holds no blending state of its own; everything stateful lives in the
/// composition layer, so animation clocks are freely shareable across
/// composition sites.
#[derive(Clone)]
pub struct AnimationClock<T: Animatable> {
    clock: ClockId,
    source: Arc<dyn ValueSource<T>>,
}

impl<T: Animatable> AnimationClock<T> {
    /// Pair `clock` with `source`.
    pub fn new(clock: ClockId, source: Arc<dyn ValueSource<T>>) -> Self {
        Self { clock, source }
    }

    /// The driving clock's handle.
    pub fn clock_id(&self) -> ClockId {
        self.clock
    }

    /// Sample the current value.
    ///
    /// A `Stopped` clock contributes nothing and returns `destination`
    /// verbatim, regardless of prior history. Out-of-range progress is a
    /// contract violation, never clamped.
    pub fn value(&self, manager: &TimeManager, origin: &T, destination: &T) -> TempraResult<T> {
        match manager.state(self.clock)? {
            ClockState::Stopped => Ok(destination.clone()),
            ClockState::Active(sample) | ClockState::Filling(sample) => {
                if !sample.progress.is_finite() || !(0.0..=1.0).contains(&sample.progress) {
                    return Err(TempraError::animation("clock progress outside [0, 1]"));
                }
                self.source.current_value(origin, destination, &sample)
            }
        }
    }
}

impl<T: Animatable> std::fmt::Debug for AnimationClock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationClock").field("clock", &self.clock).finish_non_exhaustive()
    }
}

/// From/to/by interpolation source.
///
/// Unset endpoints resolve against the supplied fallbacks: a missing `from`
/// uses the origin, a missing `to` uses `from + by` when `by` is set and the
/// destination otherwise.
#[derive(Clone, Debug)]
pub struct FromToBy<T> {
    /// Explicit start value.
    pub from: Option<T>,
    /// Explicit end value.
    pub to: Option<T>,
    /// Explicit delta; used when `to` is unset.
    pub by: Option<T>,
    /// Add the computed value to the origin instead of replacing it.
    pub additive: bool,
    /// Accumulate the per-iteration delta across repeats.
    pub cumulative: bool,
    /// Easing applied to progress before interpolation.
    pub ease: Ease,
}

impl<T> FromToBy<T> {
    /// Animate between two explicit values.
    pub fn from_to(from: T, to: T) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            by: None,
            additive: false,
            cumulative: false,
            ease: Ease::Linear,
        }
    }

    /// Animate from the origin toward an explicit value.
    pub fn to(to: T) -> Self {
        Self {
            from: None,
            to: Some(to),
            by: None,
            additive: false,
            cumulative: false,
            ease: Ease::Linear,
        }
    }

    /// Animate from the origin by an explicit delta.
    pub fn by(by: T) -> Self {
        Self {
            from: None,
            to: None,
            by: Some(by),
            additive: false,
            cumulative: false,
            ease: Ease::Linear,
        }
    }

    /// Mark the source additive.
    pub fn additive(mut self) -> Self {
        self.additive = true;
        self
    }

    /// Mark the source cumulative across iterations.
    pub fn cumulative(mut self) -> Self {
        self.cumulative = true;
        self
    }

    /// Set the easing curve.
    pub fn with_ease(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }
}

impl<T: Animatable> ValueSource<T> for FromToBy<T> {
    fn current_value(&self, origin: &T, destination: &T, sample: &ClockSample) -> TempraResult<T> {
        let t = self.ease.apply(sample.progress);
        let (from, to) = match (&self.from, &self.to, &self.by) {
            (Some(f), Some(to), _) => (f.clone(), to.clone()),
            (Some(f), None, Some(by)) => (f.clone(), T::add(f, by)),
            (Some(f), None, None) => (f.clone(), destination.clone()),
            (None, Some(to), _) => (origin.clone(), to.clone()),
            (None, None, Some(by)) => (origin.clone(), T::add(origin, by)),
            (None, None, None) => (origin.clone(), destination.clone()),
        };

        let mut value = T::interpolate(&from, &to, t);
        if self.cumulative && sample.iteration > 1 {
            // Iteration 1 is the first pass; each completed repeat adds one
            // full from->to delta.
            let delta = T::add(&to, &T::scale(&from, -1.0));
            value = T::add(&value, &T::scale(&delta, (sample.iteration - 1) as f64));
        }
        if self.additive {
            value = T::add(origin, &value);
        }
        Ok(value)
    }
}

/// Point source following a fixed geometric path.
///
/// Progress selects a position along the path; cumulative deltas derive from
/// the path's endpoints rather than explicit values.
#[derive(Clone, Debug)]
pub struct PathPosition {
    segments: Vec<PathSeg>,
    additive: bool,
    cumulative: bool,
}

impl PathPosition {
    /// Build from a path; rejects paths with no segments.
    pub fn new(path: &BezPath) -> TempraResult<Self> {
        let segments: Vec<PathSeg> = path.segments().collect();
        if segments.is_empty() {
            return Err(TempraError::animation("path animation needs at least one segment"));
        }
        Ok(Self {
            segments,
            additive: false,
            cumulative: false,
        })
    }

    /// Mark the source additive.
    pub fn additive(mut self) -> Self {
        self.additive = true;
        self
    }

    /// Mark the source cumulative across iterations.
    pub fn cumulative(mut self) -> Self {
        self.cumulative = true;
        self
    }

    /// Point at normalized progress, parameterized uniformly per segment.
    fn point_at(&self, t: f64) -> Point {
        let n = self.segments.len();
        let scaled = t.clamp(0.0, 1.0) * n as f64;
        let idx = (scaled.floor() as usize).min(n - 1);
        let local = scaled - idx as f64;
        self.segments[idx].eval(local)
    }

    fn endpoint_delta(&self) -> kurbo::Vec2 {
        let start = self.segments[0].eval(0.0);
        let end = self.segments[self.segments.len() - 1].eval(1.0);
        end - start
    }
}

impl ValueSource<Point> for PathPosition {
    fn current_value(&self, origin: &Point, _destination: &Point, sample: &ClockSample) -> TempraResult<Point> {
        let mut value = self.point_at(sample.progress);
        if self.cumulative && sample.iteration > 1 {
            let delta = self.endpoint_delta() * (sample.iteration - 1) as f64;
            value += delta;
        }
        if self.additive {
            value = Point::add(origin, &value);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(progress: f64, iteration: u64) -> ClockSample {
        ClockSample {
            local_time: crate::foundation::core::TimeValue::ZERO,
            progress,
            iteration,
        }
    }

    #[test]
    fn from_to_interpolates_explicit_endpoints() {
        let src = FromToBy::from_to(10.0, 20.0);
        let v = src.current_value(&0.0, &0.0, &sample(0.5, 1)).unwrap();
        assert_eq!(v, 15.0);
    }

    #[test]
    fn missing_endpoints_resolve_against_fallbacks() {
        // to-only: origin -> to.
        let v = FromToBy::to(50.0).current_value(&10.0, &0.0, &sample(0.5, 1)).unwrap();
        assert_eq!(v, 30.0);
        // by-only: origin -> origin + by.
        let v = FromToBy::by(8.0).current_value(&10.0, &0.0, &sample(0.25, 1)).unwrap();
        assert_eq!(v, 12.0);
        // nothing: origin -> destination.
        let none: FromToBy<f64> = FromToBy {
            from: None,
            to: None,
            by: None,
            additive: false,
            cumulative: false,
            ease: Ease::Linear,
        };
        let v = none.current_value(&0.0, &100.0, &sample(0.75, 1)).unwrap();
        assert_eq!(v, 75.0);
    }

    #[test]
    fn cumulative_scales_delta_by_completed_iterations() {
        let src = FromToBy::from_to(0.0, 10.0).cumulative();
        // Third iteration at progress 0.5: 5 + 2 * 10.
        let v = src.current_value(&0.0, &0.0, &sample(0.5, 3)).unwrap();
        assert_eq!(v, 25.0);
    }

    #[test]
    fn additive_offsets_the_origin() {
        let src = FromToBy::from_to(0.0, 10.0).additive();
        let v = src.current_value(&5.0, &0.0, &sample(1.0, 1)).unwrap();
        assert_eq!(v, 15.0);
    }

    #[test]
    fn path_position_walks_the_path() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        path.line_to((10.0, 10.0));
        let src = PathPosition::new(&path).unwrap();

        let p = src.current_value(&Point::ZERO, &Point::ZERO, &sample(0.0, 1)).unwrap();
        assert_eq!(p, Point::new(0.0, 0.0));
        let p = src.current_value(&Point::ZERO, &Point::ZERO, &sample(0.5, 1)).unwrap();
        assert_eq!(p, Point::new(10.0, 0.0));
        let p = src.current_value(&Point::ZERO, &Point::ZERO, &sample(1.0, 1)).unwrap();
        assert_eq!(p, Point::new(10.0, 10.0));
    }

    #[test]
    fn path_cumulative_uses_endpoint_delta() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((4.0, 2.0));
        let src = PathPosition::new(&path).unwrap().cumulative();
        let p = src.current_value(&Point::ZERO, &Point::ZERO, &sample(0.5, 2)).unwrap();
        assert_eq!(p, Point::new(6.0, 3.0));
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(PathPosition::new(&BezPath::new()).is_err());
    }
}
