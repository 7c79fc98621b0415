//! Interpolation contract for animated value types.

/// Value types an animation leaf can produce.
///
/// `interpolate` is the per-type blend; `add` and `scale` support additive
/// and cumulative composition. Implementations must be pure.
pub trait Animatable: Clone {
    /// Interpolate from `from` to `to` with normalized factor `t` in `[0, 1]`.
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self;

    /// Component-wise sum.
    fn add(a: &Self, b: &Self) -> Self;

    /// Component-wise scale by `factor`.
    fn scale(v: &Self, factor: f64) -> Self;
}

impl Animatable for f64 {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        from + (to - from) * t
    }

    fn add(a: &Self, b: &Self) -> Self {
        a + b
    }

    fn scale(v: &Self, factor: f64) -> Self {
        v * factor
    }
}

impl Animatable for f32 {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        (f64::from(*from) + (f64::from(*to) - f64::from(*from)) * t) as f32
    }

    fn add(a: &Self, b: &Self) -> Self {
        a + b
    }

    fn scale(v: &Self, factor: f64) -> Self {
        (f64::from(*v) * factor) as f32
    }
}

impl Animatable for kurbo::Vec2 {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        *from + (*to - *from) * t
    }

    fn add(a: &Self, b: &Self) -> Self {
        *a + *b
    }

    fn scale(v: &Self, factor: f64) -> Self {
        *v * factor
    }
}

impl Animatable for kurbo::Point {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        kurbo::Point::new(
            from.x + (to.x - from.x) * t,
            from.y + (to.y - from.y) * t,
        )
    }

    fn add(a: &Self, b: &Self) -> Self {
        kurbo::Point::new(a.x + b.x, a.y + b.y)
    }

    fn scale(v: &Self, factor: f64) -> Self {
        kurbo::Point::new(v.x * factor, v.y * factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_interpolation_is_linear() {
        assert_eq!(f64::interpolate(&10.0, &20.0, 0.5), 15.0);
        assert_eq!(f64::add(&1.0, &2.0), 3.0);
        assert_eq!(f64::scale(&3.0, -2.0), -6.0);
    }

    #[test]
    fn point_interpolation_moves_both_axes() {
        let a = kurbo::Point::new(0.0, 10.0);
        let b = kurbo::Point::new(4.0, 2.0);
        let mid = kurbo::Point::interpolate(&a, &b, 0.5);
        assert_eq!(mid, kurbo::Point::new(2.0, 6.0));
    }
}
