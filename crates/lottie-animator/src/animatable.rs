//! Keyframe interpolation and value providers.
//!
//! A [`ValueProvider`] yields the value of one animatable attribute for any
//! frame. Keyframed attributes use a [`KeyframeInterpolator`]; everything else
//! (static model values, external overrides) is a [`ConstantProvider`] or a
//! [`ClosureProvider`].

use glam::{Vec2, Vec3, Vec4};
use lottie_data::model::BezierPath;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub trait Interpolatable: Sized + Clone + PartialEq {
    fn lerp(&self, other: &Self, t: f32) -> Self;

    /// Interpolates along a cubic curve whose handles are offsets from the
    /// endpoints. Kinds without a spatial meaning fall back to [`lerp`].
    ///
    /// [`lerp`]: Interpolatable::lerp
    fn lerp_spatial(
        &self,
        other: &Self,
        t: f32,
        _tan_out: Option<Vec3>,
        _tan_in: Option<Vec3>,
    ) -> Self {
        self.lerp(other, t)
    }
}

impl Interpolatable for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolatable for Vec2 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec2::lerp(*self, *other, t)
    }

    fn lerp_spatial(
        &self,
        other: &Self,
        t: f32,
        tan_out: Option<Vec3>,
        tan_in: Option<Vec3>,
    ) -> Self {
        let p0 = *self;
        let p3 = *other;
        let p1 = p0 + tan_out.unwrap_or(Vec3::ZERO).truncate();
        let p2 = p3 + tan_in.unwrap_or(Vec3::ZERO).truncate();
        cubic_point(p0, p1, p2, p3, t)
    }
}

impl Interpolatable for Vec3 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec3::lerp(*self, *other, t)
    }

    fn lerp_spatial(
        &self,
        other: &Self,
        t: f32,
        tan_out: Option<Vec3>,
        tan_in: Option<Vec3>,
    ) -> Self {
        let p0 = *self;
        let p3 = *other;
        let p1 = p0 + tan_out.unwrap_or(Vec3::ZERO);
        let p2 = p3 + tan_in.unwrap_or(Vec3::ZERO);
        cubic_point(p0, p1, p2, p3, t)
    }
}

impl Interpolatable for Vec4 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Vec4::lerp(*self, *other, t)
    }
}

impl Interpolatable for BezierPath {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        if t <= 0.0 {
            return self.clone();
        }
        if t >= 1.0 {
            return other.clone();
        }

        // Vertex counts should match between keyframes; extra vertices are dropped.
        let count = self.v.len().min(other.v.len());
        if count == 0 {
            return self.clone();
        }

        let mix = |a: [f32; 2], b: [f32; 2]| [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t];
        let zero = [0.0, 0.0];

        let mut v = Vec::with_capacity(count);
        let mut i = Vec::with_capacity(count);
        let mut o = Vec::with_capacity(count);
        for idx in 0..count {
            v.push(mix(self.v[idx], other.v[idx]));
            i.push(mix(
                self.i.get(idx).copied().unwrap_or(zero),
                other.i.get(idx).copied().unwrap_or(zero),
            ));
            o.push(mix(
                self.o.get(idx).copied().unwrap_or(zero),
                other.o.get(idx).copied().unwrap_or(zero),
            ));
        }

        BezierPath { c: self.c, v, i, o }
    }
}

fn cubic_point<T>(p0: T, p1: T, p2: T, p3: T, t: f32) -> T
where
    T: std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T>,
{
    let one_minus_t = 1.0 - t;
    let one_minus_t_sq = one_minus_t * one_minus_t;
    let t_sq = t * t;

    p0 * (one_minus_t_sq * one_minus_t)
        + p1 * (3.0 * one_minus_t_sq * t)
        + p2 * (3.0 * one_minus_t * t_sq)
        + p3 * (t_sq * t)
}

// Cubic Bezier Easing
pub fn solve_cubic_bezier(p1: Vec2, p2: Vec2, x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    // Newton-Raphson
    let mut t = x;
    for _ in 0..8 {
        let one_minus_t = 1.0 - t;
        let x_est = 3.0 * one_minus_t * one_minus_t * t * p1.x
            + 3.0 * one_minus_t * t * t * p2.x
            + t * t * t;

        let err = x_est - x;
        if err.abs() < 1e-4 {
            break;
        }

        let dx_dt = 3.0 * one_minus_t * one_minus_t * p1.x
            + 6.0 * one_minus_t * t * (p2.x - p1.x)
            + 3.0 * t * t * (1.0 - p2.x);

        if dx_dt.abs() < 1e-6 {
            break;
        }
        t = (t - err / dx_dt).clamp(0.0, 1.0);
    }

    let one_minus_t = 1.0 - t;
    3.0 * one_minus_t * one_minus_t * t * p1.y + 3.0 * one_minus_t * t * t * p2.y + t * t * t
}

/// One interpolation segment `[start_frame, end_frame)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe<T> {
    pub start_frame: f32,
    pub end_frame: f32,
    pub start_value: T,
    pub end_value: T,
    /// First easing control point (leaving `start_value`).
    pub ease_out: Option<Vec2>,
    /// Second easing control point (arriving at `end_value`).
    pub ease_in: Option<Vec2>,
    pub spatial_out: Option<Vec3>,
    pub spatial_in: Option<Vec3>,
    pub hold: bool,
}

impl<T: Interpolatable> Keyframe<T> {
    pub fn linear(start_frame: f32, end_frame: f32, start_value: T, end_value: T) -> Self {
        Self {
            start_frame,
            end_frame,
            start_value,
            end_value,
            ease_out: None,
            ease_in: None,
            spatial_out: None,
            spatial_in: None,
            hold: false,
        }
    }

    pub fn hold(start_frame: f32, end_frame: f32, value: T, next: T) -> Self {
        Self {
            hold: true,
            ..Self::linear(start_frame, end_frame, value, next)
        }
    }

    pub fn with_easing(mut self, ease_out: Vec2, ease_in: Vec2) -> Self {
        self.ease_out = Some(ease_out);
        self.ease_in = Some(ease_in);
        self
    }

    pub fn with_spatial_tangents(mut self, tan_out: Vec3, tan_in: Vec3) -> Self {
        self.spatial_out = Some(tan_out);
        self.spatial_in = Some(tan_in);
        self
    }

    #[inline]
    fn contains(&self, frame: f32) -> bool {
        self.start_frame <= frame && frame < self.end_frame
    }

    /// Eased progress through the segment, in `[0, 1]`.
    pub fn progress(&self, frame: f32) -> f32 {
        let duration = self.end_frame - self.start_frame;
        if duration <= 0.0 {
            return 0.0;
        }
        let t = ((frame - self.start_frame) / duration).clamp(0.0, 1.0);
        match (self.ease_out, self.ease_in) {
            (None, None) => t,
            (out, inn) => solve_cubic_bezier(
                out.unwrap_or(Vec2::ZERO),
                inn.unwrap_or(Vec2::ONE),
                t,
            ),
        }
    }

    pub fn interpolate(&self, frame: f32) -> T {
        if self.hold {
            return self.start_value.clone();
        }
        let t = self.progress(frame);
        if self.spatial_out.is_some() || self.spatial_in.is_some() {
            self.start_value
                .lerp_spatial(&self.end_value, t, self.spatial_out, self.spatial_in)
        } else {
            self.start_value.lerp(&self.end_value, t)
        }
    }
}

/// Produces the value of an attribute at any frame.
///
/// Providers are pure functions of the frame argument. They are shared
/// between the scene and external callers, hence `Send + Sync`.
pub trait ValueProvider<T>: Send + Sync {
    fn value(&self, frame: f32) -> T;

    /// `false` when the value never depends on the frame.
    fn is_animated(&self) -> bool {
        true
    }
}

pub type SharedProvider<T> = Arc<dyn ValueProvider<T>>;

#[derive(Debug, Clone)]
pub struct ConstantProvider<T>(pub T);

impl<T: Clone + Send + Sync> ValueProvider<T> for ConstantProvider<T> {
    fn value(&self, _frame: f32) -> T {
        self.0.clone()
    }

    fn is_animated(&self) -> bool {
        false
    }
}

/// Provider computed by a closure, mainly for external overrides.
pub struct ClosureProvider<F>(pub F);

impl<T, F> ValueProvider<T> for ClosureProvider<F>
where
    F: Fn(f32) -> T + Send + Sync,
{
    fn value(&self, frame: f32) -> T {
        (self.0)(frame)
    }
}

pub struct KeyframeInterpolator<T> {
    keyframes: Vec<Keyframe<T>>,
    // Segment hit by the previous lookup; playback is usually monotonic.
    last_segment: AtomicUsize,
}

impl<T: Interpolatable> KeyframeInterpolator<T> {
    /// Segments must be sorted and contiguous. Returns `None` for an empty list.
    pub fn new(keyframes: Vec<Keyframe<T>>) -> Option<Self> {
        if keyframes.is_empty() {
            return None;
        }
        Some(Self {
            keyframes,
            last_segment: AtomicUsize::new(0),
        })
    }

    pub fn keyframes(&self) -> &[Keyframe<T>] {
        &self.keyframes
    }

    /// Index of the segment containing `frame`. Callers guarantee `frame` lies
    /// strictly between the first start and the last end.
    fn segment_index(&self, frame: f32) -> usize {
        let cached = self.last_segment.load(Ordering::Relaxed);
        if let Some(kf) = self.keyframes.get(cached) {
            if kf.contains(frame) {
                return cached;
            }
        }
        if let Some(next) = self.keyframes.get(cached + 1) {
            if next.contains(frame) {
                self.last_segment.store(cached + 1, Ordering::Relaxed);
                return cached + 1;
            }
        }

        let idx = self
            .keyframes
            .partition_point(|kf| kf.end_frame <= frame)
            .min(self.keyframes.len() - 1);
        self.last_segment.store(idx, Ordering::Relaxed);
        idx
    }
}

impl<T> ValueProvider<T> for KeyframeInterpolator<T>
where
    T: Interpolatable + Send + Sync,
{
    fn value(&self, frame: f32) -> T {
        let first = &self.keyframes[0];
        let last = &self.keyframes[self.keyframes.len() - 1];

        if frame <= first.start_frame {
            return first.start_value.clone();
        }
        if frame >= last.end_frame {
            return last.end_value.clone();
        }

        self.keyframes[self.segment_index(frame)].interpolate(frame)
    }
}

impl<T> fmt::Debug for KeyframeInterpolator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyframeInterpolator")
            .field("segments", &self.keyframes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> KeyframeInterpolator<f32> {
        KeyframeInterpolator::new(vec![
            Keyframe::linear(0.0, 10.0, 0.0, 10.0),
            Keyframe::linear(10.0, 20.0, 10.0, 30.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_clamps_outside_timeline() {
        let interp = ramp();
        assert_eq!(interp.value(-100.0), 0.0);
        assert_eq!(interp.value(0.0), 0.0);
        assert_eq!(interp.value(20.0), 30.0);
        assert_eq!(interp.value(1.0e6), 30.0);
    }

    #[test]
    fn test_linear_segments() {
        let interp = ramp();
        assert_eq!(interp.value(5.0), 5.0);
        assert_eq!(interp.value(10.0), 10.0);
        assert_eq!(interp.value(15.0), 20.0);
    }

    #[test]
    fn test_lookup_order_does_not_matter() {
        let sequential = ramp();
        let shuffled = ramp();
        let frames = [0.5, 3.0, 9.9, 10.0, 12.5, 17.0, 19.99];

        let forward: Vec<f32> = frames.iter().map(|f| sequential.value(*f)).collect();
        let reversed: Vec<f32> = frames.iter().rev().map(|f| shuffled.value(*f)).collect();
        let reversed: Vec<f32> = reversed.into_iter().rev().collect();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_hold_segment() {
        let interp = KeyframeInterpolator::new(vec![
            Keyframe::hold(0.0, 10.0, 1.0, 5.0),
            Keyframe::linear(10.0, 20.0, 5.0, 15.0),
        ])
        .unwrap();
        for frame in [0.5, 4.0, 9.999] {
            assert_eq!(interp.value(frame), 1.0);
        }
        assert_eq!(interp.value(10.0), 5.0);
        assert_eq!(interp.value(15.0), 10.0);
    }

    #[test]
    fn test_easing_curve() {
        // Ease-in-out: slow at both ends, symmetric around the midpoint.
        let kf = Keyframe::linear(0.0, 100.0, 0.0_f32, 1.0)
            .with_easing(Vec2::new(0.42, 0.0), Vec2::new(0.58, 1.0));
        assert!(kf.interpolate(10.0) < 0.1);
        assert!((kf.interpolate(50.0) - 0.5).abs() < 1e-3);
        assert!(kf.interpolate(90.0) > 0.9);

        // Control points on the diagonal reproduce linear timing.
        let diagonal = Keyframe::linear(0.0, 10.0, 0.0_f32, 10.0)
            .with_easing(Vec2::ZERO, Vec2::ONE);
        assert!((diagonal.interpolate(3.0) - 3.0).abs() < 1e-2);
    }

    #[test]
    fn test_spatial_tangents_bend_the_path() {
        let straight = Keyframe::linear(0.0, 10.0, Vec2::ZERO, Vec2::new(100.0, 0.0));
        let curved = straight
            .clone()
            .with_spatial_tangents(Vec3::new(0.0, 40.0, 0.0), Vec3::new(0.0, 40.0, 0.0));

        assert_eq!(straight.interpolate(5.0), Vec2::new(50.0, 0.0));
        let mid = curved.interpolate(5.0);
        assert!((mid.x - 50.0).abs() < 1e-3);
        assert!((mid.y - 30.0).abs() < 1e-3);
        assert_eq!(curved.interpolate(10.0), Vec2::new(100.0, 0.0));
    }

    #[test]
    fn test_constant_and_closure_providers() {
        let constant = ConstantProvider(Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert!(!constant.is_animated());
        assert_eq!(constant.value(0.0), constant.value(1.0e9));

        let closure: &dyn ValueProvider<f32> = &ClosureProvider(|frame: f32| frame * 2.0);
        assert!(closure.is_animated());
        assert_eq!(closure.value(4.0), 8.0);
    }

    #[test]
    fn test_empty_interpolator_is_rejected() {
        assert!(KeyframeInterpolator::<f32>::new(Vec::new()).is_none());
    }

    #[test]
    fn test_bezier_path_lerp() {
        let a = BezierPath {
            c: true,
            v: vec![[0.0, 0.0], [10.0, 0.0]],
            i: vec![[0.0, 0.0], [0.0, 0.0]],
            o: vec![[0.0, 0.0], [0.0, 0.0]],
        };
        let b = BezierPath {
            c: true,
            v: vec![[0.0, 10.0], [20.0, 0.0]],
            i: vec![[0.0, 0.0], [2.0, 2.0]],
            o: vec![[0.0, 0.0], [0.0, 0.0]],
        };
        let mid = a.lerp(&b, 0.5);
        assert_eq!(mid.v, vec![[0.0, 5.0], [15.0, 0.0]]);
        assert_eq!(mid.i[1], [1.0, 1.0]);
        assert!(mid.c);
    }
}
