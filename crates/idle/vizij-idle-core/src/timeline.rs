//! Keyframed timelines over the normalized transition clock [0, 1].
//!
//! Model:
//! - A timeline always has a first keyframe at t=0 and a last keyframe at t=1, plus
//!   zero or more interior keyframes.
//! - With only the two boundaries the segment is a straight linear blend.
//! - With interior keyframes, control values come from [`crate::spline`]; the first and
//!   last segments are quadratic Bezier pieces and every other segment is cubic.
//! - Values are splined component-wise. Transform rotations are hemisphere-aligned to
//!   the previous keyframe before solving and renormalized after evaluation.
//!
//! Transform timelines store offsets relative to a [`VirtualAnchor`] that blends the
//! source and target anchor frames by t, so the world pose stays consistent while the
//! anchors themselves move during the blend.

use crate::anchor::{AnchorContext, AnchorSpec, ControlEntryAnchored};
use crate::interp::functions::{cubic_bezier, linear_bezier, quadratic_bezier};
use crate::spline::compute_control_points;
use crate::transform::{quat_from_components, Transform};
use nalgebra::Vector3;
use std::fmt::Debug;

/// Keyframes closer than this to another keyframe's time are treated as the same time.
const TIME_EPS: f32 = 1e-4;

/// Values that can be splined one scalar component at a time.
pub trait SplineValue: Clone + Debug {
    type Raw: Copy + Default + Debug + PartialEq + AsRef<[f32]> + AsMut<[f32]>;

    fn to_raw(&self) -> Self::Raw;
    fn from_raw(raw: &Self::Raw) -> Self;

    /// Adjust `raw` so it interpolates the short way from `previous`.
    fn align_raw(_raw: &mut Self::Raw, _previous: &Self::Raw) {}
}

impl SplineValue for f32 {
    type Raw = [f32; 1];

    #[inline]
    fn to_raw(&self) -> [f32; 1] {
        [*self]
    }

    #[inline]
    fn from_raw(raw: &[f32; 1]) -> f32 {
        raw[0]
    }
}

impl SplineValue for Transform {
    /// `[px, py, pz, qx, qy, qz, qw]`
    type Raw = [f32; 7];

    fn to_raw(&self) -> [f32; 7] {
        let p = self.position_array();
        let q = self.rotation_array();
        [p[0], p[1], p[2], q[0], q[1], q[2], q[3]]
    }

    fn from_raw(raw: &[f32; 7]) -> Transform {
        Transform::new(
            Vector3::new(raw[0], raw[1], raw[2]),
            quat_from_components([raw[3], raw[4], raw[5], raw[6]]),
        )
    }

    fn align_raw(raw: &mut [f32; 7], previous: &[f32; 7]) {
        let dot: f32 = (3..7).map(|i| raw[i] * previous[i]).sum();
        if dot < 0.0 {
            for c in &mut raw[3..7] {
                *c = -*c;
            }
        }
    }
}

/// One keyframe. Interior keyframes carry incoming/outgoing control values.
#[derive(Clone, Debug)]
pub struct Keyframe<V: SplineValue> {
    pub time: f32,
    pub value: V,
    raw: V::Raw,
    control_in: V::Raw,
    control_out: V::Raw,
}

impl<V: SplineValue> Keyframe<V> {
    fn new(time: f32, value: V) -> Self {
        let raw = value.to_raw();
        Self {
            time,
            value,
            raw,
            control_in: raw,
            control_out: raw,
        }
    }

    #[inline]
    pub fn control_in(&self) -> &V::Raw {
        &self.control_in
    }

    #[inline]
    pub fn control_out(&self) -> &V::Raw {
        &self.control_out
    }
}

/// Ordered keyframes over [0, 1] with precomputed spline controls.
#[derive(Clone, Debug)]
pub struct Timeline<V: SplineValue> {
    keyframes: Vec<Keyframe<V>>,
}

/// Timeline over a single scalar channel.
pub type ScalarTimeline = Timeline<f32>;

impl<V: SplineValue> Timeline<V> {
    pub fn new(first: V, last: V) -> Self {
        let mut tl = Self {
            keyframes: vec![Keyframe::new(0.0, first), Keyframe::new(1.0, last)],
        };
        tl.recompute();
        tl
    }

    /// Build from boundaries plus interior `(time, value)` pairs. Interior times outside
    /// the open interval are dropped; duplicates keep the later value.
    pub fn from_keyframes(first: V, interior: impl IntoIterator<Item = (f32, V)>, last: V) -> Self {
        let mut tl = Self {
            keyframes: vec![Keyframe::new(0.0, first), Keyframe::new(1.0, last)],
        };
        for (time, value) in interior {
            tl.insert_sorted(time, value);
        }
        tl.recompute();
        tl
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    /// Always false; a timeline has at least its two boundary keyframes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    #[inline]
    pub fn keyframes(&self) -> &[Keyframe<V>] {
        &self.keyframes
    }

    #[inline]
    pub fn first(&self) -> &V {
        &self.keyframes[0].value
    }

    #[inline]
    pub fn last(&self) -> &V {
        &self.keyframes[self.keyframes.len() - 1].value
    }

    /// Interior keyframes as `(time, value)`.
    pub fn interior(&self) -> impl Iterator<Item = (f32, &V)> {
        let n = self.keyframes.len();
        self.keyframes[1..n - 1].iter().map(|k| (k.time, &k.value))
    }

    pub fn set_first(&mut self, value: V) {
        self.keyframes[0] = Keyframe::new(0.0, value);
        self.recompute();
    }

    pub fn set_last(&mut self, value: V) {
        let n = self.keyframes.len();
        self.keyframes[n - 1] = Keyframe::new(1.0, value);
        self.recompute();
    }

    /// Insert an interior keyframe and return its index. A keyframe already at `time`
    /// is replaced. Returns `None` for times not strictly inside (0, 1).
    pub fn add_keyframe(&mut self, time: f32, value: V) -> Option<usize> {
        let idx = self.insert_sorted(time, value)?;
        self.recompute();
        Some(idx)
    }

    /// Remove an interior keyframe. Boundary keyframes cannot be removed.
    pub fn remove_keyframe(&mut self, index: usize) -> Option<V> {
        if index == 0 || index + 1 >= self.keyframes.len() {
            return None;
        }
        let k = self.keyframes.remove(index);
        self.recompute();
        Some(k.value)
    }

    fn insert_sorted(&mut self, time: f32, value: V) -> Option<usize> {
        if !time.is_finite() || time <= TIME_EPS || time >= 1.0 - TIME_EPS {
            return None;
        }
        let n = self.keyframes.len();
        if let Some(i) = (1..n - 1).find(|&i| (self.keyframes[i].time - time).abs() < TIME_EPS) {
            self.keyframes[i] = Keyframe::new(time, value);
            return Some(i);
        }
        let idx = self.keyframes.partition_point(|k| k.time < time);
        self.keyframes.insert(idx, Keyframe::new(time, value));
        Some(idx)
    }

    /// Index `i` of the segment `[k_i, k_{i+1}]` containing `t` (binary search).
    pub fn find_segment(&self, t: f32) -> usize {
        let mut lo = 0usize;
        let mut hi = self.keyframes.len() - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.keyframes[mid].time <= t {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Value at normalized time `t` (clamped to [0, 1]).
    pub fn evaluate(&self, t: f32) -> V {
        let n = self.keyframes.len();
        let t = t.clamp(0.0, 1.0);
        if t <= 0.0 {
            return self.keyframes[0].value.clone();
        }
        if t >= 1.0 {
            return self.keyframes[n - 1].value.clone();
        }
        let i = self.find_segment(t);
        let k0 = &self.keyframes[i];
        let k1 = &self.keyframes[i + 1];
        let span = k1.time - k0.time;
        let u = if span > f32::EPSILON {
            ((t - k0.time) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let mut out = V::Raw::default();
        let (p0, p3) = (k0.raw.as_ref(), k1.raw.as_ref());
        let dst = out.as_mut();
        if n == 2 {
            for c in 0..dst.len() {
                dst[c] = linear_bezier(p0[c], p3[c], u);
            }
        } else if i == 0 {
            let p1 = k1.control_in.as_ref();
            for c in 0..dst.len() {
                dst[c] = quadratic_bezier(p0[c], p1[c], p3[c], u);
            }
        } else if i + 2 == n {
            let p1 = k0.control_out.as_ref();
            for c in 0..dst.len() {
                dst[c] = quadratic_bezier(p0[c], p1[c], p3[c], u);
            }
        } else {
            let p1 = k0.control_out.as_ref();
            let p2 = k1.control_in.as_ref();
            for c in 0..dst.len() {
                dst[c] = cubic_bezier(p0[c], p1[c], p2[c], p3[c], u);
            }
        }
        V::from_raw(&out)
    }

    /// Cut at `v` into two timelines, each rescaled to [0, 1]. The value at `v` becomes
    /// the new inner boundary of both halves; a keyframe sitting at `v` is dropped.
    pub fn split(&self, v: f32) -> Option<(Self, Self)> {
        if !(v > 0.0 && v < 1.0) {
            return None;
        }
        let mid = self.evaluate(v);
        let left_interior: Vec<(f32, V)> = self
            .interior()
            .filter(|(t, _)| *t < v - TIME_EPS)
            .map(|(t, val)| (t / v, val.clone()))
            .collect();
        let right_interior: Vec<(f32, V)> = self
            .interior()
            .filter(|(t, _)| *t > v + TIME_EPS)
            .map(|(t, val)| ((t - v) / (1.0 - v), val.clone()))
            .collect();
        let left = Self::from_keyframes(self.first().clone(), left_interior, mid.clone());
        let right = Self::from_keyframes(mid, right_interior, self.last().clone());
        Some((left, right))
    }

    /// Re-align raw components and recompute every interior control value.
    fn recompute(&mut self) {
        let n = self.keyframes.len();
        for i in 0..n {
            let mut raw = self.keyframes[i].value.to_raw();
            if i > 0 {
                let prev = self.keyframes[i - 1].raw;
                V::align_raw(&mut raw, &prev);
            }
            let k = &mut self.keyframes[i];
            k.raw = raw;
            k.control_in = raw;
            k.control_out = raw;
        }
        if n < 3 {
            return;
        }
        let times: Vec<f32> = self.keyframes.iter().map(|k| k.time).collect();
        let dims = V::Raw::default().as_ref().len();
        let mut values = vec![0.0f32; n];
        for c in 0..dims {
            for (i, k) in self.keyframes.iter().enumerate() {
                values[i] = k.raw.as_ref()[c];
            }
            let controls = compute_control_points(&times, &values);
            for (j, cp) in controls.iter().enumerate() {
                let k = &mut self.keyframes[j + 1];
                k.control_in.as_mut()[c] = cp.incoming;
                k.control_out.as_mut()[c] = cp.outgoing;
            }
        }
    }
}

/// Time-varying anchor frame for a transform timeline: the blend of the source and
/// target anchors, with the blend running from `start` to `end` on the timeline clock.
/// Split timelines keep the original blend by rescaling `start`/`end`, which may then
/// fall outside [0, 1].
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualAnchor {
    pub from: AnchorSpec,
    pub to: AnchorSpec,
    pub start: f32,
    pub end: f32,
}

impl VirtualAnchor {
    pub fn new(from: AnchorSpec, to: AnchorSpec) -> Self {
        Self {
            from,
            to,
            start: 0.0,
            end: 1.0,
        }
    }

    /// Blend ratio between `from` and `to` at timeline time `t`.
    pub fn ratio(&self, t: f32) -> f32 {
        let span = self.end - self.start;
        if span.abs() <= f32::EPSILON {
            return 1.0;
        }
        ((t - self.start) / span).clamp(0.0, 1.0)
    }

    pub fn frame(&self, t: f32, ctx: &AnchorContext<'_>) -> Transform {
        let fa = self.from.frame_or_identity(ctx);
        if self.from == self.to {
            return fa;
        }
        let fb = self.to.frame_or_identity(ctx);
        fa.blend(&fb, self.ratio(t))
    }

    /// Damping time applied to the blended frame: the target's.
    #[inline]
    pub fn damping_time(&self) -> f32 {
        self.to.damping_time
    }

    fn split(&self, v: f32) -> (Self, Self) {
        let left = Self {
            from: self.from.clone(),
            to: self.to.clone(),
            start: self.start / v,
            end: self.end / v,
        };
        let right = Self {
            from: self.from.clone(),
            to: self.to.clone(),
            start: (self.start - v) / (1.0 - v),
            end: (self.end - v) / (1.0 - v),
        };
        (left, right)
    }
}

/// Anchor-relative transform timeline for one control channel.
#[derive(Clone, Debug)]
pub struct TransformTimeline {
    pub curve: Timeline<Transform>,
    pub anchor: VirtualAnchor,
}

impl TransformTimeline {
    /// Two-keyframe timeline between two anchored entries.
    pub fn between(from: &ControlEntryAnchored, to: &ControlEntryAnchored) -> Self {
        Self {
            curve: Timeline::new(from.transform, to.transform),
            anchor: VirtualAnchor::new(from.anchor.clone(), to.anchor.clone()),
        }
    }

    /// Refresh boundaries and anchors from the endpoint entries, keeping interior keyframes.
    pub fn set_endpoints(&mut self, from: &ControlEntryAnchored, to: &ControlEntryAnchored) {
        let interior: Vec<(f32, Transform)> = self.curve.interior().map(|(t, v)| (t, *v)).collect();
        self.curve = Timeline::from_keyframes(from.transform, interior, to.transform);
        self.anchor = VirtualAnchor::new(from.anchor.clone(), to.anchor.clone());
    }

    /// Anchor-relative offset at `t`.
    #[inline]
    pub fn offset_at(&self, t: f32) -> Transform {
        self.curve.evaluate(t)
    }

    /// World transform at `t`: virtual anchor frame composed with the splined offset.
    pub fn evaluate(&self, t: f32, ctx: &AnchorContext<'_>) -> Transform {
        self.anchor.frame(t, ctx).compose(&self.offset_at(t))
    }

    /// Insert an interior keyframe from a world transform, expressed relative to the
    /// virtual anchor at `t`.
    pub fn add_world_keyframe(
        &mut self,
        t: f32,
        world: &Transform,
        ctx: &AnchorContext<'_>,
    ) -> Option<usize> {
        let offset = self.anchor.frame(t, ctx).inverse().compose(world);
        self.curve.add_keyframe(t, offset)
    }

    pub fn split(&self, v: f32) -> Option<(Self, Self)> {
        let (left, right) = self.curve.split(v)?;
        let (al, ar) = self.anchor.split(v);
        Some((
            Self {
                curve: left,
                anchor: al,
            },
            Self {
                curve: right,
                anchor: ar,
            },
        ))
    }
}
