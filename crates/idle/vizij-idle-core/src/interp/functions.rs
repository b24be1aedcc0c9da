//! Interpolation helpers:
//! - lerp_f32 (scalar lerp)
//! - linear/quadratic/cubic Bezier evaluation on scalar control values
//! - clamp01

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn clamp01(t: f32) -> f32 {
    t.clamp(0.0, 1.0)
}

/// Linear Bezier (two points).
#[inline]
pub fn linear_bezier(p0: f32, p1: f32, t: f32) -> f32 {
    lerp_f32(p0, p1, t)
}

/// Quadratic Bezier basis.
#[inline]
pub fn quadratic_bezier(p0: f32, p1: f32, p2: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * p0 + 2.0 * u * t * p1 + t * t * p2
}

/// Cubic Bezier basis.
#[inline]
pub fn cubic_bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}
