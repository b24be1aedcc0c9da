//! Three-piece easing for transition clocks.
//!
//! Velocity ramps up with a smoothstep profile over `ease_in` seconds, holds a constant
//! plateau, and ramps down with a mirrored smoothstep over `ease_out` seconds. Position
//! is the integral of that velocity, normalized to reach exactly 1 at the end.

use super::functions::clamp01;

const EPS: f32 = 1e-6;

/// Integral of smoothstep `3x² - 2x³` from 0 to `x`.
#[inline]
fn ramp(x: f32) -> f32 {
    let x2 = x * x;
    x2 * x - 0.5 * x2 * x2
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EaseCurve {
    duration: f32,
    ease_in: f32,
    ease_out: f32,
    /// Plateau velocity in normalized units per second.
    velocity: f32,
}

impl EaseCurve {
    /// Build a curve for `duration` seconds. When `ease_in + ease_out` exceeds the
    /// duration both ramps are shrunk proportionally so the curve stays monotonic.
    pub fn new(duration: f32, ease_in: f32, ease_out: f32) -> Self {
        let duration = duration.max(0.0);
        let mut ease_in = ease_in.max(0.0);
        let mut ease_out = ease_out.max(0.0);
        let ramps = ease_in + ease_out;
        if ramps > duration && ramps > EPS {
            let scale = duration / ramps;
            ease_in *= scale;
            ease_out *= scale;
        }
        let travel = duration - 0.5 * (ease_in + ease_out);
        let velocity = if travel > EPS { 1.0 / travel } else { 0.0 };
        Self {
            duration,
            ease_in,
            ease_out,
            velocity,
        }
    }

    pub fn linear(duration: f32) -> Self {
        Self::new(duration, 0.0, 0.0)
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Effective (possibly rescaled) ramp durations.
    #[inline]
    pub fn ramps(&self) -> (f32, f32) {
        (self.ease_in, self.ease_out)
    }

    /// Map a normalized clock in [0, 1] to eased progress in [0, 1].
    pub fn evaluate(&self, clock: f32) -> f32 {
        let c = clamp01(clock);
        if self.velocity <= 0.0 {
            return c;
        }
        let d = self.duration;
        let a = self.ease_in;
        let b = self.ease_out;
        let t = c * d;
        let v = self.velocity;
        let y = if t < a {
            v * a * ramp(t / a)
        } else if t <= d - b {
            v * (0.5 * a + (t - a))
        } else {
            1.0 - v * b * ramp((d - t) / b)
        };
        clamp01(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_ramps_is_linear() {
        let e = EaseCurve::linear(2.0);
        for i in 0..=10 {
            let c = i as f32 / 10.0;
            assert!((e.evaluate(c) - c).abs() < 1e-6);
        }
    }

    #[test]
    fn endpoints_are_exact() {
        let e = EaseCurve::new(1.5, 0.4, 0.3);
        assert_eq!(e.evaluate(0.0), 0.0);
        assert!((e.evaluate(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn oversized_ramps_are_rescaled() {
        let e = EaseCurve::new(1.0, 1.0, 3.0);
        let (a, b) = e.ramps();
        assert!((a - 0.25).abs() < 1e-6);
        assert!((b - 0.75).abs() < 1e-6);
        let mut last = 0.0;
        for i in 1..=200 {
            let y = e.evaluate(i as f32 / 200.0);
            assert!(y >= last);
            last = y;
        }
        assert!((last - 1.0).abs() < 1e-5);
    }

    #[test]
    fn symmetric_ramps_pass_through_half() {
        let e = EaseCurve::new(2.0, 0.5, 0.5);
        assert!((e.evaluate(0.5) - 0.5).abs() < 1e-5);
        assert!(e.evaluate(0.05) < 0.05);
    }
}
