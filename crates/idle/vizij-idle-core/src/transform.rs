//! Rigid transform (offset + orientation) used by every anchor and timeline computation.

use nalgebra::{Quaternion, UnitQuaternion, Vector3, Vector4};

/// Position offset plus orientation. Composition applies the right-hand side in the
/// left-hand side's local frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    #[inline]
    pub fn new(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self { position, rotation }
    }

    #[inline]
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    #[inline]
    pub fn from_position(position: Vector3<f32>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Build from `[x, y, z]` and a quaternion `[x, y, z, w]`. The quaternion is
    /// normalized; a zero quaternion becomes identity.
    pub fn from_arrays(position: [f32; 3], rotation: [f32; 4]) -> Self {
        Self {
            position: Vector3::from(position),
            rotation: quat_from_components(rotation),
        }
    }

    #[inline]
    pub fn position_array(&self) -> [f32; 3] {
        [self.position.x, self.position.y, self.position.z]
    }

    /// Quaternion as `[x, y, z, w]`.
    #[inline]
    pub fn rotation_array(&self) -> [f32; 4] {
        let c = self.rotation.quaternion().coords;
        [c.x, c.y, c.z, c.w]
    }

    /// `self ∘ other`: `other` expressed in `self`'s frame, returned in `self`'s parent frame.
    #[inline]
    pub fn compose(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * other.position,
            rotation: self.rotation * other.rotation,
        }
    }

    #[inline]
    pub fn inverse(&self) -> Transform {
        let inv = self.rotation.inverse();
        Transform {
            position: -(inv * self.position),
            rotation: inv,
        }
    }

    /// Linear position + shortest-arc spherical rotation interpolation.
    /// `ratio` is not clamped, so values outside [0, 1] extrapolate.
    pub fn blend(&self, other: &Transform, ratio: f32) -> Transform {
        let delta = self.rotation.rotation_to(&other.rotation);
        Transform {
            position: self.position + (other.position - self.position) * ratio,
            rotation: delta.powf(ratio) * self.rotation,
        }
    }

    /// Component tolerance check; `q` and `-q` are the same orientation.
    pub fn approx_eq(&self, other: &Transform, eps: f32) -> bool {
        let dp = (self.position - other.position).norm();
        let dot = self.rotation.coords.dot(&other.rotation.coords).abs();
        dp <= eps && (1.0 - dot) <= eps
    }
}

/// Normalize raw `[x, y, z, w]` components into a unit quaternion.
pub fn quat_from_components(c: [f32; 4]) -> UnitQuaternion<f32> {
    let q = Quaternion::from(Vector4::new(c[0], c[1], c[2], c[3]));
    if q.norm() <= f32::EPSILON {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::from_quaternion(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn sample() -> Transform {
        Transform::new(
            Vector3::new(1.0, -2.0, 0.5),
            UnitQuaternion::from_euler_angles(0.3, -0.7, 1.1),
        )
    }

    #[test]
    fn inverse_cancels_on_both_sides() {
        let a = sample();
        assert!(a.inverse().compose(&a).approx_eq(&Transform::identity(), 1e-5));
        assert!(a.compose(&a.inverse()).approx_eq(&Transform::identity(), 1e-5));
    }

    #[test]
    fn compose_rotates_offset() {
        let a = Transform::new(
            Vector3::new(0.0, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2),
        );
        let b = Transform::from_position(Vector3::new(1.0, 0.0, 0.0));
        let c = a.compose(&b);
        assert!((c.position - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn blend_extrapolates_past_one() {
        let a = Transform::identity();
        let b = Transform::new(
            Vector3::new(2.0, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.4),
        );
        let c = a.blend(&b, 1.5);
        assert!((c.position.x - 3.0).abs() < 1e-5);
        assert!((c.rotation.angle() - 0.6).abs() < 1e-4);
    }

    #[test]
    fn zero_quaternion_is_identity() {
        let t = Transform::from_arrays([0.0; 3], [0.0; 4]);
        assert_eq!(t.rotation, UnitQuaternion::identity());
    }
}
