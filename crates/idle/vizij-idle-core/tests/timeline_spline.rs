use std::f32::consts::FRAC_PI_4;

use nalgebra::{UnitQuaternion, Vector3};
use vizij_idle_core::{EaseCurve, ScalarTimeline, Timeline, Transform};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

#[test]
fn two_keyframes_blend_linearly_and_clamp() {
    let tl = ScalarTimeline::new(1.0, 3.0);
    assert_eq!(tl.len(), 2);
    approx(tl.evaluate(0.0), 1.0, 1e-6);
    approx(tl.evaluate(0.5), 2.0, 1e-6);
    approx(tl.evaluate(1.0), 3.0, 1e-6);
    approx(tl.evaluate(-0.5), 1.0, 1e-6);
    approx(tl.evaluate(1.5), 3.0, 1e-6);
}

#[test]
fn curve_passes_through_interior_keyframes() {
    let tl = Timeline::from_keyframes(0.0f32, [(0.3, 1.0), (0.7, -1.0)], 0.0);
    assert_eq!(tl.len(), 4);
    approx(tl.evaluate(0.3), 1.0, 1e-4);
    approx(tl.evaluate(0.7), -1.0, 1e-4);
    approx(tl.evaluate(1.0), 0.0, 1e-6);
}

#[test]
fn interior_keyframes_join_without_a_kink() {
    let tl = Timeline::from_keyframes(0.0f32, [(0.3, 1.0), (0.7, -1.0)], 0.0);
    let h = 1e-3;
    for t in [0.3f32, 0.7] {
        let left = (tl.evaluate(t) - tl.evaluate(t - h)) / h;
        let right = (tl.evaluate(t + h) - tl.evaluate(t)) / h;
        assert!((left - right).abs() < 0.2, "slope jump at {t}: {left} vs {right}");
    }
}

#[test]
fn out_of_range_and_duplicate_keyframes() {
    let mut tl = ScalarTimeline::new(0.0, 1.0);
    assert_eq!(tl.add_keyframe(0.0, 5.0), None);
    assert_eq!(tl.add_keyframe(1.2, 5.0), None);
    assert_eq!(tl.add_keyframe(0.5, 5.0), Some(1));
    assert_eq!(tl.add_keyframe(0.5, 7.0), Some(1));
    assert_eq!(tl.len(), 3);
    approx(tl.evaluate(0.5), 7.0, 1e-4);
    assert_eq!(tl.remove_keyframe(0), None);
    assert_eq!(tl.remove_keyframe(1), Some(7.0));
    approx(tl.evaluate(0.5), 0.5, 1e-6);
}

#[test]
fn split_keeps_the_value_at_the_cut() {
    let tl = Timeline::from_keyframes(0.0f32, [(0.5, 2.0)], 1.0);
    let cut = tl.evaluate(0.4);
    let (left, right) = tl.split(0.4).expect("split inside (0, 1)");

    approx(*left.first(), 0.0, 1e-6);
    approx(left.evaluate(1.0), cut, 1e-5);
    approx(right.evaluate(0.0), cut, 1e-5);
    approx(*right.last(), 1.0, 1e-6);

    // The 0.5 keyframe lands on the right half at (0.5 - 0.4) / 0.6.
    assert_eq!(left.len(), 2);
    assert_eq!(right.len(), 3);
    let (t, v) = right.interior().next().expect("moved keyframe");
    approx(t, 1.0 / 6.0, 1e-5);
    approx(*v, 2.0, 1e-6);
    approx(right.evaluate(t), 2.0, 1e-3);

    assert!(tl.split(0.0).is_none());
    assert!(tl.split(1.0).is_none());
}

#[test]
fn rotation_takes_the_short_way_and_stays_unit() {
    let quarter = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 2.0 * FRAC_PI_4);
    let c = quarter.quaternion().coords;
    // Same orientation, opposite hemisphere.
    let flipped = Transform::from_arrays([0.0; 3], [-c.x, -c.y, -c.z, -c.w]);
    let tl = Timeline::new(Transform::identity(), flipped);
    let mid = tl.evaluate(0.5);
    approx(mid.rotation.angle(), FRAC_PI_4, 1e-4);
    approx(mid.rotation.quaternion().norm(), 1.0, 1e-5);

    let keyed = Timeline::from_keyframes(
        Transform::identity(),
        [(0.5, Transform::from_position(Vector3::new(0.0, 1.0, 0.0)))],
        Transform::new(Vector3::zeros(), quarter),
    );
    for i in 0..=10 {
        let v = keyed.evaluate(i as f32 / 10.0);
        approx(v.rotation.quaternion().norm(), 1.0, 1e-5);
    }
    approx(keyed.evaluate(0.5).position.y, 1.0, 1e-4);
}

#[test]
fn eased_clock_is_monotonic_with_exact_ends() {
    let e = EaseCurve::new(2.0, 0.6, 0.4);
    let mut last = e.evaluate(0.0);
    assert_eq!(last, 0.0);
    for i in 1..=100 {
        let y = e.evaluate(i as f32 / 100.0);
        assert!(y + 1e-6 >= last, "dip at {i}: {y} < {last}");
        last = y;
    }
    approx(last, 1.0, 1e-5);
}
