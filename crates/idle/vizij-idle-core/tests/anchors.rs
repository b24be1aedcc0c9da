mod common;

use common::{approx, MockScene};
use nalgebra::{UnitQuaternion, Vector3};
use vizij_idle_core::{
    AnchorContext, AnchorFilter, AnchorRef, AnchorSpec, ControlEntryAnchored, Role, Transform,
    TransformTimeline,
};

fn frame(x: f32, yaw: f32) -> Transform {
    Transform::new(
        Vector3::new(x, 0.0, 0.0),
        UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw),
    )
}

#[test]
fn capture_then_resolve_returns_the_world_pose() {
    let scene = MockScene::default().with_anchor("chair", "seat", frame(2.0, 0.7));
    let ctx = AnchorContext::new(&scene, &[]);
    let world = Transform::new(
        Vector3::new(1.0, 0.5, -0.25),
        UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3),
    );
    let entry = ControlEntryAnchored::capture_new(
        &world,
        AnchorSpec::single(AnchorRef::entity("chair", "seat")),
        &ctx,
    );
    assert!(!entry.transform.approx_eq(&world, 1e-3));
    assert!(entry.resolve(&ctx).approx_eq(&world, 1e-5));
}

#[test]
fn offsets_follow_a_moving_anchor() {
    let entry = ControlEntryAnchored::anchored(
        Transform::from_position(Vector3::new(0.0, 1.0, 0.0)),
        AnchorSpec::single(AnchorRef::entity("table", "top")),
    );
    let near = MockScene::default().with_anchor("table", "top", frame(1.0, 0.0));
    let far = MockScene::default().with_anchor("table", "top", frame(5.0, 0.0));
    let a = entry.resolve(&AnchorContext::new(&near, &[]));
    let b = entry.resolve(&AnchorContext::new(&far, &[]));
    approx(a.position.x, 1.0, 1e-6);
    approx(b.position.x, 5.0, 1e-6);
    approx(b.position.y, 1.0, 1e-6);
}

#[test]
fn roles_resolve_through_the_role_table() {
    let scene = MockScene::default().with_anchor("npc_7", "hand", frame(3.0, 0.0));
    let roles = vec![
        Role {
            name: "partner".into(),
            entity: Some("npc_7".into()),
        },
        Role {
            name: "nobody".into(),
            entity: None,
        },
    ];
    let ctx = AnchorContext::new(&scene, &roles);
    let bound = AnchorSpec::single(AnchorRef::role("partner", "hand"));
    let unbound = AnchorSpec::single(AnchorRef::role("nobody", "hand"));
    approx(bound.resolve_frame(&ctx).expect("bound role").position.x, 3.0, 1e-6);
    assert!(unbound.resolve_frame(&ctx).is_none());
    assert_eq!(unbound.frame_or_identity(&ctx), Transform::identity());
}

#[test]
fn blend_anchor_interpolates_between_frames() {
    let scene = MockScene::default()
        .with_anchor("a", "c", frame(0.0, 0.0))
        .with_anchor("b", "c", frame(4.0, 0.0));
    let ctx = AnchorContext::new(&scene, &[]);
    let spec = AnchorSpec::blend(AnchorRef::entity("a", "c"), AnchorRef::entity("b", "c"), 0.25);
    approx(spec.resolve_frame(&ctx).expect("both resolve").position.x, 1.0, 1e-6);

    let missing = AnchorSpec::blend(AnchorRef::entity("a", "c"), AnchorRef::entity("gone", "c"), 0.5);
    assert!(missing.resolve_frame(&ctx).is_none());
}

#[test]
fn damping_moves_a_fraction_per_tick() {
    let mut filter = AnchorFilter::new(0.001);
    let first = filter.apply(frame(0.0, 0.0), 0.5, 0.1);
    approx(first.position.x, 0.0, 1e-6);
    let second = filter.apply(frame(1.0, 0.0), 0.5, 0.1);
    approx(second.position.x, 0.2, 1e-5);
    let third = filter.apply(frame(1.0, 0.0), 0.5, 0.1);
    approx(third.position.x, 0.36, 1e-5);

    // At or below the threshold the frame snaps.
    let snapped = filter.apply(frame(-2.0, 0.0), 0.0005, 0.1);
    approx(snapped.position.x, -2.0, 1e-6);

    filter.reset();
    let fresh = filter.apply(frame(9.0, 0.0), 0.5, 0.1);
    approx(fresh.position.x, 9.0, 1e-6);
}

#[test]
fn virtual_anchor_keeps_world_endpoints_while_anchors_differ() {
    let scene = MockScene::default()
        .with_anchor("left", "mark", frame(-1.0, 0.0))
        .with_anchor("right", "mark", frame(3.0, 0.4));
    let ctx = AnchorContext::new(&scene, &[]);
    let from_world = Transform::from_position(Vector3::new(0.0, 1.0, 0.0));
    let to_world = Transform::from_position(Vector3::new(2.0, 1.0, 0.0));
    let from = ControlEntryAnchored::capture_new(
        &from_world,
        AnchorSpec::single(AnchorRef::entity("left", "mark")),
        &ctx,
    );
    let to = ControlEntryAnchored::capture_new(
        &to_world,
        AnchorSpec::single(AnchorRef::entity("right", "mark")),
        &ctx,
    );
    let tl = TransformTimeline::between(&from, &to);
    assert!(tl.evaluate(0.0, &ctx).approx_eq(&from_world, 1e-5));
    assert!(tl.evaluate(1.0, &ctx).approx_eq(&to_world, 1e-5));

    let (left, right) = tl.split(0.5).expect("split");
    let mid = tl.evaluate(0.5, &ctx);
    assert!(left.evaluate(1.0, &ctx).approx_eq(&mid, 1e-4));
    assert!(right.evaluate(0.0, &ctx).approx_eq(&mid, 1e-4));
    assert!(right.evaluate(1.0, &ctx).approx_eq(&to_world, 1e-4));
}

#[test]
fn damping_smooths_the_world_pose_not_the_frame() {
    let entry = ControlEntryAnchored::anchored(
        Transform::from_position(Vector3::new(0.0, 0.0, 1.0)),
        AnchorSpec::single(AnchorRef::entity("chair", "seat")).with_damping(0.5),
    );
    let before = MockScene::default().with_anchor("chair", "seat", frame(0.0, 0.0));
    let after = MockScene::default().with_anchor("chair", "seat", frame(0.0, std::f32::consts::FRAC_PI_2));
    let mut filter = AnchorFilter::new(0.001);

    let start = entry.resolve_damped(&AnchorContext::new(&before, &[]), &mut filter, 0.1);
    approx(start.position.z, 1.0, 1e-6);

    // The offset swings from +z to +x; the output cuts the chord, it does not ride the arc.
    let ctx = AnchorContext::new(&after, &[]);
    let fresh = entry.resolve(&ctx);
    approx(fresh.position.x, 1.0, 1e-5);
    let damped = entry.resolve_damped(&ctx, &mut filter, 0.1);
    let expected = start.blend(&fresh, 0.2);
    assert!(damped.approx_eq(&expected, 1e-5), "{damped:?} vs {expected:?}");
    approx(damped.position.x, 0.2, 1e-5);
    approx(damped.position.z, 0.8, 1e-5);
}
