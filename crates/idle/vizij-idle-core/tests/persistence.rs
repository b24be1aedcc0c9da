use vizij_idle_core::{
    graph_to_json, parse_graph_document, parse_graph_json, AnchorMode, AnchorTarget, Graph, IdleError,
    StateKind,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn load(name: &str) -> Graph {
    let json = vizij_test_fixtures::idle_graphs::json(name).expect("load idle graph fixture");
    parse_graph_json(&json).expect("parse idle graph")
}

#[test]
fn every_fixture_parses() {
    for key in vizij_test_fixtures::idle_graphs::keys() {
        let json = vizij_test_fixtures::idle_graphs::json(&key).expect("fixture text");
        let graph = parse_graph_json(&json).unwrap_or_else(|e| panic!("{key}: {e}"));
        assert!(graph.state_count() > 0, "{key} has no states");
    }
}

#[test]
fn loads_structure_signals_and_anchors() {
    let g = load("two-animations");
    let standing = g.resolve_animation("Standing").unwrap();
    approx(g.animation(standing).unwrap().speed, 1.5, 1e-6);

    let body = g.resolve_layer("Sitting", "Body").unwrap();
    let slouch = g.resolve_state("Sitting", "Body", "Slouch").unwrap();
    let upright = g.resolve_state("Sitting", "Body", "Upright").unwrap();
    let tall = g.resolve_state("Standing", "Body", "Tall").unwrap();
    let forward = g.resolve_state("Standing", "Head", "Forward").unwrap();
    assert_eq!(g.layer(body).unwrap().root_state, Some(slouch));

    let cross = g.direct_transition(slouch, tall).expect("crossing edge");
    approx(cross.duration, 1.0, 1e-6);
    assert_eq!(cross.sync_targets.len(), 1);
    assert_eq!(cross.sync_targets[0].state, forward);

    let signal = g.direct_transition(slouch, upright).unwrap();
    assert_eq!(signal.messages[0].role, "partner");
    assert_eq!(signal.avoids[0].avoid, "crowding");
    assert!(signal.avoids[0].place);

    let hips = &g.state(upright).unwrap().controls["hips"];
    approx(hips.anchor.damping_time, 0.25, 1e-6);
    match &hips.anchor.mode {
        AnchorMode::Single(r) => {
            assert_eq!(r.target, AnchorTarget::Role("seat".into()));
            assert_eq!(r.control, "cushion");
        }
        other => panic!("expected single anchor, got {other:?}"),
    }

    assert_eq!(g.role_entity("partner"), Some("npc_2"));
    assert_eq!(g.role_entity("ghost"), None);
    assert_eq!(g.messages.len(), 2);
    assert_eq!(g.messages[0].sources, vec![slouch]);
    assert_eq!(g.messages[0].target, tall);
    assert!(g.messages[1].sources.is_empty());
    assert_eq!(g.avoids.len(), 1);
    assert!(!g.avoids[0].active);
}

#[test]
fn keyframes_kinds_and_indirect_edges_load() {
    let g = load("chain-indirect");
    let a = g.resolve_state("Posture", "Body", "A").unwrap();
    let b = g.resolve_state("Posture", "Body", "B").unwrap();
    let c = g.resolve_state("Posture", "Body", "C").unwrap();
    assert_eq!(g.state(b).unwrap().kind, StateKind::Intermediate);

    let to_c = g.state(a).unwrap().transition(c).expect("indirect edge");
    assert!(!to_c.is_direct());
    approx(to_c.probability(), 1.0, 1e-6);

    let edge = g.direct_transition(b, c).unwrap();
    let spine = &edge.control_timelines["spine"];
    assert_eq!(spine.curve.len(), 3);
    let (t, v) = spine.curve.interior().next().unwrap();
    approx(t, 0.5, 1e-6);
    approx(v.position.x, 1.5, 1e-6);
    // Boundaries come from the endpoint states.
    approx(spine.curve.first().position.x, 1.0, 1e-6);
    approx(spine.curve.last().position.x, 2.0, 1e-6);
}

#[test]
fn export_then_parse_preserves_the_graph() {
    let original = load("two-animations");
    let json = graph_to_json(&original).unwrap();
    let again = parse_graph_json(&json).unwrap();

    assert_eq!(again.state_count(), original.state_count());
    let names = |g: &Graph| g.animations().map(|(_, a)| a.name.clone()).collect::<Vec<_>>();
    assert_eq!(names(&again), names(&original));

    for (_, st) in original.states() {
        let layer = original.layer(st.layer).unwrap();
        let anim = original.animation(layer.animation).unwrap();
        let id = again.resolve_state(&anim.name, &layer.name, &st.name).unwrap();
        let copy = again.state(id).unwrap();
        assert_eq!(copy.kind, st.kind);
        assert_eq!(copy.timing, st.timing);
        assert_eq!(copy.defaults, st.defaults);
        assert_eq!(copy.controls, st.controls);
        assert_eq!(copy.morphs, st.morphs);
        assert_eq!(copy.transitions.len(), st.transitions.len());
        for (t0, t1) in st.transitions.iter().zip(&copy.transitions) {
            assert_eq!(t0.is_direct(), t1.is_direct());
            approx(t0.probability(), t1.probability(), 1e-6);
            if let (Some(d0), Some(d1)) = (t0.as_direct(), t1.as_direct()) {
                approx(d0.duration, d1.duration, 1e-6);
                assert_eq!(d0.messages, d1.messages);
                assert_eq!(d0.avoids, d1.avoids);
                assert_eq!(d0.sync_targets.len(), d1.sync_targets.len());
                assert_eq!(d0.morph_timelines.len(), d1.morph_timelines.len());
            }
        }
    }
    assert_eq!(again.roles, original.roles);
    assert_eq!(again.messages.len(), original.messages.len());
    assert_eq!(again.avoids.len(), original.avoids.len());
}

#[test]
fn dangling_references_are_dropped() {
    let json = r#"{
        "animations": [{
            "name": "A",
            "layers": [{
                "name": "L",
                "root_state": "missing",
                "states": [
                    { "name": "s", "transitions": [
                        { "target": { "state": "nowhere" } },
                        { "target": { "state": "t" }, "sync_targets": [ { "layer": "Z", "state": "q" } ] },
                        { "target": { "state": "s" } }
                    ] },
                    { "name": "t" },
                    { "transitions": [ { "target": { "state": "s" } } ] }
                ]
            }]
        }],
        "avoids": [ { "name": "x", "states": [ { "animation": "A", "layer": "L", "state": "gone" } ] } ]
    }"#;
    let g = parse_graph_json(json).unwrap();
    let s = g.resolve_state("A", "L", "s").unwrap();
    let t = g.resolve_state("A", "L", "t").unwrap();
    let layer = g.resolve_layer("A", "L").unwrap();
    assert_eq!(g.layer(layer).unwrap().root_state, None);
    // Only s -> t survives; the self-loop is rejected.
    assert_eq!(g.state(s).unwrap().transitions.len(), 1);
    assert!(g.direct_transition(s, t).unwrap().sync_targets.is_empty());
    // The unnamed state gets a generated name and keeps its edge.
    let unnamed = g.resolve_state("A", "L", "state2").unwrap();
    assert!(g.direct_transition(unnamed, s).is_some());
    assert!(g.avoids[0].states.is_empty());
}

#[test]
fn items_missing_required_values_are_skipped() {
    let json = r#"{
        "animations": [{
            "name": "A",
            "layers": [{
                "name": "L",
                "controls": ["hips"],
                "morphs": ["breath"],
                "states": [
                    { "name": "a", "transitions": [
                        { "duration": 1.0 },
                        { "target": { "state": "b" },
                          "messages": [ { "text": "hi" } ],
                          "avoids": [ { "place": true } ],
                          "control_keyframes": { "hips": [ { "position": [1.0, 0.0, 0.0] } ] },
                          "morph_keyframes": { "breath": [ { "time": 0.5 } ] } }
                    ] },
                    { "name": "b" }
                ]
            }]
        }],
        "roles": [ { "entity": "npc_1" } ],
        "messages": [ { "target": { "animation": "A", "layer": "L", "state": "b" } } ],
        "avoids": [ { "active": true } ]
    }"#;
    let loaded = parse_graph_document(json).expect("document still loads");
    let g = &loaded.graph;
    assert_eq!(g.state_count(), 2);
    let a = g.resolve_state("A", "L", "a").unwrap();
    let b = g.resolve_state("A", "L", "b").unwrap();
    assert_eq!(g.state(a).unwrap().transitions.len(), 1);

    let edge = g.direct_transition(a, b).expect("edge with a target survives");
    assert!(edge.messages.is_empty());
    assert!(edge.avoids.is_empty());
    assert!(edge.control_timelines.contains_key("hips"));
    assert!(edge.morph_timelines.contains_key("breath"));
    assert!(g.messages.is_empty());
    assert!(g.avoids.is_empty());
    assert!(g.roles.is_empty());

    // edge target, outgoing message, avoid toggle, two keyframes, role, message, avoid
    assert_eq!(loaded.skipped.len(), 8, "{:?}", loaded.skipped);
    assert!(loaded
        .skipped
        .iter()
        .all(|e| matches!(e, IdleError::MalformedDocument { .. })));
    assert!(loaded.skipped.iter().all(|e| e.category() == "document"));
}

#[test]
fn dangling_references_are_reported() {
    let json = r#"{
        "animations": [{ "name": "A", "layers": [{ "name": "L", "root_state": "missing",
            "states": [ { "name": "s", "transitions": [ { "target": { "state": "nowhere" } } ] } ] }] }]
    }"#;
    let loaded = parse_graph_document(json).unwrap();
    assert_eq!(loaded.skipped.len(), 2);
    assert!(loaded.skipped.iter().all(|e| e.is_recoverable()));
    assert_eq!(parse_graph_json(json).unwrap().state_count(), 1);
}

#[test]
fn malformed_and_future_documents_fail() {
    assert!(matches!(
        parse_graph_json("{ \"animations\": 3 }"),
        Err(IdleError::Serialization { .. })
    ));
    assert!(matches!(
        parse_graph_json(r#"{ "version": 2 }"#),
        Err(IdleError::UnsupportedVersion { version: 2 })
    ));
}
