use rand::rngs::StdRng;
use rand::SeedableRng;
use vizij_idle_core::{Graph, LayerId, Selection, StateId};

fn states(graph: &mut Graph, layer: LayerId, names: &[&str]) -> Vec<StateId> {
    names
        .iter()
        .map(|n| graph.add_state(layer, *n).unwrap())
        .collect()
}

/// a → b → c → d, plus a → c and a ⇢ d (indirect).
fn diamond() -> (Graph, Vec<StateId>) {
    let mut g = Graph::new();
    let anim = g.add_animation("Idle");
    let layer = g.add_layer(anim, "Body").unwrap();
    let s = states(&mut g, layer, &["a", "b", "c", "d"]);
    g.add_direct_transition(s[0], s[1]).unwrap();
    g.add_direct_transition(s[1], s[2]).unwrap();
    g.add_direct_transition(s[2], s[3]).unwrap();
    g.add_direct_transition(s[0], s[2]).unwrap();
    g.add_indirect_transition(s[0], s[3], 1.0).unwrap();
    (g, s)
}

#[test]
fn paths_take_the_fewest_hops() {
    let (g, s) = diamond();
    let table = g.get_all_paths(s[0]);
    assert_eq!(table[&s[0]], Vec::<StateId>::new());
    assert_eq!(table[&s[1]], vec![s[1]]);
    assert_eq!(table[&s[2]], vec![s[2]]);
    assert_eq!(table[&s[3]], vec![s[2], s[3]]);
    assert_eq!(g.find_path(s[0], s[0]), Some(Vec::new()));
    assert_eq!(g.find_path(s[3], s[0]), None);
}

#[test]
fn indirect_edges_are_not_walked() {
    let mut g = Graph::new();
    let anim = g.add_animation("Idle");
    let layer = g.add_layer(anim, "Body").unwrap();
    let s = states(&mut g, layer, &["a", "b"]);
    g.add_indirect_transition(s[0], s[1], 1.0).unwrap();
    assert_eq!(g.find_path(s[0], s[1]), None);
    assert_eq!(g.reachable_states(s[0]), vec![s[1]]);
}

#[test]
fn active_avoids_block_paths_and_selection() {
    let (mut g, s) = diamond();
    g.add_avoid("crowded", vec![s[2]]);
    assert_eq!(g.find_path(s[0], s[3]), Some(vec![s[2], s[3]]));

    assert!(g.set_avoid_active("crowded", true));
    assert!(!g.set_avoid_active("missing", true));
    assert_eq!(g.find_path(s[0], s[2]), None);
    assert_eq!(g.find_path(s[0], s[3]), None);

    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..200 {
        match g.sort_next_state(s[1], &mut rng) {
            Selection::NoValidTransition => {}
            other => panic!("avoided state picked: {other:?}"),
        }
    }
}

#[test]
fn path_to_animation_crosses_into_the_nearest_state() {
    let (mut g, s) = diamond();
    let sit = g.add_animation("Sit");
    let seat = g.add_layer(sit, "Body").unwrap();
    let slump = g.add_state(seat, "slump").unwrap();
    g.add_direct_transition(s[1], slump).unwrap();
    assert_eq!(g.find_path_to_animation(s[0], sit), Some(vec![s[1], slump]));
    let idle = g.state_animation(s[0]).unwrap();
    assert_eq!(g.find_path_to_animation(s[0], idle), Some(Vec::new()));
    assert_eq!(g.find_path_to_animation(slump, idle), None);
}

#[test]
fn weighted_selection_follows_the_weights() {
    let mut g = Graph::new();
    let anim = g.add_animation("Idle");
    let layer = g.add_layer(anim, "Body").unwrap();
    let s = states(&mut g, layer, &["from", "rare", "common", "never"]);
    g.add_direct_transition(s[0], s[1]).unwrap().probability = 1.0;
    g.add_direct_transition(s[0], s[2]).unwrap().probability = 3.0;
    g.add_direct_transition(s[0], s[3]).unwrap().probability = 0.0;

    let mut rng = StdRng::seed_from_u64(42);
    let (mut rare, mut common) = (0u32, 0u32);
    for _ in 0..8000 {
        match g.sort_next_state(s[0], &mut rng) {
            Selection::Next { target, direct } => {
                assert!(direct);
                if target == s[1] {
                    rare += 1;
                } else if target == s[2] {
                    common += 1;
                } else {
                    panic!("weightless target picked");
                }
            }
            Selection::NoValidTransition => panic!("candidates exist"),
        }
    }
    let share = common as f32 / (rare + common) as f32;
    assert!((share - 0.75).abs() < 0.03, "common share {share}");
}

#[test]
fn huge_weights_still_select() {
    let mut g = Graph::new();
    let anim = g.add_animation("Idle");
    let layer = g.add_layer(anim, "Body").unwrap();
    let s = states(&mut g, layer, &["from", "left", "right"]);
    g.add_direct_transition(s[0], s[1]).unwrap().probability = f32::MAX;
    g.add_direct_transition(s[0], s[2]).unwrap().probability = f32::MAX;

    let mut rng = StdRng::seed_from_u64(3);
    let mut seen = [0u32; 2];
    for _ in 0..400 {
        match g.sort_next_state(s[0], &mut rng) {
            Selection::Next { target, .. } if target == s[1] => seen[0] += 1,
            Selection::Next { target, .. } if target == s[2] => seen[1] += 1,
            other => panic!("unexpected pick {other:?}"),
        }
    }
    assert!(seen[0] > 100 && seen[1] > 100, "{seen:?}");
}

#[test]
fn selection_reports_indirect_picks() {
    let (mut g, s) = diamond();
    for t in [s[1], s[2]] {
        g.direct_transition_mut(s[0], t).unwrap().probability = 0.0;
    }
    let mut rng = StdRng::seed_from_u64(9);
    assert_eq!(
        g.sort_next_state(s[0], &mut rng),
        Selection::Next {
            target: s[3],
            direct: false
        }
    );
    assert_eq!(g.sort_next_state(s[3], &mut rng), Selection::NoValidTransition);
}
