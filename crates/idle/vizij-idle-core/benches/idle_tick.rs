use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use vizij_idle_core::{
    parse_graph_json, AnchorResolver, Config, Engine, Graph, Inputs, PoseSource, Transform,
};

/// Static host: identity pose, every anchor at the origin.
struct StillScene;

impl PoseSource for StillScene {
    fn read_control(&self, _name: &str) -> Option<Transform> {
        Some(Transform::identity())
    }

    fn read_morph(&self, _name: &str) -> Option<f32> {
        Some(0.0)
    }
}

impl AnchorResolver for StillScene {
    fn resolve_anchor(&self, _entity: &str, _control: &str) -> Option<Transform> {
        Some(Transform::identity())
    }
}

fn load(name: &str) -> Graph {
    let json = vizij_test_fixtures::idle_graphs::json(name).expect("fixture");
    parse_graph_json(&json).expect("parse fixture")
}

/// A layer with `n` states in a ring, each edge carrying one interior keyframe.
fn ring_graph(n: usize) -> Graph {
    let mut json = String::from(r#"{ "animations": [{ "name": "Ring", "layers": [{ "name": "Body", "controls": ["hips"], "morphs": ["breath"], "states": ["#);
    for i in 0..n {
        if i > 0 {
            json.push(',');
        }
        let next = (i + 1) % n;
        json.push_str(&format!(
            r#"{{ "name": "s{i}", "wait_min": 0.0, "wait_max": 0.2,
                 "controls": {{ "hips": {{ "position": [{i}.0, 0.0, 0.0] }} }},
                 "morphs": {{ "breath": 0.{i} }},
                 "transitions": [{{ "target": {{ "state": "s{next}" }}, "duration": 0.5,
                    "control_keyframes": {{ "hips": [{{ "time": 0.5, "position": [0.0, 1.0, 0.0] }}] }} }}] }}"#
        ));
    }
    json.push_str("] }] }] }");
    parse_graph_json(&json).expect("ring graph")
}

fn bench_tick(c: &mut Criterion) {
    let scene = StillScene;

    for (label, graph) in [
        ("tick_idle_wave", load("idle-wave")),
        ("tick_two_animations", load("two-animations")),
        ("tick_ring_8", ring_graph(8)),
    ] {
        c.bench_function(label, |b| {
            b.iter_batched(
                || Engine::with_graph(Config::seeded(7), graph.clone()),
                |mut engine| {
                    for _ in 0..120 {
                        black_box(engine.update(1.0 / 60.0, Inputs::none(), &scene));
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_paths(c: &mut Criterion) {
    let graph = ring_graph(64);
    let Some(start) = graph.states().map(|(id, _)| id).next() else {
        return;
    };
    c.bench_function("all_paths_ring_64", |b| {
        b.iter(|| black_box(graph.get_all_paths(black_box(start))))
    });
}

criterion_group!(benches, bench_tick, bench_paths);
criterion_main!(benches);
