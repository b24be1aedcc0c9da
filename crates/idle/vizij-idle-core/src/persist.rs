//! JSON persistence for idle graphs.
//!
//! Document shape (every field optional unless noted):
//! - `version` (default 1)
//! - `animations[]`: `name`, `speed`, `layers[]`
//!   - `layers[]`: `name`, `controls[]`, `morphs[]`, `root_state`, `states[]`
//!     - `states[]`: `name`, `kind`, wait timing, `defaults`, `controls{}`, `morphs{}`,
//!       `transitions[]` with timing, signals and interior keyframes
//! - `roles[]`, `messages[]`, `avoids[]` at the root
//!
//! State references are `{ animation?, layer?, state }`; omitted parts default to the
//! referring state's animation/layer. References are resolved after every state exists,
//! so forward references are fine. Dangling references and items missing a required
//! value (an edge without a target, a role without a name, a keyframe without a time)
//! are dropped with a warning and reported in [`LoadedGraph::skipped`]; the rest of the
//! document still loads.

use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::anchor::{AnchorMode, AnchorRef, AnchorSpec, AnchorTarget, ControlEntryAnchored};
use crate::error::IdleError;
use crate::graph::{
    AvoidToggle, Graph, OutgoingMessage, StateKind, StateTiming, SyncTarget, Transition,
    TransitionDefaults,
};
use crate::ids::{LayerId, StateId};
use crate::timeline::{ScalarTimeline, Timeline, TransformTimeline, VirtualAnchor};
use crate::transform::Transform;

/// Current document revision.
pub const FORMAT_VERSION: u32 = 1;

/// A parsed graph plus the items the loader dropped.
#[derive(Clone, Debug)]
pub struct LoadedGraph {
    pub graph: Graph,
    /// `LookupMiss` for dangling references, `MalformedDocument` for unusable items.
    pub skipped: Vec<IdleError>,
}

/// Parse a graph document, keeping the list of skipped items.
pub fn parse_graph_document(s: &str) -> Result<LoadedGraph, IdleError> {
    let doc: GraphDoc = serde_json::from_str(s)?;
    build_graph(doc)
}

/// Parse a graph document.
pub fn parse_graph_json(s: &str) -> Result<Graph, IdleError> {
    parse_graph_document(s).map(|loaded| loaded.graph)
}

/// Serialize a graph into a document.
pub fn graph_to_json(graph: &Graph) -> Result<String, IdleError> {
    Ok(serde_json::to_string_pretty(&export_graph(graph))?)
}

fn build_graph(doc: GraphDoc) -> Result<LoadedGraph, IdleError> {
    if doc.version > FORMAT_VERSION {
        return Err(IdleError::UnsupportedVersion {
            version: doc.version,
        });
    }
    let mut graph = Graph::new();
    let mut skipped: Vec<IdleError> = Vec::new();

    // Pass 1: animations, layers, states and their channel values.
    let mut deferred: Vec<(StateId, String, String, Vec<TransitionDoc>)> = Vec::new();
    for (ai, adoc) in doc.animations.into_iter().enumerate() {
        let anim_name = name_or(adoc.name, "animation", ai);
        let anim = graph.add_animation(anim_name.clone());
        if let Some(a) = graph.animation_mut(anim) {
            a.speed = adoc.speed.max(0.0);
        }
        for (li, ldoc) in adoc.layers.into_iter().enumerate() {
            let layer_name = name_or(ldoc.name, "layer", li);
            let layer = graph.add_layer(anim, layer_name.clone())?;
            for c in ldoc.controls {
                graph.add_control_channel(layer, c)?;
            }
            for m in ldoc.morphs {
                graph.add_morph_channel(layer, m)?;
            }
            for (si, sdoc) in ldoc.states.into_iter().enumerate() {
                let state_name = name_or(sdoc.name, "state", si);
                let id = graph.add_state(layer, state_name)?;
                if let Some(st) = graph.state_mut(id) {
                    st.kind = sdoc.kind.into();
                    st.timing = StateTiming {
                        wait_min: sdoc.wait_min,
                        wait_max: sdoc.wait_max,
                        wait_infinite: sdoc.wait_infinite,
                        wait_for_sync: sdoc.wait_for_sync,
                    };
                    st.defaults = sdoc.defaults.into();
                    for (ch, cdoc) in sdoc.controls {
                        st.controls.insert(ch, cdoc.into_entry());
                    }
                    st.morphs = sdoc.morphs;
                }
                deferred.push((id, anim_name.clone(), layer_name.clone(), sdoc.transitions));
            }
            if let Some(root) = ldoc.root_state {
                match graph.find_state(layer, &root) {
                    Some(s) => graph.set_root_state(layer, s)?,
                    None => skip(&mut skipped, IdleError::lookup("root state", format!("{layer_name}/{root}"))),
                }
            }
        }
    }

    // Pass 2: edges.
    for (source, anim_name, layer_name, transitions) in deferred {
        for tdoc in transitions {
            let Some(target) = resolve_ref(&graph, &tdoc.target, &anim_name, &layer_name, &mut skipped) else {
                continue;
            };
            if let Err(e) = add_edge(&mut graph, source, target, tdoc, &mut skipped) {
                warn!("transition from '{}' dropped", graph.state_name(source));
                skip(&mut skipped, e);
            }
        }
    }

    // Root lists.
    for r in doc.roles {
        if r.name.is_empty() {
            skip(&mut skipped, malformed("role without a name"));
            continue;
        }
        graph.set_role(r.name, r.entity);
    }
    for m in doc.messages {
        if m.text.is_empty() {
            skip(&mut skipped, malformed("message without text"));
            continue;
        }
        let Some(target) = resolve_ref(&graph, &m.target, "", "", &mut skipped) else {
            continue;
        };
        let sources: Vec<StateId> = m
            .sources
            .iter()
            .filter_map(|r| resolve_ref(&graph, r, "", "", &mut skipped))
            .collect();
        graph.add_message(m.text, sources, target)?;
    }
    for a in doc.avoids {
        if a.name.is_empty() {
            skip(&mut skipped, malformed("avoid without a name"));
            continue;
        }
        let states: Vec<StateId> = a
            .states
            .iter()
            .filter_map(|r| resolve_ref(&graph, r, "", "", &mut skipped))
            .collect();
        graph.add_avoid(a.name.clone(), states);
        graph.set_avoid_active(&a.name, a.active);
    }
    Ok(LoadedGraph { graph, skipped })
}

fn malformed(reason: impl Into<String>) -> IdleError {
    IdleError::MalformedDocument {
        reason: reason.into(),
    }
}

fn skip(skipped: &mut Vec<IdleError>, err: IdleError) {
    warn!("{err}; skipped");
    skipped.push(err);
}

fn name_or(name: String, kind: &str, index: usize) -> String {
    if name.is_empty() {
        let generated = format!("{kind}{index}");
        warn!("{kind} without a name; using '{generated}'");
        generated
    } else {
        name
    }
}

fn resolve_ref(
    graph: &Graph,
    r: &StateRefDoc,
    animation: &str,
    layer: &str,
    skipped: &mut Vec<IdleError>,
) -> Option<StateId> {
    if r.state.is_empty() {
        skip(skipped, malformed("state reference without a state name"));
        return None;
    }
    let animation = r.animation.as_deref().unwrap_or(animation);
    let layer = r.layer.as_deref().unwrap_or(layer);
    match graph.resolve_state(animation, layer, &r.state) {
        Ok(id) => Some(id),
        Err(e) => {
            skip(skipped, e);
            None
        }
    }
}

fn add_edge(
    graph: &mut Graph,
    source: StateId,
    target: StateId,
    t: TransitionDoc,
    skipped: &mut Vec<IdleError>,
) -> Result<(), IdleError> {
    if t.kind == TransitionKindDoc::Indirect {
        return graph.add_indirect_transition(source, target, t.probability.unwrap_or(0.5));
    }

    let target_anim = graph
        .state_animation(target)
        .map(|a| graph.animation_name(a))
        .unwrap_or_default();
    let sync_targets: Vec<SyncTarget> = t
        .sync_targets
        .iter()
        .filter_map(|r| {
            let state = resolve_ref(graph, r, &target_anim, "", skipped)?;
            let layer = graph.state(state)?.layer;
            Some(SyncTarget { layer, state })
        })
        .collect();

    let (src_controls, src_morphs) = endpoint_values(graph, source);
    let (dst_controls, dst_morphs) = endpoint_values(graph, target);
    let control_timelines: IndexMap<String, TransformTimeline> = t
        .control_keyframes
        .into_iter()
        .map(|(ch, keys)| {
            let identity = || ControlEntryAnchored::world(Transform::identity());
            let a = src_controls.get(&ch).cloned().unwrap_or_else(identity);
            let b = dst_controls.get(&ch).cloned().unwrap_or_else(identity);
            let interior = keys
                .into_iter()
                .filter_map(|k| match k.time {
                    Some(time) => Some((time, Transform::from_arrays(k.position, k.rotation))),
                    None => {
                        skip(skipped, malformed(format!("'{ch}' keyframe without a time")));
                        None
                    }
                })
                .collect::<Vec<_>>();
            let tl = TransformTimeline {
                curve: Timeline::from_keyframes(a.transform, interior, b.transform),
                anchor: VirtualAnchor::new(a.anchor, b.anchor),
            };
            (ch, tl)
        })
        .collect();
    let morph_timelines: IndexMap<String, ScalarTimeline> = t
        .morph_keyframes
        .into_iter()
        .map(|(ch, keys)| {
            let a = src_morphs.get(&ch).copied().unwrap_or_default();
            let b = dst_morphs.get(&ch).copied().unwrap_or_default();
            let interior = keys
                .into_iter()
                .filter_map(|k| match (k.time, k.value) {
                    (Some(time), Some(value)) => Some((time, value)),
                    _ => {
                        skip(skipped, malformed(format!("'{ch}' keyframe without a time or value")));
                        None
                    }
                })
                .collect::<Vec<_>>();
            let tl = Timeline::from_keyframes(a, interior, b);
            (ch, tl)
        })
        .collect();

    let edge = graph.add_direct_transition(source, target)?;
    if let Some(p) = t.probability {
        edge.probability = p.max(0.0);
    }
    if let Some(d) = t.duration {
        edge.duration = d.max(0.0);
    }
    if let Some(n) = t.duration_noise {
        edge.duration_noise = n.max(0.0);
    }
    if let Some(a) = t.ease_in {
        edge.ease_in = a.max(0.0);
    }
    if let Some(b) = t.ease_out {
        edge.ease_out = b.max(0.0);
    }
    edge.sync_targets = sync_targets;
    edge.messages = t
        .messages
        .into_iter()
        .filter_map(|m| {
            if m.role.is_empty() || m.text.is_empty() {
                skip(skipped, malformed("outgoing message without a role or text"));
                return None;
            }
            Some(OutgoingMessage {
                role: m.role,
                text: m.text,
            })
        })
        .collect();
    edge.avoids = t
        .avoids
        .into_iter()
        .filter_map(|a| {
            if a.avoid.is_empty() {
                skip(skipped, malformed("avoid toggle without an avoid name"));
                return None;
            }
            Some(AvoidToggle {
                role: a.role,
                avoid: a.avoid,
                place: a.place,
            })
        })
        .collect();
    edge.control_timelines = control_timelines;
    edge.morph_timelines = morph_timelines;
    Ok(())
}

fn endpoint_values(
    graph: &Graph,
    state: StateId,
) -> (IndexMap<String, ControlEntryAnchored>, IndexMap<String, f32>) {
    graph
        .state(state)
        .map(|s| (s.controls.clone(), s.morphs.clone()))
        .unwrap_or_default()
}

// ----- export -----

fn state_ref(graph: &Graph, id: StateId) -> StateRefDoc {
    let layer = graph.state(id).map(|s| s.layer);
    let animation = graph.state_animation(id).map(|a| graph.animation_name(a));
    StateRefDoc {
        animation,
        layer: layer.map(|l| graph.layer_name(l)),
        state: graph.state_name(id),
    }
}

fn export_graph(graph: &Graph) -> GraphDoc {
    let animations = graph
        .animations()
        .map(|(_, a)| AnimationDoc {
            name: a.name.clone(),
            speed: a.speed,
            layers: a
                .layers
                .iter()
                .filter_map(|l| export_layer(graph, *l))
                .collect(),
        })
        .collect();
    GraphDoc {
        version: FORMAT_VERSION,
        animations,
        roles: graph
            .roles
            .iter()
            .map(|r| RoleDoc {
                name: r.name.clone(),
                entity: r.entity.clone(),
            })
            .collect(),
        messages: graph
            .messages
            .iter()
            .map(|m| MessageDoc {
                text: m.text.clone(),
                sources: m.sources.iter().map(|s| state_ref(graph, *s)).collect(),
                target: state_ref(graph, m.target),
            })
            .collect(),
        avoids: graph
            .avoids
            .iter()
            .map(|a| AvoidDoc {
                name: a.name.clone(),
                active: a.active,
                states: a.states.iter().map(|s| state_ref(graph, *s)).collect(),
            })
            .collect(),
    }
}

fn export_layer(graph: &Graph, id: LayerId) -> Option<LayerDoc> {
    let layer = graph.layer(id)?;
    let states = layer
        .states
        .iter()
        .filter_map(|s| {
            let st = graph.state(*s)?;
            Some(StateDoc {
                name: st.name.clone(),
                kind: st.kind.into(),
                wait_min: st.timing.wait_min,
                wait_max: st.timing.wait_max,
                wait_infinite: st.timing.wait_infinite,
                wait_for_sync: st.timing.wait_for_sync,
                defaults: DefaultsDoc::from(&st.defaults),
                controls: st
                    .controls
                    .iter()
                    .map(|(ch, e)| (ch.clone(), ControlDoc::from_entry(e)))
                    .collect(),
                morphs: st.morphs.clone(),
                transitions: st.transitions.iter().map(|t| export_transition(graph, t)).collect(),
            })
        })
        .collect();
    Some(LayerDoc {
        name: layer.name.clone(),
        controls: layer.controls.clone(),
        morphs: layer.morphs.clone(),
        root_state: layer.root_state.map(|s| graph.state_name(s)),
        states,
    })
}

fn export_transition(graph: &Graph, t: &Transition) -> TransitionDoc {
    match t {
        Transition::Indirect(i) => TransitionDoc {
            kind: TransitionKindDoc::Indirect,
            target: state_ref(graph, i.target),
            probability: Some(i.probability),
            ..TransitionDoc::default()
        },
        Transition::Direct(d) => TransitionDoc {
            kind: TransitionKindDoc::Direct,
            target: state_ref(graph, d.target),
            probability: Some(d.probability),
            duration: Some(d.duration),
            duration_noise: Some(d.duration_noise),
            ease_in: Some(d.ease_in),
            ease_out: Some(d.ease_out),
            sync_targets: d.sync_targets.iter().map(|s| state_ref(graph, s.state)).collect(),
            messages: d
                .messages
                .iter()
                .map(|m| MessageOutDoc {
                    role: m.role.clone(),
                    text: m.text.clone(),
                })
                .collect(),
            avoids: d
                .avoids
                .iter()
                .map(|a| AvoidToggleDoc {
                    role: a.role.clone(),
                    avoid: a.avoid.clone(),
                    place: a.place,
                })
                .collect(),
            control_keyframes: d
                .control_timelines
                .iter()
                .map(|(ch, tl)| {
                    let keys = tl
                        .curve
                        .interior()
                        .map(|(time, v)| ControlKeyDoc {
                            time: Some(time),
                            position: v.position_array(),
                            rotation: v.rotation_array(),
                        })
                        .collect();
                    (ch.clone(), keys)
                })
                .collect(),
            morph_keyframes: d
                .morph_timelines
                .iter()
                .map(|(ch, tl)| {
                    let keys = tl
                        .interior()
                        .map(|(time, v)| MorphKeyDoc {
                            time: Some(time),
                            value: Some(*v),
                        })
                        .collect();
                    (ch.clone(), keys)
                })
                .collect(),
        },
    }
}

// ----- JSON schema (serde) -----

fn default_version() -> u32 {
    FORMAT_VERSION
}

fn default_speed() -> f32 {
    1.0
}

fn default_wait_min() -> f32 {
    StateTiming::default().wait_min
}

fn default_wait_max() -> f32 {
    StateTiming::default().wait_max
}

fn identity_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphDoc {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    animations: Vec<AnimationDoc>,
    #[serde(default)]
    roles: Vec<RoleDoc>,
    #[serde(default)]
    messages: Vec<MessageDoc>,
    #[serde(default)]
    avoids: Vec<AvoidDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnimationDoc {
    #[serde(default)]
    name: String,
    #[serde(default = "default_speed")]
    speed: f32,
    #[serde(default)]
    layers: Vec<LayerDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerDoc {
    #[serde(default)]
    name: String,
    #[serde(default)]
    controls: Vec<String>,
    #[serde(default)]
    morphs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    root_state: Option<String>,
    #[serde(default)]
    states: Vec<StateDoc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
enum StateKindDoc {
    #[default]
    Regular,
    Intermediate,
}

impl From<StateKindDoc> for StateKind {
    fn from(k: StateKindDoc) -> Self {
        match k {
            StateKindDoc::Regular => StateKind::Regular,
            StateKindDoc::Intermediate => StateKind::Intermediate,
        }
    }
}

impl From<StateKind> for StateKindDoc {
    fn from(k: StateKind) -> Self {
        match k {
            StateKind::Regular => StateKindDoc::Regular,
            StateKind::Intermediate => StateKindDoc::Intermediate,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StateDoc {
    #[serde(default)]
    name: String,
    #[serde(default)]
    kind: StateKindDoc,
    #[serde(default = "default_wait_min")]
    wait_min: f32,
    #[serde(default = "default_wait_max")]
    wait_max: f32,
    #[serde(default)]
    wait_infinite: bool,
    #[serde(default)]
    wait_for_sync: bool,
    #[serde(default)]
    defaults: DefaultsDoc,
    #[serde(default)]
    controls: IndexMap<String, ControlDoc>,
    #[serde(default)]
    morphs: IndexMap<String, f32>,
    #[serde(default)]
    transitions: Vec<TransitionDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct DefaultsDoc {
    duration: f32,
    duration_noise: f32,
    ease_in: f32,
    ease_out: f32,
    probability: f32,
}

impl Default for DefaultsDoc {
    fn default() -> Self {
        DefaultsDoc::from(&TransitionDefaults::default())
    }
}

impl From<&TransitionDefaults> for DefaultsDoc {
    fn from(d: &TransitionDefaults) -> Self {
        Self {
            duration: d.duration,
            duration_noise: d.duration_noise,
            ease_in: d.ease_in,
            ease_out: d.ease_out,
            probability: d.probability,
        }
    }
}

impl From<DefaultsDoc> for TransitionDefaults {
    fn from(d: DefaultsDoc) -> Self {
        Self {
            duration: d.duration.max(0.0),
            duration_noise: d.duration_noise.max(0.0),
            ease_in: d.ease_in.max(0.0),
            ease_out: d.ease_out.max(0.0),
            probability: d.probability.max(0.0),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ControlDoc {
    #[serde(default)]
    position: [f32; 3],
    /// Quaternion (x, y, z, w)
    #[serde(default = "identity_rotation")]
    rotation: [f32; 4],
    #[serde(default)]
    anchor: AnchorDoc,
}

impl ControlDoc {
    fn into_entry(self) -> ControlEntryAnchored {
        ControlEntryAnchored::anchored(
            Transform::from_arrays(self.position, self.rotation),
            self.anchor.into_spec(),
        )
    }

    fn from_entry(e: &ControlEntryAnchored) -> Self {
        Self {
            position: e.transform.position_array(),
            rotation: e.transform.rotation_array(),
            anchor: AnchorDoc::from_spec(&e.anchor),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
enum AnchorModeDoc {
    #[default]
    World,
    Single,
    Blend,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct AnchorDoc {
    mode: AnchorModeDoc,
    #[serde(skip_serializing_if = "Option::is_none")]
    a: Option<AnchorRefDoc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    b: Option<AnchorRefDoc>,
    ratio: f32,
    damping_time: f32,
}

impl AnchorDoc {
    fn into_spec(self) -> AnchorSpec {
        let a = self.a.and_then(AnchorRefDoc::into_ref);
        let b = self.b.and_then(AnchorRefDoc::into_ref);
        let spec = match (self.mode, a, b) {
            (AnchorModeDoc::World, _, _) => AnchorSpec::world(),
            (AnchorModeDoc::Single, Some(a), _) => AnchorSpec::single(a),
            (AnchorModeDoc::Blend, Some(a), Some(b)) => AnchorSpec::blend(a, b, self.ratio),
            (AnchorModeDoc::Blend, Some(a), None) => {
                warn!("blend anchor without a second reference; using single");
                AnchorSpec::single(a)
            }
            (mode, None, _) => {
                warn!("{mode:?} anchor without a reference; using world");
                AnchorSpec::world()
            }
        };
        spec.with_damping(self.damping_time)
    }

    fn from_spec(spec: &AnchorSpec) -> Self {
        let (mode, a, b, ratio) = match &spec.mode {
            AnchorMode::World => (AnchorModeDoc::World, None, None, 0.0),
            AnchorMode::Single(a) => (AnchorModeDoc::Single, Some(AnchorRefDoc::from_ref(a)), None, 0.0),
            AnchorMode::Blend { a, b, ratio } => (
                AnchorModeDoc::Blend,
                Some(AnchorRefDoc::from_ref(a)),
                Some(AnchorRefDoc::from_ref(b)),
                *ratio,
            ),
        };
        Self {
            mode,
            a,
            b,
            ratio,
            damping_time: spec.damping_time,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct AnchorRefDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    control: String,
}

impl AnchorRefDoc {
    fn into_ref(self) -> Option<AnchorRef> {
        match (self.entity, self.role) {
            (Some(e), _) => Some(AnchorRef::entity(e, self.control)),
            (None, Some(r)) => Some(AnchorRef::role(r, self.control)),
            (None, None) => None,
        }
    }

    fn from_ref(r: &AnchorRef) -> Self {
        match &r.target {
            AnchorTarget::Entity(e) => Self {
                entity: Some(e.clone()),
                role: None,
                control: r.control.clone(),
            },
            AnchorTarget::Role(role) => Self {
                entity: None,
                role: Some(role.clone()),
                control: r.control.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct StateRefDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    animation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    layer: Option<String>,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
enum TransitionKindDoc {
    #[default]
    Direct,
    Indirect,
}

/// Unset timing fields fall back to the source state's defaults.
#[derive(Debug, Serialize, Deserialize, Default)]
struct TransitionDoc {
    #[serde(default)]
    kind: TransitionKindDoc,
    #[serde(default)]
    target: StateRefDoc,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    probability: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration_noise: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ease_in: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ease_out: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sync_targets: Vec<StateRefDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    messages: Vec<MessageOutDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    avoids: Vec<AvoidToggleDoc>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    control_keyframes: IndexMap<String, Vec<ControlKeyDoc>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    morph_keyframes: IndexMap<String, Vec<MorphKeyDoc>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MessageOutDoc {
    #[serde(default)]
    role: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AvoidToggleDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    avoid: String,
    #[serde(default = "default_place")]
    place: bool,
}

fn default_place() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
struct ControlKeyDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<f32>,
    #[serde(default)]
    position: [f32; 3],
    #[serde(default = "identity_rotation")]
    rotation: [f32; 4],
}

#[derive(Debug, Serialize, Deserialize)]
struct MorphKeyDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RoleDoc {
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    entity: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MessageDoc {
    #[serde(default)]
    text: String,
    #[serde(default)]
    sources: Vec<StateRefDoc>,
    #[serde(default)]
    target: StateRefDoc,
}

#[derive(Debug, Serialize, Deserialize)]
struct AvoidDoc {
    #[serde(default)]
    name: String,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    states: Vec<StateRefDoc>,
}
