//! The state graph: animations own layers, layers own states, states own outgoing
//! transitions.
//!
//! Entities live in slot maps and refer to each other by versioned key. Every removal
//! purges the references other entities hold to the removed one, so a live handle stored
//! anywhere in the graph always resolves.

pub mod paths;
pub mod state;
pub mod transition;

use hashbrown::HashSet;
use log::{debug, warn};
use slotmap::SlotMap;

use crate::anchor::{AnchorContext, AnchorMode, AnchorSpec, ControlEntryAnchored};
use crate::binding::Scene;
use crate::error::IdleError;
use crate::ids::{AnimationId, LayerId, StateId};
use crate::timeline::{ScalarTimeline, TransformTimeline};
use crate::transform::Transform;

pub use paths::Selection;
pub use state::{Captured, State, StateKind, StateTiming, TransitionDefaults};
pub use transition::{
    AvoidToggle, DirectTransition, IndirectTransition, OutgoingMessage, SyncTarget, Transition,
};

#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    /// Playback-speed multiplier applied to every layer clock.
    pub speed: f32,
    pub layers: Vec<LayerId>,
}

#[derive(Clone, Debug)]
pub struct Layer {
    pub name: String,
    pub animation: AnimationId,
    /// Captured control channels, in output order.
    pub controls: Vec<String>,
    pub morphs: Vec<String>,
    pub states: Vec<StateId>,
    pub root_state: Option<StateId>,
}

/// Logical name bound to an external character instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub entity: Option<String>,
}

/// Cross-instance trigger: receiving `text` moves a layer sitting on one of `sources`
/// to `target`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub sources: Vec<StateId>,
    pub target: StateId,
}

/// Togglable exclusion flag. While active, `states` are never selected or pathed through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Avoid {
    pub name: String,
    pub states: Vec<StateId>,
    pub active: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Graph {
    animations: SlotMap<AnimationId, Animation>,
    layers: SlotMap<LayerId, Layer>,
    states: SlotMap<StateId, State>,
    pub roles: Vec<Role>,
    pub messages: Vec<Message>,
    pub avoids: Vec<Avoid>,
}

fn state_miss(id: StateId) -> IdleError {
    IdleError::lookup("state", format!("{id:?}"))
}

fn layer_miss(id: LayerId) -> IdleError {
    IdleError::lookup("layer", format!("{id:?}"))
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    // ----- access -----

    pub fn animation(&self, id: AnimationId) -> Option<&Animation> {
        self.animations.get(id)
    }

    pub fn animation_mut(&mut self, id: AnimationId) -> Option<&mut Animation> {
        self.animations.get_mut(id)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(id)
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id)
    }

    pub fn state_mut(&mut self, id: StateId) -> Option<&mut State> {
        self.states.get_mut(id)
    }

    pub fn animations(&self) -> impl Iterator<Item = (AnimationId, &Animation)> {
        self.animations.iter()
    }

    pub fn layers(&self) -> impl Iterator<Item = (LayerId, &Layer)> {
        self.layers.iter()
    }

    pub fn states(&self) -> impl Iterator<Item = (StateId, &State)> {
        self.states.iter()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Animation a state belongs to.
    pub fn state_animation(&self, id: StateId) -> Option<AnimationId> {
        let layer = self.states.get(id)?.layer;
        Some(self.layers.get(layer)?.animation)
    }

    /// Root state of the layer, else its first state.
    pub fn entry_state(&self, layer: LayerId) -> Option<StateId> {
        let l = self.layers.get(layer)?;
        l.root_state.or_else(|| l.states.first().copied())
    }

    pub fn state_name(&self, id: StateId) -> String {
        self.states
            .get(id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| format!("{id:?}"))
    }

    pub fn layer_name(&self, id: LayerId) -> String {
        self.layers
            .get(id)
            .map(|l| l.name.clone())
            .unwrap_or_else(|| format!("{id:?}"))
    }

    pub fn animation_name(&self, id: AnimationId) -> String {
        self.animations
            .get(id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| format!("{id:?}"))
    }

    // ----- lookup by name -----

    pub fn find_animation(&self, name: &str) -> Option<AnimationId> {
        self.animations
            .iter()
            .find(|(_, a)| a.name == name)
            .map(|(id, _)| id)
    }

    pub fn find_layer(&self, animation: AnimationId, name: &str) -> Option<LayerId> {
        self.animations.get(animation)?.layers.iter().copied().find(|l| {
            self.layers
                .get(*l)
                .map(|layer| layer.name == name)
                .unwrap_or(false)
        })
    }

    pub fn find_state(&self, layer: LayerId, name: &str) -> Option<StateId> {
        self.layers.get(layer)?.states.iter().copied().find(|s| {
            self.states
                .get(*s)
                .map(|state| state.name == name)
                .unwrap_or(false)
        })
    }

    pub fn resolve_animation(&self, animation: &str) -> Result<AnimationId, IdleError> {
        self.find_animation(animation)
            .ok_or_else(|| IdleError::lookup("animation", animation))
    }

    pub fn resolve_layer(&self, animation: &str, layer: &str) -> Result<LayerId, IdleError> {
        let a = self.resolve_animation(animation)?;
        self.find_layer(a, layer)
            .ok_or_else(|| IdleError::lookup("layer", format!("{animation}/{layer}")))
    }

    /// Resolve an `animation/layer/state` name triple.
    pub fn resolve_state(&self, animation: &str, layer: &str, state: &str) -> Result<StateId, IdleError> {
        let l = self.resolve_layer(animation, layer)?;
        self.find_state(l, state)
            .ok_or_else(|| IdleError::lookup("state", format!("{animation}/{layer}/{state}")))
    }

    // ----- authoring -----

    pub fn add_animation(&mut self, name: impl Into<String>) -> AnimationId {
        self.animations.insert(Animation {
            name: name.into(),
            speed: 1.0,
            layers: Vec::new(),
        })
    }

    pub fn add_layer(&mut self, animation: AnimationId, name: impl Into<String>) -> Result<LayerId, IdleError> {
        if !self.animations.contains_key(animation) {
            return Err(IdleError::lookup("animation", format!("{animation:?}")));
        }
        let id = self.layers.insert(Layer {
            name: name.into(),
            animation,
            controls: Vec::new(),
            morphs: Vec::new(),
            states: Vec::new(),
            root_state: None,
        });
        if let Some(a) = self.animations.get_mut(animation) {
            a.layers.push(id);
        }
        Ok(id)
    }

    pub fn add_state(&mut self, layer: LayerId, name: impl Into<String>) -> Result<StateId, IdleError> {
        if !self.layers.contains_key(layer) {
            return Err(layer_miss(layer));
        }
        let id = self.states.insert(State::new(name, layer));
        if let Some(l) = self.layers.get_mut(layer) {
            l.states.push(id);
        }
        Ok(id)
    }

    /// Register a control channel on a layer. States capture it lazily.
    pub fn add_control_channel(&mut self, layer: LayerId, name: impl Into<String>) -> Result<(), IdleError> {
        let l = self.layers.get_mut(layer).ok_or_else(|| layer_miss(layer))?;
        let name = name.into();
        if !l.controls.contains(&name) {
            l.controls.push(name);
        }
        Ok(())
    }

    pub fn add_morph_channel(&mut self, layer: LayerId, name: impl Into<String>) -> Result<(), IdleError> {
        let l = self.layers.get_mut(layer).ok_or_else(|| layer_miss(layer))?;
        let name = name.into();
        if !l.morphs.contains(&name) {
            l.morphs.push(name);
        }
        Ok(())
    }

    /// An edge may stay inside one layer or cross into another animation.
    fn validate_edge(&self, source: StateId, target: StateId) -> Result<(), IdleError> {
        let s = self.states.get(source).ok_or_else(|| state_miss(source))?;
        let t = self.states.get(target).ok_or_else(|| state_miss(target))?;
        if source == target {
            return Err(IdleError::InvalidTransition {
                reason: format!("'{}' cannot transition to itself", s.name),
            });
        }
        if s.layer != t.layer && self.state_animation(source) == self.state_animation(target) {
            return Err(IdleError::InvalidTransition {
                reason: format!(
                    "'{}' and '{}' are in different layers of the same animation",
                    s.name, t.name
                ),
            });
        }
        Ok(())
    }

    /// Add (or replace) the direct edge `source → target`, seeded from the source's
    /// transition defaults.
    pub fn add_direct_transition(
        &mut self,
        source: StateId,
        target: StateId,
    ) -> Result<&mut DirectTransition, IdleError> {
        self.validate_edge(source, target)?;
        let state = self.states.get_mut(source).ok_or_else(|| state_miss(source))?;
        let edge = DirectTransition::new(target, &state.defaults);
        state.transitions.retain(|t| t.target() != target);
        state.transitions.push(Transition::Direct(edge));
        state
            .transitions
            .last_mut()
            .and_then(Transition::as_direct_mut)
            .ok_or_else(|| state_miss(source))
    }

    pub fn add_indirect_transition(
        &mut self,
        source: StateId,
        target: StateId,
        probability: f32,
    ) -> Result<(), IdleError> {
        self.validate_edge(source, target)?;
        let state = self.states.get_mut(source).ok_or_else(|| state_miss(source))?;
        state.transitions.retain(|t| t.target() != target);
        state.transitions.push(Transition::Indirect(IndirectTransition {
            target,
            probability: probability.max(0.0),
        }));
        Ok(())
    }

    pub fn direct_transition(&self, source: StateId, target: StateId) -> Option<&DirectTransition> {
        self.states.get(source)?.direct(target)
    }

    pub fn direct_transition_mut(&mut self, source: StateId, target: StateId) -> Option<&mut DirectTransition> {
        self.states.get_mut(source)?.direct_mut(target)
    }

    pub fn remove_transition(&mut self, source: StateId, target: StateId) -> bool {
        let Some(state) = self.states.get_mut(source) else {
            return false;
        };
        let before = state.transitions.len();
        state.transitions.retain(|t| t.target() != target);
        before != state.transitions.len()
    }

    /// Remove a state and purge every reference to it.
    pub fn remove_state(&mut self, id: StateId) -> Option<State> {
        let state = self.states.remove(id)?;
        if let Some(layer) = self.layers.get_mut(state.layer) {
            layer.states.retain(|s| *s != id);
            if layer.root_state == Some(id) {
                layer.root_state = None;
            }
        }
        for (_, s) in self.states.iter_mut() {
            s.purge_state(id);
        }
        self.messages.retain(|m| m.target != id);
        for m in &mut self.messages {
            m.sources.retain(|s| *s != id);
        }
        for a in &mut self.avoids {
            a.states.retain(|s| *s != id);
        }
        debug!("removed state '{}'", state.name);
        Some(state)
    }

    /// Remove a layer with all its states, and drop sync targets that name it.
    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let states = self.layers.get(id)?.states.clone();
        for s in states {
            self.remove_state(s);
        }
        let layer = self.layers.remove(id)?;
        if let Some(a) = self.animations.get_mut(layer.animation) {
            a.layers.retain(|l| *l != id);
        }
        for (_, s) in self.states.iter_mut() {
            for t in &mut s.transitions {
                if let Transition::Direct(d) = t {
                    d.purge_layer(id);
                }
            }
        }
        debug!("removed layer '{}'", layer.name);
        Some(layer)
    }

    pub fn remove_animation(&mut self, id: AnimationId) -> Option<Animation> {
        let layers = self.animations.get(id)?.layers.clone();
        for l in layers {
            self.remove_layer(l);
        }
        let animation = self.animations.remove(id)?;
        debug!("removed animation '{}'", animation.name);
        Some(animation)
    }

    // ----- roles, messages, avoids -----

    /// Insert or rebind a role.
    pub fn set_role(&mut self, name: impl Into<String>, entity: Option<String>) {
        let name = name.into();
        match self.roles.iter_mut().find(|r| r.name == name) {
            Some(r) => r.entity = entity,
            None => self.roles.push(Role { name, entity }),
        }
    }

    pub fn role_entity(&self, name: &str) -> Option<&str> {
        self.roles
            .iter()
            .find(|r| r.name == name)
            .and_then(|r| r.entity.as_deref())
    }

    pub fn add_message(
        &mut self,
        text: impl Into<String>,
        sources: Vec<StateId>,
        target: StateId,
    ) -> Result<(), IdleError> {
        if !self.states.contains_key(target) {
            return Err(state_miss(target));
        }
        if let Some(missing) = sources.iter().find(|s| !self.states.contains_key(**s)) {
            return Err(state_miss(*missing));
        }
        self.messages.push(Message {
            text: text.into(),
            sources,
            target,
        });
        Ok(())
    }

    /// Insert or replace an avoid (inactive until placed).
    pub fn add_avoid(&mut self, name: impl Into<String>, states: Vec<StateId>) {
        let name = name.into();
        let states: Vec<StateId> = states.into_iter().filter(|s| self.states.contains_key(*s)).collect();
        match self.avoids.iter_mut().find(|a| a.name == name) {
            Some(a) => a.states = states,
            None => self.avoids.push(Avoid {
                name,
                states,
                active: false,
            }),
        }
    }

    /// Returns false when no avoid has that name.
    pub fn set_avoid_active(&mut self, name: &str, active: bool) -> bool {
        match self.avoids.iter_mut().find(|a| a.name == name) {
            Some(a) => {
                a.active = active;
                true
            }
            None => false,
        }
    }

    /// States excluded by the currently active avoids.
    pub fn avoided_states(&self) -> HashSet<StateId> {
        self.avoids
            .iter()
            .filter(|a| a.active)
            .flat_map(|a| a.states.iter().copied())
            .collect()
    }

    // ----- root state and capture -----

    pub fn set_root_state(&mut self, layer: LayerId, state: StateId) -> Result<(), IdleError> {
        let owner = self.states.get(state).ok_or_else(|| state_miss(state))?.layer;
        if owner != layer {
            return Err(IdleError::InvalidTransition {
                reason: format!("state {state:?} is not in layer {layer:?}"),
            });
        }
        let l = self.layers.get_mut(layer).ok_or_else(|| layer_miss(layer))?;
        l.root_state = Some(state);
        Ok(())
    }

    fn root_of(&self, layer: LayerId) -> Result<(StateId, Vec<StateId>), IdleError> {
        let l = self.layers.get(layer).ok_or_else(|| layer_miss(layer))?;
        let root = l
            .root_state
            .ok_or_else(|| IdleError::lookup("root state", l.name.clone()))?;
        Ok((root, l.states.clone()))
    }

    /// Rewrite a root control offset and carry the edit over to every sibling that has
    /// the channel. Returns how many siblings changed.
    pub fn edit_root_control(
        &mut self,
        layer: LayerId,
        channel: &str,
        offset: Transform,
    ) -> Result<usize, IdleError> {
        let (root, siblings) = self.root_of(layer)?;
        let root_state = self.states.get_mut(root).ok_or_else(|| state_miss(root))?;
        let old = match root_state.controls.get_mut(channel) {
            Some(entry) => std::mem::replace(&mut entry.transform, offset),
            None => {
                root_state
                    .controls
                    .insert(channel.to_string(), ControlEntryAnchored::world(offset));
                return Ok(0);
            }
        };
        let old_inv = old.inverse();
        let mut changed = 0;
        for s in siblings.into_iter().filter(|s| *s != root) {
            if let Some(entry) = self.states.get_mut(s).and_then(|st| st.controls.get_mut(channel)) {
                let relative = old_inv.compose(&entry.transform);
                entry.transform = offset.compose(&relative);
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Scalar counterpart of [`edit_root_control`](Self::edit_root_control): siblings
    /// move by the same delta.
    pub fn edit_root_morph(&mut self, layer: LayerId, channel: &str, value: f32) -> Result<usize, IdleError> {
        let (root, siblings) = self.root_of(layer)?;
        let root_state = self.states.get_mut(root).ok_or_else(|| state_miss(root))?;
        let old = root_state.morphs.insert(channel.to_string(), value);
        let Some(old) = old else {
            return Ok(0);
        };
        let delta = value - old;
        let mut changed = 0;
        for s in siblings.into_iter().filter(|s| *s != root) {
            if let Some(v) = self.states.get_mut(s).and_then(|st| st.morphs.get_mut(channel)) {
                *v += delta;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Re-capture every channel of the state's layer from the host, keeping each entry's
    /// anchor. Returns the number of channels read.
    pub fn capture_state(&mut self, state: StateId, scene: &dyn Scene) -> Result<usize, IdleError> {
        let layer = self.states.get(state).ok_or_else(|| state_miss(state))?.layer;
        let l = self.layers.get(layer).ok_or_else(|| layer_miss(layer))?;
        let (controls, morphs) = (l.controls.clone(), l.morphs.clone());
        let ctx = AnchorContext::new(scene.anchors(), &self.roles);
        let st = self.states.get_mut(state).ok_or_else(|| state_miss(state))?;
        let mut read = 0;
        for ch in &controls {
            let Some(world) = scene.pose().read_control(ch) else {
                warn!("capture '{}': control '{}' unreadable", st.name, ch);
                continue;
            };
            match st.controls.get_mut(ch) {
                Some(entry) => entry.capture(&world, &ctx),
                None => {
                    st.controls.insert(ch.clone(), ControlEntryAnchored::world(world));
                }
            }
            read += 1;
        }
        for ch in &morphs {
            let Some(value) = scene.pose().read_morph(ch) else {
                warn!("capture '{}': morph '{}' unreadable", st.name, ch);
                continue;
            };
            st.morphs.insert(ch.clone(), value);
            read += 1;
        }
        Ok(read)
    }

    // ----- splitting -----

    /// Insert an intermediate state at parametric point `v` of the direct edge
    /// `source → target`. The edge becomes `source → new → target`; durations split as
    /// `d·v` and `d·(1−v)`, ease-in stays on the first half and ease-out on the second.
    pub fn split_transition(
        &mut self,
        source: StateId,
        target: StateId,
        v: f32,
        name: impl Into<String>,
    ) -> Result<StateId, IdleError> {
        if !(v > 0.0 && v < 1.0) {
            return Err(IdleError::InvalidSplit { at: v });
        }
        let src = self.states.get(source).ok_or_else(|| state_miss(source))?;
        let dst = self.states.get(target).ok_or_else(|| state_miss(target))?;
        let edge = src.direct(target).ok_or_else(|| IdleError::InvalidTransition {
            reason: format!("no direct transition '{}' -> '{}'", src.name, dst.name),
        })?;
        if src.layer != dst.layer {
            return Err(IdleError::InvalidTransition {
                reason: "only transitions inside one layer can be split".into(),
            });
        }
        let layer = self.layers.get(src.layer).ok_or_else(|| layer_miss(src.layer))?;

        let mut mid = State::new(name, src.layer);
        mid.kind = StateKind::Intermediate;
        mid.timing = StateTiming::fixed(0.0);
        mid.defaults = src.defaults.clone();

        let mut first = edge.clone();
        first.control_timelines.clear();
        first.morph_timelines.clear();
        first.duration = edge.duration * v;
        first.duration_noise = edge.duration_noise * v;
        first.ease_out = 0.0;

        let mut second = DirectTransition::new(target, &src.defaults);
        second.probability = 1.0;
        second.duration = edge.duration * (1.0 - v);
        second.duration_noise = edge.duration_noise * (1.0 - v);
        second.ease_in = 0.0;
        second.ease_out = edge.ease_out;

        for ch in &layer.controls {
            let (Some(a), Some(b)) = (src.controls.get(ch), dst.controls.get(ch)) else {
                continue;
            };
            let mut tl = edge
                .control_timelines
                .get(ch)
                .cloned()
                .unwrap_or_else(|| TransformTimeline::between(a, b));
            tl.set_endpoints(a, b);
            let (left, right) = tl.split(v).ok_or(IdleError::InvalidSplit { at: v })?;
            let anchor = split_anchor(&a.anchor, &b.anchor, v);
            mid.controls
                .insert(ch.clone(), ControlEntryAnchored::anchored(tl.offset_at(v), anchor));
            if left.curve.len() > 2 {
                first.control_timelines.insert(ch.clone(), left);
            }
            if right.curve.len() > 2 {
                second.control_timelines.insert(ch.clone(), right);
            }
        }
        for ch in &layer.morphs {
            let (Some(a), Some(b)) = (src.morphs.get(ch), dst.morphs.get(ch)) else {
                continue;
            };
            let mut tl = edge
                .morph_timelines
                .get(ch)
                .cloned()
                .unwrap_or_else(|| ScalarTimeline::new(*a, *b));
            tl.set_first(*a);
            tl.set_last(*b);
            let (left, right) = tl.split(v).ok_or(IdleError::InvalidSplit { at: v })?;
            mid.morphs.insert(ch.clone(), tl.evaluate(v));
            if left.len() > 2 {
                first.morph_timelines.insert(ch.clone(), left);
            }
            if right.len() > 2 {
                second.morph_timelines.insert(ch.clone(), right);
            }
        }
        mid.transitions.push(Transition::Direct(second));

        let layer_id = mid.layer;
        let mid_id = self.states.insert(mid);
        if let Some(l) = self.layers.get_mut(layer_id) {
            l.states.push(mid_id);
        }
        first.target = mid_id;
        let src = self.states.get_mut(source).ok_or_else(|| state_miss(source))?;
        if let Some(slot) = src.transitions.iter_mut().find(|t| t.target() == target) {
            *slot = Transition::Direct(first);
        }
        debug!("split {:?} -> {:?} at {} into {:?}", source, target, v, mid_id);
        Ok(mid_id)
    }
}

/// Anchor for a state inserted at `v` of a blend between anchors `a` and `b`.
/// Equal modes and single/single pairs reproduce the virtual anchor exactly; anything
/// else snaps to the nearer endpoint's anchor.
fn split_anchor(a: &AnchorSpec, b: &AnchorSpec, v: f32) -> AnchorSpec {
    if a.mode == b.mode {
        return b.clone();
    }
    match (&a.mode, &b.mode) {
        (AnchorMode::Single(ra), AnchorMode::Single(rb)) => {
            AnchorSpec::blend(ra.clone(), rb.clone(), v).with_damping(b.damping_time)
        }
        _ => {
            warn!("split at {v}: anchors {:?} / {:?} approximated by the nearer endpoint", a.mode, b.mode);
            if v < 0.5 {
                a.clone()
            } else {
                b.clone()
            }
        }
    }
}
