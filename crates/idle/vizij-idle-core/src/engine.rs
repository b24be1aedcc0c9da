//! Per-character runtime.
//!
//! The engine owns the graph plus one runtime per layer of the active animation. Each
//! `update(dt, inputs, scene)`:
//! 1. applies input commands,
//! 2. advances every layer of the active animation in layer order (idle wait, chain
//!    building, chain playback, arrival),
//! 3. writes one change per channel per layer into `Outputs`, plus events.
//!
//! Nothing on this path returns an error: lookups that miss are logged and reported as
//! `CoreEvent::LookupMiss`, and a layer with nowhere to go stays where it is.

use hashbrown::{HashMap, HashSet};
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::anchor::{AnchorContext, AnchorFilter};
use crate::binding::{BindingTable, ChannelKey, PoseSource, Scene, TargetResolver};
use crate::blend::{build_hop_channels, ChainPlan, PlannedHop};
use crate::config::Config;
use crate::error::IdleError;
use crate::graph::{DirectTransition, Graph, Role, Selection, SyncTarget};
use crate::ids::{AnimationId, LayerId, StateId};
use crate::inputs::{Command, Inputs};
use crate::outputs::{Change, ChannelValue, CoreEvent, Outputs};
use crate::transform::Transform;

/// Coarse view of what a layer is doing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayerPhase {
    /// Sitting on its current state, waiting for the wait timer (or forever).
    Idle,
    /// Parked on a wait-for-sync state.
    AwaitingSync,
    /// Playing a chain of hops.
    Blending,
}

#[derive(Debug)]
enum Phase {
    Idle { remaining: Option<f32> },
    AwaitingSync,
    Blending(ChainPlan),
}

#[derive(Debug)]
struct LayerRuntime {
    /// Last committed state.
    current: Option<StateId>,
    phase: Phase,
    /// Path requested by `go_to`, started at the next hop boundary.
    pending: Option<Vec<StateId>>,
    /// Anchor smoothing per control channel; survives phase changes.
    filters: HashMap<String, AnchorFilter>,
    advanced_at: u64,
}

/// Live pose: what the engine wrote last, falling back to the host.
struct LivePose<'a> {
    last: &'a HashMap<ChannelKey, ChannelValue>,
    host: &'a dyn PoseSource,
}

impl PoseSource for LivePose<'_> {
    fn read_control(&self, name: &str) -> Option<Transform> {
        self.last
            .get(&ChannelKey::control(name))
            .and_then(ChannelValue::transform)
            .or_else(|| self.host.read_control(name))
    }

    fn read_morph(&self, name: &str) -> Option<f32> {
        self.last
            .get(&ChannelKey::morph(name))
            .and_then(ChannelValue::morph)
            .or_else(|| self.host.read_morph(name))
    }
}

enum Step {
    Nothing,
    Start(Vec<StateId>),
    Roll(f32),
    Blend,
}

/// Duration and ramps for a blend started outside the graph's edges.
type BlendTiming = (f32, f32, f32);

pub struct Engine {
    cfg: Config,
    graph: Graph,
    rng: StdRng,
    runtimes: HashMap<LayerId, LayerRuntime>,
    active: Option<AnimationId>,
    paused: bool,
    tick: u64,
    bindings: BindingTable,
    last_values: HashMap<ChannelKey, ChannelValue>,
    outputs: Outputs,
}

impl Engine {
    pub fn new(cfg: Config) -> Self {
        Self::with_graph(cfg, Graph::new())
    }

    pub fn with_graph(cfg: Config, graph: Graph) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let outputs = Outputs::with_event_cap(cfg.max_events_per_tick);
        Self {
            cfg,
            graph,
            rng,
            runtimes: HashMap::new(),
            active: None,
            paused: false,
            tick: 0,
            bindings: BindingTable::new(),
            last_values: HashMap::new(),
            outputs,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable graph access for authoring. Layers whose runtime refers to a removed
    /// state restart from their entry state on the next tick.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn active_animation(&self) -> Option<AnimationId> {
        self.active
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Last committed state of a layer.
    pub fn current_state(&self, layer: LayerId) -> Option<StateId> {
        self.runtimes.get(&layer).and_then(|rt| rt.current)
    }

    pub fn layer_phase(&self, layer: LayerId) -> Option<LayerPhase> {
        self.runtimes.get(&layer).map(|rt| match rt.phase {
            Phase::Idle { .. } => LayerPhase::Idle,
            Phase::AwaitingSync => LayerPhase::AwaitingSync,
            Phase::Blending(_) => LayerPhase::Blending,
        })
    }

    /// Chain currently playing on a layer.
    pub fn chain(&self, layer: LayerId) -> Option<&ChainPlan> {
        match &self.runtimes.get(&layer)?.phase {
            Phase::Blending(plan) => Some(plan),
            _ => None,
        }
    }

    /// Resolve every channel of every layer to a host handle once.
    pub fn prebind(&mut self, resolver: &mut dyn TargetResolver) {
        for (_, layer) in self.graph.layers() {
            let keys = layer
                .controls
                .iter()
                .map(ChannelKey::control)
                .chain(layer.morphs.iter().map(ChannelKey::morph));
            for key in keys {
                match resolver.resolve(&key) {
                    Some(handle) => self.bindings.upsert(key, handle),
                    None => debug!("prebind: '{}' unresolved; keyed by name", key.name),
                }
            }
        }
    }

    /// Step the engine by `dt` seconds.
    pub fn update(&mut self, dt: f32, inputs: Inputs, scene: &dyn Scene) -> &Outputs {
        self.outputs.clear();
        self.tick = self.tick.wrapping_add(1);
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        if self.active.map_or(true, |a| self.graph.animation(a).is_none()) {
            self.active = self.graph.animations().next().map(|(id, _)| id);
        }
        for cmd in inputs.commands {
            self.apply_command(cmd, scene);
        }

        let roles = self.graph.roles.clone();
        let mut visited: HashSet<LayerId> = HashSet::new();
        loop {
            let Some(anim) = self.active else {
                break;
            };
            let Some(animation) = self.graph.animation(anim) else {
                self.active = None;
                break;
            };
            let layers = animation.layers.clone();
            let step = if self.paused {
                0.0
            } else {
                dt * animation.speed.max(0.0)
            };
            for layer in layers {
                if self.active != Some(anim) {
                    break;
                }
                if !visited.insert(layer) {
                    continue;
                }
                self.tick_layer(layer, step, dt, scene, &roles);
            }
            if self.active == Some(anim) {
                break;
            }
        }
        &self.outputs
    }

    // ----- commands -----

    fn apply_command(&mut self, cmd: Command, scene: &dyn Scene) {
        match cmd {
            Command::GoToState {
                animation,
                layer,
                state,
            } => match self.graph.resolve_state(&animation, &layer, &state) {
                Ok(s) => {
                    self.go_to_state(s);
                }
                Err(e) => self.report(e),
            },
            Command::GoToAnimation { animation } => match self.graph.resolve_animation(&animation) {
                Ok(a) => {
                    self.go_to_animation(a);
                }
                Err(e) => self.report(e),
            },
            Command::SetActiveAnimation { animation } => match self.graph.resolve_animation(&animation) {
                Ok(a) => self.set_active_animation(a, scene),
                Err(e) => self.report(e),
            },
            Command::ReceiveMessage { text } => {
                self.receive_message(&text, scene);
            }
            Command::PlaceAvoid { avoid } => {
                if !self.graph.set_avoid_active(&avoid, true) {
                    self.report(IdleError::lookup("avoid", avoid));
                }
            }
            Command::LiftAvoid { avoid } => {
                if !self.graph.set_avoid_active(&avoid, false) {
                    self.report(IdleError::lookup("avoid", avoid));
                }
            }
            Command::Proceed { animation, layer } => match self.graph.resolve_layer(&animation, &layer) {
                Ok(l) => {
                    self.proceed(l);
                }
                Err(e) => self.report(e),
            },
            Command::SetPaused { paused } => self.paused = paused,
            Command::SetSpeed { animation, speed } => match self.graph.resolve_animation(&animation) {
                Ok(a) => {
                    if let Some(anim) = self.graph.animation_mut(a) {
                        anim.speed = speed.max(0.0);
                    }
                }
                Err(e) => self.report(e),
            },
        }
    }

    fn report(&mut self, err: IdleError) {
        warn!("{} ({})", err, err.category());
        if let IdleError::LookupMiss { kind, name } = err {
            self.outputs.push_event(CoreEvent::LookupMiss {
                kind: kind.to_string(),
                name,
            });
        }
    }

    /// State a new path should start from: the target of the hop in flight, else the
    /// committed state.
    fn effective_state(&self, layer: LayerId) -> Option<StateId> {
        let rt = self.runtimes.get(&layer)?;
        match &rt.phase {
            Phase::Blending(plan) => Some(plan.current().to),
            _ => rt.current,
        }
    }

    fn active_layers(&self) -> Vec<LayerId> {
        self.active
            .and_then(|a| self.graph.animation(a))
            .map(|a| a.layers.clone())
            .unwrap_or_default()
    }

    /// Queue the shortest path to `target` on the layer that can reach it. Returns false
    /// (and changes nothing) when no layer of the active animation has a path.
    pub fn go_to_state(&mut self, target: StateId) -> bool {
        let Some(target_layer) = self.graph.state(target).map(|s| s.layer) else {
            return false;
        };
        if self.active.is_none() {
            self.active = self.graph.state_animation(target);
        }
        let candidates = if self.graph.state_animation(target) == self.active {
            vec![target_layer]
        } else {
            self.active_layers()
        };
        let mut best: Option<(LayerId, Vec<StateId>)> = None;
        for layer in candidates {
            self.ensure_runtime(layer);
            let Some(from) = self.effective_state(layer) else {
                continue;
            };
            if let Some(path) = self.graph.find_path(from, target) {
                if best.as_ref().map_or(true, |(_, p)| path.len() < p.len()) {
                    best = Some((layer, path));
                }
            }
        }
        self.queue(best, || format!("state {target:?}"))
    }

    /// Queue the shortest path into any state of `animation`.
    pub fn go_to_animation(&mut self, animation: AnimationId) -> bool {
        if self.graph.animation(animation).is_none() {
            return false;
        }
        if self.active == Some(animation) {
            return true;
        }
        let mut best: Option<(LayerId, Vec<StateId>)> = None;
        for layer in self.active_layers() {
            self.ensure_runtime(layer);
            let Some(from) = self.effective_state(layer) else {
                continue;
            };
            if let Some(path) = self.graph.find_path_to_animation(from, animation) {
                if best.as_ref().map_or(true, |(_, p)| path.len() < p.len()) {
                    best = Some((layer, path));
                }
            }
        }
        self.queue(best, || format!("animation {animation:?}"))
    }

    fn queue(&mut self, best: Option<(LayerId, Vec<StateId>)>, what: impl FnOnce() -> String) -> bool {
        match best {
            Some((layer, path)) => {
                debug!("go_to {}: {} hop(s) queued on '{}'", what(), path.len(), self.graph.layer_name(layer));
                if let Some(rt) = self.runtimes.get_mut(&layer) {
                    rt.pending = Some(path);
                }
                true
            }
            None => {
                debug!("go_to {} rejected: no path", what());
                false
            }
        }
    }

    /// Switch animations right away; every layer of the new animation blends from the
    /// live pose to its root (or current) state.
    pub fn set_active_animation(&mut self, animation: AnimationId, scene: &dyn Scene) {
        if self.active == Some(animation) || self.graph.animation(animation).is_none() {
            return;
        }
        self.switch_animation(animation, None, None, &[], scene);
    }

    /// Move every layer sitting on a source state of a message with this text to the
    /// message's target. Returns how many layers moved.
    pub fn receive_message(&mut self, text: &str, scene: &dyn Scene) -> usize {
        let messages: Vec<_> = self
            .graph
            .messages
            .iter()
            .filter(|m| m.text == text)
            .cloned()
            .collect();
        if messages.is_empty() {
            debug!("message '{text}' matches nothing");
            return 0;
        }
        let mut moved = 0;
        for layer in self.active_layers() {
            self.ensure_runtime(layer);
            let Some(current) = self.current_state(layer) else {
                continue;
            };
            let Some(msg) = messages.iter().find(|m| m.sources.contains(&current)) else {
                continue;
            };
            let target_layer = self.graph.state(msg.target).map(|s| s.layer);
            if target_layer == Some(layer) {
                self.force_blend(layer, msg.target, None, false, scene);
                moved += 1;
            } else if self.go_to_state(msg.target) {
                moved += 1;
            }
        }
        moved
    }

    /// Release a layer parked on a wait-for-sync state.
    pub fn proceed(&mut self, layer: LayerId) -> bool {
        match self.runtimes.get_mut(&layer) {
            Some(rt) if matches!(rt.phase, Phase::AwaitingSync) => {
                rt.phase = Phase::Idle { remaining: Some(0.0) };
                true
            }
            _ => false,
        }
    }

    // ----- layer runtime -----

    fn idle_phase(&mut self, state: Option<StateId>) -> Phase {
        let Some(timing) = state.and_then(|s| self.graph.state(s)).map(|s| &s.timing) else {
            return Phase::Idle { remaining: None };
        };
        if timing.wait_for_sync {
            return Phase::AwaitingSync;
        }
        if timing.wait_infinite {
            return Phase::Idle { remaining: None };
        }
        let lo = timing.wait_min.min(timing.wait_max).max(0.0);
        let hi = timing.wait_min.max(timing.wait_max).max(0.0);
        let wait = if hi > lo && hi.is_finite() { self.rng.random_range(lo..=hi) } else { lo };
        Phase::Idle { remaining: Some(wait) }
    }

    fn is_stale(&self, rt: &LayerRuntime) -> bool {
        let dead = |s: StateId| self.graph.state(s).is_none();
        rt.current.is_some_and(|s| dead(s))
            || rt.pending.as_ref().is_some_and(|p| p.iter().any(|s| dead(*s)))
            || matches!(&rt.phase, Phase::Blending(plan) if plan.hops().iter().any(|h| dead(h.to)))
    }

    fn ensure_runtime(&mut self, layer: LayerId) {
        let stale = self.runtimes.get(&layer).map(|rt| self.is_stale(rt));
        match stale {
            Some(false) => return,
            Some(true) => {
                debug!("layer '{}': runtime refers to removed states; restarting", self.graph.layer_name(layer));
                self.runtimes.remove(&layer);
            }
            None => {}
        }
        let current = self.graph.entry_state(layer);
        let phase = self.idle_phase(current);
        self.runtimes.insert(
            layer,
            LayerRuntime {
                current,
                phase,
                pending: None,
                filters: HashMap::new(),
                advanced_at: 0,
            },
        );
    }

    fn tick_layer(&mut self, layer: LayerId, step: f32, dt: f32, scene: &dyn Scene, roles: &[Role]) {
        self.ensure_runtime(layer);
        self.advance_layer(layer, step, scene);
        self.emit_layer(layer, dt, scene, roles);
    }

    fn advance_layer(&mut self, layer: LayerId, step: f32, scene: &dyn Scene) {
        let tick = self.tick;
        let paused = self.paused;
        let Some(rt) = self.runtimes.get_mut(&layer) else {
            return;
        };
        let step = if rt.advanced_at == tick { 0.0 } else { step };
        rt.advanced_at = tick;
        let next = match &mut rt.phase {
            // Frozen: queued paths and expired waits hold until unpaused.
            _ if paused => Step::Nothing,
            Phase::Idle { remaining } => match rt.pending.take() {
                Some(path) => Step::Start(path),
                None => match remaining {
                    Some(r) => {
                        *r -= step;
                        trace!("layer {:?}: wait {:.3}s left", layer, *r);
                        if *r <= 0.0 {
                            Step::Roll(-*r)
                        } else {
                            Step::Nothing
                        }
                    }
                    None => Step::Nothing,
                },
            },
            Phase::AwaitingSync => match rt.pending.take() {
                Some(path) => Step::Start(path),
                None => Step::Nothing,
            },
            Phase::Blending(plan) => {
                plan.advance(step);
                trace!("layer {:?}: chain clock {:.3}/{:.3}", layer, plan.elapsed(), plan.total());
                Step::Blend
            }
        };
        match next {
            Step::Nothing => {}
            Step::Start(path) => self.start_chain(layer, path, 0.0, scene),
            Step::Roll(overshoot) => self.roll_next(layer, overshoot, scene),
            Step::Blend => self.settle_hops(layer, scene),
        }
    }

    /// Wait expired: pick the next chain by weighted selection.
    fn roll_next(&mut self, layer: LayerId, overshoot: f32, scene: &dyn Scene) {
        let Some(from) = self.current_state(layer) else {
            return;
        };
        let path = self.build_chain(from);
        if path.is_empty() {
            debug!(
                "layer '{}': no valid transition out of '{}'; re-rolling next tick",
                self.graph.layer_name(layer),
                self.graph.state_name(from)
            );
            self.outputs.push_event(CoreEvent::NoValidTransition {
                layer: self.graph.layer_name(layer),
                state: self.graph.state_name(from),
            });
            // Stay put and roll again next tick.
            if let Some(rt) = self.runtimes.get_mut(&layer) {
                rt.phase = Phase::Idle { remaining: Some(0.0) };
            }
            return;
        }
        self.start_chain(layer, path, overshoot, scene);
    }

    /// Collect hops by repeated selection until the chain ends on a regular state, runs
    /// dry, or reaches the configured length. Indirect picks expand to their path.
    fn build_chain(&mut self, from: StateId) -> Vec<StateId> {
        let max = self.cfg.max_chain_length.max(1);
        let mut path: Vec<StateId> = Vec::new();
        let mut cur = from;
        while path.len() < max {
            match self.graph.sort_next_state(cur, &mut self.rng) {
                Selection::NoValidTransition => break,
                Selection::Next { target, direct: true } => path.push(target),
                Selection::Next { target, direct: false } => match self.graph.find_path(cur, target) {
                    Some(hops) if !hops.is_empty() => path.extend(hops),
                    _ => {
                        debug!("indirect target '{}' unreachable", self.graph.state_name(target));
                        break;
                    }
                },
            }
            let Some(last) = path.last().copied() else {
                break;
            };
            cur = last;
            if !self.graph.state(cur).is_some_and(|s| s.is_intermediate()) {
                break;
            }
        }
        path
    }

    fn plan_hop(&mut self, from: Option<StateId>, to: StateId) -> PlannedHop {
        let timing = match from.and_then(|f| self.graph.direct_transition(f, to)) {
            Some(e) => (e.duration, e.duration_noise, e.ease_in, e.ease_out),
            None => {
                let d = self.graph.state(to).map(|s| s.defaults.clone()).unwrap_or_default();
                (d.duration, d.duration_noise, d.ease_in, d.ease_out)
            }
        };
        let (duration, noise, ease_in, ease_out) = timing;
        let jitter = if noise > 0.0 && noise.is_finite() {
            self.rng.random_range(-noise..=noise)
        } else {
            0.0
        };
        PlannedHop {
            from,
            to,
            duration: (duration + jitter).max(self.cfg.min_transition_duration),
            ease_in,
            ease_out,
        }
    }

    fn start_chain(&mut self, layer: LayerId, path: Vec<StateId>, overshoot: f32, scene: &dyn Scene) {
        let current = self.current_state(layer);
        let mut planned = Vec::with_capacity(path.len());
        let mut prev = current;
        for to in path {
            planned.push(self.plan_hop(prev, to));
            prev = Some(to);
        }
        let Some(plan) = ChainPlan::new(&planned) else {
            let phase = self.idle_phase(current);
            if let Some(rt) = self.runtimes.get_mut(&layer) {
                rt.phase = phase;
                rt.pending = None;
            }
            return;
        };
        debug!(
            "layer '{}': chain of {} hop(s) over {:.3}s",
            self.graph.layer_name(layer),
            plan.hops().len(),
            plan.total()
        );
        if let Some(rt) = self.runtimes.get_mut(&layer) {
            rt.phase = Phase::Blending(plan.with_elapsed(overshoot));
            rt.pending = None;
        }
        if let Some(layer) = self.begin_hop(layer, scene) {
            self.settle_hops(layer, scene);
        }
    }

    /// Blend one layer straight to `target`, outside the graph's edges. `from_pose`
    /// (or a blend already in flight) starts from the live pose.
    fn force_blend(
        &mut self,
        layer: LayerId,
        target: StateId,
        timing: Option<BlendTiming>,
        from_pose: bool,
        scene: &dyn Scene,
    ) {
        self.ensure_runtime(layer);
        let from = match self.runtimes.get(&layer) {
            Some(rt) if !from_pose && !matches!(rt.phase, Phase::Blending(_)) => rt.current,
            _ => None,
        };
        let hop = match timing {
            Some((duration, ease_in, ease_out)) => PlannedHop {
                from,
                to: target,
                duration: duration.max(self.cfg.min_transition_duration),
                ease_in,
                ease_out,
            },
            None => self.plan_hop(from, target),
        };
        let Some(plan) = ChainPlan::new(&[hop]) else {
            return;
        };
        let tick = self.tick;
        if let Some(rt) = self.runtimes.get_mut(&layer) {
            rt.phase = Phase::Blending(plan);
            rt.pending = None;
            // Starts advancing on the next tick, like a chain started from a wait.
            rt.advanced_at = tick;
        }
        self.begin_hop(layer, scene);
    }

    /// Start the hop at the chain's cursor. Returns the layer now carrying the chain
    /// (a hop into another animation moves the chain to the target's layer).
    fn begin_hop(&mut self, layer: LayerId, scene: &dyn Scene) -> Option<LayerId> {
        let (edge_from, to) = match &self.runtimes.get(&layer)?.phase {
            Phase::Blending(plan) => (plan.current().from, plan.current().to),
            _ => return None,
        };
        let Some(to_layer) = self.graph.state(to).map(|s| s.layer) else {
            warn!("hop target {to:?} no longer exists; abandoning chain");
            let current = self.current_state(layer);
            let phase = self.idle_phase(current);
            if let Some(rt) = self.runtimes.get_mut(&layer) {
                rt.phase = phase;
            }
            return None;
        };
        let mut from = edge_from;
        let layer = if to_layer != layer {
            self.transfer_chain(layer, to_layer);
            from = None;
            to_layer
        } else {
            layer
        };

        self.outputs.push_event(CoreEvent::TransitionBegan {
            layer: self.graph.layer_name(layer),
            from: edge_from.map(|s| self.graph.state_name(s)),
            to: self.graph.state_name(to),
        });
        debug!(
            "layer '{}': begin {} -> {}",
            self.graph.layer_name(layer),
            edge_from.map(|s| self.graph.state_name(s)).unwrap_or_else(|| "<pose>".into()),
            self.graph.state_name(to)
        );

        let pose = LivePose {
            last: &self.last_values,
            host: scene.pose(),
        };
        let channels = build_hop_channels(&mut self.graph, from, to, &pose);
        let timing = match self.runtimes.get_mut(&layer).map(|rt| &mut rt.phase) {
            Some(Phase::Blending(plan)) => {
                plan.current_mut().channels = Some(channels);
                let (ramp_in, ramp_out) = plan.ramps();
                let ease_in = if plan.index() == 0 { ramp_in } else { 0.0 };
                let ease_out = if plan.is_last_hop() { ramp_out } else { 0.0 };
                (plan.hop_remaining(), ease_in, ease_out)
            }
            _ => return Some(layer),
        };

        let edge: Option<DirectTransition> = edge_from
            .and_then(|f| self.graph.direct_transition(f, to))
            .cloned();
        let sync: &[SyncTarget] = edge
            .as_ref()
            .map(|e| e.sync_targets.as_slice())
            .unwrap_or(&[]);
        let target_anim = self.graph.state_animation(to);
        match target_anim {
            Some(anim) if Some(anim) != self.active => {
                self.switch_animation(anim, Some(layer), Some(timing), sync, scene);
            }
            _ => {
                for st in sync {
                    self.apply_sync_target(layer, st, timing, scene);
                }
            }
        }
        if let Some(edge) = &edge {
            self.fire_signals(edge);
        }
        Some(layer)
    }

    fn apply_sync_target(&mut self, layer: LayerId, st: &SyncTarget, timing: BlendTiming, scene: &dyn Scene) {
        if st.layer == layer {
            return;
        }
        let valid = self.graph.state(st.state).map(|s| s.layer) == Some(st.layer)
            && self.graph.state_animation(st.state) == self.active;
        if !valid {
            warn!("sync target {:?} is not a state of an active layer; skipped", st.state);
            return;
        }
        debug!(
            "sync: '{}' jumps to '{}'",
            self.graph.layer_name(st.layer),
            self.graph.state_name(st.state)
        );
        self.force_blend(st.layer, st.state, Some(timing), true, scene);
    }

    /// Hand the chain in flight on `from` over to `to` (a layer of another animation).
    fn transfer_chain(&mut self, from: LayerId, to: LayerId) {
        let Some(rt) = self.runtimes.get_mut(&from) else {
            return;
        };
        let phase = std::mem::replace(&mut rt.phase, Phase::Idle { remaining: None });
        let pending = rt.pending.take();
        let advanced_at = rt.advanced_at;
        self.ensure_runtime(to);
        if let Some(rt) = self.runtimes.get_mut(&to) {
            rt.current = None;
            rt.phase = phase;
            rt.pending = pending;
            rt.advanced_at = advanced_at;
            if let Phase::Blending(plan) = &mut rt.phase {
                plan.current_mut().from = None;
            }
        }
    }

    /// Make `animation` active. Every layer except `driving` blends from the live pose
    /// to its sync target, else its root state, else where it last was.
    fn switch_animation(
        &mut self,
        animation: AnimationId,
        driving: Option<LayerId>,
        timing: Option<BlendTiming>,
        sync: &[SyncTarget],
        scene: &dyn Scene,
    ) {
        let previous = self.active.replace(animation);
        self.outputs.push_event(CoreEvent::AnimationSwitched {
            from: previous.map(|a| self.graph.animation_name(a)),
            to: self.graph.animation_name(animation),
        });
        debug!("animation switched to '{}'", self.graph.animation_name(animation));
        let layers = self
            .graph
            .animation(animation)
            .map(|a| a.layers.clone())
            .unwrap_or_default();
        for layer in layers {
            if Some(layer) == driving {
                continue;
            }
            let dest = sync
                .iter()
                .find(|s| s.layer == layer)
                .map(|s| s.state)
                .filter(|s| self.graph.state(*s).map(|st| st.layer) == Some(layer))
                .or_else(|| self.graph.layer(layer).and_then(|l| l.root_state))
                .or_else(|| self.current_state(layer))
                .or_else(|| self.graph.entry_state(layer));
            if let Some(dest) = dest {
                self.force_blend(layer, dest, timing, true, scene);
            }
        }
    }

    fn fire_signals(&mut self, edge: &DirectTransition) {
        for m in &edge.messages {
            match self.graph.role_entity(&m.role) {
                Some(entity) => self.outputs.push_event(CoreEvent::SendMessage {
                    entity: entity.to_string(),
                    text: m.text.clone(),
                }),
                None => {
                    warn!("role '{}' unassigned; message '{}' not sent", m.role, m.text);
                    self.outputs.push_event(CoreEvent::LookupMiss {
                        kind: "role".into(),
                        name: m.role.clone(),
                    });
                }
            }
        }
        for toggle in &edge.avoids {
            let Some(role) = &toggle.role else {
                if !self.graph.set_avoid_active(&toggle.avoid, toggle.place) {
                    self.report(IdleError::lookup("avoid", toggle.avoid.clone()));
                }
                continue;
            };
            let Some(entity) = self.graph.role_entity(role).map(str::to_string) else {
                warn!("role '{}' unassigned; avoid '{}' not toggled", role, toggle.avoid);
                self.outputs.push_event(CoreEvent::LookupMiss {
                    kind: "role".into(),
                    name: role.clone(),
                });
                continue;
            };
            let avoid = toggle.avoid.clone();
            self.outputs.push_event(if toggle.place {
                CoreEvent::PlaceAvoid { entity, avoid }
            } else {
                CoreEvent::LiftAvoid { entity, avoid }
            });
        }
    }

    /// Commit every finished hop, then start the next hop, a pending request, or idle.
    fn settle_hops(&mut self, layer: LayerId, scene: &dyn Scene) {
        loop {
            let (arrived, overshoot) = match self.runtimes.get(&layer).map(|rt| &rt.phase) {
                Some(Phase::Blending(plan)) if plan.hop_finished() => (plan.current().to, plan.overshoot()),
                _ => return,
            };
            self.arrive(layer, arrived);

            let pending = self.runtimes.get_mut(&layer).and_then(|rt| rt.pending.take());
            if let Some(path) = pending {
                self.start_chain(layer, path, overshoot, scene);
                return;
            }
            let advanced = match self.runtimes.get_mut(&layer).map(|rt| &mut rt.phase) {
                Some(Phase::Blending(plan)) => plan.next_hop(),
                _ => false,
            };
            if advanced {
                match self.begin_hop(layer, scene) {
                    Some(l) if l == layer => continue,
                    _ => return,
                }
            }
            let phase = self.idle_phase(Some(arrived));
            if let Some(rt) = self.runtimes.get_mut(&layer) {
                rt.phase = phase;
            }
            return;
        }
    }

    fn arrive(&mut self, layer: LayerId, state: StateId) {
        if let Some(rt) = self.runtimes.get_mut(&layer) {
            rt.current = Some(state);
        }
        debug!(
            "layer '{}': arrived at '{}'",
            self.graph.layer_name(layer),
            self.graph.state_name(state)
        );
        self.outputs.push_event(CoreEvent::TransitionEnded {
            layer: self.graph.layer_name(layer),
            state: self.graph.state_name(state),
        });
        let siblings = self
            .graph
            .layer(layer)
            .and_then(|l| self.graph.animation(l.animation))
            .map(|a| a.layers.clone())
            .unwrap_or_default();
        for sibling in siblings.into_iter().filter(|s| *s != layer) {
            if self.proceed(sibling) {
                debug!("layer '{}' released by sibling arrival", self.graph.layer_name(sibling));
            }
        }
    }

    // ----- output -----

    fn emit_layer(&mut self, layer: LayerId, dt: f32, scene: &dyn Scene, roles: &[Role]) {
        let ctx = AnchorContext::new(scene.anchors(), roles);
        let threshold = self.cfg.damping_threshold;
        let Some((controls, morphs)) = self.graph.layer(layer).map(|l| (l.controls.clone(), l.morphs.clone())) else {
            return;
        };
        let Some(rt) = self.runtimes.get_mut(&layer) else {
            return;
        };
        let mut produced: Vec<(ChannelKey, ChannelValue)> = Vec::with_capacity(controls.len() + morphs.len());
        match &rt.phase {
            Phase::Blending(plan) => {
                let u = plan.hop_progress();
                if let Some(channels) = plan.current().channels() {
                    for (name, tl) in &channels.controls {
                        let filter = rt
                            .filters
                            .entry(name.clone())
                            .or_insert_with(|| AnchorFilter::new(threshold));
                        let fresh = tl.anchor.frame(u, &ctx).compose(&tl.offset_at(u));
                        let world = filter.apply(fresh, tl.anchor.damping_time(), dt);
                        produced.push((ChannelKey::control(name.as_str()), ChannelValue::from_transform(&world)));
                    }
                    for (name, tl) in &channels.morphs {
                        produced.push((ChannelKey::morph(name.as_str()), ChannelValue::Morph(tl.evaluate(u))));
                    }
                }
            }
            Phase::Idle { .. } | Phase::AwaitingSync => {
                let Some(current) = rt.current else {
                    return;
                };
                let pose = LivePose {
                    last: &self.last_values,
                    host: scene.pose(),
                };
                for ch in &controls {
                    let Some(entry) = self
                        .graph
                        .state_mut(current)
                        .and_then(|s| s.get_or_capture_control(ch, &pose))
                        .map(|c| c.into_inner().clone())
                    else {
                        continue;
                    };
                    let filter = rt
                        .filters
                        .entry(ch.clone())
                        .or_insert_with(|| AnchorFilter::new(threshold));
                    let world = entry.resolve_damped(&ctx, filter, dt);
                    produced.push((ChannelKey::control(ch.as_str()), ChannelValue::from_transform(&world)));
                }
                for ch in &morphs {
                    let Some(value) = self
                        .graph
                        .state_mut(current)
                        .and_then(|s| s.get_or_capture_morph(ch, &pose))
                        .map(|c| c.into_inner())
                    else {
                        continue;
                    };
                    produced.push((ChannelKey::morph(ch.as_str()), ChannelValue::Morph(value)));
                }
            }
        }

        let layer_name = self.graph.layer_name(layer);
        for (key, value) in produced {
            self.outputs.push_change(Change {
                layer: layer_name.clone(),
                key: self.bindings.key_for(&key),
                value: value.clone(),
            });
            self.last_values.insert(key, value);
        }
    }
}
