//! States: per-channel pose snapshots plus timing defaults and outgoing edges.

use indexmap::IndexMap;
use log::{debug, warn};

use crate::anchor::ControlEntryAnchored;
use crate::binding::PoseSource;
use crate::graph::transition::{DirectTransition, Transition};
use crate::ids::{LayerId, StateId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum StateKind {
    #[default]
    Regular,
    /// Waypoint: chain building never stops on one.
    Intermediate,
}

/// How long a layer lingers on a state before picking the next one.
#[derive(Clone, Debug, PartialEq)]
pub struct StateTiming {
    pub wait_min: f32,
    pub wait_max: f32,
    /// Never leave automatically; only commands move the layer on.
    pub wait_infinite: bool,
    /// Park until a proceed notification releases the layer.
    pub wait_for_sync: bool,
}

impl Default for StateTiming {
    fn default() -> Self {
        Self {
            wait_min: 1.0,
            wait_max: 5.0,
            wait_infinite: false,
            wait_for_sync: false,
        }
    }
}

impl StateTiming {
    pub fn fixed(wait: f32) -> Self {
        Self {
            wait_min: wait,
            wait_max: wait,
            ..Self::default()
        }
    }
}

/// Values copied into each new transition leaving the state.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionDefaults {
    pub duration: f32,
    pub duration_noise: f32,
    pub ease_in: f32,
    pub ease_out: f32,
    pub probability: f32,
}

impl Default for TransitionDefaults {
    fn default() -> Self {
        Self {
            duration: 1.0,
            duration_noise: 0.0,
            ease_in: 1.0,
            ease_out: 1.0,
            probability: 0.5,
        }
    }
}

/// Outcome of a lazy channel read: already stored, or captured just now from the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Captured<T> {
    Existing(T),
    Fresh(T),
}

impl<T> Captured<T> {
    pub fn into_inner(self) -> T {
        match self {
            Captured::Existing(v) | Captured::Fresh(v) => v,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Captured::Fresh(_))
    }
}

#[derive(Clone, Debug)]
pub struct State {
    pub name: String,
    pub layer: LayerId,
    pub kind: StateKind,
    pub timing: StateTiming,
    pub defaults: TransitionDefaults,
    pub controls: IndexMap<String, ControlEntryAnchored>,
    pub morphs: IndexMap<String, f32>,
    /// Outgoing edges, at most one per target.
    pub transitions: Vec<Transition>,
}

impl State {
    pub fn new(name: impl Into<String>, layer: LayerId) -> Self {
        Self {
            name: name.into(),
            layer,
            kind: StateKind::Regular,
            timing: StateTiming::default(),
            defaults: TransitionDefaults::default(),
            controls: IndexMap::new(),
            morphs: IndexMap::new(),
            transitions: Vec::new(),
        }
    }

    #[inline]
    pub fn is_intermediate(&self) -> bool {
        self.kind == StateKind::Intermediate
    }

    pub fn transition(&self, target: StateId) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.target() == target)
    }

    pub fn transition_mut(&mut self, target: StateId) -> Option<&mut Transition> {
        self.transitions.iter_mut().find(|t| t.target() == target)
    }

    pub fn direct(&self, target: StateId) -> Option<&DirectTransition> {
        self.transition(target).and_then(Transition::as_direct)
    }

    pub fn direct_mut(&mut self, target: StateId) -> Option<&mut DirectTransition> {
        self.transition_mut(target).and_then(Transition::as_direct_mut)
    }

    /// Stored entry for `channel`, or capture it from the host pose as a world-anchored
    /// entry. `None` when the host cannot read the channel either.
    pub fn get_or_capture_control(
        &mut self,
        channel: &str,
        pose: &dyn PoseSource,
    ) -> Option<Captured<&ControlEntryAnchored>> {
        if self.controls.contains_key(channel) {
            return self.controls.get(channel).map(Captured::Existing);
        }
        let Some(world) = pose.read_control(channel) else {
            warn!("state '{}': control '{}' unreadable; not captured", self.name, channel);
            return None;
        };
        debug!("state '{}': lazily captured control '{}'", self.name, channel);
        self.controls
            .insert(channel.to_string(), ControlEntryAnchored::world(world));
        self.controls.get(channel).map(Captured::Fresh)
    }

    pub fn get_or_capture_morph(&mut self, channel: &str, pose: &dyn PoseSource) -> Option<Captured<f32>> {
        if let Some(v) = self.morphs.get(channel) {
            return Some(Captured::Existing(*v));
        }
        let Some(value) = pose.read_morph(channel) else {
            warn!("state '{}': morph '{}' unreadable; not captured", self.name, channel);
            return None;
        };
        debug!("state '{}': lazily captured morph '{}'", self.name, channel);
        self.morphs.insert(channel.to_string(), value);
        Some(Captured::Fresh(value))
    }

    /// Remove every outgoing edge to `target` and every sync target naming it.
    pub(crate) fn purge_state(&mut self, target: StateId) {
        self.transitions.retain(|t| t.target() != target);
        for t in &mut self.transitions {
            if let Transition::Direct(d) = t {
                d.purge_state(target);
            }
        }
    }
}
