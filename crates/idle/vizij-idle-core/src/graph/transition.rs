//! Graph edges.
//!
//! A direct transition owns its timing, signals and per-channel timelines. An indirect
//! transition only says "the target is reachable from here"; the runtime resolves it to a
//! chain of direct transitions by pathfinding.

use indexmap::IndexMap;

use crate::graph::state::TransitionDefaults;
use crate::ids::{LayerId, StateId};
use crate::timeline::{ScalarTimeline, TransformTimeline};

/// Jump another layer straight to `state` when the owning transition begins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncTarget {
    pub layer: LayerId,
    pub state: StateId,
}

/// Message sent to the entity bound to `role` when the owning transition begins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub role: String,
    pub text: String,
}

/// Place (`place = true`) or lift an avoid flag when the owning transition begins.
/// With no role the toggle applies to this graph's own avoid list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvoidToggle {
    pub role: Option<String>,
    pub avoid: String,
    pub place: bool,
}

#[derive(Clone, Debug)]
pub struct DirectTransition {
    pub target: StateId,
    pub probability: f32,
    /// Seconds.
    pub duration: f32,
    /// Jitter bound; the effective duration is drawn from `duration ± duration_noise`.
    pub duration_noise: f32,
    pub ease_in: f32,
    pub ease_out: f32,
    pub sync_targets: Vec<SyncTarget>,
    pub messages: Vec<OutgoingMessage>,
    pub avoids: Vec<AvoidToggle>,
    /// Authored interior keyframes per control channel. Boundaries are refreshed from the
    /// endpoint states whenever the transition begins.
    pub control_timelines: IndexMap<String, TransformTimeline>,
    pub morph_timelines: IndexMap<String, ScalarTimeline>,
}

impl DirectTransition {
    pub fn new(target: StateId, defaults: &TransitionDefaults) -> Self {
        Self {
            target,
            probability: defaults.probability,
            duration: defaults.duration,
            duration_noise: defaults.duration_noise,
            ease_in: defaults.ease_in,
            ease_out: defaults.ease_out,
            sync_targets: Vec::new(),
            messages: Vec::new(),
            avoids: Vec::new(),
            control_timelines: IndexMap::new(),
            morph_timelines: IndexMap::new(),
        }
    }

    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = duration.max(0.0);
        self
    }

    pub fn with_probability(mut self, probability: f32) -> Self {
        self.probability = probability.max(0.0);
        self
    }

    pub fn with_ease(mut self, ease_in: f32, ease_out: f32) -> Self {
        self.ease_in = ease_in.max(0.0);
        self.ease_out = ease_out.max(0.0);
        self
    }

    /// Drop every reference to `state` (sync targets pointing at it).
    pub(crate) fn purge_state(&mut self, state: StateId) {
        self.sync_targets.retain(|s| s.state != state);
    }

    pub(crate) fn purge_layer(&mut self, layer: LayerId) {
        self.sync_targets.retain(|s| s.layer != layer);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct IndirectTransition {
    pub target: StateId,
    pub probability: f32,
}

#[derive(Clone, Debug)]
pub enum Transition {
    Direct(DirectTransition),
    Indirect(IndirectTransition),
}

impl Transition {
    #[inline]
    pub fn target(&self) -> StateId {
        match self {
            Transition::Direct(d) => d.target,
            Transition::Indirect(i) => i.target,
        }
    }

    #[inline]
    pub fn probability(&self) -> f32 {
        match self {
            Transition::Direct(d) => d.probability,
            Transition::Indirect(i) => i.probability,
        }
    }

    #[inline]
    pub fn is_direct(&self) -> bool {
        matches!(self, Transition::Direct(_))
    }

    pub fn as_direct(&self) -> Option<&DirectTransition> {
        match self {
            Transition::Direct(d) => Some(d),
            Transition::Indirect(_) => None,
        }
    }

    pub fn as_direct_mut(&mut self) -> Option<&mut DirectTransition> {
        match self {
            Transition::Direct(d) => Some(d),
            Transition::Indirect(_) => None,
        }
    }
}
