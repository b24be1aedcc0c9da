//! Output contracts from the idle engine.
//!
//! Outputs carry the per-tick channel values keyed by host handle, plus semantic
//! events. Adapters apply changes through a [`ChannelSink`] and forward signal events
//! through a [`SignalBus`].

use log::warn;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::binding::ChannelSink;
use crate::transform::{quat_from_components, Transform};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum ChannelValue {
    Control {
        position: [f32; 3],
        /// Quaternion (x, y, z, w)
        rotation: [f32; 4],
    },
    Morph(f32),
}

impl ChannelValue {
    pub fn from_transform(t: &Transform) -> Self {
        ChannelValue::Control {
            position: t.position_array(),
            rotation: t.rotation_array(),
        }
    }

    pub fn transform(&self) -> Option<Transform> {
        match self {
            ChannelValue::Control { position, rotation } => {
                Some(Transform::from_arrays(*position, *rotation))
            }
            ChannelValue::Morph(_) => None,
        }
    }

    pub fn morph(&self) -> Option<f32> {
        match self {
            ChannelValue::Morph(v) => Some(*v),
            ChannelValue::Control { .. } => None,
        }
    }
}

/// One channel value written this tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Change {
    pub layer: String,
    /// Bound handle, or the channel name when unbound.
    pub key: String,
    pub value: ChannelValue,
}

/// Discrete semantic signals emitted during stepping.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[non_exhaustive]
pub enum CoreEvent {
    TransitionBegan {
        layer: String,
        from: Option<String>,
        to: String,
    },
    TransitionEnded {
        layer: String,
        state: String,
    },
    AnimationSwitched {
        from: Option<String>,
        to: String,
    },
    NoValidTransition {
        layer: String,
        state: String,
    },
    LookupMiss {
        kind: String,
        name: String,
    },
    SendMessage {
        entity: String,
        text: String,
    },
    PlaceAvoid {
        entity: String,
        avoid: String,
    },
    LiftAvoid {
        entity: String,
        avoid: String,
    },
}

/// Fire-and-forget transport for cross-entity signals.
pub trait SignalBus {
    fn send_message(&mut self, entity: &str, text: &str);
    fn place_avoid(&mut self, entity: &str, avoid: &str);
    fn lift_avoid(&mut self, entity: &str, avoid: &str);
}

/// Outputs returned by Engine::update().
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub changes: Vec<Change>,
    #[serde(default)]
    pub events: Vec<CoreEvent>,
    #[serde(skip)]
    max_events: usize,
}

impl Default for Outputs {
    fn default() -> Self {
        Self::with_event_cap(usize::MAX)
    }
}

impl Outputs {
    pub fn with_event_cap(max_events: usize) -> Self {
        Self {
            changes: Vec::new(),
            events: Vec::new(),
            max_events,
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.changes.clear();
        self.events.clear();
    }

    #[inline]
    pub fn push_change(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn push_event(&mut self, event: CoreEvent) {
        if self.events.len() >= self.max_events {
            warn!("event cap {} reached; dropping {:?}", self.max_events, event);
            return;
        }
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.events.is_empty()
    }

    /// Latest value written for `key` this tick.
    pub fn value_of(&self, key: &str) -> Option<&ChannelValue> {
        self.changes
            .iter()
            .rev()
            .find(|c| c.key == key)
            .map(|c| &c.value)
    }

    /// Write every change to the host.
    pub fn apply(&self, sink: &mut dyn ChannelSink) {
        for change in &self.changes {
            match &change.value {
                ChannelValue::Control { position, rotation } => sink.apply_control(
                    &change.key,
                    Vector3::from(*position),
                    quat_from_components(*rotation),
                ),
                ChannelValue::Morph(v) => sink.apply_morph(&change.key, *v),
            }
        }
    }

    /// Forward signal events to the transport.
    pub fn dispatch(&self, bus: &mut dyn SignalBus) {
        for event in &self.events {
            match event {
                CoreEvent::SendMessage { entity, text } => bus.send_message(entity, text),
                CoreEvent::PlaceAvoid { entity, avoid } => bus.place_avoid(entity, avoid),
                CoreEvent::LiftAvoid { entity, avoid } => bus.lift_avoid(entity, avoid),
                _ => {}
            }
        }
    }
}
