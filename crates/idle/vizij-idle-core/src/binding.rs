//! Host-facing seams: channel binding, pose reads and channel writes.
//!
//! Handles are small string keys resolved once per channel through
//! [`Engine::prebind`](crate::engine::Engine::prebind). Unbound channels fall back to
//! their channel name as the output key.

use hashbrown::HashMap;
use nalgebra::{UnitQuaternion, Vector3};

use crate::anchor::AnchorResolver;
use crate::transform::Transform;

/// Opaque host handle (small string key).
pub type TargetHandle = String;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ChannelKind {
    /// Position + rotation of a named control point.
    Control,
    /// Single scalar parameter (morph / shape key).
    Morph,
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ChannelKey {
    pub kind: ChannelKind,
    pub name: String,
}

impl ChannelKey {
    pub fn control(name: impl Into<String>) -> Self {
        Self {
            kind: ChannelKind::Control,
            name: name.into(),
        }
    }

    pub fn morph(name: impl Into<String>) -> Self {
        Self {
            kind: ChannelKind::Morph,
            name: name.into(),
        }
    }
}

/// Resolves channel names into host handles. Adapters implement this and pass it to
/// `Engine::prebind()`.
pub trait TargetResolver {
    fn resolve(&mut self, key: &ChannelKey) -> Option<TargetHandle>;
}

/// Channel name → handle table.
#[derive(Default, Debug, Clone)]
pub struct BindingTable {
    rows: HashMap<ChannelKey, TargetHandle>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ChannelKey) -> Option<&TargetHandle> {
        self.rows.get(key)
    }

    pub fn upsert(&mut self, key: ChannelKey, handle: TargetHandle) {
        self.rows.insert(key, handle);
    }

    /// Handle for `key`, or the channel name when unbound.
    pub fn key_for(&self, key: &ChannelKey) -> String {
        self.rows
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.name.clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read access to the host's current pose, used to capture channels lazily.
pub trait PoseSource {
    /// World transform of a control point.
    fn read_control(&self, name: &str) -> Option<Transform>;
    fn read_morph(&self, name: &str) -> Option<f32>;
}

/// Everything the engine reads from the host during a tick.
pub trait Scene {
    fn pose(&self) -> &dyn PoseSource;
    fn anchors(&self) -> &dyn AnchorResolver;
}

impl<T: PoseSource + AnchorResolver> Scene for T {
    fn pose(&self) -> &dyn PoseSource {
        self
    }

    fn anchors(&self) -> &dyn AnchorResolver {
        self
    }
}

/// Write access to host channels.
pub trait ChannelSink {
    fn apply_control(&mut self, handle: &str, position: Vector3<f32>, rotation: UnitQuaternion<f32>);
    fn apply_morph(&mut self, handle: &str, value: f32);
}
