#![allow(dead_code)]

use std::collections::HashMap;

use nalgebra::{UnitQuaternion, Vector3};
use vizij_idle_core::{AnchorResolver, ChannelSink, PoseSource, SignalBus, Transform};

pub fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

/// Host stand-in: a static pose plus named anchor frames.
#[derive(Default)]
pub struct MockScene {
    pub controls: HashMap<String, Transform>,
    pub morphs: HashMap<String, f32>,
    pub anchors: HashMap<(String, String), Transform>,
    /// Unknown controls read as identity (and unknown morphs as 0) when set.
    pub permissive: bool,
}

impl MockScene {
    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Self::default()
        }
    }

    pub fn with_anchor(mut self, entity: &str, control: &str, frame: Transform) -> Self {
        self.anchors
            .insert((entity.to_string(), control.to_string()), frame);
        self
    }

    pub fn with_control(mut self, name: &str, t: Transform) -> Self {
        self.controls.insert(name.to_string(), t);
        self
    }
}

impl PoseSource for MockScene {
    fn read_control(&self, name: &str) -> Option<Transform> {
        self.controls
            .get(name)
            .copied()
            .or_else(|| self.permissive.then(Transform::identity))
    }

    fn read_morph(&self, name: &str) -> Option<f32> {
        self.morphs
            .get(name)
            .copied()
            .or_else(|| self.permissive.then_some(0.0))
    }
}

impl AnchorResolver for MockScene {
    fn resolve_anchor(&self, entity: &str, control: &str) -> Option<Transform> {
        self.anchors
            .get(&(entity.to_string(), control.to_string()))
            .copied()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub controls: HashMap<String, (Vector3<f32>, UnitQuaternion<f32>)>,
    pub morphs: HashMap<String, f32>,
}

impl ChannelSink for RecordingSink {
    fn apply_control(&mut self, handle: &str, position: Vector3<f32>, rotation: UnitQuaternion<f32>) {
        self.controls.insert(handle.to_string(), (position, rotation));
    }

    fn apply_morph(&mut self, handle: &str, value: f32) {
        self.morphs.insert(handle.to_string(), value);
    }
}

#[derive(Default)]
pub struct RecordingBus {
    pub messages: Vec<(String, String)>,
    pub placed: Vec<(String, String)>,
    pub lifted: Vec<(String, String)>,
}

impl SignalBus for RecordingBus {
    fn send_message(&mut self, entity: &str, text: &str) {
        self.messages.push((entity.to_string(), text.to_string()));
    }

    fn place_avoid(&mut self, entity: &str, avoid: &str) {
        self.placed.push((entity.to_string(), avoid.to_string()));
    }

    fn lift_avoid(&mut self, entity: &str, avoid: &str) {
        self.lifted.push((entity.to_string(), avoid.to_string()));
    }
}
