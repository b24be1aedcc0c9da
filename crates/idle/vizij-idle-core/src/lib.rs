//! Vizij Idle Core (engine-agnostic)
//!
//! Procedural idle animation: a weighted graph of poses ("states") grouped into layers
//! and animations, a per-tick engine that waits, picks the next state, and blends every
//! captured channel toward it along anchored spline timelines. Hosts supply the pose
//! (`PoseSource`), anchor frames (`AnchorResolver`) and channel writes (`ChannelSink`).

pub mod anchor;
pub mod binding;
pub mod blend;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod ids;
pub mod inputs;
pub mod interp;
pub mod outputs;
pub mod persist;
pub mod spline;
pub mod timeline;
pub mod transform;

// Re-exports for consumers (adapters)
pub use anchor::{
    AnchorContext, AnchorFilter, AnchorMode, AnchorRef, AnchorResolver, AnchorSpec, AnchorTarget,
    ControlEntryAnchored,
};
pub use binding::{
    BindingTable, ChannelKey, ChannelKind, ChannelSink, PoseSource, Scene, TargetHandle,
    TargetResolver,
};
pub use blend::{ChainPlan, Hop, PlannedHop};
pub use config::Config;
pub use engine::{Engine, LayerPhase};
pub use error::IdleError;
pub use graph::{
    Animation, Avoid, AvoidToggle, Captured, DirectTransition, Graph, IndirectTransition, Layer,
    Message, OutgoingMessage, Role, Selection, State, StateKind, StateTiming, SyncTarget,
    Transition, TransitionDefaults,
};
pub use ids::{AnimationId, LayerId, StateId};
pub use inputs::{Command, Inputs};
pub use interp::EaseCurve;
pub use outputs::{Change, ChannelValue, CoreEvent, Outputs, SignalBus};
pub use persist::{graph_to_json, parse_graph_document, parse_graph_json, LoadedGraph};
pub use timeline::{Keyframe, ScalarTimeline, SplineValue, Timeline, TransformTimeline, VirtualAnchor};
pub use transform::Transform;
