//! Input contracts for the idle engine.
//!
//! Adapters build these and pass them into `Engine::update()` each tick. Commands
//! address graph entities by name; names that do not resolve are skipped and reported
//! as `CoreEvent::LookupMiss`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Inputs {
    /// Commands applied, in order, before the clocks advance.
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl Inputs {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(command: Command) -> Self {
        Self {
            commands: vec![command],
        }
    }

    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Command {
    /// Walk the graph to a specific state.
    GoToState {
        animation: String,
        layer: String,
        state: String,
    },
    /// Walk the graph to the nearest state of another animation.
    GoToAnimation { animation: String },
    /// Switch animations directly, blending every layer to its neutral state.
    SetActiveAnimation { animation: String },
    /// Incoming cross-entity message.
    ReceiveMessage { text: String },
    /// Incoming request to enable an avoid flag.
    PlaceAvoid { avoid: String },
    /// Incoming request to clear an avoid flag.
    LiftAvoid { avoid: String },
    /// Release a layer parked on a wait-for-sync state.
    Proceed { animation: String, layer: String },
    SetPaused { paused: bool },
    SetSpeed { animation: String, speed: f32 },
}
