//! Core configuration for vizij-idle-core.

use serde::{Deserialize, Serialize};

/// Engine-wide tuning knobs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Maximum number of hops collected when building a chain.
    pub max_chain_length: usize,
    /// Floor applied to a transition duration after jitter, in seconds.
    pub min_transition_duration: f32,
    /// Anchor damping times at or below this value snap instead of smoothing.
    pub damping_threshold: f32,
    /// Seed for the selection RNG. `None` seeds from the operating system.
    pub seed: Option<u64>,
    /// Maximum events to retain per tick.
    pub max_events_per_tick: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_chain_length: 4,
            min_transition_duration: 0.01,
            damping_threshold: 0.001,
            seed: None,
            max_events_per_tick: 1024,
        }
    }
}

impl Config {
    /// Default config with a fixed RNG seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }
}
