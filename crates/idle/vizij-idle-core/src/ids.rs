//! Handles for graph entities.
//!
//! Animations, layers and states live in `SlotMap`s addressed by small copyable keys.
//! A key carries its slot version, so a key to a removed entity never resolves to
//! whatever later reuses the slot.

use slotmap::new_key_type;

new_key_type! {
    /// Handle to an [`Animation`](crate::graph::Animation).
    pub struct AnimationId;
    /// Handle to a [`Layer`](crate::graph::Layer).
    pub struct LayerId;
    /// Handle to a [`State`](crate::graph::State).
    pub struct StateId;
}
