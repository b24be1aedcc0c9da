//! Reachability, pathfinding and weighted selection over the state graph.
//!
//! Paths follow direct transitions only; indirect transitions are resolved through them.
//! The path table is built breadth-first, so each path has the fewest hops, and among
//! equally short paths the first one discovered wins.

use indexmap::IndexMap;
use log::trace;
use rand::Rng;

use crate::graph::Graph;
use crate::ids::{AnimationId, StateId};

/// Outcome of [`Graph::sort_next_state`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    /// `direct` is false when the chosen edge is indirect and needs pathfinding.
    Next { target: StateId, direct: bool },
    /// Every candidate is weightless, avoided or missing.
    NoValidTransition,
}

impl Graph {
    /// Targets of every outgoing edge, direct or indirect, in edge order.
    pub fn reachable_states(&self, state: StateId) -> Vec<StateId> {
        let Some(s) = self.state(state) else {
            return Vec::new();
        };
        let mut out = Vec::with_capacity(s.transitions.len());
        for t in &s.transitions {
            let target = t.target();
            if self.state(target).is_some() && !out.contains(&target) {
                out.push(target);
            }
        }
        out
    }

    fn direct_targets(&self, state: StateId) -> impl Iterator<Item = StateId> + '_ {
        self.state(state)
            .into_iter()
            .flat_map(|s| s.transitions.iter())
            .filter(|t| t.is_direct())
            .map(|t| t.target())
            .filter(|t| self.state(*t).is_some())
    }

    /// Path (excluding `from`, including the destination) to every state reachable from
    /// `from` through direct transitions, skipping states under an active avoid. `from`
    /// maps to the empty path.
    pub fn get_all_paths(&self, from: StateId) -> IndexMap<StateId, Vec<StateId>> {
        let mut paths: IndexMap<StateId, Vec<StateId>> = IndexMap::new();
        if self.state(from).is_none() {
            return paths;
        }
        let avoided = self.avoided_states();
        paths.insert(from, Vec::new());
        let mut frontier = vec![from];
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for s in frontier {
                let base = paths.get(&s).cloned().unwrap_or_default();
                for t in self.direct_targets(s) {
                    if paths.contains_key(&t) || avoided.contains(&t) {
                        continue;
                    }
                    let mut p = base.clone();
                    p.push(t);
                    paths.insert(t, p);
                    next.push(t);
                }
            }
            frontier = next;
        }
        trace!("path table from {:?}: {} states", from, paths.len());
        paths
    }

    /// Hops from `from` to `target`; empty when they are the same state.
    pub fn find_path(&self, from: StateId, target: StateId) -> Option<Vec<StateId>> {
        self.get_all_paths(from).swap_remove(&target)
    }

    /// Fewest-hop path to any state of `animation`; empty when `from` is already in it.
    pub fn find_path_to_animation(&self, from: StateId, animation: AnimationId) -> Option<Vec<StateId>> {
        if self.state_animation(from) == Some(animation) {
            return Some(Vec::new());
        }
        self.get_all_paths(from)
            .into_iter()
            .find(|(s, _)| self.state_animation(*s) == Some(animation))
            .map(|(_, p)| p)
    }

    /// Weighted-random pick among outgoing edges with positive weight whose target is
    /// not avoided. Draws `u` in `[0, total)` and walks cumulative weights until the
    /// running sum reaches `u`.
    pub fn sort_next_state<R: Rng + ?Sized>(&self, state: StateId, rng: &mut R) -> Selection {
        let Some(s) = self.state(state) else {
            return Selection::NoValidTransition;
        };
        let avoided = self.avoided_states();
        let candidates: Vec<(StateId, bool, f32)> = s
            .transitions
            .iter()
            .filter(|t| {
                let w = t.probability();
                w > 0.0 && w.is_finite() && self.state(t.target()).is_some() && !avoided.contains(&t.target())
            })
            .map(|t| (t.target(), t.is_direct(), t.probability()))
            .collect();
        let Some(last) = candidates.last() else {
            return Selection::NoValidTransition;
        };
        // Scale by the largest weight so the running sum stays finite.
        let peak = candidates.iter().map(|c| c.2).fold(0.0_f32, f32::max);
        let total: f32 = candidates.iter().map(|c| c.2 / peak).sum();
        if !(total > 0.0 && total.is_finite()) {
            return Selection::NoValidTransition;
        }
        let u = rng.random_range(0.0..total);
        let mut acc = 0.0;
        for &(target, direct, w) in &candidates {
            acc += w / peak;
            if acc >= u {
                return Selection::Next { target, direct };
            }
        }
        Selection::Next {
            target: last.0,
            direct: last.1,
        }
    }
}
