//! Chain playback: one or more hops blended under a single clock and easing curve.
//!
//! A chain of hops `s0 → s1 → … → sn` runs on one clock whose length is the sum of the
//! per-hop durations. The ease curve spans the whole chain (first hop's ease-in, last
//! hop's ease-out), and each hop maps its own slice of the eased progress back onto
//! [0, 1] so every channel timeline still runs from its hop's start pose to its end pose.

use indexmap::IndexMap;

use crate::anchor::ControlEntryAnchored;
use crate::binding::PoseSource;
use crate::graph::Graph;
use crate::ids::StateId;
use crate::interp::functions::clamp01;
use crate::interp::EaseCurve;
use crate::timeline::{ScalarTimeline, TransformTimeline};

/// Clock slack when deciding whether a hop has finished.
pub const HOP_EPS: f32 = 1e-4;

/// One hop as requested, before it is placed on the chain clock.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedHop {
    /// `None` blends from the live pose.
    pub from: Option<StateId>,
    pub to: StateId,
    /// Effective (jittered) duration in seconds.
    pub duration: f32,
    pub ease_in: f32,
    pub ease_out: f32,
}

/// Per-channel timelines of a hop, built when the hop begins.
#[derive(Clone, Debug, Default)]
pub struct HopChannels {
    pub controls: Vec<(String, TransformTimeline)>,
    pub morphs: Vec<(String, ScalarTimeline)>,
}

/// A hop placed on the chain clock over `[start, end]` seconds.
#[derive(Clone, Debug)]
pub struct Hop {
    pub from: Option<StateId>,
    pub to: StateId,
    pub start: f32,
    pub end: f32,
    pub(crate) channels: Option<HopChannels>,
}

impl Hop {
    #[inline]
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }

    pub fn channels(&self) -> Option<&HopChannels> {
        self.channels.as_ref()
    }
}

#[derive(Clone, Debug)]
pub struct ChainPlan {
    hops: Vec<Hop>,
    index: usize,
    elapsed: f32,
    ease: EaseCurve,
}

impl ChainPlan {
    /// Lay hops end to end. `None` for an empty chain.
    pub fn new(planned: &[PlannedHop]) -> Option<Self> {
        let first = planned.first()?;
        let last = planned.last()?;
        let mut clock = 0.0f32;
        let hops = planned
            .iter()
            .map(|p| {
                let start = clock;
                clock += p.duration.max(0.0);
                Hop {
                    from: p.from,
                    to: p.to,
                    start,
                    end: clock,
                    channels: None,
                }
            })
            .collect();
        Some(Self {
            hops,
            index: 0,
            elapsed: 0.0,
            ease: EaseCurve::new(clock, first.ease_in, last.ease_out),
        })
    }

    /// Start the clock at `elapsed` (carry-over from the previous phase).
    pub fn with_elapsed(mut self, elapsed: f32) -> Self {
        self.elapsed = elapsed.max(0.0);
        self
    }

    #[inline]
    pub fn total(&self) -> f32 {
        self.ease.duration()
    }

    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    #[inline]
    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Effective ramps of the chain curve.
    #[inline]
    pub fn ramps(&self) -> (f32, f32) {
        self.ease.ramps()
    }

    #[inline]
    pub fn current(&self) -> &Hop {
        &self.hops[self.index]
    }

    #[inline]
    pub(crate) fn current_mut(&mut self) -> &mut Hop {
        &mut self.hops[self.index]
    }

    #[inline]
    pub fn is_last_hop(&self) -> bool {
        self.index + 1 >= self.hops.len()
    }

    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt.max(0.0);
    }

    pub fn hop_finished(&self) -> bool {
        self.elapsed >= self.current().end - HOP_EPS
    }

    /// Clock time past the end of the current hop.
    pub fn overshoot(&self) -> f32 {
        (self.elapsed - self.current().end).max(0.0)
    }

    /// Move to the next hop; false when the chain is exhausted.
    pub fn next_hop(&mut self) -> bool {
        if self.is_last_hop() {
            return false;
        }
        self.index += 1;
        true
    }

    /// Seconds until the current hop ends.
    pub fn hop_remaining(&self) -> f32 {
        (self.current().end - self.elapsed).max(0.0)
    }

    fn eased(&self, time: f32) -> f32 {
        let total = self.total();
        if total <= f32::EPSILON {
            return 1.0;
        }
        self.ease.evaluate(time / total)
    }

    /// Eased progress of the whole chain.
    pub fn chain_progress(&self) -> f32 {
        self.eased(self.elapsed)
    }

    /// Eased progress of the current hop: `(E(now) − E(start)) / (E(end) − E(start))`.
    pub fn hop_progress(&self) -> f32 {
        let hop = self.current();
        let a = self.eased(hop.start);
        let b = self.eased(hop.end);
        if b - a <= 1e-6 {
            return if self.hop_finished() { 1.0 } else { 0.0 };
        }
        clamp01((self.eased(self.elapsed.min(hop.end)) - a) / (b - a))
    }
}

/// Build the per-channel timelines for a hop into `to`.
///
/// Endpoint entries come from the states (captured lazily from `pose` when missing).
/// A source outside the target's layer, or no source at all, blends from the live pose.
/// Authored interior keyframes on the direct edge are kept.
pub(crate) fn build_hop_channels(
    graph: &mut Graph,
    from: Option<StateId>,
    to: StateId,
    pose: &dyn PoseSource,
) -> HopChannels {
    let mut out = HopChannels::default();
    let Some(layer_id) = graph.state(to).map(|s| s.layer) else {
        return out;
    };
    let Some(layer) = graph.layer(layer_id) else {
        return out;
    };
    let (controls, morphs) = (layer.controls.clone(), layer.morphs.clone());
    let from = from.filter(|f| graph.state(*f).map(|s| s.layer) == Some(layer_id));
    let (authored_controls, authored_morphs): (IndexMap<String, TransformTimeline>, IndexMap<String, ScalarTimeline>) =
        match from.and_then(|f| graph.direct_transition(f, to)) {
            Some(edge) => (edge.control_timelines.clone(), edge.morph_timelines.clone()),
            None => Default::default(),
        };

    for ch in &controls {
        let Some(dst) = graph
            .state_mut(to)
            .and_then(|s| s.get_or_capture_control(ch, pose))
            .map(|c| c.into_inner().clone())
        else {
            continue;
        };
        let src = match from {
            Some(f) => graph
                .state_mut(f)
                .and_then(|s| s.get_or_capture_control(ch, pose))
                .map(|c| c.into_inner().clone()),
            None => pose.read_control(ch).map(ControlEntryAnchored::world),
        }
        .unwrap_or_else(|| dst.clone());
        let tl = match authored_controls.get(ch) {
            Some(authored) => {
                let mut tl = authored.clone();
                tl.set_endpoints(&src, &dst);
                tl
            }
            None => TransformTimeline::between(&src, &dst),
        };
        out.controls.push((ch.clone(), tl));
    }

    for ch in &morphs {
        let Some(dst) = graph
            .state_mut(to)
            .and_then(|s| s.get_or_capture_morph(ch, pose))
            .map(|c| c.into_inner())
        else {
            continue;
        };
        let src = match from {
            Some(f) => graph
                .state_mut(f)
                .and_then(|s| s.get_or_capture_morph(ch, pose))
                .map(|c| c.into_inner()),
            None => pose.read_morph(ch),
        }
        .unwrap_or(dst);
        let tl = match authored_morphs.get(ch) {
            Some(authored) => {
                let mut tl = authored.clone();
                tl.set_first(src);
                tl.set_last(dst);
                tl
            }
            None => ScalarTimeline::new(src, dst),
        };
        out.morphs.push((ch.clone(), tl));
    }
    out
}
