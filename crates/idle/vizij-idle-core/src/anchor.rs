//! Anchored channel entries.
//!
//! A control channel's pose on a state is stored as an offset relative to an anchor
//! frame: world space, one external reference frame, or a blend of two. Resolving the
//! entry composes the current anchor frame with the stored offset; capturing does the
//! inverse. Missing anchors degrade to "no adjustment" (identity frame).

use log::trace;

use crate::graph::Role;
use crate::interp::functions::clamp01;
use crate::transform::Transform;

/// Host-side lookup of external reference frames.
pub trait AnchorResolver {
    /// World transform of `control` on `entity`, or `None` if it does not exist.
    fn resolve_anchor(&self, entity: &str, control: &str) -> Option<Transform>;
}

/// Who owns the reference control.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnchorTarget {
    /// A concrete entity identifier.
    Entity(String),
    /// A logical role, bound to an entity through the graph's role table.
    Role(String),
}

/// One external reference frame: an entity (or role) plus one of its controls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchorRef {
    pub target: AnchorTarget,
    pub control: String,
}

impl AnchorRef {
    pub fn entity(entity: impl Into<String>, control: impl Into<String>) -> Self {
        Self {
            target: AnchorTarget::Entity(entity.into()),
            control: control.into(),
        }
    }

    pub fn role(role: impl Into<String>, control: impl Into<String>) -> Self {
        Self {
            target: AnchorTarget::Role(role.into()),
            control: control.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AnchorMode {
    World,
    Single(AnchorRef),
    Blend { a: AnchorRef, b: AnchorRef, ratio: f32 },
}

/// Anchor mode plus damping time (seconds).
#[derive(Clone, Debug, PartialEq)]
pub struct AnchorSpec {
    pub mode: AnchorMode,
    pub damping_time: f32,
}

impl Default for AnchorSpec {
    fn default() -> Self {
        Self::world()
    }
}

impl AnchorSpec {
    pub fn world() -> Self {
        Self {
            mode: AnchorMode::World,
            damping_time: 0.0,
        }
    }

    pub fn single(anchor: AnchorRef) -> Self {
        Self {
            mode: AnchorMode::Single(anchor),
            damping_time: 0.0,
        }
    }

    pub fn blend(a: AnchorRef, b: AnchorRef, ratio: f32) -> Self {
        Self {
            mode: AnchorMode::Blend { a, b, ratio },
            damping_time: 0.0,
        }
    }

    pub fn with_damping(mut self, damping_time: f32) -> Self {
        self.damping_time = damping_time.max(0.0);
        self
    }

    /// Current anchor frame, or `None` if a referenced control cannot be resolved.
    pub fn resolve_frame(&self, ctx: &AnchorContext<'_>) -> Option<Transform> {
        match &self.mode {
            AnchorMode::World => Some(Transform::identity()),
            AnchorMode::Single(a) => ctx.lookup(a),
            AnchorMode::Blend { a, b, ratio } => {
                let fa = ctx.lookup(a)?;
                let fb = ctx.lookup(b)?;
                Some(fa.blend(&fb, *ratio))
            }
        }
    }

    /// Like [`resolve_frame`](Self::resolve_frame) but a missing anchor yields identity.
    pub fn frame_or_identity(&self, ctx: &AnchorContext<'_>) -> Transform {
        self.resolve_frame(ctx).unwrap_or_else(|| {
            trace!("anchor {:?} unresolved; using identity", self.mode);
            Transform::identity()
        })
    }
}

/// Resolver plus the role table used to turn roles into entity ids.
#[derive(Clone, Copy)]
pub struct AnchorContext<'a> {
    pub resolver: &'a dyn AnchorResolver,
    pub roles: &'a [Role],
}

impl<'a> AnchorContext<'a> {
    pub fn new(resolver: &'a dyn AnchorResolver, roles: &'a [Role]) -> Self {
        Self { resolver, roles }
    }

    fn lookup(&self, anchor: &AnchorRef) -> Option<Transform> {
        let entity = match &anchor.target {
            AnchorTarget::Entity(e) => e.as_str(),
            AnchorTarget::Role(name) => self
                .roles
                .iter()
                .find(|r| &r.name == name)
                .and_then(|r| r.entity.as_deref())?,
        };
        self.resolver.resolve_anchor(entity, &anchor.control)
    }
}

/// Exponential smoothing of a resolved world transform toward its fresh value.
#[derive(Clone, Debug)]
pub struct AnchorFilter {
    previous: Option<Transform>,
    threshold: f32,
}

impl AnchorFilter {
    pub fn new(threshold: f32) -> Self {
        Self {
            previous: None,
            threshold,
        }
    }

    /// Move from the previous output toward `fresh` by `clamp01(dt / damping_time)`.
    /// Damping at or below the threshold (or the first sample) snaps.
    pub fn apply(&mut self, fresh: Transform, damping_time: f32, dt: f32) -> Transform {
        let out = match self.previous {
            Some(prev) if damping_time > self.threshold => {
                prev.blend(&fresh, clamp01(dt / damping_time))
            }
            _ => fresh,
        };
        self.previous = Some(out);
        out
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// A control channel's pose on one state: offset plus anchor.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlEntryAnchored {
    /// Offset relative to the anchor frame.
    pub transform: Transform,
    pub anchor: AnchorSpec,
}

impl ControlEntryAnchored {
    /// World-anchored entry: the offset is the world transform itself.
    pub fn world(transform: Transform) -> Self {
        Self {
            transform,
            anchor: AnchorSpec::world(),
        }
    }

    pub fn anchored(transform: Transform, anchor: AnchorSpec) -> Self {
        Self { transform, anchor }
    }

    /// `anchor ∘ offset` with the anchor resolved this instant (no damping).
    pub fn resolve(&self, ctx: &AnchorContext<'_>) -> Transform {
        self.anchor.frame_or_identity(ctx).compose(&self.transform)
    }

    /// `anchor ∘ offset` passed through `filter` as a whole, so a rotating anchor
    /// damps the offset's swing too.
    pub fn resolve_damped(
        &self,
        ctx: &AnchorContext<'_>,
        filter: &mut AnchorFilter,
        dt: f32,
    ) -> Transform {
        filter.apply(self.resolve(ctx), self.anchor.damping_time, dt)
    }

    /// Store `world` as an offset relative to the current anchor frame.
    pub fn capture(&mut self, world: &Transform, ctx: &AnchorContext<'_>) {
        let frame = self.anchor.frame_or_identity(ctx);
        self.transform = frame.inverse().compose(world);
    }

    /// Build an entry for `anchor` whose resolved value equals `world` right now.
    pub fn capture_new(world: &Transform, anchor: AnchorSpec, ctx: &AnchorContext<'_>) -> Self {
        let mut entry = Self::anchored(Transform::identity(), anchor);
        entry.capture(world, ctx);
        entry
    }
}
