//! Interpolation helpers.
//!
//! - `functions`: lerp and the linear/quadratic/cubic Bezier bases used by timelines.
//! - `ease`: the three-piece ramp/plateau/ramp curve that drives the transition clock.

pub mod ease;
pub mod functions;

pub use ease::EaseCurve;
