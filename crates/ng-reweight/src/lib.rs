//! # ng-reweight
//!
//! Systematic-parameter reweighting for persisted event records.
//!
//! A [`Reweighter`] holds a set of tweak dials (one-sigma units by
//! default), rebuilds the generator-side record from a persisted
//! event/truth pair, and evaluates a multiplicative event weight via a
//! first-order response engine. All dials at nominal yields a weight of
//! exactly 1.0, and weights are a pure function of the record and the
//! dial settings.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod knobs;
pub mod reweighter;

pub use engine::ResponseEngine;
pub use knobs::{to_sigma, Calculator, InputMode, Knob};
pub use reweighter::Reweighter;
