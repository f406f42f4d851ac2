//! # ng-translate
//!
//! Bidirectional translation between the generator-side event record and
//! the framework-native triple (`NeutrinoEvent`, `GeneratorTruth`,
//! `FluxRecord`). The forward direction serves persistence; the reverse
//! direction rebuilds generator records for reweighting.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod forward;
pub mod reverse;

pub use forward::{derive_mode, fill_event, fill_flux, fill_truth};
pub use reverse::reconstruct;
