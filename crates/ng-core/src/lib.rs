//! # ng-core
//!
//! Core error and value types shared by the nugen neutrino-generator
//! adapter crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::FourVector;
