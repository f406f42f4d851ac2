//! # ng-flux
//!
//! Flux machinery for the nugen driver: file discovery and staging,
//! spill-time models, flux-frame rotations, and the flux drivers that
//! sample incoming neutrino rays for every supported flux mode.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod driver;
pub mod formula;
pub mod histogram;
pub mod mixer;
pub mod resolver;
pub mod rotation;
pub mod spill;

pub use driver::{
    AtmoFlux, BeamGeometry, FluxDriver, FluxRay, HistogramFlux, MonoFlux, TreeEntry, TreeFlux,
};
pub use formula::Formula;
pub use histogram::{hist_name_for, EnergyHistogram, HistogramFile, FLAVOR_HIST_NAMES};
pub use mixer::{FlavorMix, FlavorMixerFactory, FluxBlender};
pub use resolver::{
    expand_search_paths, select_randomized, Cleanup, CopyFetcher, CopyMethod, FluxFileEntry,
    FluxFileResolver, FluxFetcher, ResolvedFlux, ResolverConfig,
};
pub use rotation::FluxRotation;
pub use spill::{from_config as spill_from_config, SpillTime};
