//! # ng-driver
//!
//! The generator-driver subsystem: configuration, flux-type
//! regularization, detector geometry and fiducial selection, the
//! spline-driven generator backend, the spill-by-spill sample loop, and
//! the event injector.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod driver;
pub mod fluxtype;
pub mod geometry;
pub mod inject;

pub use backend::{
    channels_for_list, resolve_xml_path, BackendConfig, Channel, GeneratorBackend,
    KinematicsBackend, Spline, XsecSplines,
};
pub use config::DriverConfig;
pub use driver::{GeneratorDriver, SampledEvent, FRAMEWORK_XML_PATH};
pub use fluxtype::{regularize, FluxTag};
pub use geometry::{BoundingBox, DetectorGeometry, FiducialCut, FiducialShape, GeomScan, RockBox};
pub use inject::{CountModel, EventInjector, InjectedEvent, InjectorConfig, SourceEntry};
