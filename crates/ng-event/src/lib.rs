//! # ng-event
//!
//! Event data model for the nugen adapters: the framework-native triple
//! (`NeutrinoEvent`, `GeneratorTruth`, `FluxRecord`) persisted for every
//! produced interaction, and the generator-side `GenEvent` record the
//! translator converts to and from.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod event;
pub mod flux;
pub mod genevent;
pub mod particle;
pub mod truth;

pub use event::{CurrentKind, InteractionMode, NeutrinoEvent, NeutrinoSummary, Origin};
pub use flux::{
    BeamPassThrough, Dk2nuChoice, Dk2nuDecay, Dk2nuRecord, FluxData, FluxKind, FluxRecord,
    HistFluxInfo, RayGeometry,
};
pub use genevent::{
    ExclusiveTag, GenEvent, GenParticle, HitNucleon, InitialState, Interaction, InteractionType,
    KineVar, Kinematics, ProcessInfo, ScatteringType, Target,
};
pub use particle::{Particle, ParticleStatus, TrajectoryPoint};
pub use truth::{kine_is_set, GeneratorTruth, HadronCounts, TruthKinematics, KINE_UNSET};
