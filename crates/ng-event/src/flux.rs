//! Flux provenance record co-emitted with each neutrino event.
//!
//! The record is a closed tagged union over the flux modes; consumers
//! switch on [`FluxKind`] before reading mode-specific fields.

use serde::{Deserialize, Serialize};

/// Discriminant of the flux pass-through payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FluxKind {
    /// Full beamline ntuple ("NuMI" family).
    NuMi,
    /// Condensed beamline ntuple.
    SimpleNtuple,
    /// Decay-to-neutrino ntuple with full provenance.
    Dk2nu,
    /// Per-flavor energy histograms plus focus-peak information.
    HistPlusFocus,
    /// Minimal placeholder (mono-energetic, functional, atmospheric modes).
    Simple,
}

/// Beamline pass-through fields of the ntuple flux families.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamPassThrough {
    /// Beamline simulation run number.
    pub run: i32,
    /// Entry number within the run.
    pub evtno: i32,
    /// Parent hadron PDG code.
    pub ptype: i32,
    /// Decay-channel code of the parent.
    pub ndecay: i32,
    /// Neutrino PDG code at the decay.
    pub ntype: i32,
    /// Decay vertex x (cm, beam frame).
    pub vx: f64,
    /// Decay vertex y.
    pub vy: f64,
    /// Decay vertex z.
    pub vz: f64,
    /// Parent momentum at decay, x (GeV).
    pub pdpx: f64,
    /// Parent momentum at decay, y.
    pub pdpy: f64,
    /// Parent momentum at decay, z.
    pub pdpz: f64,
    /// Parent direction slope dx/dz at production.
    pub ppdxdz: f64,
    /// Parent direction slope dy/dz at production.
    pub ppdydz: f64,
    /// Parent pz at production (GeV).
    pub pppz: f64,
    /// Parent energy at production (GeV).
    pub ppenergy: f64,
    /// Target-exit momentum x (GeV).
    pub tpx: f64,
    /// Target-exit momentum y.
    pub tpy: f64,
    /// Target-exit momentum z.
    pub tpz: f64,
    /// PDG code of the particle leaving the target.
    pub tptype: i32,
    /// Beam-spot x (cm).
    pub beamx: f64,
    /// Beam-spot y.
    pub beamy: f64,
    /// Beam-spot z.
    pub beamz: f64,
    /// Neutrino energy in the parent center-of-mass frame (GeV).
    pub necm: f64,
    /// Importance (impulse) weight.
    pub nimpwt: f64,
}

/// Decay provenance carried by the dk2nu schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dk2nuDecay {
    /// Origin code of the decay chain.
    pub norig: i32,
    /// Decay-channel code.
    pub ndecay: i32,
    /// Neutrino PDG code.
    pub ntype: i32,
    /// Decay vertex (cm, beam frame).
    pub vx: f64,
    /// Decay vertex y.
    pub vy: f64,
    /// Decay vertex z.
    pub vz: f64,
    /// Parent momentum at decay (GeV).
    pub pdpx: f64,
    /// Parent momentum at decay, y.
    pub pdpy: f64,
    /// Parent momentum at decay, z.
    pub pdpz: f64,
    /// Neutrino energy in the parent rest frame (GeV).
    pub necm: f64,
    /// Importance weight.
    pub nimpwt: f64,
}

/// Ray choice record carried by the dk2nu schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dk2nuChoice {
    /// Chosen neutrino PDG code.
    pub pdg: i32,
    /// Ray origin (cm, detector frame).
    pub xyz: [f64; 3],
    /// Neutrino four-momentum (GeV).
    pub p4: [f64; 4],
    /// Importance weight of the choice.
    pub imp_weight: f64,
}

/// Full dk2nu pass-through: job header plus decay and choice records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dk2nuRecord {
    /// Beamline simulation job id.
    pub job: i32,
    /// Protons on target represented by this entry's file.
    pub pot: f64,
    /// Decay provenance.
    pub decay: Dk2nuDecay,
    /// Ray choice.
    pub choice: Dk2nuChoice,
}

/// Histogram-mode pass-through: per-flavor energy-flux array.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistFluxInfo {
    /// Energy flux per flavor, ordered (νe, ν̄e, νμ, ν̄μ, ντ, ν̄τ).
    pub flux: [f64; 6],
}

/// Mode-specific flux payload. Matches [`FluxKind`] one-to-one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FluxData {
    /// NuMI-family beamline fields.
    NuMi(BeamPassThrough),
    /// Condensed beamline fields.
    SimpleNtuple(BeamPassThrough),
    /// dk2nu decay + choice records.
    Dk2nu(Box<Dk2nuRecord>),
    /// Histogram-mode energy-flux array.
    HistPlusFocus(HistFluxInfo),
    /// No beamline provenance.
    Simple,
}

impl FluxData {
    /// The tag matching this payload.
    pub fn kind(&self) -> FluxKind {
        match self {
            FluxData::NuMi(_) => FluxKind::NuMi,
            FluxData::SimpleNtuple(_) => FluxKind::SimpleNtuple,
            FluxData::Dk2nu(_) => FluxKind::Dk2nu,
            FluxData::HistPlusFocus(_) => FluxKind::HistPlusFocus,
            FluxData::Simple => FluxKind::Simple,
        }
    }
}

/// Per-event ray geometry recorded at sample time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RayGeometry {
    /// Flux-ray start position (cm, detector frame).
    pub ray_origin: [f64; 3],
    /// Interaction vertex (cm, detector frame).
    pub vertex: [f64; 3],
    /// Distance from parent decay point to ray origin (cm).
    pub dk2gen: f64,
    /// Distance from ray origin to interaction vertex (cm).
    pub gen2vtx: f64,
}

/// Flux provenance record: tag, per-event ray geometry, and pass-through
/// payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluxRecord {
    /// Flux-mode tag. Always read this before the payload.
    pub tag: FluxKind,
    /// Ray start / vertex geometry of this event.
    pub ray: RayGeometry,
    /// Mode-specific pass-through fields.
    pub data: FluxData,
}

impl FluxRecord {
    /// A minimal record with the `Simple` tag and the given ray geometry.
    pub fn simple(ray: RayGeometry) -> Self {
        Self { tag: FluxKind::Simple, ray, data: FluxData::Simple }
    }

    /// Construct from a payload, deriving the tag from it.
    pub fn from_data(ray: RayGeometry, data: FluxData) -> Self {
        Self { tag: data.kind(), ray, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_matches_payload() {
        let rec = FluxRecord::from_data(
            RayGeometry::default(),
            FluxData::NuMi(BeamPassThrough { run: 7, ..Default::default() }),
        );
        assert_eq!(rec.tag, FluxKind::NuMi);
        match &rec.data {
            FluxData::NuMi(b) => assert_eq!(b.run, 7),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_flux_serde_roundtrip() {
        let rec = FluxRecord::from_data(
            RayGeometry { dk2gen: 12.0, ..Default::default() },
            FluxData::Dk2nu(Box::new(Dk2nuRecord { job: 3, pot: 1e17, ..Default::default() })),
        );
        let json = serde_json::to_string(&rec).unwrap();
        let back: FluxRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, back);
    }
}
