//! Particle entries of a framework-native neutrino event.

use ng_core::FourVector;
use serde::{Deserialize, Serialize};

/// Generator status of a particle entry.
///
/// The numeric codes follow the generator's GHEP convention so that
/// persisted records remain comparable with upstream files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleStatus {
    /// Not set by the generator.
    Undefined,
    /// Incoming probe or target (code 0).
    InitialState,
    /// Stable particle leaving the nucleus (code 1).
    StableFinalState,
    /// Intermediate propagator-level entry (code 2).
    IntermediateState,
    /// Decayed inside the generator (code 3).
    DecayedState,
    /// Struck nucleon inside the target nucleus (code 11).
    NucleonTarget,
    /// Hadron still inside the nucleus, before final-state interactions
    /// (code 14).
    HadronInNucleus,
    /// Remnant nucleus after the interaction (code 15).
    FinalStateNuclearRemnant,
    /// Nucleon-cluster target used by MEC channels (code 16).
    NucleonClusterTarget,
}

impl ParticleStatus {
    /// GHEP integer code of this status.
    pub fn code(&self) -> i32 {
        match self {
            ParticleStatus::Undefined => -1,
            ParticleStatus::InitialState => 0,
            ParticleStatus::StableFinalState => 1,
            ParticleStatus::IntermediateState => 2,
            ParticleStatus::DecayedState => 3,
            ParticleStatus::NucleonTarget => 11,
            ParticleStatus::HadronInNucleus => 14,
            ParticleStatus::FinalStateNuclearRemnant => 15,
            ParticleStatus::NucleonClusterTarget => 16,
        }
    }

    /// Status for a GHEP integer code; unknown codes map to `Undefined`.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ParticleStatus::InitialState,
            1 => ParticleStatus::StableFinalState,
            2 => ParticleStatus::IntermediateState,
            3 => ParticleStatus::DecayedState,
            11 => ParticleStatus::NucleonTarget,
            14 => ParticleStatus::HadronInNucleus,
            15 => ParticleStatus::FinalStateNuclearRemnant,
            16 => ParticleStatus::NucleonClusterTarget,
            _ => ParticleStatus::Undefined,
        }
    }
}

/// One point of a particle trajectory: detector-frame position (cm, ns)
/// and momentum (GeV) at that point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Position four-vector in detector coordinates (cm; t in ns).
    pub position: FourVector,
    /// Momentum four-vector (GeV).
    pub momentum: FourVector,
}

/// A particle entry of a [`NeutrinoEvent`](crate::NeutrinoEvent).
///
/// Track ids are dense and equal to the entry's position in the event's
/// particle sequence; mother indices refer to positions in that sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Dense index of this entry within the event.
    pub track_id: usize,
    /// PDG code.
    pub pdg: i32,
    /// Generator status.
    pub status: ParticleStatus,
    /// Index of the mother entry, or -1 for primaries.
    pub mother: i32,
    /// Mass in GeV.
    pub mass: f64,
    /// Trajectory points (at least one for status-carrying particles).
    pub trajectory: Vec<TrajectoryPoint>,
    /// Spin polarization, if set by the generator.
    #[serde(default)]
    pub polarization: Option<[f64; 3]>,
    /// Generator-frame vertex (position in fm relative to the nucleus
    /// center, t in the generator clock), if recorded.
    #[serde(default)]
    pub gen_vertex: Option<FourVector>,
    /// Intranuclear rescattering code, if recorded.
    #[serde(default)]
    pub rescatter: Option<i32>,
}

impl Particle {
    /// First trajectory point, if any.
    pub fn start(&self) -> Option<&TrajectoryPoint> {
        self.trajectory.first()
    }

    /// Last trajectory point, if any.
    pub fn end(&self) -> Option<&TrajectoryPoint> {
        self.trajectory.last()
    }

    /// Momentum at the first trajectory point, or zero if none.
    pub fn momentum(&self) -> FourVector {
        self.start().map(|p| p.momentum).unwrap_or_else(FourVector::zero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_roundtrip() {
        for code in [-1, 0, 1, 2, 3, 11, 14, 15, 16] {
            let s = ParticleStatus::from_code(code);
            if code == -1 {
                assert_eq!(s, ParticleStatus::Undefined);
            } else {
                assert_eq!(s.code(), code);
            }
        }
        assert_eq!(ParticleStatus::from_code(99), ParticleStatus::Undefined);
    }
}
