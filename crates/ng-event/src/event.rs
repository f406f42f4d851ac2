//! Framework-native neutrino event record.

use crate::particle::{Particle, ParticleStatus};
use ng_core::types::is_neutrino;
use serde::{Deserialize, Serialize};

/// Provenance tag of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Accelerator beam neutrino.
    Beam,
    /// Cosmic-ray induced.
    Cosmic,
    /// Supernova neutrino.
    Supernova,
    /// Single-particle gun.
    SingleParticle,
    /// Not recorded.
    Unknown,
}

/// Weak current of an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrentKind {
    /// Charged current (W exchange).
    Charged,
    /// Neutral current (Z exchange).
    Neutral,
}

/// Interaction mode of the neutrino summary.
///
/// The ordering of the variants mirrors the precedence of the
/// process-predicate chain used when deriving the mode from a generator
/// record; it has no other meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionMode {
    /// Quasi-elastic scattering.
    QE,
    /// Meson-exchange current (2p2h).
    MEC,
    /// Deep inelastic scattering.
    DIS,
    /// Baryon-resonance production.
    Res,
    /// Coherent meson production.
    Coh,
    /// Coherent elastic neutrino-nucleus scattering.
    CohElastic,
    /// Scattering off an atomic electron (generic).
    ElectronScattering,
    /// Elastic neutrino-electron scattering.
    NuElectronElastic,
    /// Inverse muon decay.
    InverseMuDecay,
    /// Inverse-muon-decay annihilation channel.
    IMDAnnihilation,
    /// Inverse beta decay.
    InverseBetaDecay,
    /// Glashow resonance.
    GlashowResonance,
    /// Anomaly-mediated neutrino-photon interaction.
    AMNuGamma,
    /// Diffractive production.
    Diffractive,
    /// Electromagnetic interaction.
    EM,
    /// Weak-mixed (interference) interaction.
    WeakMix,
    /// Not determined.
    Unknown,
}

/// Offset applied when encoding (mode, current) into a single reaction code.
pub const REACTION_CODE_OFFSET: i32 = 1000;

impl InteractionMode {
    fn index(&self) -> i32 {
        match self {
            InteractionMode::QE => 0,
            InteractionMode::MEC => 1,
            InteractionMode::DIS => 2,
            InteractionMode::Res => 3,
            InteractionMode::Coh => 4,
            InteractionMode::CohElastic => 5,
            InteractionMode::ElectronScattering => 6,
            InteractionMode::NuElectronElastic => 7,
            InteractionMode::InverseMuDecay => 8,
            InteractionMode::IMDAnnihilation => 9,
            InteractionMode::InverseBetaDecay => 10,
            InteractionMode::GlashowResonance => 11,
            InteractionMode::AMNuGamma => 12,
            InteractionMode::Diffractive => 13,
            InteractionMode::EM => 14,
            InteractionMode::WeakMix => 15,
            InteractionMode::Unknown => 16,
        }
    }

    /// Offset-encoded reaction code for this mode and current.
    pub fn reaction_code(&self, current: CurrentKind) -> i32 {
        let cc = match current {
            CurrentKind::Charged => 0,
            CurrentKind::Neutral => 1,
        };
        REACTION_CODE_OFFSET + 2 * self.index() + cc
    }
}

/// Kinematic summary of the neutrino interaction.
///
/// Kinematics here are the experimentalist-style values recomputed from
/// final-state lepton four-momenta, not the generator's internal selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeutrinoSummary {
    /// Weak current.
    pub current: CurrentKind,
    /// Interaction mode.
    pub mode: InteractionMode,
    /// Offset-encoded reaction code.
    pub reaction: i32,
    /// Target nucleus PDG code.
    pub target: i32,
    /// Struck nucleon PDG code (0 if none).
    pub hit_nucleon: i32,
    /// Struck quark PDG code (0 if none).
    pub hit_quark: i32,
    /// Hadronic invariant mass W (GeV).
    pub w: f64,
    /// Bjorken x.
    pub x: f64,
    /// Inelasticity y.
    pub y: f64,
    /// Momentum transfer Q² (GeV², positive convention).
    pub q2: f64,
}

/// A framework-native neutrino event: provenance, optional neutrino
/// summary, and an ordered particle sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeutrinoEvent {
    /// Provenance of the event.
    pub origin: Origin,
    /// Neutrino kinematic summary; `None` until filled.
    pub summary: Option<NeutrinoSummary>,
    /// Particle entries, dense-indexed in insertion order.
    pub particles: Vec<Particle>,
}

impl NeutrinoEvent {
    /// New empty event with the given origin.
    pub fn new(origin: Origin) -> Self {
        Self { origin, summary: None, particles: Vec::new() }
    }

    /// Append a particle, assigning the next dense track id.
    pub fn add_particle(&mut self, mut p: Particle) -> usize {
        let id = self.particles.len();
        p.track_id = id;
        self.particles.push(p);
        id
    }

    /// All initial-state particle entries.
    pub fn initial_state(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter().filter(|p| p.status == ParticleStatus::InitialState)
    }

    /// The incoming neutrino: first initial-state entry with a neutrino PDG.
    pub fn probe(&self) -> Option<&Particle> {
        self.initial_state().find(|p| is_neutrino(p.pdg))
    }

    /// The outgoing lepton: first stable final-state charged lepton or
    /// neutrino.
    pub fn final_lepton(&self) -> Option<&Particle> {
        self.particles.iter().find(|p| {
            p.status == ParticleStatus::StableFinalState
                && (is_neutrino(p.pdg) || ng_core::types::is_charged_lepton(p.pdg))
        })
    }

    /// Daughter indices of entry `i`, reconstructed from mother links.
    pub fn daughters(&self, i: usize) -> Vec<usize> {
        self.particles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.mother == i as i32)
            .map(|(j, _)| j)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::TrajectoryPoint;
    use ng_core::FourVector;

    fn particle(pdg: i32, status: ParticleStatus, mother: i32) -> Particle {
        Particle {
            track_id: 0,
            pdg,
            status,
            mother,
            mass: 0.0,
            trajectory: vec![TrajectoryPoint {
                position: FourVector::zero(),
                momentum: FourVector::zero(),
            }],
            polarization: None,
            gen_vertex: None,
            rescatter: None,
        }
    }

    #[test]
    fn test_dense_track_ids() {
        let mut ev = NeutrinoEvent::new(Origin::Beam);
        let a = ev.add_particle(particle(14, ParticleStatus::InitialState, -1));
        let b = ev.add_particle(particle(13, ParticleStatus::StableFinalState, 0));
        assert_eq!((a, b), (0, 1));
        assert_eq!(ev.particles[1].track_id, 1);
        assert_eq!(ev.daughters(0), vec![1]);
    }

    #[test]
    fn test_probe_lookup() {
        let mut ev = NeutrinoEvent::new(Origin::Beam);
        ev.add_particle(particle(1_000_180_400, ParticleStatus::InitialState, -1));
        ev.add_particle(particle(14, ParticleStatus::InitialState, -1));
        assert_eq!(ev.probe().unwrap().pdg, 14);
    }

    #[test]
    fn test_reaction_code_encoding() {
        let qe_cc = InteractionMode::QE.reaction_code(CurrentKind::Charged);
        let qe_nc = InteractionMode::QE.reaction_code(CurrentKind::Neutral);
        assert_eq!(qe_cc, 1000);
        assert_eq!(qe_nc, 1001);
        assert_ne!(
            InteractionMode::DIS.reaction_code(CurrentKind::Charged),
            InteractionMode::Res.reaction_code(CurrentKind::Charged)
        );
    }
}
