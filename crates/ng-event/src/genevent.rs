//! Generator-side event record and interaction summary.
//!
//! This is the opaque record the external generator works with, expressed
//! as plain owned data: the event owns its particle list and its
//! [`Interaction`] summary, so the record/summary reference cycle of the
//! native library collapses into single ownership.

use ng_core::FourVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scattering-process class of the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScatteringType {
    /// Quasi-elastic.
    QuasiElastic,
    /// Meson-exchange current (2p2h).
    MEC,
    /// Deep inelastic.
    DeepInelastic,
    /// Baryon-resonance production.
    Resonant,
    /// Coherent meson production.
    CoherentProduction,
    /// Coherent elastic neutrino-nucleus scattering.
    CoherentElastic,
    /// Neutrino-electron elastic scattering.
    NuElectronElastic,
    /// Inverse muon decay.
    InverseMuDecay,
    /// IMD annihilation channel.
    IMDAnnihilation,
    /// Inverse beta decay.
    InverseBetaDecay,
    /// Glashow resonance.
    GlashowResonance,
    /// Anomaly-mediated neutrino-photon channel.
    AMNuGamma,
    /// Diffractive production.
    Diffractive,
    /// Generic electron scattering.
    ElectronScattering,
    /// Not set.
    Unknown,
}

impl ScatteringType {
    /// Integer id persisted in [`GeneratorTruth`](crate::GeneratorTruth).
    pub fn id(&self) -> i32 {
        match self {
            ScatteringType::QuasiElastic => 1,
            ScatteringType::MEC => 2,
            ScatteringType::DeepInelastic => 3,
            ScatteringType::Resonant => 4,
            ScatteringType::CoherentProduction => 5,
            ScatteringType::CoherentElastic => 6,
            ScatteringType::NuElectronElastic => 7,
            ScatteringType::InverseMuDecay => 8,
            ScatteringType::IMDAnnihilation => 9,
            ScatteringType::InverseBetaDecay => 10,
            ScatteringType::GlashowResonance => 11,
            ScatteringType::AMNuGamma => 12,
            ScatteringType::Diffractive => 13,
            ScatteringType::ElectronScattering => 14,
            ScatteringType::Unknown => -1,
        }
    }

    /// Inverse of [`ScatteringType::id`]; unknown ids map to `Unknown`.
    pub fn from_id(id: i32) -> Self {
        match id {
            1 => ScatteringType::QuasiElastic,
            2 => ScatteringType::MEC,
            3 => ScatteringType::DeepInelastic,
            4 => ScatteringType::Resonant,
            5 => ScatteringType::CoherentProduction,
            6 => ScatteringType::CoherentElastic,
            7 => ScatteringType::NuElectronElastic,
            8 => ScatteringType::InverseMuDecay,
            9 => ScatteringType::IMDAnnihilation,
            10 => ScatteringType::InverseBetaDecay,
            11 => ScatteringType::GlashowResonance,
            12 => ScatteringType::AMNuGamma,
            13 => ScatteringType::Diffractive,
            14 => ScatteringType::ElectronScattering,
            _ => ScatteringType::Unknown,
        }
    }
}

/// Interaction-type class (exchange boson) of the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionType {
    /// Weak charged current.
    WeakCC,
    /// Weak neutral current.
    WeakNC,
    /// Electromagnetic.
    EM,
    /// Weak CC/NC interference.
    WeakMix,
    /// Not set.
    Unknown,
}

impl InteractionType {
    /// Integer id persisted in [`GeneratorTruth`](crate::GeneratorTruth).
    pub fn id(&self) -> i32 {
        match self {
            InteractionType::WeakCC => 1,
            InteractionType::WeakNC => 2,
            InteractionType::EM => 3,
            InteractionType::WeakMix => 4,
            InteractionType::Unknown => -1,
        }
    }

    /// Inverse of [`InteractionType::id`].
    pub fn from_id(id: i32) -> Self {
        match id {
            1 => InteractionType::WeakCC,
            2 => InteractionType::WeakNC,
            3 => InteractionType::EM,
            4 => InteractionType::WeakMix,
            _ => InteractionType::Unknown,
        }
    }
}

/// Process information: scattering class plus interaction class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    /// Scattering-process class.
    pub scattering: ScatteringType,
    /// Interaction-type class.
    pub interaction: InteractionType,
}

impl ProcessInfo {
    /// New process info.
    pub fn new(scattering: ScatteringType, interaction: InteractionType) -> Self {
        Self { scattering, interaction }
    }

    /// Weak charged current?
    pub fn is_weak_cc(&self) -> bool {
        self.interaction == InteractionType::WeakCC
    }

    /// Weak neutral current?
    pub fn is_weak_nc(&self) -> bool {
        self.interaction == InteractionType::WeakNC
    }

    /// Quasi-elastic?
    pub fn is_quasi_elastic(&self) -> bool {
        self.scattering == ScatteringType::QuasiElastic
    }

    /// Meson-exchange current?
    pub fn is_mec(&self) -> bool {
        self.scattering == ScatteringType::MEC
    }

    /// Deep inelastic?
    pub fn is_deep_inelastic(&self) -> bool {
        self.scattering == ScatteringType::DeepInelastic
    }

    /// Resonant?
    pub fn is_resonant(&self) -> bool {
        self.scattering == ScatteringType::Resonant
    }

    /// Coherent meson production?
    pub fn is_coherent_production(&self) -> bool {
        self.scattering == ScatteringType::CoherentProduction
    }

    /// Coherent elastic?
    pub fn is_coherent_elastic(&self) -> bool {
        self.scattering == ScatteringType::CoherentElastic
    }
}

/// Kinematic variable keys of the generator's kinematics container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KineVar {
    /// Bjorken x.
    X,
    /// Inelasticity y.
    Y,
    /// Mandelstam t.
    T,
    /// Hadronic invariant mass W.
    W,
    /// Momentum transfer Q² (positive convention).
    Q2,
    /// Four-momentum transfer q² (negative convention).
    QSqr,
}

/// Kinematics container with explicit per-variable set flags.
///
/// Only variables the generator actually selected are present; reading an
/// absent variable yields `None` rather than a default.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Kinematics {
    vars: BTreeMap<KineVar, f64>,
}

impl Kinematics {
    /// New empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable.
    pub fn set(&mut self, var: KineVar, value: f64) {
        self.vars.insert(var, value);
    }

    /// Read a variable, if set.
    pub fn get(&self, var: KineVar) -> Option<f64> {
        self.vars.get(&var).copied()
    }

    /// Was this variable set?
    pub fn has(&self, var: KineVar) -> bool {
        self.vars.contains_key(&var)
    }

    /// Number of set variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// True if no variable is set.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Exclusive final-state tag: resonance, pre-FSI multiplicities, charm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusiveTag {
    /// Baryon-resonance number, or -1.
    pub resonance: i32,
    /// π⁺ multiplicity before final-state interactions.
    pub n_pi_plus: u32,
    /// π⁻ multiplicity.
    pub n_pi_minus: u32,
    /// π⁰ multiplicity.
    pub n_pi_zero: u32,
    /// Proton multiplicity.
    pub n_proton: u32,
    /// Neutron multiplicity.
    pub n_neutron: u32,
    /// Charm-production flag.
    pub is_charm: bool,
}

impl Default for ExclusiveTag {
    fn default() -> Self {
        Self {
            resonance: -1,
            n_pi_plus: 0,
            n_pi_minus: 0,
            n_pi_zero: 0,
            n_proton: 0,
            n_neutron: 0,
            is_charm: false,
        }
    }
}

/// Target nucleus description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Nuclear PDG code (10LZZZAAAI), or a bare-nucleon code.
    pub pdg: i32,
    /// Proton number.
    pub z: i32,
    /// Nucleon number.
    pub a: i32,
}

impl Default for ProcessInfo {
    fn default() -> Self {
        Self {
            scattering: ScatteringType::Unknown,
            interaction: InteractionType::Unknown,
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self { pdg: 0, z: 0, a: 0 }
    }
}

/// Struck nucleon inside the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitNucleon {
    /// Nucleon PDG code.
    pub pdg: i32,
    /// Nucleon four-momentum including Fermi motion (GeV).
    pub p4: FourVector,
}

/// Initial state of the interaction: probe, target, optional struck
/// nucleon/quark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    /// Probe PDG code.
    pub probe_pdg: i32,
    /// Probe four-momentum (GeV).
    pub probe_p4: FourVector,
    /// Target nucleus.
    pub target: Target,
    /// Struck nucleon, if the process has one.
    pub hit_nucleon: Option<HitNucleon>,
    /// Struck quark PDG code, if the process resolves one.
    pub hit_quark: Option<i32>,
    /// True if the struck quark was a sea quark.
    pub sea_quark: bool,
}

impl Default for InitialState {
    fn default() -> Self {
        Self {
            probe_pdg: 0,
            probe_p4: FourVector::default(),
            target: Target::default(),
            hit_nucleon: None,
            hit_quark: None,
            sea_quark: false,
        }
    }
}

/// Full interaction summary owned by a [`GenEvent`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Interaction {
    /// Process classes.
    pub process: ProcessInfo,
    /// Selected kinematics.
    pub kinematics: Kinematics,
    /// Exclusive final-state tag.
    pub exclusive: ExclusiveTag,
    /// Initial state.
    pub initial_state: InitialState,
}

/// One particle entry of the generator record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenParticle {
    /// PDG code.
    pub pdg: i32,
    /// GHEP status code.
    pub status: crate::ParticleStatus,
    /// Index of the mother entry, or -1.
    pub mother: i32,
    /// Four-momentum (GeV).
    pub p4: FourVector,
    /// Position relative to the nucleus center (fm; t in the generator
    /// clock).
    pub x4: FourVector,
    /// Spin polarization, if set.
    #[serde(default)]
    pub polarization: Option<[f64; 3]>,
    /// Intranuclear rescattering code, if set.
    #[serde(default)]
    pub rescatter: Option<i32>,
}

/// The generator-side event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenEvent {
    /// Particle entries in generation order.
    pub particles: Vec<GenParticle>,
    /// Interaction summary.
    pub interaction: Interaction,
    /// Generator event weight.
    pub weight: f64,
    /// Interaction probability for the sampled ray.
    pub probability: f64,
    /// Total cross section of the selected channel (1e-38 cm²).
    pub xsec: f64,
    /// Differential cross section at the selected kinematics.
    pub diff_xsec: f64,
    /// Interaction vertex in the generator frame (meters; t in seconds).
    pub vertex: FourVector,
}

impl Default for GenEvent {
    fn default() -> Self {
        Self {
            particles: Vec::new(),
            interaction: Interaction::default(),
            weight: 1.0,
            probability: 0.0,
            xsec: 0.0,
            diff_xsec: 0.0,
            vertex: FourVector::default(),
        }
    }
}

impl GenEvent {
    /// The probe entry: first initial-state particle with a lepton PDG.
    pub fn probe(&self) -> Option<&GenParticle> {
        self.particles.iter().find(|p| {
            p.status == crate::ParticleStatus::InitialState
                && (ng_core::types::is_neutrino(p.pdg)
                    || ng_core::types::is_charged_lepton(p.pdg))
        })
    }

    /// The outgoing primary lepton: first stable final-state lepton.
    pub fn final_lepton(&self) -> Option<&GenParticle> {
        self.particles.iter().find(|p| {
            p.status == crate::ParticleStatus::StableFinalState
                && (ng_core::types::is_neutrino(p.pdg)
                    || ng_core::types::is_charged_lepton(p.pdg))
        })
    }

    /// The struck-nucleon entry, if present.
    pub fn hit_nucleon(&self) -> Option<&GenParticle> {
        self.particles
            .iter()
            .find(|p| p.status == crate::ParticleStatus::NucleonTarget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scattering_id_roundtrip() {
        for s in [
            ScatteringType::QuasiElastic,
            ScatteringType::MEC,
            ScatteringType::DeepInelastic,
            ScatteringType::Resonant,
            ScatteringType::CoherentProduction,
            ScatteringType::CoherentElastic,
            ScatteringType::GlashowResonance,
        ] {
            assert_eq!(ScatteringType::from_id(s.id()), s);
        }
        assert_eq!(ScatteringType::from_id(999), ScatteringType::Unknown);
    }

    #[test]
    fn test_kinematics_set_flags() {
        let mut k = Kinematics::new();
        assert!(k.is_empty());
        k.set(KineVar::Q2, 1.25);
        assert!(k.has(KineVar::Q2));
        assert!(!k.has(KineVar::W));
        assert_eq!(k.get(KineVar::Q2), Some(1.25));
        assert_eq!(k.get(KineVar::X), None);
    }
}
