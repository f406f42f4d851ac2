//! Generator-truth record persisted alongside each neutrino event.

use ng_core::FourVector;
use serde::{Deserialize, Serialize};

/// Sentinel for internal kinematic variables the generator never set.
///
/// Consumers must compare against this value before using a field; the
/// reverse translation only restores variables that differ from it.
pub const KINE_UNSET: f64 = -99999.0;

/// True if an internal kinematic field holds a real value.
pub fn kine_is_set(v: f64) -> bool {
    (v - KINE_UNSET).abs() > 0.5
}

/// Internal generator kinematics. Any subset may be unset ([`KINE_UNSET`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruthKinematics {
    /// Momentum transfer Q² (positive convention).
    pub q2: f64,
    /// Four-momentum transfer q² (negative convention).
    pub q_sq: f64,
    /// Hadronic invariant mass W.
    pub w: f64,
    /// Mandelstam t.
    pub t: f64,
    /// Bjorken x.
    pub x: f64,
    /// Inelasticity y.
    pub y: f64,
}

impl Default for TruthKinematics {
    fn default() -> Self {
        Self { q2: KINE_UNSET, q_sq: KINE_UNSET, w: KINE_UNSET, t: KINE_UNSET, x: KINE_UNSET, y: KINE_UNSET }
    }
}

/// Pre-final-state-interaction hadron multiplicities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HadronCounts {
    /// π⁺ count.
    pub pi_plus: u32,
    /// π⁻ count.
    pub pi_minus: u32,
    /// π⁰ count.
    pub pi_zero: u32,
    /// Proton count.
    pub proton: u32,
    /// Neutron count.
    pub neutron: u32,
}

/// Generator truth: everything needed to rebuild the generator-side event
/// record from persisted data.
///
/// `weight` is the generator's internal weight, never a reweight factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorTruth {
    /// Generator interaction-type id.
    pub interaction_type: i32,
    /// Generator scattering-type id.
    pub scattering_type: i32,
    /// Generator event weight.
    pub weight: f64,
    /// Interaction probability for the sampled ray.
    pub probability: f64,
    /// Total cross section for the selected channel (1e-38 cm²).
    pub xsec: f64,
    /// Differential cross section at the selected kinematics.
    pub diff_xsec: f64,
    /// Interaction vertex in the generator frame (meters; t in seconds).
    pub vertex: FourVector,
    /// Hadron multiplicities before final-state interactions.
    pub pre_fsi: HadronCounts,
    /// Charm-production flag.
    pub is_charm: bool,
    /// Baryon-resonance number, or -1.
    pub resonance: i32,
    /// Internal kinematics; unset entries hold [`KINE_UNSET`].
    pub kinematics: TruthKinematics,
    /// Final-state hadronic-system four-momentum.
    pub fs_hadronic_p4: FourVector,
    /// Probe PDG code.
    pub probe_pdg: i32,
    /// Probe four-momentum.
    pub probe_p4: FourVector,
    /// Target PDG code.
    pub target_pdg: i32,
    /// Target proton number.
    pub target_z: i32,
    /// Target nucleon number.
    pub target_a: i32,
    /// True if the struck quark was a sea quark.
    pub is_sea_quark: bool,
    /// Struck-nucleon PDG code (0 if none).
    pub hit_nucleon_pdg: i32,
    /// Struck-nucleon four-momentum (zero if none).
    pub hit_nucleon_p4: FourVector,
}

impl Default for GeneratorTruth {
    fn default() -> Self {
        Self {
            interaction_type: -1,
            scattering_type: -1,
            weight: 1.0,
            probability: 0.0,
            xsec: 0.0,
            diff_xsec: 0.0,
            vertex: FourVector::zero(),
            pre_fsi: HadronCounts::default(),
            is_charm: false,
            resonance: -1,
            kinematics: TruthKinematics::default(),
            fs_hadronic_p4: FourVector::zero(),
            probe_pdg: 0,
            probe_p4: FourVector::zero(),
            target_pdg: 0,
            target_z: 0,
            target_a: 0,
            is_sea_quark: false,
            hit_nucleon_pdg: 0,
            hit_nucleon_p4: FourVector::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kine_sentinel() {
        let k = TruthKinematics::default();
        assert!(!kine_is_set(k.q2));
        assert!(kine_is_set(0.0));
        assert!(kine_is_set(-1.5));
    }

    #[test]
    fn test_truth_serde_roundtrip() {
        let t = GeneratorTruth { probe_pdg: 14, target_z: 18, target_a: 40, ..Default::default() };
        let json = serde_json::to_string(&t).unwrap();
        let back: GeneratorTruth = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
